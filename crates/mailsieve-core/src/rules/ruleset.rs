use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::clock::Clock;
use crate::records::Record;

use super::conditions::{ConditionError, validate_condition};
use super::matcher::{MatchError, find_match};
use super::types::{Action, Rule};

#[derive(Debug, Error)]
pub enum RuleSetError {
    #[error("failed to read rules file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid rules document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("rule '{rule}' has no conditions")]
    EmptyConditions { rule: String },
    #[error("rule '{rule}' condition #{index}: {source}")]
    InvalidCondition {
        rule: String,
        index: usize,
        source: ConditionError,
    },
    #[error("rule '{rule}' action #{index}: {reason}")]
    InvalidAction {
        rule: String,
        index: usize,
        reason: String,
    },
}

/// Ordered, validated collection of rules. Immutable once loaded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new(rules: Vec<Rule>) -> Result<Self, RuleSetError> {
        let rule_set = Self { rules };
        rule_set.validate()?;
        Ok(rule_set)
    }

    pub fn from_json_str(document: &str) -> Result<Self, RuleSetError> {
        let rules: Vec<Rule> = serde_json::from_str(document)?;
        Self::new(rules)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, RuleSetError> {
        let path = path.as_ref();
        let document = fs::read_to_string(path).map_err(|source| RuleSetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&document)
    }

    /// Checks every rule so that misconfiguration fails the load rather than a
    /// later evaluation.
    pub fn validate(&self) -> Result<(), RuleSetError> {
        for rule in &self.rules {
            if rule.conditions.is_empty() {
                return Err(RuleSetError::EmptyConditions {
                    rule: rule.name.clone(),
                });
            }

            for (index, condition) in rule.conditions.iter().enumerate() {
                validate_condition(condition).map_err(|source| {
                    RuleSetError::InvalidCondition {
                        rule: rule.name.clone(),
                        index,
                        source,
                    }
                })?;
            }

            for (index, action) in rule.actions.iter().enumerate() {
                validate_action(action).map_err(|reason| RuleSetError::InvalidAction {
                    rule: rule.name.clone(),
                    index,
                    reason,
                })?;
            }
        }
        Ok(())
    }

    pub fn find_match(
        &self,
        record: &Record,
        clock: &dyn Clock,
    ) -> Result<Option<&Rule>, MatchError> {
        find_match(record, self, clock)
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Rule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl<'a> IntoIterator for &'a RuleSet {
    type Item = &'a Rule;
    type IntoIter = std::slice::Iter<'a, Rule>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.iter()
    }
}

fn validate_action(action: &Action) -> Result<(), String> {
    let has_value = action
        .value
        .as_deref()
        .is_some_and(|value| !value.trim().is_empty());

    match (action.kind.requires_value(), has_value, action.value.is_some()) {
        (true, false, _) => Err(format!("'{}' requires a label name", action.kind.as_str())),
        (false, _, true) => Err(format!("'{}' does not take a value", action.kind.as_str())),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::types::{ActionKind, Aggregate, Condition, Field, Predicate};
    use std::io::Write;
    use tempfile::NamedTempFile;

    const RULES_JSON: &str = r#"
[
  {
    "rule_name": "Flag Invoices",
    "predicate": "Any",
    "conditions": [
      { "field": "Subject", "predicate": "contains", "value": "Invoice" }
    ],
    "actions": [
      { "action": "Mark as Unread" }
    ]
  },
  {
    "rule_name": "Archive old newsletters",
    "predicate": "All",
    "conditions": [
      { "field": "From", "predicate": "contains", "value": "newsletter" },
      { "field": "Received Date", "predicate": "greater_than", "value": "1 month" }
    ],
    "actions": [
      { "action": "Mark as Read" },
      { "action": "Move Message", "value": "Archive" }
    ]
  }
]
"#;

    #[test]
    fn loads_rules_in_declared_order() {
        let rules = RuleSet::from_json_str(RULES_JSON).expect("rules parse");
        assert_eq!(rules.len(), 2);
        let names: Vec<&str> = rules.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Flag Invoices", "Archive old newsletters"]);
        assert_eq!(rules.rules()[1].aggregate, Aggregate::All);
        assert_eq!(rules.rules()[1].actions[1].kind, ActionKind::MoveToLabel);
    }

    #[test]
    fn loads_rules_from_file() {
        let mut file = NamedTempFile::new().expect("temp file");
        file.write_all(RULES_JSON.as_bytes()).expect("write rules");

        let rules = RuleSet::load(file.path()).expect("rules load");
        assert_eq!(rules.len(), 2);
    }

    #[test]
    fn missing_file_is_reported_with_path() {
        let err = RuleSet::load("/definitely/not/here/rules.json").expect_err("missing file");
        match err {
            RuleSetError::Io { path, .. } => {
                assert_eq!(path, PathBuf::from("/definitely/not/here/rules.json"))
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn malformed_json_is_rejected() {
        let err = RuleSet::from_json_str("[{\"rule_name\": \"x\"").expect_err("bad json");
        assert!(matches!(err, RuleSetError::Json(_)));

        let err = RuleSet::from_json_str(r#"[{"rule_name": "x", "predicate": "Most", "conditions": []}]"#)
            .expect_err("unknown aggregate");
        assert!(matches!(err, RuleSetError::Json(_)));
    }

    #[test]
    fn empty_conditions_are_rejected() {
        let err = RuleSet::from_json_str(
            r#"[{"rule_name": "Nothing", "predicate": "All", "conditions": [], "actions": []}]"#,
        )
        .expect_err("empty conditions");
        match err {
            RuleSetError::EmptyConditions { rule } => assert_eq!(rule, "Nothing"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn invalid_age_expression_fails_at_load() {
        let err = RuleSet::from_json_str(
            r#"[{"rule_name": "Old", "predicate": "All", "conditions": [
                {"field": "Subject", "predicate": "contains", "value": "x"},
                {"field": "Received Date", "predicate": "less_than", "value": "3 weeks"}
            ]}]"#,
        )
        .expect_err("bad age");
        match err {
            RuleSetError::InvalidCondition { rule, index, source } => {
                assert_eq!(rule, "Old");
                assert_eq!(index, 1);
                assert_eq!(source, ConditionError::InvalidAge("3 weeks".into()));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn incompatible_predicate_fails_at_load() {
        let rules = vec![Rule {
            name: "Mixed".into(),
            aggregate: Aggregate::Any,
            conditions: vec![Condition::new(Field::Body, Predicate::OlderThan, "2 days")],
            actions: vec![],
        }];
        let err = RuleSet::new(rules).expect_err("incompatible pair");
        assert!(matches!(
            err,
            RuleSetError::InvalidCondition {
                source: ConditionError::IncompatiblePredicate { .. },
                ..
            }
        ));
    }

    #[test]
    fn move_requires_label_and_flags_reject_values() {
        let err = RuleSet::from_json_str(
            r#"[{"rule_name": "Move", "predicate": "Any",
                "conditions": [{"field": "Subject", "predicate": "contains", "value": "x"}],
                "actions": [{"action": "Move Message"}]}]"#,
        )
        .expect_err("move without label");
        assert!(matches!(err, RuleSetError::InvalidAction { index: 0, .. }));

        let err = RuleSet::from_json_str(
            r#"[{"rule_name": "Move", "predicate": "Any",
                "conditions": [{"field": "Subject", "predicate": "contains", "value": "x"}],
                "actions": [{"action": "Mark as Read"}, {"action": "Move Message", "value": "  "}]}]"#,
        )
        .expect_err("blank label");
        assert!(matches!(err, RuleSetError::InvalidAction { index: 1, .. }));

        let err = RuleSet::from_json_str(
            r#"[{"rule_name": "Read", "predicate": "Any",
                "conditions": [{"field": "Subject", "predicate": "contains", "value": "x"}],
                "actions": [{"action": "Mark as Read", "value": "Archive"}]}]"#,
        )
        .expect_err("flag with value");
        assert!(matches!(err, RuleSetError::InvalidAction { index: 0, .. }));
    }

    #[test]
    fn empty_document_is_an_empty_rule_set() {
        let rules = RuleSet::from_json_str("[]").expect("empty list is valid");
        assert!(rules.is_empty());
    }
}
