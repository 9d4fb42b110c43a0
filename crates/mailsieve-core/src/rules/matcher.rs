use crate::clock::Clock;
use crate::records::Record;

use thiserror::Error;

use super::conditions::{ConditionError, evaluate};
use super::ruleset::RuleSet;
use super::types::Rule;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatchError {
    #[error("rule '{0}' has no conditions")]
    EmptyRule(String),
    #[error(transparent)]
    Condition(#[from] ConditionError),
}

/// Evaluates every condition of `rule` in order and combines the results under
/// the rule's aggregate. All conditions are evaluated so a misconfigured
/// condition is reported even when an earlier one already decided the outcome.
pub fn matches(record: &Record, rule: &Rule, clock: &dyn Clock) -> Result<bool, MatchError> {
    if rule.conditions.is_empty() {
        return Err(MatchError::EmptyRule(rule.name.clone()));
    }

    let results = rule
        .conditions
        .iter()
        .map(|condition| evaluate(record, condition, clock))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rule.aggregate.combine(&results))
}

/// Returns the first rule, in declared order, that matches `record`.
pub fn find_match<'r>(
    record: &Record,
    rules: &'r RuleSet,
    clock: &dyn Clock,
) -> Result<Option<&'r Rule>, MatchError> {
    for rule in rules.iter() {
        if matches(record, rule, clock)? {
            return Ok(Some(rule));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::rules::types::{Action, Aggregate, Condition, Field, Predicate};
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 20, 8, 0, 0).unwrap()
    }

    fn record() -> Record {
        Record {
            id: "12345".into(),
            sender: Some("billing@vendor.example".into()),
            subject: Some("Your Invoice is here".into()),
            body: Some("Amount due: 42.00".into()),
            received_at: Some(now() - Duration::days(5)),
        }
    }

    fn rule(name: &str, aggregate: Aggregate, conditions: Vec<Condition>) -> Rule {
        Rule {
            name: name.into(),
            aggregate,
            conditions,
            actions: vec![Action::mark_read()],
        }
    }

    fn condition_grid() -> Vec<Condition> {
        vec![
            Condition::new(Field::Subject, Predicate::Contains, "invoice"),
            Condition::new(Field::Subject, Predicate::Contains, "receipt"),
            Condition::new(Field::Sender, Predicate::Equals, "billing@vendor.example"),
            Condition::new(Field::Body, Predicate::NotContains, "amount"),
            Condition::new(Field::ReceivedDate, Predicate::OlderThan, "3 days"),
            Condition::new(Field::ReceivedDate, Predicate::NewerThan, "1 day"),
        ]
    }

    #[test]
    fn aggregate_matches_fold_of_individual_evaluations() {
        let clock = FixedClock(now());
        let record = record();
        let grid = condition_grid();

        // Every non-empty subset of the grid, under both aggregates.
        for mask in 1u32..(1 << grid.len()) {
            let subset: Vec<Condition> = grid
                .iter()
                .enumerate()
                .filter(|(idx, _)| mask & (1 << idx) != 0)
                .map(|(_, c)| c.clone())
                .collect();
            let individual: Vec<bool> = subset
                .iter()
                .map(|c| evaluate(&record, c, &clock).unwrap())
                .collect();

            let all = rule("all", Aggregate::All, subset.clone());
            let any = rule("any", Aggregate::Any, subset);

            assert_eq!(
                matches(&record, &all, &clock).unwrap(),
                individual.iter().all(|r| *r),
                "All over mask {mask:b}"
            );
            assert_eq!(
                matches(&record, &any, &clock).unwrap(),
                individual.iter().any(|r| *r),
                "Any over mask {mask:b}"
            );
        }
    }

    #[test]
    fn eager_and_short_circuit_evaluation_agree() {
        let clock = FixedClock(now());
        let record = record();
        let conditions = condition_grid();

        for aggregate in [Aggregate::All, Aggregate::Any] {
            let short_circuit = match aggregate {
                Aggregate::All => conditions
                    .iter()
                    .all(|c| evaluate(&record, c, &clock).unwrap()),
                Aggregate::Any => conditions
                    .iter()
                    .any(|c| evaluate(&record, c, &clock).unwrap()),
            };
            let eager = matches(&record, &rule("r", aggregate, conditions.clone()), &clock);
            assert_eq!(eager.unwrap(), short_circuit);
        }
    }

    #[test]
    fn later_invalid_condition_is_reported_even_when_outcome_is_decided() {
        let clock = FixedClock(now());
        let any = rule(
            "any",
            Aggregate::Any,
            vec![
                Condition::new(Field::Subject, Predicate::Contains, "invoice"),
                Condition::new(Field::ReceivedDate, Predicate::OlderThan, "a while"),
            ],
        );
        let err = matches(&record(), &any, &clock).expect_err("invalid age surfaces");
        assert!(matches!(
            err,
            MatchError::Condition(ConditionError::InvalidAge(_))
        ));
    }

    #[test]
    fn empty_rule_is_an_error() {
        let clock = FixedClock(now());
        let empty = rule("empty", Aggregate::Any, vec![]);
        let err = matches(&record(), &empty, &clock).expect_err("empty rule");
        assert_eq!(err, MatchError::EmptyRule("empty".into()));
    }

    #[test]
    fn find_match_returns_first_matching_rule_in_order() {
        let clock = FixedClock(now());
        let rules = RuleSet::new(vec![
            rule(
                "no match",
                Aggregate::All,
                vec![Condition::new(Field::Subject, Predicate::Contains, "newsletter")],
            ),
            rule(
                "first",
                Aggregate::Any,
                vec![Condition::new(Field::Subject, Predicate::Contains, "invoice")],
            ),
            rule(
                "second",
                Aggregate::Any,
                vec![Condition::new(Field::Sender, Predicate::Contains, "vendor")],
            ),
        ])
        .expect("valid rules");

        let matched = find_match(&record(), &rules, &clock)
            .expect("evaluates")
            .expect("matches");
        assert_eq!(matched.name, "first");
    }

    #[test]
    fn find_match_returns_none_when_nothing_matches() {
        let clock = FixedClock(now());
        let rules = RuleSet::new(vec![rule(
            "only",
            Aggregate::All,
            vec![
                Condition::new(Field::Subject, Predicate::Contains, "invoice"),
                Condition::new(Field::Body, Predicate::Contains, "overdue"),
            ],
        )])
        .expect("valid rules");

        assert!(find_match(&record(), &rules, &clock).unwrap().is_none());
        assert!(find_match(&record(), &RuleSet::default(), &clock).unwrap().is_none());
    }

    #[test]
    fn find_match_is_stable_for_a_fixed_clock() {
        let clock = FixedClock(now());
        let rules = RuleSet::new(vec![rule(
            "recent",
            Aggregate::All,
            vec![Condition::new(Field::ReceivedDate, Predicate::NewerThan, "6 days")],
        )])
        .expect("valid rules");

        let first = find_match(&record(), &rules, &clock).unwrap().map(|r| r.name.clone());
        let second = find_match(&record(), &rules, &clock).unwrap().map(|r| r.name.clone());
        assert_eq!(first, Some("recent".to_string()));
        assert_eq!(first, second);

        let later = FixedClock(now() + Duration::days(2));
        assert!(find_match(&record(), &rules, &later).unwrap().is_none());
    }
}
