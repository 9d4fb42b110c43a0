use serde::{Deserialize, Serialize};

/// Record attribute a condition inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Field {
    #[serde(rename = "From", alias = "sender", alias = "Sender")]
    Sender,
    #[serde(rename = "Subject", alias = "subject")]
    Subject,
    #[serde(rename = "Message", alias = "body", alias = "Body")]
    Body,
    #[serde(
        rename = "Received Date",
        alias = "received_date",
        alias = "ReceivedDate"
    )]
    ReceivedDate,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Sender => "From",
            Field::Subject => "Subject",
            Field::Body => "Message",
            Field::ReceivedDate => "Received Date",
        }
    }

    pub fn is_date(&self) -> bool {
        matches!(self, Field::ReceivedDate)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Predicate {
    #[serde(rename = "contains", alias = "Contains")]
    Contains,
    #[serde(rename = "does not contain", alias = "not_contains", alias = "NotContains")]
    NotContains,
    #[serde(rename = "equals", alias = "Equals")]
    Equals,
    #[serde(rename = "does not equal", alias = "not_equals", alias = "NotEquals")]
    NotEquals,
    /// Received longer ago than the threshold.
    #[serde(rename = "greater_than", alias = "older_than", alias = "OlderThan")]
    OlderThan,
    /// Received more recently than the threshold.
    #[serde(rename = "less_than", alias = "newer_than", alias = "NewerThan")]
    NewerThan,
}

impl Predicate {
    pub fn as_str(&self) -> &'static str {
        match self {
            Predicate::Contains => "contains",
            Predicate::NotContains => "does not contain",
            Predicate::Equals => "equals",
            Predicate::NotEquals => "does not equal",
            Predicate::OlderThan => "greater_than",
            Predicate::NewerThan => "less_than",
        }
    }

    pub fn is_date(&self) -> bool {
        matches!(self, Predicate::OlderThan | Predicate::NewerThan)
    }

    pub fn applies_to(&self, field: Field) -> bool {
        self.is_date() == field.is_date()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub field: Field,
    pub predicate: Predicate,
    pub value: String,
}

impl Condition {
    pub fn new(field: Field, predicate: Predicate, value: impl Into<String>) -> Self {
        Self {
            field,
            predicate,
            value: value.into(),
        }
    }
}

/// How a rule combines the results of its conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Aggregate {
    #[serde(rename = "All", alias = "all", alias = "ALL")]
    All,
    #[serde(rename = "Any", alias = "any", alias = "ANY")]
    Any,
}

impl Aggregate {
    pub fn as_str(&self) -> &'static str {
        match self {
            Aggregate::All => "All",
            Aggregate::Any => "Any",
        }
    }

    pub fn combine(&self, results: &[bool]) -> bool {
        match self {
            Aggregate::All => results.iter().all(|matched| *matched),
            Aggregate::Any => results.iter().any(|matched| *matched),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    #[serde(rename = "Mark as Read", alias = "mark_read", alias = "MarkRead")]
    MarkRead,
    #[serde(rename = "Mark as Unread", alias = "mark_unread", alias = "MarkUnread")]
    MarkUnread,
    #[serde(rename = "Move Message", alias = "move_to_label", alias = "MoveToLabel")]
    MoveToLabel,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::MarkRead => "Mark as Read",
            ActionKind::MarkUnread => "Mark as Unread",
            ActionKind::MoveToLabel => "Move Message",
        }
    }

    pub fn requires_value(&self) -> bool {
        matches!(self, ActionKind::MoveToLabel)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "action", alias = "kind")]
    pub kind: ActionKind,
    /// Destination label name; only meaningful for `MoveToLabel`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl Action {
    pub fn mark_read() -> Self {
        Self {
            kind: ActionKind::MarkRead,
            value: None,
        }
    }

    pub fn mark_unread() -> Self {
        Self {
            kind: ActionKind::MarkUnread,
            value: None,
        }
    }

    pub fn move_to_label(label: impl Into<String>) -> Self {
        Self {
            kind: ActionKind::MoveToLabel,
            value: Some(label.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    #[serde(rename = "rule_name", alias = "name")]
    pub name: String,
    #[serde(rename = "predicate", alias = "aggregate")]
    pub aggregate: Aggregate,
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub actions: Vec<Action>,
}
