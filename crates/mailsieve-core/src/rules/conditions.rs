use std::sync::LazyLock;

use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use thiserror::Error;

use crate::clock::Clock;
use crate::records::Record;

use super::types::{Condition, Field, Predicate};

/// A "month" in age expressions is a flat 30 days, not a calendar month.
pub const DAYS_PER_MONTH: i64 = 30;

static AGE_EXPRESSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*([0-9]+)\s+(days?|months?)\s*$").expect("age expression regex is valid")
});

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConditionError {
    #[error("predicate '{predicate}' cannot be applied to field '{field}'")]
    IncompatiblePredicate {
        field: &'static str,
        predicate: &'static str,
    },
    #[error("invalid age expression '{0}': expected '<number> day(s)' or '<number> month(s)'")]
    InvalidAge(String),
    #[error("age expression '{0}' is out of range")]
    AgeOutOfRange(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgeUnit {
    Days,
    Months,
}

/// Parsed form of a `"<number> <unit>"` date condition value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgeThreshold {
    pub amount: i64,
    pub unit: AgeUnit,
}

impl AgeThreshold {
    pub fn parse(value: &str) -> Result<Self, ConditionError> {
        let captures = AGE_EXPRESSION
            .captures(value)
            .ok_or_else(|| ConditionError::InvalidAge(value.to_string()))?;

        let amount: i64 = captures[1]
            .parse()
            .map_err(|_| ConditionError::AgeOutOfRange(value.to_string()))?;
        let unit = if captures[2].to_ascii_lowercase().starts_with("month") {
            AgeUnit::Months
        } else {
            AgeUnit::Days
        };

        let threshold = Self { amount, unit };
        // Reject amounts chrono cannot represent up front.
        threshold
            .try_duration()
            .ok_or_else(|| ConditionError::AgeOutOfRange(value.to_string()))?;
        Ok(threshold)
    }

    fn try_duration(&self) -> Option<Duration> {
        let days = match self.unit {
            AgeUnit::Days => self.amount,
            AgeUnit::Months => self.amount.checked_mul(DAYS_PER_MONTH)?,
        };
        Duration::try_days(days)
    }

    pub fn duration(&self) -> Duration {
        self.try_duration().unwrap_or(Duration::MAX)
    }
}

/// Checks a condition for configuration errors without evaluating it.
pub fn validate_condition(condition: &Condition) -> Result<(), ConditionError> {
    if !condition.predicate.applies_to(condition.field) {
        return Err(incompatible(condition));
    }
    if condition.field.is_date() {
        AgeThreshold::parse(&condition.value)?;
    }
    Ok(())
}

enum FieldValue<'a> {
    Text(Option<&'a str>),
    Date(Option<DateTime<Utc>>),
}

fn resolve(field: Field, record: &Record) -> FieldValue<'_> {
    match field {
        Field::Sender => FieldValue::Text(record.sender.as_deref()),
        Field::Subject => FieldValue::Text(record.subject.as_deref()),
        Field::Body => FieldValue::Text(record.body.as_deref()),
        Field::ReceivedDate => FieldValue::Date(record.received_at),
    }
}

/// Evaluates one condition against one record.
///
/// A record missing the referenced field never matches. Configuration errors
/// (incompatible predicate, malformed age) are reported even when the field is
/// missing, so a bad rule cannot hide behind sparse data.
pub fn evaluate(
    record: &Record,
    condition: &Condition,
    clock: &dyn Clock,
) -> Result<bool, ConditionError> {
    match (resolve(condition.field, record), condition.predicate) {
        (
            FieldValue::Text(actual),
            predicate @ (Predicate::Contains
            | Predicate::NotContains
            | Predicate::Equals
            | Predicate::NotEquals),
        ) => Ok(actual
            .map(|actual| text_matches(predicate, actual, &condition.value))
            .unwrap_or(false)),
        (FieldValue::Date(received_at), predicate @ (Predicate::OlderThan | Predicate::NewerThan)) => {
            let threshold = AgeThreshold::parse(&condition.value)?.duration();
            let Some(received_at) = received_at else {
                return Ok(false);
            };
            let age = clock.now().signed_duration_since(received_at);
            Ok(match predicate {
                Predicate::OlderThan => age > threshold,
                _ => age < threshold,
            })
        }
        _ => Err(incompatible(condition)),
    }
}

fn text_matches(predicate: Predicate, actual: &str, expected: &str) -> bool {
    let actual = actual.to_lowercase();
    let expected = expected.to_lowercase();
    match predicate {
        Predicate::Contains => actual.contains(&expected),
        Predicate::NotContains => !actual.contains(&expected),
        Predicate::Equals => actual == expected,
        Predicate::NotEquals => actual != expected,
        Predicate::OlderThan | Predicate::NewerThan => false,
    }
}

fn incompatible(condition: &Condition) -> ConditionError {
    ConditionError::IncompatiblePredicate {
        field: condition.field.as_str(),
        predicate: condition.predicate.as_str(),
    }
}
