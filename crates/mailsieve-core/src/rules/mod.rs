pub mod conditions;
pub mod dispatch;
pub mod matcher;
pub mod mock;
pub mod ruleset;
pub mod types;

pub use conditions::{AgeThreshold, AgeUnit, ConditionError, evaluate, validate_condition};
pub use dispatch::{
    ActionDispatcher, DispatchOutcome, ExecutorError, INBOX_LABEL, LabelCatalog, LabelChanges,
    LabelPlan, MailActionExecutor, UNREAD_LABEL, plan_label_changes,
};
pub use matcher::{MatchError, find_match, matches};
pub use mock::{AppliedChange, MockExecutor};
pub use ruleset::{RuleSet, RuleSetError};
pub use types::{Action, ActionKind, Aggregate, Condition, Field, Predicate, Rule};
