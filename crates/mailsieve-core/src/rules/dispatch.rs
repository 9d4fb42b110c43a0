use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::gmail::GmailClientError;
use crate::records::Record;

use super::types::{Action, ActionKind, Rule};

/// Reserved label carrying the unread flag.
pub const UNREAD_LABEL: &str = "UNREAD";
/// Default inbox label removed when a message is moved elsewhere.
pub const INBOX_LABEL: &str = "INBOX";

/// Label name to provider label id.
pub type LabelCatalog = HashMap<String, String>;

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("gmail error: {0}")]
    Gmail(#[from] GmailClientError),
    #[error("executor error: {0}")]
    Remote(String),
}

/// Applies label mutations to the remote mailbox.
#[async_trait]
pub trait MailActionExecutor: Send + Sync {
    async fn list_labels(&self) -> Result<LabelCatalog, ExecutorError>;

    async fn apply_label_changes(
        &self,
        record_id: &str,
        add_labels: &BTreeSet<String>,
        remove_labels: &BTreeSet<String>,
    ) -> Result<(), ExecutorError>;
}

/// Consolidated label mutation for one record. A label never appears in both
/// sets; the most recent request for a label wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelChanges {
    add: BTreeSet<String>,
    remove: BTreeSet<String>,
}

impl LabelChanges {
    pub fn add_label(&mut self, label: impl Into<String>) {
        let label = label.into();
        self.remove.remove(&label);
        self.add.insert(label);
    }

    pub fn remove_label(&mut self, label: impl Into<String>) {
        let label = label.into();
        self.add.remove(&label);
        self.remove.insert(label);
    }

    pub fn to_add(&self) -> &BTreeSet<String> {
        &self.add
    }

    pub fn to_remove(&self) -> &BTreeSet<String> {
        &self.remove
    }

    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelPlan {
    pub changes: LabelChanges,
    /// Destination label names that were not found in the catalog.
    pub unresolved: Vec<String>,
}

/// Folds a rule's actions into a single label mutation. MoveToLabel entries
/// whose destination is not in `catalog` are skipped individually.
pub fn plan_label_changes(actions: &[Action], catalog: &LabelCatalog) -> LabelPlan {
    let mut plan = LabelPlan::default();

    for action in actions {
        match action.kind {
            ActionKind::MarkRead => plan.changes.remove_label(UNREAD_LABEL),
            ActionKind::MarkUnread => plan.changes.add_label(UNREAD_LABEL),
            ActionKind::MoveToLabel => {
                let name = action.value.as_deref().unwrap_or_default();
                match catalog.get(name) {
                    Some(label_id) => {
                        plan.changes.remove_label(INBOX_LABEL);
                        plan.changes.add_label(label_id.clone());
                    }
                    None => plan.unresolved.push(name.to_string()),
                }
            }
        }
    }

    plan
}

#[derive(Debug)]
pub enum DispatchOutcome {
    /// One mutation call succeeded.
    Applied {
        changes: LabelChanges,
        unresolved: Vec<String>,
    },
    /// Nothing effective to apply; the executor was not called.
    NoChanges { unresolved: Vec<String> },
    /// The executor failed. The failure is already logged.
    Failed { error: ExecutorError },
}

impl DispatchOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, DispatchOutcome::Applied { .. })
    }

    pub fn unresolved_labels(&self) -> &[String] {
        match self {
            DispatchOutcome::Applied { unresolved, .. }
            | DispatchOutcome::NoChanges { unresolved } => unresolved,
            DispatchOutcome::Failed { .. } => &[],
        }
    }
}

/// Turns a matched rule into at most one executor call per record.
#[derive(Clone)]
pub struct ActionDispatcher {
    executor: Arc<dyn MailActionExecutor>,
}

impl ActionDispatcher {
    pub fn new(executor: Arc<dyn MailActionExecutor>) -> Self {
        Self { executor }
    }

    pub async fn dispatch(&self, record: &Record, rule: &Rule) -> DispatchOutcome {
        let needs_catalog = rule
            .actions
            .iter()
            .any(|action| action.kind == ActionKind::MoveToLabel);

        let catalog = if needs_catalog {
            match self.executor.list_labels().await {
                Ok(catalog) => catalog,
                Err(err) => {
                    error!(
                        record_id = %record.id,
                        rule = %rule.name,
                        error = %err,
                        "failed to load label catalog"
                    );
                    return DispatchOutcome::Failed { error: err };
                }
            }
        } else {
            LabelCatalog::new()
        };

        let LabelPlan {
            changes,
            unresolved,
        } = plan_label_changes(&rule.actions, &catalog);

        for label in &unresolved {
            warn!(
                record_id = %record.id,
                rule = %rule.name,
                label = %label,
                "label not found; skipping move action"
            );
        }

        if changes.is_empty() {
            debug!(record_id = %record.id, rule = %rule.name, "no label changes to apply");
            return DispatchOutcome::NoChanges { unresolved };
        }

        match self
            .executor
            .apply_label_changes(&record.id, changes.to_add(), changes.to_remove())
            .await
        {
            Ok(()) => {
                info!(
                    record_id = %record.id,
                    rule = %rule.name,
                    add = ?changes.to_add(),
                    remove = ?changes.to_remove(),
                    "applied label changes"
                );
                DispatchOutcome::Applied {
                    changes,
                    unresolved,
                }
            }
            Err(err) => {
                error!(
                    record_id = %record.id,
                    rule = %rule.name,
                    error = %err,
                    "failed to apply label changes"
                );
                DispatchOutcome::Failed { error: err }
            }
        }
    }
}
