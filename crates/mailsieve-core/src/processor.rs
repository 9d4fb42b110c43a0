use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error, info, info_span, Instrument};

use crate::clock::{Clock, SystemClock};
use crate::records::{EmailStore, StoreError};
use crate::rules::{ActionDispatcher, DispatchOutcome, MailActionExecutor, RuleSet};

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to load records: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessSummary {
    pub records: usize,
    pub matched: usize,
    pub applied: usize,
    pub no_changes: usize,
    pub failed: usize,
    pub condition_errors: usize,
}

/// Runs every stored record through the rule set, sequentially and in store
/// order, dispatching the first matching rule's actions.
pub struct RuleProcessor {
    store: Arc<dyn EmailStore>,
    rules: RuleSet,
    dispatcher: ActionDispatcher,
    clock: Arc<dyn Clock>,
}

impl RuleProcessor {
    pub fn new(
        store: Arc<dyn EmailStore>,
        rules: RuleSet,
        executor: Arc<dyn MailActionExecutor>,
    ) -> Self {
        Self {
            store,
            rules,
            dispatcher: ActionDispatcher::new(executor),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub async fn run(&self) -> Result<ProcessSummary, ProcessError> {
        let records = self.store.list_all().await?;
        let mut summary = ProcessSummary {
            records: records.len(),
            ..ProcessSummary::default()
        };

        for record in &records {
            let span = info_span!("process_record", record_id = %record.id);

            let rule = match span.in_scope(|| self.rules.find_match(record, self.clock.as_ref())) {
                Ok(Some(rule)) => rule,
                Ok(None) => {
                    debug!(parent: &span, "no rule matched");
                    continue;
                }
                Err(err) => {
                    error!(parent: &span, error = %err, "rule evaluation failed");
                    summary.condition_errors += 1;
                    continue;
                }
            };

            summary.matched += 1;
            match self.dispatcher.dispatch(record, rule).instrument(span).await {
                DispatchOutcome::Applied { .. } => summary.applied += 1,
                DispatchOutcome::NoChanges { .. } => summary.no_changes += 1,
                DispatchOutcome::Failed { .. } => summary.failed += 1,
            }
        }

        info!(
            records = summary.records,
            matched = summary.matched,
            applied = summary.applied,
            no_changes = summary.no_changes,
            failed = summary.failed,
            condition_errors = summary.condition_errors,
            "processing pass complete"
        );
        Ok(summary)
    }
}
