use std::collections::{BTreeSet, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::dispatch::{ExecutorError, LabelCatalog, MailActionExecutor};

/// One `apply_label_changes` call observed by [`MockExecutor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedChange {
    pub record_id: String,
    pub add: BTreeSet<String>,
    pub remove: BTreeSet<String>,
}

/// In-memory executor that records every mutation instead of touching a
/// mailbox.
#[derive(Debug, Default, Clone)]
pub struct MockExecutor {
    labels: Arc<Mutex<LabelCatalog>>,
    applied: Arc<Mutex<Vec<AppliedChange>>>,
    failing_records: Arc<Mutex<HashSet<String>>>,
    fail_list_labels: Arc<AtomicBool>,
    list_labels_calls: Arc<AtomicUsize>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_labels(labels: LabelCatalog) -> Self {
        let mock = Self::default();
        *mock.labels.lock().expect("lock labels") = labels;
        mock
    }

    /// Makes `apply_label_changes` fail for `record_id`.
    pub fn fail_apply_for(&self, record_id: impl Into<String>) {
        self.failing_records
            .lock()
            .expect("lock failing records")
            .insert(record_id.into());
    }

    pub fn fail_list_labels(&self) {
        self.fail_list_labels.store(true, Ordering::SeqCst);
    }

    /// Successful mutations in call order.
    pub fn applied(&self) -> Vec<AppliedChange> {
        self.applied.lock().expect("lock applied").clone()
    }

    pub fn list_labels_calls(&self) -> usize {
        self.list_labels_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MailActionExecutor for MockExecutor {
    async fn list_labels(&self) -> Result<LabelCatalog, ExecutorError> {
        self.list_labels_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_list_labels.load(Ordering::SeqCst) {
            return Err(ExecutorError::Remote("label listing unavailable".into()));
        }
        Ok(self.labels.lock().expect("lock labels").clone())
    }

    async fn apply_label_changes(
        &self,
        record_id: &str,
        add_labels: &BTreeSet<String>,
        remove_labels: &BTreeSet<String>,
    ) -> Result<(), ExecutorError> {
        if self
            .failing_records
            .lock()
            .expect("lock failing records")
            .contains(record_id)
        {
            return Err(ExecutorError::Remote(format!(
                "mock failure for {record_id}"
            )));
        }

        self.applied.lock().expect("lock applied").push(AppliedChange {
            record_id: record_id.to_string(),
            add: add_labels.clone(),
            remove: remove_labels.clone(),
        });
        Ok(())
    }
}
