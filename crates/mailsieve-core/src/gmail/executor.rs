use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;

use crate::gmail::client::GmailClient;
use crate::gmail::oauth::TokenStore;
use crate::gmail::types::ModifyMessageRequest;
use crate::rules::{ExecutorError, LabelCatalog, MailActionExecutor};

/// Executes label mutations against the Gmail API.
pub struct GmailActionExecutor<S: TokenStore> {
    client: Arc<GmailClient<S>>,
}

impl<S: TokenStore> GmailActionExecutor<S> {
    pub fn new(client: Arc<GmailClient<S>>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl<S: TokenStore + 'static> MailActionExecutor for GmailActionExecutor<S> {
    async fn list_labels(&self) -> Result<LabelCatalog, ExecutorError> {
        let response = self.client.list_labels().await?;
        Ok(response
            .labels
            .into_iter()
            .map(|label| (label.name, label.id))
            .collect())
    }

    async fn apply_label_changes(
        &self,
        record_id: &str,
        add_labels: &BTreeSet<String>,
        remove_labels: &BTreeSet<String>,
    ) -> Result<(), ExecutorError> {
        let request = ModifyMessageRequest {
            add_label_ids: add_labels.iter().cloned().collect(),
            remove_label_ids: remove_labels.iter().cloned().collect(),
        };
        self.client.modify_message(record_id, &request).await?;
        Ok(())
    }
}
