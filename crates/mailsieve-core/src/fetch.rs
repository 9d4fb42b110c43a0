use std::sync::Arc;

use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::clock::{Clock, SystemClock};
use crate::gmail::{GmailClient, GmailClientError, TokenStore, parse_message};
use crate::records::{Record, RecordRepository, StoreError};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to list messages in {label}: {source}")]
    List {
        label: String,
        source: GmailClientError,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchSummary {
    pub listed: usize,
    pub stored: usize,
    pub duplicates: usize,
    pub failed: usize,
}

#[derive(Debug, Error)]
enum IngestError {
    #[error(transparent)]
    Gmail(#[from] GmailClientError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Copies messages carrying one label from Gmail into the local store.
pub struct MailFetcher<S: TokenStore> {
    client: Arc<GmailClient<S>>,
    repo: RecordRepository,
    label: String,
    max_results: u32,
    clock: Arc<dyn Clock>,
}

impl<S: TokenStore> MailFetcher<S> {
    pub fn new(
        client: Arc<GmailClient<S>>,
        repo: RecordRepository,
        label: impl Into<String>,
        max_results: u32,
    ) -> Self {
        Self {
            client,
            repo,
            label: label.into(),
            max_results,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replaces the clock used to stamp messages that carry no usable date.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[instrument(skip(self), fields(label = %self.label, max_results = self.max_results))]
    pub async fn fetch(&self) -> Result<FetchSummary, FetchError> {
        let listing = self
            .client
            .list_messages(&self.label, Some(self.max_results))
            .await
            .map_err(|source| FetchError::List {
                label: self.label.clone(),
                source,
            })?;

        let mut summary = FetchSummary {
            listed: listing.messages.len(),
            ..FetchSummary::default()
        };

        for stub in &listing.messages {
            match self.ingest(&stub.id).await {
                Ok(true) => summary.stored += 1,
                Ok(false) => summary.duplicates += 1,
                Err(err) => {
                    warn!(record_id = %stub.id, error = %err, "failed to ingest message");
                    summary.failed += 1;
                }
            }
        }

        info!(
            listed = summary.listed,
            stored = summary.stored,
            duplicates = summary.duplicates,
            failed = summary.failed,
            "fetch complete"
        );
        Ok(summary)
    }

    async fn ingest(&self, message_id: &str) -> Result<bool, IngestError> {
        let message = self.client.get_message(message_id).await?;
        let parsed = parse_message(&message);

        let record = Record {
            id: message.id,
            sender: parsed.sender,
            subject: parsed.subject,
            body: parsed.body,
            received_at: Some(parsed.received_at.unwrap_or_else(|| self.clock.now())),
        };

        Ok(self.repo.insert_if_absent(&record).await?)
    }
}
