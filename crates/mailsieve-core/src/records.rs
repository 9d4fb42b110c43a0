use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use libsql::{Row, params};
use thiserror::Error;

use crate::db::{Database, DbError};

const RECORD_COLUMNS: &str = "message_id, sender, subject, body, received_at";

const CREATE_EMAILS_TABLE: &str = "CREATE TABLE IF NOT EXISTS emails (
    message_id TEXT PRIMARY KEY,
    sender TEXT,
    subject TEXT,
    body TEXT,
    received_at TEXT,
    stored_at TEXT NOT NULL
)";

/// A stored email as rules see it. Absent attributes stay `None` rather than
/// being replaced with placeholders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    /// Provider message id; also the target of label mutations.
    pub id: String,
    pub sender: Option<String>,
    pub subject: Option<String>,
    pub body: Option<String>,
    pub received_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(#[from] DbError),
    #[error("sql error: {0}")]
    Sql(#[from] libsql::Error),
    #[error("datetime parse error: {0}")]
    DateTimeParse(#[from] chrono::ParseError),
}

/// Read access to every stored record.
#[async_trait]
pub trait EmailStore: Send + Sync {
    async fn list_all(&self) -> Result<Vec<Record>, StoreError>;
}

#[derive(Clone)]
pub struct RecordRepository {
    db: Database,
}

impl RecordRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        let conn = self.db.connection()?;
        conn.execute(CREATE_EMAILS_TABLE, ()).await?;
        Ok(())
    }

    /// Stores `record` unless a record with the same id already exists.
    /// Returns whether a row was written.
    pub async fn insert_if_absent(&self, record: &Record) -> Result<bool, StoreError> {
        let conn = self.db.connection()?;
        let written = conn
            .execute(
                "INSERT INTO emails (message_id, sender, subject, body, received_at, stored_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(message_id) DO NOTHING",
                params![
                    record.id.as_str(),
                    record.sender.clone(),
                    record.subject.clone(),
                    record.body.clone(),
                    record.received_at.map(to_rfc3339),
                    to_rfc3339(Utc::now())
                ],
            )
            .await?;
        Ok(written > 0)
    }

    pub async fn get(&self, id: &str) -> Result<Option<Record>, StoreError> {
        let conn = self.db.connection()?;
        let mut rows = conn
            .query(
                &format!("SELECT {RECORD_COLUMNS} FROM emails WHERE message_id = ?1"),
                params![id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(row_to_record(row)?)),
            None => Ok(None),
        }
    }

    /// All records in insertion order.
    pub async fn list_all(&self) -> Result<Vec<Record>, StoreError> {
        let conn = self.db.connection()?;
        let mut rows = conn
            .query(
                &format!("SELECT {RECORD_COLUMNS} FROM emails ORDER BY rowid"),
                (),
            )
            .await?;

        let mut records = Vec::new();
        while let Some(row) = rows.next().await? {
            records.push(row_to_record(row)?);
        }
        Ok(records)
    }
}

#[async_trait]
impl EmailStore for RecordRepository {
    async fn list_all(&self) -> Result<Vec<Record>, StoreError> {
        RecordRepository::list_all(self).await
    }
}

fn row_to_record(row: Row) -> Result<Record, StoreError> {
    let received_at: Option<String> = row.get(4)?;

    Ok(Record {
        id: row.get(0)?,
        sender: row.get(1)?,
        subject: row.get(2)?,
        body: row.get(3)?,
        received_at: match received_at {
            Some(value) => Some(DateTime::parse_from_rfc3339(&value)?.with_timezone(&Utc)),
            None => None,
        },
    })
}

fn to_rfc3339(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}
