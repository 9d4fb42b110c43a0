pub mod clock;
pub mod config;
pub mod db;
pub mod fetch;
pub mod gmail;
pub mod processor;
pub mod records;
pub mod rules;
pub mod telemetry;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::Config;
pub use db::Database;
pub use fetch::{FetchError, FetchSummary, MailFetcher};
pub use processor::{ProcessError, ProcessSummary, RuleProcessor};
pub use records::{EmailStore, Record, RecordRepository, StoreError};
pub use rules::{RuleSet, RuleSetError};
pub use telemetry::{TelemetryError, TelemetryGuard, init_telemetry};
