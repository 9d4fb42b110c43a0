use std::{env, path::Path, sync::Arc};

use libsql::{Builder, Connection, Database as LibSqlDatabase};
use thiserror::Error;

/// Env var holding the auth token for `libsql://` and `http(s)://` databases.
pub const AUTH_TOKEN_ENV: &str = "LIBSQL_AUTH_TOKEN";

#[derive(Clone)]
pub struct Database {
    inner: Arc<LibSqlDatabase>,
}

#[derive(Error, Debug)]
pub enum DbError {
    #[error("failed to open database {path}: {source}")]
    Open {
        path: String,
        source: libsql::Error,
    },
    #[error("failed to open connection: {0}")]
    Connect(libsql::Error),
    #[error("failed to execute statement: {0}")]
    Statement(libsql::Error),
    #[error("missing required LIBSQL_AUTH_TOKEN for remote database")]
    MissingAuthToken,
}

impl Database {
    /// Opens a local file database, or a remote one when `location` is a URL.
    pub async fn open(location: &Path) -> Result<Self, DbError> {
        let location = location.to_string_lossy().to_string();
        let built = if is_remote(&location) {
            let auth_token = env::var(AUTH_TOKEN_ENV)
                .ok()
                .filter(|token| !token.is_empty())
                .ok_or(DbError::MissingAuthToken)?;

            Builder::new_remote(location.clone(), auth_token)
                .build()
                .await
        } else {
            Builder::new_local(location.clone()).build().await
        };

        let inner = built.map_err(|source| DbError::Open {
            path: location,
            source,
        })?;

        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    pub fn connection(&self) -> Result<Connection, DbError> {
        self.inner.connect().map_err(DbError::Connect)
    }

    pub async fn health_check(&self) -> Result<(), DbError> {
        let conn = self.connection()?;
        let mut rows = conn
            .query("SELECT 1", ())
            .await
            .map_err(DbError::Statement)?;
        let _ = rows.next().await.map_err(DbError::Statement)?;
        Ok(())
    }
}

fn is_remote(location: &str) -> bool {
    ["libsql://", "http://", "https://"]
        .iter()
        .any(|scheme| location.starts_with(scheme))
}
