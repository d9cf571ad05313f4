//! Error types shared across the engine

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while talking to the database server.
///
/// `ConnectionLost` is the only case that triggers the one-shot reconnect;
/// every other failure is surfaced as-is.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("connection to the server was lost: {0}")]
    ConnectionLost(String),

    #[error("query failed: {0}")]
    Failed(String),
}

impl QueryError {
    pub fn is_connection_lost(&self) -> bool {
        matches!(self, QueryError::ConnectionLost(_))
    }
}

impl From<sqlx::Error> for QueryError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolClosed
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::WorkerCrashed => QueryError::ConnectionLost(err.to_string()),
            sqlx::Error::Database(db) => {
                // ER_SERVER_SHUTDOWN, ER_CONNECTION_KILLED
                let number = db
                    .try_downcast_ref::<sqlx::mysql::MySqlDatabaseError>()
                    .map(|e| e.number());
                let sqlstate_lost = db.code().map_or(false, |c| c.starts_with("08"));

                if sqlstate_lost || matches!(number, Some(1053) | Some(1927)) {
                    QueryError::ConnectionLost(err.to_string())
                } else {
                    QueryError::Failed(err.to_string())
                }
            }
            _ => QueryError::Failed(err.to_string()),
        }
    }
}

/// Startup configuration errors. All of them are fatal before polling begins.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot kill without specifying criteria")]
    KillWithoutCriteria,

    #[error("cannot kill using defaults")]
    KillWithDefaults,

    #[error("defaults mode cannot be combined with explicit filters")]
    DefaultsWithFilters,

    #[error("invalid order-by clause '{clause}': {reason}")]
    InvalidOrderBy { clause: String, reason: String },

    #[error("credential file {path} is missing or unreadable: {reason}")]
    CredentialFile { path: PathBuf, reason: String },

    #[error("could not determine home directory")]
    NoHomeDirectory,
}

/// Failure appending to the kill audit log
#[derive(Debug, Error)]
#[error("unable to write kill log {path}: {source}")]
pub struct AuditError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}
