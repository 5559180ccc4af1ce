//! Error types

use std::time::Duration;

use thiserror::Error;

/// Failures that stop the daemon before it reads any input.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("malformed configuration string {input:?}: {reason}")]
    ConfigMalformed { input: String, reason: String },

    #[error("invalid daemon settings: {0}")]
    InvalidSettings(String),

    #[error("cannot connect to {target}: {source}")]
    ConnectionFailed {
        target: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("table {table} does not expose the access log columns: {source}")]
    SchemaMismatch {
        table: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("cannot prepare insert statement for {table}: {source}")]
    StatementPrepareFailed {
        table: String,
        #[source]
        source: sqlx::Error,
    },
}

impl From<config::ConfigError> for StartupError {
    fn from(err: config::ConfigError) -> Self {
        Self::InvalidSettings(err.to_string())
    }
}

/// Failure of a single append command. Never fatal.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("malformed record: expected {expected} fields, got {actual}")]
    Malformed { expected: usize, actual: usize },

    #[error("insert failed: {0}")]
    InsertFailed(#[from] sqlx::Error),

    #[error("insert timed out after {0:?}")]
    TimedOut(Duration),
}
