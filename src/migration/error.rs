use std::path::PathBuf;

use thiserror::Error;

use crate::db::DbError;

/// Failures that end a setup run.
///
/// Statement-level failures never appear here; the executor absorbs them.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("SQL file not found for step '{step}': {}", path.display())]
    FileNotFound { step: String, path: PathBuf },

    #[error("failed to read SQL file {} for step '{step}': {source}", path.display())]
    FileUnreadable {
        step: String,
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("no core tables found (expected any of: {})", expected.join(", "))]
    VerificationFailed { expected: Vec<String> },

    #[error("failed to query core tables: {0}")]
    VerificationQuery(DbError),

    #[error("failed to connect to database: {0}")]
    ConnectionFailure(DbError),

    #[error("console I/O failed: {0}")]
    Console(#[from] std::io::Error),
}
