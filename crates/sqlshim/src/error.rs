use sqlshim_pg::PgError;
use thiserror::Error;

/// Errors surfaced by the checked (`try_*`) API and by connection setup.
///
/// The SQLite-compatible surface collapses all of these into
/// [`StepResult::Error`](crate::StepResult::Error) or a neutral value.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Pg(#[from] PgError),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Statement was never prepared: {sql}")]
    NotPrepared { sql: String },

    #[error("Statement failed on an earlier step")]
    StatementFailed,

    #[error("Column index {index} out of range (statement has {count} columns)")]
    ColumnRange { index: usize, count: usize },

    #[error("Text is not valid UTF-8")]
    Utf8,
}

pub type Result<T> = std::result::Result<T, Error>;
