//! Backend error types.

use thiserror::Error;

use crate::worker::WorkerError;

/// Result type for backend probes.
pub type QueryResult<T> = Result<T, QueryError>;

/// Failure of a column-list or duplicate-count probe.
///
/// Any `QueryError` raised during a search is fatal to that search: it is
/// reported once and the run completes without resuming.
#[derive(Error, Debug)]
pub enum QueryError {
    /// SQLite reported an error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The database worker reported an error.
    #[error(transparent)]
    Worker(#[from] WorkerError),

    /// A duplicate-count probe was requested with no columns.
    #[error("cannot count duplicates over an empty column list")]
    EmptyColumnList,

    /// The table has no columns or does not exist.
    #[error("table not found: {schema}.{table}")]
    TableNotFound {
        /// Schema searched.
        schema: String,
        /// Table name.
        table: String,
    },

    /// A probe returned a result that could not be read as a count.
    #[error("unexpected probe result: {0}")]
    UnexpectedResult(String),

    /// The snapshot session was used after it was released.
    #[error("snapshot session already released")]
    SessionClosed,

    /// The search task died without returning, e.g. a backend panicked.
    #[error("key search aborted: {0}")]
    SearchAborted(String),
}

impl QueryError {
    /// Create an unexpected-result error.
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::UnexpectedResult(message.into())
    }
}
