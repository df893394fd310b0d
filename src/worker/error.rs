//! Worker-specific error types.

use std::io;
use thiserror::Error;

/// Result type for worker operations.
pub type WorkerResult<T> = Result<T, WorkerError>;

/// Errors raised while talking to the database worker.
#[derive(Error, Debug)]
pub enum WorkerError {
    /// The worker binary could not be started.
    #[error("could not start worker `{path}`: {source}")]
    Spawn {
        path: String,
        #[source]
        source: io::Error,
    },

    /// Writing to the worker's stdin failed.
    #[error("worker pipe failed: {0}")]
    Pipe(#[source] io::Error),

    #[error("could not encode `{method}` request: {source}")]
    Encode {
        method: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("could not decode `{method}` response: {source}")]
    Decode {
        method: String,
        #[source]
        source: serde_json::Error,
    },

    /// No response arrived within the configured request timeout.
    #[error("`{method}` timed out after {seconds}s")]
    Timeout { method: String, seconds: u64 },

    /// The worker process went away with requests outstanding.
    #[error("worker process exited")]
    Exited,

    /// The worker could not open or use the database connection.
    #[error("worker cannot reach the database: {0}")]
    Connection(String),

    /// The transaction id was already ended or never begun.
    #[error("worker has no open transaction: {0}")]
    TransactionNotFound(String),

    /// The worker refused the request (unknown method, bad params or driver).
    #[error("worker rejected the request: {0}")]
    Rejected(String),

    /// Any other error reported by the worker.
    #[error("worker error {code}: {message}")]
    Remote { code: String, message: String },
}

impl WorkerError {
    /// Map an error code from a worker response to a variant.
    pub fn from_remote(code: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        match code {
            "CONNECTION_FAILED" => Self::Connection(message),
            "TRANSACTION_NOT_FOUND" => Self::TransactionNotFound(message),
            "INVALID_REQUEST" | "METHOD_NOT_FOUND" | "DRIVER_NOT_FOUND" => Self::Rejected(message),
            "WORKER_EXITED" => Self::Exited,
            _ => Self::Remote {
                code: code.to_string(),
                message,
            },
        }
    }

    /// Whether the worker is gone and every later request will fail too.
    pub fn is_worker_exited(&self) -> bool {
        matches!(self, Self::Exited | Self::Pipe(_))
    }
}
