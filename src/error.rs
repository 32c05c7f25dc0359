//! Error types for order-pipeline
//!
//! Two layers of failure exist in the pipeline:
//! - [`ProcessError`] describes why a single order failed. These are ordinary
//!   values carried inside a [`ProcessResult`](crate::types::ProcessResult) and
//!   never abort a run.
//! - [`Error`] is returned by the run itself. Only configuration problems and
//!   pipeline protocol violations end up here.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::OrderId;

/// Result type alias for order-pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for order-pipeline
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "worker_count")
        key: Option<String>,
    },

    /// The order source ran dry before the requested count was generated
    #[error("order source exhausted at order {id}")]
    SourceExhausted {
        /// The first id the source could not produce
        id: OrderId,
    },

    /// A stage broke the pipeline protocol (lost result, panicked task, ...)
    #[error("pipeline protocol violation: {0}")]
    Protocol(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for a configuration error tied to a specific key
    pub(crate) fn config(key: &str, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(e: tokio::task::JoinError) -> Self {
        Error::Protocol(format!("pipeline stage did not finish cleanly: {}", e))
    }
}

/// Why a single order failed to process
#[derive(Clone, Debug, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProcessError {
    /// A processing attempt failed; the order may be retried
    #[error("could not process order")]
    Transient,

    /// The order failed every allowed retry attempt
    #[error("all {attempts} retry attempts failed")]
    RetriesExhausted {
        /// Number of retry attempts made before giving up
        attempts: u32,
    },

    /// The pipeline was cancelled before the order could be processed
    #[error("pipeline cancelled before the order was processed")]
    Cancelled,
}
