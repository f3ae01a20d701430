//! Error types for the decode pipeline
//!
//! "Nothing found" is never an error: it is an empty result. Only input that
//! cannot become a [`PixelGrid`](crate::PixelGrid) and a lost worker reach the
//! caller; engine failures stay inside their stage.

use std::any::Any;

use thiserror::Error;

/// Errors surfaced by the pipeline
#[derive(Debug, Error)]
pub enum ScanError {
    /// The input cannot be turned into a pixel grid
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// A detector engine failed inside its pass
    #[error("{engine} engine failed: {message}")]
    Engine {
        /// Engine name
        engine: &'static str,
        /// What went wrong
        message: String,
    },

    /// The worker holding a request went away before replying
    #[error("worker {worker} dropped request {id} without replying")]
    WorkerLost {
        /// Pool slot the request was dispatched to
        worker: usize,
        /// Correlation id of the request
        id: u64,
    },

    /// A worker replied to a different request than the one awaited
    #[error("expected reply for request {expected}, got {actual}")]
    CorrelationMismatch {
        /// Correlation id the caller waited for
        expected: u64,
        /// Correlation id carried by the reply
        actual: u64,
    },
}

impl ScanError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedInput(reason.into())
    }

    /// True when the caller handed over unusable input
    pub fn is_malformed_input(&self) -> bool {
        matches!(self, Self::MalformedInput(_))
    }
}

impl From<image::ImageError> for ScanError {
    fn from(err: image::ImageError) -> Self {
        Self::MalformedInput(format!("could not decode image data: {err}"))
    }
}

/// Result alias used across the crate
pub type Result<T, E = ScanError> = std::result::Result<T, E>;

/// Text of a caught panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}
