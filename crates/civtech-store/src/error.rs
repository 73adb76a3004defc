//! Error types for the store layer.
//!
//! Transport problems surface as [`StoreError`]; payloads that arrive
//! intact but cannot be read surface as [`DecodeError`], wrapped in
//! [`StoreError::Decode`] when they come through the typed operations.

/// Errors produced when a stored payload cannot be read.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The payload is not valid JSON of the expected shape.
    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors that can occur talking to the record store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store did not answer its availability check.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// An operation exceeded the configured store timeout.
    #[error("store {op} on {key:?} timed out after {limit_ms}ms")]
    Timeout {
        /// The operation that timed out.
        op: &'static str,
        /// The key involved.
        key: String,
        /// The configured limit in milliseconds.
        limit_ms: u64,
    },

    /// A `Dragonfly`/Redis operation failed.
    #[error("Dragonfly error: {0}")]
    Backend(#[from] fred::error::Error),

    /// A value could not be converted to the backend's representation.
    #[error("cannot encode value for {key:?}: {reason}")]
    Encoding {
        /// The key being written.
        key: String,
        /// What went wrong.
        reason: String,
    },

    /// A write was refused by the store.
    #[error("write to {key:?} failed: {reason}")]
    WriteFailed {
        /// The key being written.
        key: String,
        /// What went wrong.
        reason: String,
    },

    /// A stored payload could not be decoded.
    #[error("cannot decode {key:?}: {source}")]
    Decode {
        /// The key that was read.
        key: String,
        /// The decode failure.
        source: DecodeError,
    },

    /// A configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}
