//! Error types for the kvstore crate

use thiserror::Error;

/// Result type alias using kvstore's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the kvstore crate
#[derive(Debug, Error)]
pub enum Error {
    // ============ Protocol Errors ============
    /// A request frame was not valid JSON or not a JSON object
    #[error("{0}")]
    Protocol(String),

    /// The request named an op not in the dispatch table
    #[error("unknown op: {0}")]
    UnknownOp(String),

    /// A request reached a non-primary node in leader mode
    #[error("not_primary")]
    NotPrimary,

    // ============ Mutation Errors ============
    /// A mutation failed partway (I/O, missing field, type coercion)
    #[error("{0}")]
    Mutation(String),

    // ============ System Errors ============
    /// IO error (journal append, snapshot rename, socket I/O)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encode/decode error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal invariant violation (lock poisoned, channel closed)
    #[error("internal error: {0}")]
    Internal(String),

    /// Any other error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Build a mutation error from a missing or malformed request field
    pub fn missing_field(field: &str) -> Self {
        Self::Mutation(format!("missing field: {field}"))
    }
}
