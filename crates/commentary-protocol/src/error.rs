//! Error types for the commentary pipeline.

use thiserror::Error;

/// Errors that can occur while turning stream records into commentary.
#[derive(Debug, Error)]
pub enum CommentaryError {
    #[error("malformed record: {0}")]
    MalformedRecord(String),
    #[error("generation service error: {0}")]
    GenerationService(String),
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
}

impl CommentaryError {
    /// Whether the error only affects the current record.
    ///
    /// Malformed records are skipped; every other error aborts the batch so
    /// the upstream transport redelivers it.
    pub fn is_record_local(&self) -> bool {
        matches!(self, Self::MalformedRecord(_))
    }
}

impl From<serde_json::Error> for CommentaryError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

/// Convenience result type for pipeline operations.
pub type CommentaryResult<T> = Result<T, CommentaryError>;
