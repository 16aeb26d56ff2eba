//! Error types for event construction and conversion.

use thiserror::Error;

/// Result type alias using `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core error type for event model operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Event could not be converted into its wire representation.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Event serialized to something other than a JSON object.
    #[error("event did not serialize to an object, got {kind}")]
    NotAnObject {
        /// JSON kind that was produced instead
        kind: &'static str,
    },
}
