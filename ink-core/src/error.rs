//! Error types for core canvas operations.

use thiserror::Error;

/// Result type for core canvas operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in core canvas operations.
///
/// Geometry and input handling never fail; only configuration loading does.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A configuration value is out of its valid range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
