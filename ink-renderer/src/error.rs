//! Renderer error types.

use thiserror::Error;

/// Result type for renderer operations.
pub type RenderResult<T> = Result<T, RenderError>;

/// Errors that can occur during rendering.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Resource loading or allocation failed.
    #[error("Failed to load resource: {0}")]
    Resource(String),

    /// Requested page does not exist.
    #[error("Page {index} out of range (document has {count} pages)")]
    PageOutOfRange {
        /// Requested page.
        index: usize,
        /// Pages in the document.
        count: usize,
    },

    /// Image decoding failed.
    #[error("Image decoding failed: {0}")]
    Decode(String),

    /// Image encoding failed.
    #[error("Image encoding failed: {0}")]
    Encode(String),

    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Canvas configuration was rejected.
    #[error(transparent)]
    Config(#[from] ink_core::CoreError),

    /// A background task failed to complete.
    #[error("Background task failed: {0}")]
    Task(String),
}
