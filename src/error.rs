//! Error types for gChat.

use thiserror::Error;

/// Common error type for gChat.
#[derive(Error, Debug)]
pub enum GChatError {
    /// Configuration error.
    ///
    /// Raised while loading or reloading; the previously active configuration
    /// stays in place when this is returned.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Operator markup could not be rendered into a text tree.
    #[error("render error: {0}")]
    Render(#[from] crate::text::RenderError),

    /// Permission denied error.
    #[error("permission denied: {0}")]
    Permission(String),

    /// Validation error for caller input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),
}

/// Result type alias for gChat operations.
pub type Result<T> = std::result::Result<T, GChatError>;
