//! Error types for embedding operations.

/// Errors surfaced by embedding providers.
#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    /// The call exceeded its configured deadline.
    #[error("embedding call timed out")]
    Timeout,

    /// The provider is not reachable at all.
    #[error("embedding provider unavailable")]
    Unavailable,

    /// The provider answered with an error of its own.
    #[error("embedding provider error: {0}")]
    Provider(String),

    /// The provider returned a vector of unexpected dimensionality.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Generic catch-all error.
    #[error("{0}")]
    Other(String),
}

/// Result type alias using [`EmbedError`].
pub type Result<T> = std::result::Result<T, EmbedError>;
