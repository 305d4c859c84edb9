//! Error types for indexing operations.

/// Errors that can occur during indexing and search.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// IO error reading repository files.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Durable store failure.
    #[error("store error: {0}")]
    Store(#[from] strata_store::StoreError),

    /// Vector store failure.
    #[error("vector store error: {0}")]
    VectorStore(#[from] strata_store::VectorStoreError),

    /// Embedding provider failure after retries.
    #[error("embedding error: {0}")]
    Embed(#[from] strata_embed::EmbedError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Unknown repository or job.
    #[error("not found: {0}")]
    NotFound(String),

    /// Repository root missing or inaccessible — fails the whole job.
    #[error("repository unavailable: {0}")]
    RepositoryUnavailable(String),

    /// Generic catch-all error.
    #[error("{0}")]
    Other(String),
}

/// Result type alias using [`IndexError`].
pub type Result<T> = std::result::Result<T, IndexError>;
