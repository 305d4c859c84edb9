//! Error type surfaced by the service operations.

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("index error: {0}")]
    Index(#[from] strata_index::IndexError),

    #[error("store error: {0}")]
    Store(#[from] strata_store::StoreError),

    #[error("embedding error: {0}")]
    Embed(#[from] strata_embed::EmbedError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),
}

impl ServiceError {
    /// `true` when the error maps to a 404-style outcome for callers.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_)
                | Self::Index(strata_index::IndexError::NotFound(_))
                | Self::Store(strata_store::StoreError::NotFound(_))
        )
    }
}
