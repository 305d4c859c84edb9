//! Error types for context assembly.
//!
//! These surface only from the internal retrieval helpers;
//! `build_context` itself converts them into degraded results.

#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("index error: {0}")]
    Index(#[from] strata_index::IndexError),

    #[error("store error: {0}")]
    Store(#[from] strata_store::StoreError),
}
