//! Service facade over the indexing and retrieval pipeline.
//!
//! One explicitly constructed [`StrataService`] holds every injected
//! dependency (embedder, vector store, `SQLite`, cache) — no process-wide
//! globals. The five external operations live here as async methods; HTTP
//! framing, if any, is a separate concern.

pub mod config;
pub mod error;
pub mod service;

pub use config::Config;
pub use error::ServiceError;
pub use service::{JobStatusResponse, StrataService, vector_store_for};

pub use strata_context::{AssembledContext, ContextOptions, format_context};
pub use strata_index::SearchHit;
pub use strata_store::ContentType;
