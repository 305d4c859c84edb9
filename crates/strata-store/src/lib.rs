//! Persistence layer for the indexing pipeline.
//!
//! Three concerns live here: domain types shared across the workspace
//! (chunks, jobs, conversation turns), the [`VectorStore`] abstraction with
//! in-memory and Qdrant-backed implementations, and the cache-first layer
//! ([`cache::CacheFirst`]) that fronts the `SQLite` durable store with a TTL
//! cache and degrades to an in-process map when an external cache backend is
//! unreachable.

pub mod cache;
pub mod error;
pub mod memory;
pub mod qdrant;
pub mod sqlite;
pub mod types;
pub mod vector;

pub use error::{Result, StoreError};
pub use sqlite::SqliteStore;
pub use types::{
    Chunk, ChunkMetadata, ChunkRef, ContentType, ConversationTurn, IndexingJob, JobFileError,
    JobStatus, TurnRole,
};
pub use vector::{
    FieldCondition, FieldValue, ScoredVectorPoint, VectorFilter, VectorPoint, VectorStore,
    VectorStoreError,
};
