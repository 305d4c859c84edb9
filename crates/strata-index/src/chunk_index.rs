//! Dedup-aware chunk index over the vector store and `SQLite`.
//!
//! Dual-write in both directions: the vector payload carries everything a
//! search hit needs, the `SQLite` row backs dedup lookups and cascade
//! deletes. The dedup key is `(repository_id, file_path, start_offset,
//! end_offset, source_hash)` — indexing an unchanged chunk a second time is
//! a no-op that never re-embeds.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use strata_embed::{Embedder, RetryPolicy, embed_with_retry};
use strata_store::{
    Chunk, ChunkMetadata, ContentType, FieldCondition, FieldValue, SqliteStore, VectorFilter,
    VectorPoint, VectorStore,
};

use crate::error::{IndexError, Result};

/// Collection all chunk vectors live in, scoped by payload fields.
pub const CHUNK_COLLECTION: &str = "strata_chunks";

/// Outcome of one `index` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexResult {
    pub chunk_id: String,
    /// `true` when the dedup key already existed and nothing was written.
    pub deduplicated: bool,
}

/// One ranked search result.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub chunk_id: String,
    pub content: String,
    pub content_type: ContentType,
    pub metadata: ChunkMetadata,
    pub score: f32,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

pub struct ChunkIndex {
    vectors: Arc<dyn VectorStore>,
    sqlite: SqliteStore,
    embedder: Arc<dyn Embedder>,
    retry: RetryPolicy,
    collection: String,
}

impl std::fmt::Debug for ChunkIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkIndex")
            .field("collection", &self.collection)
            .finish_non_exhaustive()
    }
}

impl ChunkIndex {
    #[must_use]
    pub fn new(
        vectors: Arc<dyn VectorStore>,
        sqlite: SqliteStore,
        embedder: Arc<dyn Embedder>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            vectors,
            sqlite,
            embedder,
            retry,
            collection: CHUNK_COLLECTION.to_owned(),
        }
    }

    /// Probe the embedder for its dimensionality and make sure the
    /// collection exists. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if the probe or collection setup fails.
    pub async fn ensure_ready(&self) -> Result<u64> {
        let probe = embed_with_retry(&*self.embedder, "dimension probe", &self.retry).await?;
        let vector_size = u64::try_from(probe.len())
            .map_err(|e| IndexError::Other(format!("absurd embedding size: {e}")))?;
        self.vectors
            .ensure_collection(&self.collection, vector_size)
            .await?;
        Ok(vector_size)
    }

    /// Index one chunk, embedding it unless its dedup key already exists.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding (after retries) or either store write
    /// fails.
    pub async fn index(&self, chunk: &Chunk) -> Result<IndexResult> {
        if let Some(existing) = self.find_existing(chunk).await? {
            return Ok(IndexResult {
                chunk_id: existing,
                deduplicated: true,
            });
        }

        let vector = match &chunk.embedding {
            Some(v) => v.clone(),
            None => embed_with_retry(&*self.embedder, &embedding_text(chunk), &self.retry).await?,
        };

        self.vectors
            .upsert(
                &self.collection,
                vec![VectorPoint {
                    id: chunk.id.clone(),
                    vector,
                    payload: payload_of(chunk),
                }],
            )
            .await?;

        match self.sqlite.insert_chunk(chunk).await {
            Ok(()) => Ok(IndexResult {
                chunk_id: chunk.id.clone(),
                deduplicated: false,
            }),
            Err(e) if e.is_unique_violation() => {
                // A concurrent worker indexed the same dedup key first; drop
                // the point we just wrote and report theirs.
                self.vectors
                    .delete_by_ids(&self.collection, vec![chunk.id.clone()])
                    .await?;
                let existing = self.find_existing(chunk).await?.unwrap_or_else(|| chunk.id.clone());
                Ok(IndexResult {
                    chunk_id: existing,
                    deduplicated: true,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_existing(&self, chunk: &Chunk) -> Result<Option<String>> {
        Ok(self
            .sqlite
            .find_chunk_id(
                &chunk.repository_id,
                &chunk.metadata.file_path,
                chunk.metadata.start_offset,
                chunk.metadata.end_offset,
                &chunk.source_hash,
            )
            .await?)
    }

    /// Embed a query string under the index's retry policy.
    ///
    /// # Errors
    ///
    /// Returns an error once retries are exhausted.
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        Ok(embed_with_retry(&*self.embedder, text, &self.retry).await?)
    }

    /// Similarity search, descending score, ties broken by the most recent
    /// `created_at`.
    ///
    /// # Errors
    ///
    /// Returns an error if the vector store query fails.
    pub async fn search(
        &self,
        query_vector: Vec<f32>,
        repository_id: Option<&str>,
        content_types: Option<&[ContentType]>,
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        let mut filter = VectorFilter::default();
        if let Some(repo) = repository_id {
            filter.must.push(FieldCondition {
                field: "repository_id".into(),
                value: FieldValue::Text(repo.to_owned()),
            });
        }
        if let Some(types) = content_types {
            filter.should.extend(types.iter().map(|ct| FieldCondition {
                field: "content_type".into(),
                value: FieldValue::Text(ct.as_str().to_owned()),
            }));
        }
        let filter = if filter.must.is_empty() && filter.should.is_empty() {
            None
        } else {
            Some(filter)
        };

        let points = self
            .vectors
            .search(&self.collection, query_vector, limit as u64, filter)
            .await?;

        let mut hits: Vec<SearchHit> = points.into_iter().filter_map(hit_from_payload).collect();
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
        hits.truncate(limit);
        Ok(hits)
    }

    /// Remove all chunks of one file from both stores.
    ///
    /// # Errors
    ///
    /// Returns an error if either store fails.
    pub async fn remove_file(&self, repository_id: &str, file_path: &str) -> Result<usize> {
        let ids = self.sqlite.remove_file_chunks(repository_id, file_path).await?;
        let count = ids.len();
        self.vectors.delete_by_ids(&self.collection, ids).await?;
        Ok(count)
    }

    /// Cascade-delete every chunk of a repository.
    ///
    /// # Errors
    ///
    /// Returns an error if either store fails.
    pub async fn delete_repository(&self, repository_id: &str) -> Result<usize> {
        let ids = self.sqlite.remove_repository_chunks(repository_id).await?;
        let count = ids.len();
        self.vectors
            .delete_by_filter(
                &self.collection,
                VectorFilter {
                    must: vec![FieldCondition {
                        field: "repository_id".into(),
                        value: FieldValue::Text(repository_id.to_owned()),
                    }],
                    ..VectorFilter::default()
                },
            )
            .await?;
        Ok(count)
    }

    /// `file_path -> source_hash` of everything currently indexed for the
    /// repository; the incremental pass diffs against this.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn file_hashes(&self, repository_id: &str) -> Result<HashMap<String, String>> {
        Ok(self
            .sqlite
            .file_hashes(repository_id)
            .await?
            .into_iter()
            .collect())
    }
}

/// Text handed to the embedder: a short provenance header ahead of the raw
/// content noticeably improves conceptual-query retrieval.
pub(crate) fn embedding_text(chunk: &Chunk) -> String {
    let mut text = String::with_capacity(chunk.content.len() + 128);
    text.push_str("# ");
    text.push_str(&chunk.metadata.file_path);
    text.push('\n');
    if let Some(lang) = &chunk.metadata.language {
        text.push_str("# Language: ");
        text.push_str(lang);
        text.push('\n');
    }
    text.push_str("# Kind: ");
    text.push_str(chunk.content_type.as_str());
    text.push('\n');
    text.push_str(&chunk.content);
    text
}

fn payload_of(chunk: &Chunk) -> HashMap<String, serde_json::Value> {
    HashMap::from([
        ("repository_id".to_owned(), serde_json::json!(chunk.repository_id)),
        ("file_path".to_owned(), serde_json::json!(chunk.metadata.file_path)),
        ("content".to_owned(), serde_json::json!(chunk.content)),
        ("content_type".to_owned(), serde_json::json!(chunk.content_type.as_str())),
        ("language".to_owned(), serde_json::json!(chunk.metadata.language)),
        ("start_offset".to_owned(), serde_json::json!(chunk.metadata.start_offset)),
        ("end_offset".to_owned(), serde_json::json!(chunk.metadata.end_offset)),
        ("line_start".to_owned(), serde_json::json!(chunk.metadata.line_range.0)),
        ("line_end".to_owned(), serde_json::json!(chunk.metadata.line_range.1)),
        ("source_hash".to_owned(), serde_json::json!(chunk.source_hash)),
        ("created_at".to_owned(), serde_json::json!(chunk.created_at.to_rfc3339())),
    ])
}

fn hit_from_payload(point: strata_store::ScoredVectorPoint) -> Option<SearchHit> {
    let p = &point.payload;
    let get_str = |key: &str| p.get(key).and_then(|v| v.as_str()).map(str::to_owned);
    let get_usize = |key: &str| {
        p.get(key)
            .and_then(serde_json::Value::as_u64)
            .and_then(|v| usize::try_from(v).ok())
    };

    let created_at = chrono::DateTime::parse_from_rfc3339(&get_str("created_at")?)
        .ok()?
        .with_timezone(&chrono::Utc);

    Some(SearchHit {
        chunk_id: point.id,
        content: get_str("content")?,
        content_type: ContentType::parse(&get_str("content_type")?)?,
        metadata: ChunkMetadata {
            file_path: get_str("file_path")?,
            start_offset: get_usize("start_offset")?,
            end_offset: get_usize("end_offset")?,
            language: get_str("language"),
            line_range: (get_usize("line_start")?, get_usize("line_end")?),
        },
        score: point.score,
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use strata_embed::mock::MockEmbedder;
    use strata_store::memory::InMemoryVectorStore;

    fn chunk(id: &str, repo: &str, file: &str, start: usize, content: &str, hash: &str) -> Chunk {
        Chunk {
            id: id.into(),
            repository_id: repo.into(),
            content: content.into(),
            content_type: ContentType::SourceCode,
            metadata: ChunkMetadata {
                file_path: file.into(),
                start_offset: start,
                end_offset: start + content.len(),
                language: Some("rust".into()),
                line_range: (1, 1),
            },
            embedding: None,
            source_hash: hash.into(),
            created_at: chrono::Utc::now(),
        }
    }

    async fn index_with_mock() -> (ChunkIndex, MockEmbedder) {
        let embedder = MockEmbedder::default();
        let index = ChunkIndex::new(
            Arc::new(InMemoryVectorStore::new()),
            SqliteStore::in_memory().await.unwrap(),
            Arc::new(embedder.clone()),
            RetryPolicy::default(),
        );
        index.ensure_ready().await.unwrap();
        (index, embedder)
    }

    #[tokio::test]
    async fn index_then_search_read_your_writes() {
        let (index, _) = index_with_mock().await;
        let c = chunk("c1", "r1", "src/lib.rs", 0, "fn parse_config() { read_toml() }", "h1");
        let result = index.index(&c).await.unwrap();
        assert!(!result.deduplicated);

        let query = index.embed_query("parse_config").await.unwrap();
        let hits = index.search(query, Some("r1"), None, 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk_id, "c1");
        assert_eq!(hits[0].metadata.file_path, "src/lib.rs");
    }

    #[tokio::test]
    async fn second_index_of_same_dedup_key_is_noop() {
        let (index, embedder) = index_with_mock().await;
        let c = chunk("c1", "r1", "src/lib.rs", 0, "fn a() {}", "h1");
        assert!(!index.index(&c).await.unwrap().deduplicated);

        let calls_after_first = embedder.call_count();
        // Same dedup key, different chunk id (as a re-extraction would make).
        let again = chunk("c2", "r1", "src/lib.rs", 0, "fn a() {}", "h1");
        let result = index.index(&again).await.unwrap();
        assert!(result.deduplicated);
        assert_eq!(result.chunk_id, "c1");
        assert_eq!(embedder.call_count(), calls_after_first, "dedup must not re-embed");
    }

    #[tokio::test]
    async fn changed_hash_is_not_deduplicated() {
        let (index, _) = index_with_mock().await;
        index.index(&chunk("c1", "r1", "a.rs", 0, "fn a() {}", "h1")).await.unwrap();
        let changed = chunk("c2", "r1", "a.rs", 0, "fn a() {}", "h2");
        assert!(!index.index(&changed).await.unwrap().deduplicated);
    }

    #[tokio::test]
    async fn search_scopes_by_repository() {
        let (index, _) = index_with_mock().await;
        index.index(&chunk("c1", "r1", "a.rs", 0, "alpha beta", "h1")).await.unwrap();
        index.index(&chunk("c2", "r2", "b.rs", 0, "alpha beta", "h2")).await.unwrap();

        let query = index.embed_query("alpha beta").await.unwrap();
        let hits = index.search(query, Some("r1"), None, 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk_id, "c1");
    }

    #[tokio::test]
    async fn search_filters_by_content_type() {
        let (index, _) = index_with_mock().await;
        let mut code = chunk("c1", "r1", "a.rs", 0, "retry with backoff", "h1");
        code.content_type = ContentType::SourceCode;
        let mut docs = chunk("c2", "r1", "guide.md", 0, "retry with backoff", "h2");
        docs.content_type = ContentType::Markdown;
        index.index(&code).await.unwrap();
        index.index(&docs).await.unwrap();

        let query = index.embed_query("retry with backoff").await.unwrap();
        let hits = index
            .search(query, Some("r1"), Some(&[ContentType::Markdown]), 10)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk_id, "c2");
    }

    #[tokio::test]
    async fn no_match_returns_empty_not_error() {
        let (index, _) = index_with_mock().await;
        let query = index.embed_query("nonexistent_term_xyz").await.unwrap();
        let hits = index.search(query, Some("r-empty"), None, 10).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn delete_repository_cascades() {
        let (index, _) = index_with_mock().await;
        index.index(&chunk("c1", "r1", "a.rs", 0, "one", "h1")).await.unwrap();
        index.index(&chunk("c2", "r1", "b.rs", 0, "two", "h2")).await.unwrap();
        index.index(&chunk("c3", "r2", "c.rs", 0, "three", "h3")).await.unwrap();

        let removed = index.delete_repository("r1").await.unwrap();
        assert_eq!(removed, 2);

        let query = index.embed_query("one two three").await.unwrap();
        assert!(index.search(query.clone(), Some("r1"), None, 10).await.unwrap().is_empty());
        assert_eq!(index.search(query, Some("r2"), None, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn remove_file_drops_only_that_file() {
        let (index, _) = index_with_mock().await;
        index.index(&chunk("c1", "r1", "a.rs", 0, "keep me around", "h1")).await.unwrap();
        index.index(&chunk("c2", "r1", "b.rs", 0, "drop me please", "h2")).await.unwrap();

        assert_eq!(index.remove_file("r1", "b.rs").await.unwrap(), 1);
        let hashes = index.file_hashes("r1").await.unwrap();
        assert_eq!(hashes.len(), 1);
        assert!(hashes.contains_key("a.rs"));
    }

    #[test]
    fn embedding_text_carries_provenance() {
        let c = chunk("c1", "r1", "src/net.rs", 0, "fn connect() {}", "h1");
        let text = embedding_text(&c);
        assert!(text.contains("# src/net.rs"));
        assert!(text.contains("# Language: rust"));
        assert!(text.contains("# Kind: source_code"));
        assert!(text.contains("fn connect() {}"));
    }
}
