//! Chunk rows: dedup lookups, per-file and per-repository lifecycle.

use sqlx::FromRow;

use super::{SqliteStore, parse_timestamp};
use crate::error::StoreError;
use crate::types::{Chunk, ChunkMetadata, ContentType};

#[derive(Debug, FromRow)]
struct ChunkRow {
    id: String,
    repository_id: String,
    file_path: String,
    content: String,
    content_type: String,
    language: Option<String>,
    start_offset: i64,
    end_offset: i64,
    line_start: i64,
    line_end: i64,
    source_hash: String,
    created_at: String,
}

impl ChunkRow {
    fn into_chunk(self) -> Result<Chunk, StoreError> {
        let content_type = ContentType::parse(&self.content_type)
            .ok_or_else(|| StoreError::Other(format!("unknown content type {:?}", self.content_type)))?;
        Ok(Chunk {
            id: self.id,
            repository_id: self.repository_id,
            content: self.content,
            content_type,
            metadata: ChunkMetadata {
                file_path: self.file_path,
                start_offset: usize::try_from(self.start_offset)?,
                end_offset: usize::try_from(self.end_offset)?,
                language: self.language,
                line_range: (
                    usize::try_from(self.line_start)?,
                    usize::try_from(self.line_end)?,
                ),
            },
            embedding: None,
            source_hash: self.source_hash,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

impl SqliteStore {
    /// Insert a chunk row.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails (including a dedup-key
    /// uniqueness violation — callers check [`Self::find_chunk_id`] first).
    pub async fn insert_chunk(&self, chunk: &Chunk) -> Result<(), StoreError> {
        let start = i64::try_from(chunk.metadata.start_offset)?;
        let end = i64::try_from(chunk.metadata.end_offset)?;
        let line_start = i64::try_from(chunk.metadata.line_range.0)?;
        let line_end = i64::try_from(chunk.metadata.line_range.1)?;

        sqlx::query(
            "INSERT INTO chunks \
             (id, repository_id, file_path, content, content_type, language, \
              start_offset, end_offset, line_start, line_end, source_hash, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&chunk.id)
        .bind(&chunk.repository_id)
        .bind(&chunk.metadata.file_path)
        .bind(&chunk.content)
        .bind(chunk.content_type.as_str())
        .bind(chunk.metadata.language.as_deref())
        .bind(start)
        .bind(end)
        .bind(line_start)
        .bind(line_end)
        .bind(&chunk.source_hash)
        .bind(chunk.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Look up an existing chunk by its dedup key.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn find_chunk_id(
        &self,
        repository_id: &str,
        file_path: &str,
        start_offset: usize,
        end_offset: usize,
        source_hash: &str,
    ) -> Result<Option<String>, StoreError> {
        let start = i64::try_from(start_offset)?;
        let end = i64::try_from(end_offset)?;

        let row: Option<(String,)> = sqlx::query_as(
            "SELECT id FROM chunks \
             WHERE repository_id = ? AND file_path = ? \
               AND start_offset = ? AND end_offset = ? AND source_hash = ?",
        )
        .bind(repository_id)
        .bind(file_path)
        .bind(start)
        .bind(end)
        .bind(source_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(id,)| id))
    }

    /// Fetch one chunk by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the row is malformed.
    pub async fn get_chunk(&self, id: &str) -> Result<Option<Chunk>, StoreError> {
        let row: Option<ChunkRow> = sqlx::query_as("SELECT * FROM chunks WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(ChunkRow::into_chunk).transpose()
    }

    /// Map of `file_path` to the `source_hash` it was last indexed at.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn file_hashes(
        &self,
        repository_id: &str,
    ) -> Result<Vec<(String, String)>, StoreError> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT DISTINCT file_path, source_hash FROM chunks WHERE repository_id = ?",
        )
        .bind(repository_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Remove all chunks of a file, returning the removed chunk ids so the
    /// caller can delete the matching vector points.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn remove_file_chunks(
        &self,
        repository_id: &str,
        file_path: &str,
    ) -> Result<Vec<String>, StoreError> {
        let ids: Vec<(String,)> =
            sqlx::query_as("SELECT id FROM chunks WHERE repository_id = ? AND file_path = ?")
                .bind(repository_id)
                .bind(file_path)
                .fetch_all(&self.pool)
                .await?;

        if ids.is_empty() {
            return Ok(Vec::new());
        }

        sqlx::query("DELETE FROM chunks WHERE repository_id = ? AND file_path = ?")
            .bind(repository_id)
            .bind(file_path)
            .execute(&self.pool)
            .await?;

        Ok(ids.into_iter().map(|(id,)| id).collect())
    }

    /// Remove every chunk of a repository, returning the removed ids.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn remove_repository_chunks(
        &self,
        repository_id: &str,
    ) -> Result<Vec<String>, StoreError> {
        let ids: Vec<(String,)> = sqlx::query_as("SELECT id FROM chunks WHERE repository_id = ?")
            .bind(repository_id)
            .fetch_all(&self.pool)
            .await?;

        sqlx::query("DELETE FROM chunks WHERE repository_id = ?")
            .bind(repository_id)
            .execute(&self.pool)
            .await?;

        Ok(ids.into_iter().map(|(id,)| id).collect())
    }

    /// Number of chunks stored for a repository.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn chunk_count(&self, repository_id: &str) -> Result<u64, StoreError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM chunks WHERE repository_id = ?")
            .bind(repository_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(u64::try_from(row.0)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_chunk(id: &str, file_path: &str, start: usize) -> Chunk {
        Chunk {
            id: id.into(),
            repository_id: "repo-1".into(),
            content: "fn sample() {}".into(),
            content_type: ContentType::SourceCode,
            metadata: ChunkMetadata {
                file_path: file_path.into(),
                start_offset: start,
                end_offset: start + 14,
                language: Some("rust".into()),
                line_range: (1, 1),
            },
            embedding: None,
            source_hash: "hash-a".into(),
            created_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn insert_and_find_by_dedup_key() {
        let store = SqliteStore::in_memory().await.unwrap();
        let chunk = sample_chunk("c1", "src/lib.rs", 0);
        store.insert_chunk(&chunk).await.unwrap();

        let found = store
            .find_chunk_id("repo-1", "src/lib.rs", 0, 14, "hash-a")
            .await
            .unwrap();
        assert_eq!(found.as_deref(), Some("c1"));

        let missing = store
            .find_chunk_id("repo-1", "src/lib.rs", 0, 14, "hash-b")
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn duplicate_dedup_key_rejected() {
        let store = SqliteStore::in_memory().await.unwrap();
        store.insert_chunk(&sample_chunk("c1", "src/lib.rs", 0)).await.unwrap();
        let dup = sample_chunk("c2", "src/lib.rs", 0);
        assert!(store.insert_chunk(&dup).await.is_err());
    }

    #[tokio::test]
    async fn get_chunk_roundtrip() {
        let store = SqliteStore::in_memory().await.unwrap();
        let chunk = sample_chunk("c1", "src/lib.rs", 42);
        store.insert_chunk(&chunk).await.unwrap();

        let loaded = store.get_chunk("c1").await.unwrap().unwrap();
        assert_eq!(loaded.content, chunk.content);
        assert_eq!(loaded.content_type, ContentType::SourceCode);
        assert_eq!(loaded.metadata.start_offset, 42);
        assert_eq!(loaded.metadata.language.as_deref(), Some("rust"));
    }

    #[tokio::test]
    async fn remove_file_chunks_returns_ids() {
        let store = SqliteStore::in_memory().await.unwrap();
        store.insert_chunk(&sample_chunk("c1", "a.rs", 0)).await.unwrap();
        store.insert_chunk(&sample_chunk("c2", "a.rs", 100)).await.unwrap();
        store.insert_chunk(&sample_chunk("c3", "b.rs", 0)).await.unwrap();

        let removed = store.remove_file_chunks("repo-1", "a.rs").await.unwrap();
        assert_eq!(removed.len(), 2);
        assert_eq!(store.chunk_count("repo-1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn remove_repository_chunks_cascades() {
        let store = SqliteStore::in_memory().await.unwrap();
        store.insert_chunk(&sample_chunk("c1", "a.rs", 0)).await.unwrap();
        store.insert_chunk(&sample_chunk("c2", "b.rs", 0)).await.unwrap();

        let removed = store.remove_repository_chunks("repo-1").await.unwrap();
        assert_eq!(removed.len(), 2);
        assert_eq!(store.chunk_count("repo-1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn file_hashes_distinct_per_file() {
        let store = SqliteStore::in_memory().await.unwrap();
        store.insert_chunk(&sample_chunk("c1", "a.rs", 0)).await.unwrap();
        store.insert_chunk(&sample_chunk("c2", "a.rs", 100)).await.unwrap();
        store.insert_chunk(&sample_chunk("c3", "b.rs", 0)).await.unwrap();

        let hashes = store.file_hashes("repo-1").await.unwrap();
        assert_eq!(hashes.len(), 2);
    }
}
