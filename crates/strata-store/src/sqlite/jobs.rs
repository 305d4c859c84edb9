//! Indexing job snapshots, persisted so `job_status` survives restarts.

use sqlx::FromRow;

use super::{SqliteStore, parse_timestamp};
use crate::error::StoreError;
use crate::types::{IndexingJob, JobFileError, JobStatus};

#[derive(Debug, FromRow)]
struct JobRow {
    id: String,
    repository_id: String,
    branch: String,
    status: String,
    total_files: i64,
    processed_files: i64,
    total_chunks: i64,
    indexed_chunks: i64,
    failed_chunks: i64,
    started_at: Option<String>,
    finished_at: Option<String>,
    current_file: Option<String>,
    errors: String,
}

impl JobRow {
    fn into_job(self) -> Result<IndexingJob, StoreError> {
        let status = JobStatus::parse(&self.status)
            .ok_or_else(|| StoreError::Other(format!("unknown job status {:?}", self.status)))?;
        let errors: Vec<JobFileError> = serde_json::from_str(&self.errors)?;
        Ok(IndexingJob {
            id: self.id,
            repository_id: self.repository_id,
            branch: self.branch,
            status,
            total_files: usize::try_from(self.total_files)?,
            processed_files: usize::try_from(self.processed_files)?,
            total_chunks: usize::try_from(self.total_chunks)?,
            indexed_chunks: usize::try_from(self.indexed_chunks)?,
            failed_chunks: usize::try_from(self.failed_chunks)?,
            started_at: self.started_at.as_deref().map(parse_timestamp).transpose()?,
            finished_at: self.finished_at.as_deref().map(parse_timestamp).transpose()?,
            current_file: self.current_file,
            errors,
        })
    }
}

impl SqliteStore {
    /// Write a job snapshot, replacing any previous snapshot for the id.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn upsert_job(&self, job: &IndexingJob) -> Result<(), StoreError> {
        let errors = serde_json::to_string(&job.errors)?;

        sqlx::query(
            "INSERT OR REPLACE INTO indexing_jobs \
             (id, repository_id, branch, status, total_files, processed_files, \
              total_chunks, indexed_chunks, failed_chunks, started_at, finished_at, \
              current_file, errors) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&job.id)
        .bind(&job.repository_id)
        .bind(&job.branch)
        .bind(job.status.as_str())
        .bind(i64::try_from(job.total_files)?)
        .bind(i64::try_from(job.processed_files)?)
        .bind(i64::try_from(job.total_chunks)?)
        .bind(i64::try_from(job.indexed_chunks)?)
        .bind(i64::try_from(job.failed_chunks)?)
        .bind(job.started_at.map(|t| t.to_rfc3339()))
        .bind(job.finished_at.map(|t| t.to_rfc3339()))
        .bind(job.current_file.as_deref())
        .bind(errors)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Load a persisted job snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the row is malformed.
    pub async fn get_job(&self, job_id: &str) -> Result<Option<IndexingJob>, StoreError> {
        let row: Option<JobRow> = sqlx::query_as("SELECT * FROM indexing_jobs WHERE id = ?")
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(JobRow::into_job).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_job() -> IndexingJob {
        IndexingJob {
            id: "job-1".into(),
            repository_id: "repo-1".into(),
            branch: "main".into(),
            status: JobStatus::Completed,
            total_files: 10,
            processed_files: 10,
            total_chunks: 42,
            indexed_chunks: 40,
            failed_chunks: 2,
            started_at: Some(chrono::Utc::now()),
            finished_at: Some(chrono::Utc::now()),
            current_file: None,
            errors: vec![JobFileError {
                file: "broken.bin".into(),
                message: "invalid UTF-8".into(),
            }],
        }
    }

    #[tokio::test]
    async fn upsert_and_get_roundtrip() {
        let store = SqliteStore::in_memory().await.unwrap();
        let job = sample_job();
        store.upsert_job(&job).await.unwrap();

        let loaded = store.get_job("job-1").await.unwrap().unwrap();
        assert_eq!(loaded.status, JobStatus::Completed);
        assert_eq!(loaded.total_chunks, 42);
        assert_eq!(loaded.errors.len(), 1);
        assert_eq!(loaded.errors[0].file, "broken.bin");
    }

    #[tokio::test]
    async fn upsert_replaces_snapshot() {
        let store = SqliteStore::in_memory().await.unwrap();
        let mut job = sample_job();
        job.status = JobStatus::Running;
        job.processed_files = 3;
        store.upsert_job(&job).await.unwrap();

        job.status = JobStatus::Completed;
        job.processed_files = 10;
        store.upsert_job(&job).await.unwrap();

        let loaded = store.get_job("job-1").await.unwrap().unwrap();
        assert_eq!(loaded.status, JobStatus::Completed);
        assert_eq!(loaded.processed_files, 10);
    }

    #[tokio::test]
    async fn missing_job_is_none() {
        let store = SqliteStore::in_memory().await.unwrap();
        assert!(store.get_job("nope").await.unwrap().is_none());
    }
}
