//! Job-driven indexing over a repository tree.
//!
//! One job walks the repository, fans file work out over a bounded worker
//! pool, and feeds extraction output into the chunk index. Per-file errors
//! are recorded on the job and never abort it; only systemic failures
//! (repository missing, storage unreachable after retries) mark a job
//! failed. Cancellation is cooperative and checked between files.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::StreamExt;

use strata_extract::Extractor;
use strata_store::{ContentType, IndexingJob, JobStatus, SqliteStore};

use crate::chunk_index::ChunkIndex;
use crate::error::{IndexError, Result};
use crate::job::{JobRegistry, JobState};
use crate::source::RepositorySource;

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Files processed in parallel within one job.
    pub concurrency: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self { concurrency: 8 }
    }
}

/// Cheap to clone: every worker-shared field sits behind an `Arc` or a
/// pooled handle, and spawned jobs run on their own clone.
#[derive(Clone)]
pub struct Orchestrator {
    source: Arc<dyn RepositorySource>,
    index: Arc<ChunkIndex>,
    extractor: Extractor,
    registry: Arc<JobRegistry>,
    sqlite: SqliteStore,
    config: OrchestratorConfig,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    #[must_use]
    pub fn new(
        source: Arc<dyn RepositorySource>,
        index: Arc<ChunkIndex>,
        extractor: Extractor,
        sqlite: SqliteStore,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            source,
            index,
            extractor,
            registry: Arc::new(JobRegistry::new()),
            sqlite,
            config,
        }
    }

    /// Start (or join) an indexing job for `(repository_id, branch)`.
    ///
    /// While a job for the pair is non-terminal, further calls return its id
    /// instead of spawning a second job.
    pub fn index_repository(
        &self,
        repository_id: &str,
        branch: &str,
        incremental: bool,
        content_type_filter: Option<Vec<ContentType>>,
    ) -> String {
        let (state, existing) = self.registry.begin(repository_id, branch);
        if existing {
            tracing::debug!(job = %state.id, "active job already running for this repository/branch");
            return state.id.clone();
        }

        let job_id = state.id.clone();
        tracing::info!(job = %job_id, repository = repository_id, branch, incremental, "indexing job started");

        let orchestrator = self.clone();
        tokio::spawn(async move {
            orchestrator
                .run_job(state, incremental, content_type_filter)
                .await;
        });

        job_id
    }

    /// Snapshot of a job still held by the in-memory registry, if any.
    #[must_use]
    pub fn live_job(&self, job_id: &str) -> Option<IndexingJob> {
        self.registry.get(job_id).map(|state| state.snapshot())
    }

    /// Snapshot of a job: live registry first, persisted snapshots second.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::NotFound`] for an unknown id.
    pub async fn get_job(&self, job_id: &str) -> Result<IndexingJob> {
        if let Some(state) = self.registry.get(job_id) {
            return Ok(state.snapshot());
        }
        self.sqlite
            .get_job(job_id)
            .await?
            .ok_or_else(|| IndexError::NotFound(format!("job {job_id}")))
    }

    /// Request cooperative cancellation and return the resulting snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::NotFound`] for an unknown id.
    pub async fn cancel_job(&self, job_id: &str) -> Result<IndexingJob> {
        if let Some(state) = self.registry.get(job_id) {
            state.cancel();
            tracing::info!(job = %job_id, "cancellation requested");
            return Ok(state.snapshot());
        }
        // Only terminal jobs live solely in the durable store; nothing to cancel.
        self.sqlite
            .get_job(job_id)
            .await?
            .ok_or_else(|| IndexError::NotFound(format!("job {job_id}")))
    }

    async fn run_job(
        &self,
        state: Arc<JobState>,
        incremental: bool,
        content_type_filter: Option<Vec<ContentType>>,
    ) {
        state.mark_running();

        match self
            .run_job_inner(&state, incremental, content_type_filter.as_deref())
            .await
        {
            Ok(()) => {
                let status = if state.is_cancel_requested() {
                    JobStatus::Cancelled
                } else {
                    JobStatus::Completed
                };
                state.finish(status);
            }
            Err(e) => {
                tracing::error!(job = %state.id, "indexing job failed: {e}");
                state.record_error(&state.repository_id, &e.to_string());
                state.finish(JobStatus::Failed);
            }
        }

        let snapshot = state.snapshot();
        tracing::info!(
            job = %snapshot.id,
            status = %snapshot.status,
            files = snapshot.processed_files,
            chunks = snapshot.indexed_chunks,
            failed = snapshot.failed_chunks,
            "indexing job finished"
        );
        if let Err(e) = self.sqlite.upsert_job(&snapshot).await {
            tracing::warn!(job = %snapshot.id, "failed to persist job snapshot: {e}");
        }
    }

    async fn run_job_inner(
        &self,
        state: &Arc<JobState>,
        incremental: bool,
        content_type_filter: Option<&[ContentType]>,
    ) -> Result<()> {
        self.index.ensure_ready().await?;

        let files = self
            .source
            .list_files(&state.repository_id, &state.branch)
            .await?;
        state.set_total_files(files.len());

        let previous = self.index.file_hashes(&state.repository_id).await?;
        let current: HashSet<&str> = files.iter().map(String::as_str).collect();

        futures::stream::iter(&files)
            .for_each_concurrent(self.config.concurrency.max(1), |rel_path| {
                let state = Arc::clone(state);
                let previous = &previous;
                async move {
                    // Cooperative cancellation: no new file starts, the
                    // in-flight ones complete.
                    if state.is_cancel_requested() {
                        return;
                    }
                    state.set_current_file(rel_path);
                    self.process_file(
                        &state,
                        rel_path,
                        incremental,
                        previous.get(rel_path).map(String::as_str),
                        content_type_filter,
                    )
                    .await;
                    state.add_processed();
                }
            })
            .await;

        if !state.is_cancel_requested() {
            self.remove_deleted_files(state, &previous, &current).await;
        }

        Ok(())
    }

    async fn process_file(
        &self,
        state: &JobState,
        rel_path: &str,
        incremental: bool,
        previous_hash: Option<&str>,
        content_type_filter: Option<&[ContentType]>,
    ) {
        let content = match self
            .source
            .read_file(&state.repository_id, &state.branch, rel_path)
            .await
        {
            Ok(c) => c,
            Err(e) => {
                state.record_error(rel_path, &format!("read failed: {e}"));
                return;
            }
        };

        if let Some(prev) = previous_hash {
            if prev == content.hash {
                if incremental {
                    // Unchanged file: no extraction, no chunk churn.
                    return;
                }
            } else if let Err(e) = self.index.remove_file(&state.repository_id, rel_path).await {
                // Changed file: its old chunks are superseded.
                state.record_error(rel_path, &format!("stale chunk cleanup failed: {e}"));
                return;
            }
        }

        let result =
            self.extractor
                .extract(&state.repository_id, rel_path, &content.bytes, content_type_filter);
        if !result.success {
            state.record_error(
                rel_path,
                result.error.as_deref().unwrap_or("extraction failed"),
            );
            return;
        }

        state.add_total_chunks(result.chunks.len());
        for chunk in &result.chunks {
            match self.index.index(chunk).await {
                Ok(_) => state.add_indexed(),
                Err(e) => {
                    state.add_failed();
                    state.record_error(rel_path, &format!("indexing failed: {e}"));
                }
            }
        }
    }

    async fn remove_deleted_files(
        &self,
        state: &JobState,
        previous: &HashMap<String, String>,
        current: &HashSet<&str>,
    ) {
        for old_file in previous.keys() {
            if current.contains(old_file.as_str()) {
                continue;
            }
            match self.index.remove_file(&state.repository_id, old_file).await {
                Ok(removed) if removed > 0 => {
                    tracing::debug!(file = %old_file, removed, "removed chunks of deleted file");
                }
                Ok(_) => {}
                Err(e) => state.record_error(old_file, &format!("deleted-file cleanup failed: {e}")),
            }
        }
    }
}
