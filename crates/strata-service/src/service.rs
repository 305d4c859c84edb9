//! The service facade: external operations over the pipeline.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use strata_context::{AssembledContext, ContextAssembler, ContextOptions};
use strata_embed::Embedder;
use strata_extract::Extractor;
use strata_index::{ChunkIndex, FsRepositorySource, Orchestrator, RepositorySource, SearchHit};
use strata_store::cache::{CacheBackend, CacheFirst};
use strata_store::{
    ContentType, ConversationTurn, IndexingJob, JobFileError, JobStatus, SqliteStore, VectorStore,
};

use crate::config::Config;
use crate::error::ServiceError;

/// Build the vector store the configuration names: Qdrant when a URL is
/// configured, the in-process store otherwise.
///
/// # Errors
///
/// Returns an error if the Qdrant client cannot be created.
pub fn vector_store_for(config: &Config) -> anyhow::Result<Arc<dyn VectorStore>> {
    match &config.storage.qdrant_url {
        Some(url) => Ok(Arc::new(strata_store::qdrant::QdrantStore::new(url)?)),
        None => Ok(Arc::new(strata_store::memory::InMemoryVectorStore::new())),
    }
}

/// Wire shape of `job_status` / `cancel_job` responses.
#[derive(Debug, Clone, Serialize)]
pub struct JobStatusResponse {
    pub job_id: String,
    pub status: JobStatus,
    pub progress_percentage: f32,
    pub current_file: Option<String>,
    pub processed_files: usize,
    pub total_files: usize,
    pub total_chunks: usize,
    pub indexed_chunks: usize,
    pub failed_chunks: usize,
    pub errors: Vec<JobFileError>,
}

impl From<IndexingJob> for JobStatusResponse {
    fn from(job: IndexingJob) -> Self {
        Self {
            progress_percentage: job.progress_percentage(),
            job_id: job.id,
            status: job.status,
            current_file: job.current_file,
            processed_files: job.processed_files,
            total_files: job.total_files,
            total_chunks: job.total_chunks,
            indexed_chunks: job.indexed_chunks,
            failed_chunks: job.failed_chunks,
            errors: job.errors,
        }
    }
}

/// Everything wired together: one instance per process, dependencies
/// injected at construction.
pub struct StrataService {
    orchestrator: Orchestrator,
    assembler: ContextAssembler,
    index: Arc<ChunkIndex>,
    source: Arc<FsRepositorySource>,
    sqlite: SqliteStore,
    cache: CacheFirst,
    score_floor: f32,
}

impl std::fmt::Debug for StrataService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrataService").finish_non_exhaustive()
    }
}

impl StrataService {
    /// Build a service with an in-process cache only.
    ///
    /// # Errors
    ///
    /// Returns an error if the durable store cannot be opened.
    pub async fn new(
        config: &Config,
        embedder: Arc<dyn Embedder>,
        vectors: Arc<dyn VectorStore>,
    ) -> anyhow::Result<Self> {
        Self::with_cache_backend(config, embedder, vectors, None).await
    }

    /// Build a service with an external cache backend in front of the
    /// in-process fallback.
    ///
    /// # Errors
    ///
    /// Returns an error if the durable store cannot be opened.
    pub async fn with_cache_backend(
        config: &Config,
        embedder: Arc<dyn Embedder>,
        vectors: Arc<dyn VectorStore>,
        cache_backend: Option<Box<dyn CacheBackend>>,
    ) -> anyhow::Result<Self> {
        let sqlite = SqliteStore::new(&config.storage.database_path).await?;
        let source = Arc::new(FsRepositorySource::new());
        let index = Arc::new(ChunkIndex::new(
            vectors,
            sqlite.clone(),
            embedder,
            config.retry(),
        ));
        let orchestrator = Orchestrator::new(
            Arc::clone(&source) as Arc<dyn RepositorySource>,
            Arc::clone(&index),
            Extractor::new(config.extractor()),
            sqlite.clone(),
            config.orchestrator(),
        );
        let assembler = ContextAssembler::new(
            Arc::clone(&index),
            sqlite.clone(),
            config.assembler(),
        );

        Ok(Self {
            orchestrator,
            assembler,
            index,
            source,
            sqlite,
            cache: CacheFirst::new(cache_backend, config.cache_ttl()),
            score_floor: config.retrieval.score_floor,
        })
    }

    /// Install the tracing subscriber; safe to call more than once.
    pub fn init_telemetry() {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    }

    /// Point a repository id at a local checkout produced by the
    /// acquisition collaborator.
    pub fn register_repository(&self, repository_id: &str, root: impl Into<PathBuf>) {
        let root = root.into();
        tracing::debug!(repository = repository_id, root = %root.display(), "repository registered");
        self.source.register(repository_id, root);
    }

    /// `POST index_repository`: start (or join) an indexing job.
    #[must_use]
    pub fn index_repository(
        &self,
        repository_id: &str,
        branch: &str,
        incremental: bool,
        content_type_filter: Option<Vec<ContentType>>,
    ) -> String {
        self.orchestrator
            .index_repository(repository_id, branch, incremental, content_type_filter)
    }

    /// `GET job_status`: live registry first, then cached terminal
    /// snapshots read through the durable store.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::NotFound`] for an unknown job id.
    pub async fn job_status(&self, job_id: &str) -> Result<JobStatusResponse, ServiceError> {
        if let Some(job) = self.orchestrator.live_job(job_id) {
            return Ok(job.into());
        }

        let key = format!("job:{job_id}");
        let sqlite = self.sqlite.clone();
        let id = job_id.to_owned();
        let loaded = self
            .cache
            .get_or_load(&key, None, || async move {
                let job = sqlite.get_job(&id).await?;
                job.map(|j| serde_json::to_value(j).map_err(Into::into))
                    .transpose()
            })
            .await?;

        let value = loaded.ok_or_else(|| ServiceError::NotFound(format!("job {job_id}")))?;
        let job: IndexingJob = serde_json::from_value(value)?;
        Ok(job.into())
    }

    /// `POST cancel_job`: request cooperative cancellation.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::NotFound`] for an unknown job id.
    pub async fn cancel_job(&self, job_id: &str) -> Result<JobStatusResponse, ServiceError> {
        let job = self.orchestrator.cancel_job(job_id).await?;
        self.cache.invalidate(&format!("job:{job_id}")).await;
        Ok(job.into())
    }

    /// `POST search`: embed the query and run a filtered similarity search.
    ///
    /// An empty result is a normal outcome, not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the query cannot be embedded (after retries) or
    /// the vector store fails.
    pub async fn search(
        &self,
        query: &str,
        repository_id: Option<&str>,
        content_types: Option<&[ContentType]>,
        limit: usize,
    ) -> Result<Vec<SearchHit>, ServiceError> {
        let vector = self.index.embed_query(query).await?;
        let mut hits = self
            .index
            .search(vector, repository_id, content_types, limit)
            .await?;
        hits.retain(|h| h.score >= self.score_floor);
        Ok(hits)
    }

    /// `POST build_context`: assemble a budget-bounded context. Never
    /// fails — dependency outages degrade the result instead.
    pub async fn build_context(
        &self,
        query: &str,
        repository_id: &str,
        session_id: &str,
        branch: &str,
        options: &ContextOptions,
    ) -> AssembledContext {
        self.assembler
            .build_context(query, repository_id, session_id, branch, options)
            .await
    }

    /// Cascade-delete every chunk of a repository.
    ///
    /// # Errors
    ///
    /// Returns an error if either store fails.
    pub async fn delete_repository(&self, repository_id: &str) -> Result<usize, ServiceError> {
        let removed = self.index.delete_repository(repository_id).await?;
        self.cache.invalidate("job:*").await;
        tracing::info!(repository = repository_id, removed, "repository chunks deleted");
        Ok(removed)
    }

    /// Record a turn written by the generation consumer. Write-through:
    /// durable store first, then session cache invalidation.
    ///
    /// # Errors
    ///
    /// Returns an error if the durable write fails.
    pub async fn append_turn(&self, turn: &ConversationTurn) -> Result<i64, ServiceError> {
        let id = self.sqlite.append_turn(turn).await?;
        self.cache
            .invalidate(&format!("history:{}:*", turn.session_id))
            .await;
        Ok(id)
    }

    /// Recent turns of a session, newest first, read through the cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the durable store fails on a cache miss.
    pub async fn session_history(
        &self,
        session_id: &str,
        limit: u32,
    ) -> Result<Vec<ConversationTurn>, ServiceError> {
        let key = format!("history:{session_id}:{limit}");
        let sqlite = self.sqlite.clone();
        let session = session_id.to_owned();
        let loaded = self
            .cache
            .get_or_load(&key, None, || async move {
                let turns = sqlite.recent_turns(&session, limit).await?;
                Ok(Some(serde_json::to_value(turns)?))
            })
            .await?;

        match loaded {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(Vec::new()),
        }
    }

    /// Delete a session's turns (the session owns them).
    ///
    /// # Errors
    ///
    /// Returns an error if the durable delete fails.
    pub async fn clear_session(&self, session_id: &str) -> Result<u64, ServiceError> {
        let removed = self.sqlite.clear_session(session_id).await?;
        self.cache
            .invalidate(&format!("history:{session_id}:*"))
            .await;
        Ok(removed)
    }
}
