//! Live job state and the per-`(repository, branch)` job registry.
//!
//! Workers mutate shared job state through atomics and short-held mutexes;
//! readers only ever see immutable [`IndexingJob`] snapshots. The registry
//! enforces at most one non-terminal job per `(repository_id, branch)` —
//! a second start request gets the existing job back instead of an error.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use strata_store::{IndexingJob, JobFileError, JobStatus};

/// Mutable state of one job, shared between workers and status readers.
#[derive(Debug)]
pub struct JobState {
    pub id: String,
    pub repository_id: String,
    pub branch: String,
    status: Mutex<JobStatus>,
    total_files: AtomicUsize,
    processed_files: AtomicUsize,
    total_chunks: AtomicUsize,
    indexed_chunks: AtomicUsize,
    failed_chunks: AtomicUsize,
    started_at: Mutex<Option<DateTime<Utc>>>,
    finished_at: Mutex<Option<DateTime<Utc>>>,
    current_file: Mutex<Option<String>>,
    errors: Mutex<Vec<JobFileError>>,
    cancel: CancellationToken,
}

fn unpoison<T>(result: Result<T, PoisonError<T>>) -> T {
    result.unwrap_or_else(PoisonError::into_inner)
}

impl JobState {
    fn new(repository_id: &str, branch: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            repository_id: repository_id.to_owned(),
            branch: branch.to_owned(),
            status: Mutex::new(JobStatus::Pending),
            total_files: AtomicUsize::new(0),
            processed_files: AtomicUsize::new(0),
            total_chunks: AtomicUsize::new(0),
            indexed_chunks: AtomicUsize::new(0),
            failed_chunks: AtomicUsize::new(0),
            started_at: Mutex::new(None),
            finished_at: Mutex::new(None),
            current_file: Mutex::new(None),
            errors: Mutex::new(Vec::new()),
            cancel: CancellationToken::new(),
        }
    }

    pub fn status(&self) -> JobStatus {
        *unpoison(self.status.lock())
    }

    pub fn mark_running(&self) {
        let mut status = unpoison(self.status.lock());
        if *status == JobStatus::Pending {
            *status = JobStatus::Running;
            *unpoison(self.started_at.lock()) = Some(Utc::now());
        }
    }

    pub fn set_total_files(&self, n: usize) {
        self.total_files.store(n, Ordering::SeqCst);
    }

    pub fn add_processed(&self) {
        self.processed_files.fetch_add(1, Ordering::SeqCst);
    }

    pub fn add_total_chunks(&self, n: usize) {
        self.total_chunks.fetch_add(n, Ordering::SeqCst);
    }

    pub fn add_indexed(&self) {
        self.indexed_chunks.fetch_add(1, Ordering::SeqCst);
    }

    pub fn add_failed(&self) {
        self.failed_chunks.fetch_add(1, Ordering::SeqCst);
    }

    pub fn set_current_file(&self, file: &str) {
        *unpoison(self.current_file.lock()) = Some(file.to_owned());
    }

    pub fn record_error(&self, file: &str, message: &str) {
        unpoison(self.errors.lock()).push(JobFileError {
            file: file.to_owned(),
            message: message.to_owned(),
        });
    }

    /// Request cooperative cancellation. Workers check the token between
    /// files; the in-flight file completes.
    pub fn cancel(&self) {
        self.cancel.cancel();
        let mut status = unpoison(self.status.lock());
        if !status.is_terminal() {
            *status = JobStatus::Cancelled;
        }
    }

    #[must_use]
    pub fn is_cancel_requested(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Transition to a terminal status. The first terminal status wins; a
    /// cancellation that already landed is never overwritten.
    pub fn finish(&self, status: JobStatus) {
        {
            let mut current = unpoison(self.status.lock());
            if !current.is_terminal() {
                *current = status;
            }
        }
        let mut finished = unpoison(self.finished_at.lock());
        if finished.is_none() {
            *finished = Some(Utc::now());
        }
        *unpoison(self.current_file.lock()) = None;
    }

    /// Immutable snapshot for status readers.
    #[must_use]
    pub fn snapshot(&self) -> IndexingJob {
        IndexingJob {
            id: self.id.clone(),
            repository_id: self.repository_id.clone(),
            branch: self.branch.clone(),
            status: self.status(),
            total_files: self.total_files.load(Ordering::SeqCst),
            processed_files: self.processed_files.load(Ordering::SeqCst),
            total_chunks: self.total_chunks.load(Ordering::SeqCst),
            indexed_chunks: self.indexed_chunks.load(Ordering::SeqCst),
            failed_chunks: self.failed_chunks.load(Ordering::SeqCst),
            started_at: *unpoison(self.started_at.lock()),
            finished_at: *unpoison(self.finished_at.lock()),
            current_file: unpoison(self.current_file.lock()).clone(),
            errors: unpoison(self.errors.lock()).clone(),
        }
    }
}

/// Registry of jobs, keyed both by `(repository_id, branch)` and by id.
#[derive(Debug, Default)]
pub struct JobRegistry {
    by_key: Mutex<HashMap<(String, String), Arc<JobState>>>,
    by_id: Mutex<HashMap<String, Arc<JobState>>>,
}

impl JobRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a job for the pair, or return the active one.
    ///
    /// The boolean is `true` when an existing non-terminal job was returned.
    pub fn begin(&self, repository_id: &str, branch: &str) -> (Arc<JobState>, bool) {
        let key = (repository_id.to_owned(), branch.to_owned());
        let mut by_key = unpoison(self.by_key.lock());

        if let Some(existing) = by_key.get(&key)
            && !existing.status().is_terminal()
        {
            return (Arc::clone(existing), true);
        }

        let state = Arc::new(JobState::new(repository_id, branch));
        by_key.insert(key, Arc::clone(&state));
        unpoison(self.by_id.lock()).insert(state.id.clone(), Arc::clone(&state));
        (state, false)
    }

    #[must_use]
    pub fn get(&self, job_id: &str) -> Option<Arc<JobState>> {
        unpoison(self.by_id.lock()).get(job_id).cloned()
    }
}
