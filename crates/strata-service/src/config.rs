//! TOML configuration with environment overrides.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use strata_context::AssemblerConfig;
use strata_embed::RetryPolicy;
use strata_extract::{ExtractorConfig, WindowConfig};
use strata_index::OrchestratorConfig;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub chunker: ChunkerSection,
    #[serde(default)]
    pub indexer: IndexerSection,
    #[serde(default)]
    pub retrieval: RetrievalSection,
    #[serde(default)]
    pub embedding: EmbeddingSection,
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub storage: StorageSection,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChunkerSection {
    #[serde(default = "default_max_chunk_size")]
    pub max_chunk_size: usize,
    #[serde(default = "default_overlap_size")]
    pub overlap_size: usize,
    #[serde(default = "default_min_chunk_size")]
    pub min_chunk_size: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndexerSection {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrievalSection {
    #[serde(default = "default_score_floor")]
    pub score_floor: f32,
    #[serde(default = "default_max_chunks")]
    pub max_chunks: usize,
    #[serde(default = "default_history_limit")]
    pub history_limit: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingSection {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheSection {
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageSection {
    #[serde(default = "default_database_path")]
    pub database_path: String,
    /// When unset, the in-memory vector store is used.
    #[serde(default)]
    pub qdrant_url: Option<String>,
}

fn default_max_chunk_size() -> usize {
    1000
}
fn default_overlap_size() -> usize {
    150
}
fn default_min_chunk_size() -> usize {
    100
}
fn default_concurrency() -> usize {
    8
}
fn default_score_floor() -> f32 {
    0.25
}
fn default_max_chunks() -> usize {
    12
}
fn default_history_limit() -> u32 {
    20
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    3
}
fn default_backoff_ms() -> u64 {
    200
}
fn default_cache_ttl_secs() -> u64 {
    300
}
fn default_database_path() -> String {
    "strata.db".to_owned()
}

impl Default for ChunkerSection {
    fn default() -> Self {
        Self {
            max_chunk_size: default_max_chunk_size(),
            overlap_size: default_overlap_size(),
            min_chunk_size: default_min_chunk_size(),
        }
    }
}

impl Default for IndexerSection {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
        }
    }
}

impl Default for RetrievalSection {
    fn default() -> Self {
        Self {
            score_floor: default_score_floor(),
            max_chunks: default_max_chunks(),
            history_limit: default_history_limit(),
        }
    }
}

impl Default for EmbeddingSection {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl_secs(),
        }
    }
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            qdrant_url: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("STRATA_DATABASE_PATH") {
            self.storage.database_path = path;
        }
        if let Ok(url) = std::env::var("STRATA_QDRANT_URL") {
            self.storage.qdrant_url = Some(url);
        }
        if let Ok(n) = std::env::var("STRATA_CONCURRENCY")
            && let Ok(n) = n.parse()
        {
            self.indexer.concurrency = n;
        }
    }

    #[must_use]
    pub fn extractor(&self) -> ExtractorConfig {
        ExtractorConfig {
            window: WindowConfig {
                max_chunk_size: self.chunker.max_chunk_size,
                overlap_size: self.chunker.overlap_size,
                min_chunk_size: self.chunker.min_chunk_size,
            },
        }
    }

    #[must_use]
    pub fn orchestrator(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            concurrency: self.indexer.concurrency,
        }
    }

    #[must_use]
    pub fn retry(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.embedding.max_retries,
            base_delay: Duration::from_millis(self.embedding.backoff_ms),
            timeout: Duration::from_secs(self.embedding.timeout_secs),
        }
    }

    #[must_use]
    pub fn assembler(&self) -> AssemblerConfig {
        AssemblerConfig {
            score_floor: self.retrieval.score_floor,
            max_chunks: self.retrieval.max_chunks,
            history_limit: self.retrieval.history_limit,
        }
    }

    #[must_use]
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_secs)
    }
}
