//! The context assembler.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use strata_index::{ChunkIndex, SearchHit};
use strata_store::{ConversationTurn, SqliteStore};

use crate::budget::estimate_tokens;
use crate::error::ContextError;

/// Fixed per-item framing cost added on top of the content estimate.
const ITEM_OVERHEAD_TOKENS: usize = 20;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextOptions {
    pub use_retrieval: bool,
    pub include_history: bool,
    /// Token budget for the combined context.
    pub max_size: usize,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            use_retrieval: true,
            include_history: true,
            max_size: 4096,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AssemblerConfig {
    /// Minimum similarity for a retrieved chunk to be considered.
    pub score_floor: f32,
    /// Chunks fetched from the index before budget packing.
    pub max_chunks: usize,
    /// Recent turns fetched per session before budget packing.
    pub history_limit: u32,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            score_floor: 0.25,
            max_chunks: 12,
            history_limit: 20,
        }
    }
}

/// The assembled, budget-bounded context.
#[derive(Debug, Serialize)]
pub struct AssembledContext {
    /// Ranked chunks, most relevant first.
    pub retrieved_chunks: Vec<SearchHit>,
    /// Recent turns, newest first.
    pub history_excerpt: Vec<ConversationTurn>,
    /// `true` when a fallback path was taken (retrieval or history failed).
    pub degraded: bool,
}

pub struct ContextAssembler {
    index: Arc<ChunkIndex>,
    sqlite: SqliteStore,
    config: AssemblerConfig,
}

impl std::fmt::Debug for ContextAssembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextAssembler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ContextAssembler {
    #[must_use]
    pub fn new(index: Arc<ChunkIndex>, sqlite: SqliteStore, config: AssemblerConfig) -> Self {
        Self {
            index,
            sqlite,
            config,
        }
    }

    /// Build a context for `query` in the given session.
    ///
    /// Never fails: when retrieval or history is unavailable the result is
    /// degraded (possibly empty) instead.
    pub async fn build_context(
        &self,
        query: &str,
        repository_id: &str,
        session_id: &str,
        branch: &str,
        options: &ContextOptions,
    ) -> AssembledContext {
        let _ = branch;
        let mut degraded = false;

        let retrieved = if options.use_retrieval {
            match self.retrieve(query, repository_id).await {
                Ok(hits) => hits,
                Err(e) => {
                    tracing::warn!(repository = repository_id, "retrieval failed, degrading: {e}");
                    degraded = true;
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        let history = if options.include_history {
            match self
                .sqlite
                .recent_turns(session_id, self.config.history_limit)
                .await
            {
                Ok(turns) => turns,
                Err(e) => {
                    tracing::warn!(session = session_id, "history fetch failed, degrading: {e}");
                    degraded = true;
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        let (retrieved_chunks, history_excerpt) = pack(retrieved, history, options.max_size);

        AssembledContext {
            retrieved_chunks,
            history_excerpt,
            degraded,
        }
    }

    async fn retrieve(
        &self,
        query: &str,
        repository_id: &str,
    ) -> Result<Vec<SearchHit>, ContextError> {
        let vector = self.index.embed_query(query).await?;
        let mut hits = self
            .index
            .search(vector, Some(repository_id), None, self.config.max_chunks)
            .await?;
        hits.retain(|h| h.score >= self.config.score_floor);
        Ok(hits)
    }
}

/// Pack chunks then history under the budget. Chunks take priority; within
/// each category the incoming order (relevance, recency) is preserved, so
/// over-budget history drops oldest-first.
fn pack(
    retrieved: Vec<SearchHit>,
    history: Vec<ConversationTurn>,
    max_size: usize,
) -> (Vec<SearchHit>, Vec<ConversationTurn>) {
    let mut used = 0_usize;

    let mut kept_chunks = Vec::new();
    for hit in retrieved {
        let cost = estimate_tokens(&hit.content) + ITEM_OVERHEAD_TOKENS;
        if used + cost > max_size {
            break;
        }
        used += cost;
        kept_chunks.push(hit);
    }

    let mut kept_history = Vec::new();
    for turn in history {
        let cost = estimate_tokens(&turn.content) + ITEM_OVERHEAD_TOKENS;
        if used + cost > max_size {
            break;
        }
        used += cost;
        kept_history.push(turn);
    }

    (kept_chunks, kept_history)
}
