//! Domain types shared across the pipeline: chunks, jobs, conversation turns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of content a chunk was extracted from.
///
/// Exhaustive by design: detection selects a variant with a `match`, and
/// anything unrecognized lands on [`ContentType::Text`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    SourceCode,
    Documentation,
    Readme,
    Comments,
    Configuration,
    Tests,
    Markdown,
    Text,
}

impl ContentType {
    /// Identifier used in vector payloads and `SQLite` rows.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SourceCode => "source_code",
            Self::Documentation => "documentation",
            Self::Readme => "readme",
            Self::Comments => "comments",
            Self::Configuration => "configuration",
            Self::Tests => "tests",
            Self::Markdown => "markdown",
            Self::Text => "text",
        }
    }

    /// Parse a stored identifier back into a variant.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "source_code" => Some(Self::SourceCode),
            "documentation" => Some(Self::Documentation),
            "readme" => Some(Self::Readme),
            "comments" => Some(Self::Comments),
            "configuration" => Some(Self::Configuration),
            "tests" => Some(Self::Tests),
            "markdown" => Some(Self::Markdown),
            "text" => Some(Self::Text),
            _ => None,
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Positional metadata attached to every chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub file_path: String,
    /// Byte offset of the chunk start within the originating file.
    pub start_offset: usize,
    /// Byte offset one past the chunk end.
    pub end_offset: usize,
    pub language: Option<String>,
    /// 1-based inclusive line range.
    pub line_range: (usize, usize),
}

/// A bounded span of extracted content, the unit of indexing and retrieval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub repository_id: String,
    pub content: String,
    pub content_type: ContentType,
    pub metadata: ChunkMetadata,
    /// Populated once the chunk has been embedded; `None` straight out of
    /// extraction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    /// Content fingerprint of the originating file, not of the chunk.
    pub source_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Lifecycle of an indexing job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded per-file failure within a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFileError {
    pub file: String,
    pub message: String,
}

/// Immutable snapshot of an indexing job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingJob {
    pub id: String,
    pub repository_id: String,
    pub branch: String,
    pub status: JobStatus,
    pub total_files: usize,
    pub processed_files: usize,
    pub total_chunks: usize,
    pub indexed_chunks: usize,
    pub failed_chunks: usize,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub current_file: Option<String>,
    pub errors: Vec<JobFileError>,
}

impl IndexingJob {
    /// Completion percentage, clamped to `[0, 100]`.
    #[must_use]
    pub fn progress_percentage(&self) -> f32 {
        if self.total_files == 0 {
            return if self.status.is_terminal() { 100.0 } else { 0.0 };
        }
        #[allow(clippy::cast_precision_loss)]
        let pct = self.processed_files as f32 / self.total_files as f32 * 100.0;
        pct.clamp(0.0, 100.0)
    }
}

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

impl TurnRole {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "assistant" => Self::Assistant,
            _ => Self::User,
        }
    }
}

/// Reference to a chunk cited by an assistant turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRef {
    pub chunk_id: String,
    pub file_path: String,
    pub line_range: (usize, usize),
}

/// One message in a chat session, written by the generation consumer and
/// read back by the context assembler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub session_id: String,
    pub repository_id: String,
    pub branch: String,
    pub role: TurnRole,
    pub content: String,
    pub sources: Vec<ChunkRef>,
    pub created_at: DateTime<Utc>,
}
