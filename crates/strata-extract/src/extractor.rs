//! Per-file extraction entry point.

use std::path::Path;
use std::time::{Duration, Instant};

use strata_store::{Chunk, ChunkMetadata, ContentType};

use crate::code::{SpanKind, chunk_code};
use crate::lang::{Lang, classify_content, detect_language};
use crate::sniff::sniff_language;
use crate::window::{WindowConfig, split_windows};

#[derive(Debug, Clone, Default)]
pub struct ExtractorConfig {
    pub window: WindowConfig,
}

/// Outcome of extracting one file.
///
/// Failures are recorded here (`success = false`, `error` set) rather than
/// returned as `Err`: a single broken file never aborts an indexing job.
#[derive(Debug)]
pub struct ExtractionResult {
    pub chunks: Vec<Chunk>,
    pub success: bool,
    pub error: Option<String>,
    pub duration: Duration,
}

/// Turns file content into bounded, metadata-tagged chunks.
#[derive(Debug, Clone, Default)]
pub struct Extractor {
    config: ExtractorConfig,
}

impl Extractor {
    #[must_use]
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    /// Extract chunks from one file.
    ///
    /// `content_filter`, when present, restricts which content types are
    /// emitted; a file whose detected type is filtered out yields a
    /// successful, empty result.
    #[must_use]
    pub fn extract(
        &self,
        repository_id: &str,
        file_path: &str,
        bytes: &[u8],
        content_filter: Option<&[ContentType]>,
    ) -> ExtractionResult {
        let started = Instant::now();

        let source = match std::str::from_utf8(bytes) {
            Ok(s) => s,
            Err(e) => {
                return ExtractionResult {
                    chunks: Vec::new(),
                    success: false,
                    error: Some(format!("invalid UTF-8: {e}")),
                    duration: started.elapsed(),
                };
            }
        };

        let path = Path::new(file_path);
        let lang = detect_language(path).or_else(|| sniff_language(source));
        let content_type = classify_content(path, lang);

        if let Some(filter) = content_filter
            && !filter.contains(&content_type)
            && !filter.contains(&ContentType::Comments)
        {
            return ExtractionResult {
                chunks: Vec::new(),
                success: true,
                error: None,
                duration: started.elapsed(),
            };
        }

        let spans = self.spans_for(source, file_path, lang, content_type);

        let source_hash = blake3::hash(bytes).to_hex().to_string();
        let line_starts = line_starts(source);
        let mut chunks = Vec::with_capacity(spans.len());
        for (start, end, chunk_type) in spans {
            let content = &source[start..end];
            if content.trim().is_empty() {
                continue;
            }
            chunks.push(Chunk {
                id: uuid::Uuid::new_v4().to_string(),
                repository_id: repository_id.to_owned(),
                content: content.to_owned(),
                content_type: chunk_type,
                metadata: ChunkMetadata {
                    file_path: file_path.to_owned(),
                    start_offset: start,
                    end_offset: end,
                    language: lang.map(|l| l.id().to_owned()),
                    line_range: (line_of(&line_starts, start), line_of(&line_starts, end - 1)),
                },
                embedding: None,
                source_hash: source_hash.clone(),
                created_at: chrono::Utc::now(),
            });
        }

        if let Some(filter) = content_filter {
            chunks.retain(|c| filter.contains(&c.content_type));
        }

        ExtractionResult {
            chunks,
            success: true,
            error: None,
            duration: started.elapsed(),
        }
    }

    fn spans_for(
        &self,
        source: &str,
        file_path: &str,
        lang: Option<Lang>,
        content_type: ContentType,
    ) -> Vec<(usize, usize, ContentType)> {
        let code_capable = matches!(content_type, ContentType::SourceCode | ContentType::Tests)
            && lang.is_some_and(|l| l.grammar().is_some() && !l.entity_node_kinds().is_empty());

        if code_capable && let Some(l) = lang {
            match chunk_code(source, l, &self.config.window) {
                Ok(spans) => {
                    return spans
                        .into_iter()
                        .map(|s| {
                            let ct = if s.kind == SpanKind::Comment {
                                ContentType::Comments
                            } else {
                                content_type
                            };
                            (s.start, s.end, ct)
                        })
                        .collect();
                }
                Err(e) => {
                    tracing::debug!(file = file_path, "AST chunking failed, using window: {e}");
                }
            }
        }

        split_windows(source, &self.config.window)
            .into_iter()
            .map(|w| (w.start, w.end, content_type))
            .collect()
    }
}

fn line_starts(source: &str) -> Vec<usize> {
    std::iter::once(0)
        .chain(source.match_indices('\n').map(|(i, _)| i + 1))
        .collect()
}

/// 1-based line number containing the byte at `offset`.
fn line_of(starts: &[usize], offset: usize) -> usize {
    starts.partition_point(|&s| s <= offset)
}
