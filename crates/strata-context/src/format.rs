//! Rendering an assembled context for prompt injection.

use std::fmt::Write;

use crate::assembler::AssembledContext;

/// Format the context as tagged blocks for the generation consumer.
///
/// Chunks come first (most relevant first), then history oldest-to-newest
/// so the transcript reads naturally.
#[must_use]
pub fn format_context(context: &AssembledContext) -> String {
    let mut out = String::new();

    if !context.retrieved_chunks.is_empty() {
        out.push_str("<code_context>\n");
        for hit in &context.retrieved_chunks {
            let _ = writeln!(
                out,
                "  <chunk file=\"{}\" lines=\"{}-{}\" kind=\"{}\" score=\"{:.2}\">",
                hit.metadata.file_path,
                hit.metadata.line_range.0,
                hit.metadata.line_range.1,
                hit.content_type,
                hit.score,
            );
            out.push_str(&hit.content);
            out.push_str("\n  </chunk>\n");
        }
        out.push_str("</code_context>\n");
    }

    if !context.history_excerpt.is_empty() {
        out.push_str("<history>\n");
        for turn in context.history_excerpt.iter().rev() {
            let _ = writeln!(out, "  [{}] {}", turn.role.as_str(), turn.content);
        }
        out.push_str("</history>\n");
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    use strata_index::SearchHit;
    use strata_store::{ChunkMetadata, ContentType, ConversationTurn, TurnRole};

    #[test]
    fn empty_context_renders_empty() {
        let context = AssembledContext {
            retrieved_chunks: vec![],
            history_excerpt: vec![],
            degraded: false,
        };
        assert_eq!(format_context(&context), "");
    }

    #[test]
    fn renders_chunks_and_history() {
        let context = AssembledContext {
            retrieved_chunks: vec![SearchHit {
                chunk_id: "c1".into(),
                content: "fn hello() {}".into(),
                content_type: ContentType::SourceCode,
                metadata: ChunkMetadata {
                    file_path: "src/lib.rs".into(),
                    start_offset: 0,
                    end_offset: 13,
                    language: Some("rust".into()),
                    line_range: (1, 3),
                },
                score: 0.85,
                created_at: chrono::Utc::now(),
            }],
            history_excerpt: vec![
                ConversationTurn {
                    session_id: "s1".into(),
                    repository_id: "r1".into(),
                    branch: "main".into(),
                    role: TurnRole::Assistant,
                    content: "it lives in lib.rs".into(),
                    sources: vec![],
                    created_at: chrono::Utc::now(),
                },
                ConversationTurn {
                    session_id: "s1".into(),
                    repository_id: "r1".into(),
                    branch: "main".into(),
                    role: TurnRole::User,
                    content: "where is hello defined?".into(),
                    sources: vec![],
                    created_at: chrono::Utc::now(),
                },
            ],
            degraded: false,
        };

        let text = format_context(&context);
        assert!(text.contains("<code_context>"));
        assert!(text.contains("file=\"src/lib.rs\""));
        assert!(text.contains("score=\"0.85\""));
        assert!(text.contains("fn hello() {}"));
        // History renders oldest first for a natural transcript.
        let user_pos = text.find("where is hello").unwrap();
        let assistant_pos = text.find("it lives in lib.rs").unwrap();
        assert!(user_pos < assistant_pos);
    }
}
