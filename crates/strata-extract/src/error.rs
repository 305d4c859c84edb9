//! Error types for extraction internals.

/// Errors raised by the chunking strategies.
///
/// These stay internal to the crate: [`crate::Extractor::extract`] converts
/// them into a failed [`crate::ExtractionResult`] instead of propagating.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    /// Tree-sitter failed to parse or no grammar is available.
    #[error("parse failed: {0}")]
    Parse(String),
}
