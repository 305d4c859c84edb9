//! Content extraction: file type detection and chunking.
//!
//! Files are classified by extension first, with content sniffing as the
//! fallback, then chunked with the strategy the detected type selects:
//! tree-sitter entity boundaries for parseable source, a sliding window with
//! overlap for everything else. Extraction failures are recorded results,
//! never errors — a broken file must not abort an indexing job.

pub mod code;
pub mod error;
pub mod extractor;
pub mod lang;
pub mod sniff;
pub mod window;

pub use error::ExtractError;
pub use extractor::{ExtractionResult, Extractor, ExtractorConfig};
pub use lang::{Lang, classify_content, detect_language};
pub use window::WindowConfig;
