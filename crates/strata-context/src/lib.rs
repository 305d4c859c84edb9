//! Retrieval-augmented context assembly.
//!
//! Merges ranked chunks and recent conversation history under a token
//! budget. Retrieved chunks take priority over history; when either path is
//! unavailable the assembler degrades instead of failing, flagging the
//! result so the consumer can tell.

pub mod assembler;
pub mod budget;
pub mod error;
pub mod format;

pub use assembler::{AssembledContext, AssemblerConfig, ContextAssembler, ContextOptions};
pub use budget::estimate_tokens;
pub use error::ContextError;
pub use format::format_context;
