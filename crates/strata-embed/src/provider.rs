//! Object-safe embedding provider trait.

use std::future::Future;
use std::pin::Pin;

use crate::error::EmbedError;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A provider that turns text into fixed-length vectors.
///
/// Implementations are expected to return the same dimensionality for every
/// call; the index probes the provider once to size its collections.
pub trait Embedder: Send + Sync {
    /// Embed a single text into a vector.
    ///
    /// Implementations must not borrow `text` past the synchronous prefix of
    /// the call (copy it into the returned future if needed).
    fn embed(&self, text: &str) -> BoxFuture<'_, Result<Vec<f32>, EmbedError>>;

    /// Short provider identifier for logs.
    fn name(&self) -> &'static str;
}
