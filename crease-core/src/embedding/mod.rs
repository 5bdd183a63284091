pub mod local;
pub mod openai;

use std::future::Future;
use std::pin::Pin;

use crate::provider::ProviderError;

/// Errors that can occur during embedding.
#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    /// Failed to load or initialize the embedding model.
    #[error("model load error: {0}")]
    ModelLoad(String),
    /// Failed to encode input texts into vectors.
    #[error("encoding failed: {0}")]
    EncodingFailed(String),
    /// The remote embedding endpoint failed.
    #[error("embedding provider failed: {0}")]
    Provider(#[from] ProviderError),
}

/// Boxed future returned by [`Embedder::embed`].
pub type EmbedFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Vec<Vec<f32>>, EmbedError>> + Send + 'a>>;

/// Trait abstracting text-to-vector embedding.
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts into vectors, one per input, in input order.
    fn embed<'a>(&'a self, texts: &'a [&'a str]) -> EmbedFuture<'a>;

    /// Dimensionality of the output vectors.
    fn dimensions(&self) -> usize;

    /// Model identifier string.
    fn model_name(&self) -> &str;

    /// Provider type identifier (e.g., "local", "openai").
    fn provider_type(&self) -> &str;
}
