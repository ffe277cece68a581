// Embeddings module
// Embedding providers and fixed-width text chunking

pub mod ascii;
pub mod chunking;
pub mod openai;

use std::sync::Arc;

use crate::config::{EmbeddingConfig, ProviderKind};
use crate::{DocvecError, Result};

pub use ascii::AsciiEmbedder;
pub use chunking::{ChunkingConfig, split_into_chunks};
pub use openai::OpenAiClient;

/// Turns text into fixed-length vectors.
///
/// Calls block on network I/O; async callers run them on the blocking pool.
pub trait EmbeddingProvider: Send + Sync {
    fn model(&self) -> &str;

    /// Length of every vector this provider returns
    fn dimension(&self) -> usize;

    /// One vector per input, in input order
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    #[inline]
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| DocvecError::Embedding("Provider returned no embedding".to_string()))
    }
}

/// Build the provider selected in config
#[inline]
pub fn provider_from_config(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    Ok(match config.provider {
        ProviderKind::OpenAi => Arc::new(OpenAiClient::new(config)?),
        ProviderKind::Ascii => Arc::new(AsciiEmbedder::new(config.dimension)),
    })
}
