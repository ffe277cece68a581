//! Offline embedder mapping characters to their code points.
//!
//! Not semantically meaningful. It exists so collections can be filled and
//! queried without network access.

use super::EmbeddingProvider;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AsciiEmbedder {
    dimension: usize,
}

impl AsciiEmbedder {
    #[inline]
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    /// Each character becomes `code_point / 255.0`, truncated or zero padded
    #[inline]
    pub fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut vector: Vec<f32> = text
            .chars()
            .take(self.dimension)
            .map(|c| u32::from(c) as f32 / 255.0)
            .collect();
        vector.resize(self.dimension, 0.0);
        vector
    }
}

impl EmbeddingProvider for AsciiEmbedder {
    #[inline]
    fn model(&self) -> &str {
        "ascii"
    }

    #[inline]
    fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.vectorize(text)).collect())
    }
}
