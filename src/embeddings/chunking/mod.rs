#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default chunk width in characters
pub const DEFAULT_CHUNK_SIZE: usize = 500;
/// Chunks are stored in the `text` field, which holds at most this many characters
pub const MAX_CHUNK_SIZE: usize = 1024;

/// Configuration for content chunking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Chunk width in Unicode scalar values
    pub chunk_size: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl ChunkingConfig {
    #[inline]
    pub fn split<'a>(&self, text: &'a str) -> Vec<&'a str> {
        split_into_chunks(text, self.chunk_size)
    }
}

/// Cut `text` into consecutive, non-overlapping pieces of `chunk_size`
/// characters. Only the last piece may be shorter; empty text yields no pieces.
#[inline]
#[expect(clippy::string_slice, reason = "offsets come from char_indices")]
pub fn split_into_chunks(text: &str, chunk_size: usize) -> Vec<&str> {
    let chunk_size = chunk_size.max(1);
    let mut chunks = Vec::with_capacity(text.len() / chunk_size + 1);
    let mut start = 0;

    // Byte offset of every chunk_size-th character
    for (count, (offset, _)) in text.char_indices().enumerate() {
        if count > 0 && count % chunk_size == 0 {
            chunks.push(&text[start..offset]);
            start = offset;
        }
    }
    if start < text.len() {
        chunks.push(&text[start..]);
    }

    debug!(
        "Split {} bytes into {} chunks of up to {} characters",
        text.len(),
        chunks.len(),
        chunk_size
    );
    chunks
}
