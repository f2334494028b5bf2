// Embeddings module
// Text chunking plus the embedding capability consumed by the index and retriever

pub mod chunking;
pub mod ollama;

pub use chunking::{Chunk, ChunkingConfig, TextSplitter};
pub use ollama::OllamaClient;

use crate::Result;

/// Maps text to a fixed-length vector.
///
/// Implementations report failures as [`crate::RagError::EmbeddingBackend`].
pub trait EmbeddingBackend: Send + Sync {
    /// Embed a single piece of text
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed several texts, returning one vector per input in the same order
    #[inline]
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|text| self.embed(text)).collect()
    }
}
