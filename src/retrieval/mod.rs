//! Retrieval of the passages most relevant to a question.
//!
//! The question is embedded with the same backend used for the index, the
//! vector index is searched for the top-k chunks above a similarity threshold,
//! and near-duplicate chunks (common with overlapping windows) are dropped
//! before anything is handed to the synthesizer.

pub mod dedup;


use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::Result;
use crate::database::{SearchResult, VectorStore};
use crate::embeddings::EmbeddingBackend;

pub use dedup::{Source, deduplicate};

pub const DEFAULT_TOP_K: usize = 2;
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.7;
pub const DEFAULT_DEDUP_PREFIX_CHARS: usize = 100;
pub const DEFAULT_PREVIEW_CHARS: usize = 300;

/// Retrieval tuning. Low `top_k` and a high threshold keep the context sent to
/// the model short.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub similarity_threshold: f32,
    /// Characters of chunk text compared when detecting duplicates
    pub dedup_prefix_chars: usize,
    /// Characters of chunk text returned in each source preview
    pub preview_chars: usize,
}

impl Default for RetrievalConfig {
    #[inline]
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            dedup_prefix_chars: DEFAULT_DEDUP_PREFIX_CHARS,
            preview_chars: DEFAULT_PREVIEW_CHARS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Retriever {
    config: RetrievalConfig,
}

impl Retriever {
    #[inline]
    pub fn new(config: RetrievalConfig) -> Self {
        Self { config }
    }

    #[inline]
    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Find the distinct passages most similar to `question`, best first
    #[inline]
    pub async fn retrieve(
        &self,
        question: &str,
        embedder: &dyn EmbeddingBackend,
        index: &VectorStore,
    ) -> Result<Vec<SearchResult>> {
        let query_vector = embedder.embed(question)?;

        let results = index
            .search(
                &query_vector,
                self.config.top_k,
                self.config.similarity_threshold,
            )
            .await?;
        let found = results.len();

        let distinct = deduplicate(results, self.config.dedup_prefix_chars);

        debug!(
            "Retrieved {} passages ({} after removing duplicates)",
            found,
            distinct.len()
        );
        Ok(distinct)
    }

    /// Transport form of retrieved passages
    #[inline]
    pub fn sources(&self, passages: &[SearchResult]) -> Vec<Source> {
        passages
            .iter()
            .map(|passage| Source::preview(passage, self.config.preview_chars))
            .collect()
    }
}
