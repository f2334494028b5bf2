use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use crate::database::SearchResult;

/// A retrieved passage as returned to callers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Source {
    /// Leading part of the chunk text, suffixed with `...` when shortened
    pub content: String,
    pub metadata: BTreeMap<String, String>,
    pub score: f32,
}

impl Source {
    /// Build a source whose content is at most `max_chars` characters of the
    /// passage text plus an ellipsis marker
    #[inline]
    pub fn preview(passage: &SearchResult, max_chars: usize) -> Self {
        let text = &passage.chunk.text;
        let content = if text.chars().count() > max_chars {
            let mut shortened: String = text.chars().take(max_chars).collect();
            shortened.push_str("...");
            shortened
        } else {
            text.clone()
        };

        Self {
            content,
            metadata: passage.chunk.metadata.clone(),
            score: passage.score,
        }
    }
}

/// Drop results whose trimmed first `prefix_chars` characters were already
/// seen. Input order is kept, so with score-sorted input the best-scoring
/// copy of each passage survives.
#[inline]
pub fn deduplicate(results: Vec<SearchResult>, prefix_chars: usize) -> Vec<SearchResult> {
    let mut seen = HashSet::new();

    results
        .into_iter()
        .filter(|result| seen.insert(dedup_key(&result.chunk.text, prefix_chars)))
        .collect()
}

fn dedup_key(text: &str, prefix_chars: usize) -> String {
    text.chars()
        .take(prefix_chars)
        .collect::<String>()
        .trim()
        .to_string()
}
