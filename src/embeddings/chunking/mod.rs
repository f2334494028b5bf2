
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{RagError, Result};

/// Separators tried in order when a segment is too long.
/// The empty separator means a hard cut at the size limit.
pub const DEFAULT_SEPARATORS: &[&str] = &["\n\n", "\n", ".", "!", "?", ",", " ", ""];

pub const DEFAULT_CHUNK_SIZE: usize = 1500;
pub const DEFAULT_CHUNK_OVERLAP: usize = 50;

/// A bounded segment of document text, the unit of retrieval
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// The chunk text, including any leading overlap
    pub text: String,
    /// Position of this chunk within the document
    pub ordinal: usize,
    /// Number of leading characters repeated from the previous chunk
    pub overlap: usize,
    /// Source information (path, page, ...)
    pub metadata: BTreeMap<String, String>,
}

impl Chunk {
    /// Length of the chunk text in characters
    #[inline]
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    /// The part of the text that is not shared with the previous chunk
    #[inline]
    pub fn fresh_text(&self) -> &str {
        skip_chars(&self.text, self.overlap)
    }
}

/// Configuration for text splitting, measured in characters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk length
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

/// Recursive character splitter.
///
/// Text is broken on the first separator (in priority order) that occurs in an
/// oversized segment, and pieces that are still too long are broken again with
/// the remaining separators. Pieces are then packed greedily into chunks. Each
/// chunk after the first begins with the tail of its predecessor, so context
/// that straddles a boundary is visible from both sides.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl TextSplitter {
    #[inline]
    pub fn new(config: &ChunkingConfig) -> Result<Self> {
        Self::with_separators(config, DEFAULT_SEPARATORS)
    }

    #[inline]
    pub fn with_separators(config: &ChunkingConfig, separators: &[&str]) -> Result<Self> {
        if config.chunk_size == 0 {
            return Err(RagError::Config(
                "chunk size must be greater than zero".to_string(),
            ));
        }
        if config.chunk_overlap >= config.chunk_size {
            return Err(RagError::Config(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                config.chunk_overlap, config.chunk_size
            )));
        }

        Ok(Self {
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
            separators: separators.iter().map(|s| (*s).to_string()).collect(),
        })
    }

    #[inline]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    #[inline]
    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split text into chunks numbered from zero with no metadata
    #[inline]
    pub fn split(&self, text: &str) -> Result<Vec<Chunk>> {
        self.split_with_metadata(text, &BTreeMap::new(), 0)
    }

    /// Split text into chunks, stamping each with `metadata` and numbering
    /// them from `first_ordinal`
    #[inline]
    pub fn split_with_metadata(
        &self,
        text: &str,
        metadata: &BTreeMap<String, String>,
        first_ordinal: usize,
    ) -> Result<Vec<Chunk>> {
        if text.trim().is_empty() {
            return Err(RagError::EmptyInput);
        }

        let fresh_limit = self.chunk_size - self.chunk_overlap;

        let mut pieces = Vec::new();
        split_recursive(text, &self.separators, fresh_limit, &mut pieces);

        let bodies = merge_pieces(&pieces, fresh_limit);

        let mut chunks: Vec<Chunk> = Vec::with_capacity(bodies.len());
        for (offset, body) in bodies.into_iter().enumerate() {
            let lead = chunks
                .last()
                .map_or("", |prev| tail_chars(&prev.text, self.chunk_overlap));
            let overlap = lead.chars().count();

            let mut chunk_text = String::with_capacity(lead.len() + body.len());
            chunk_text.push_str(lead);
            chunk_text.push_str(&body);

            chunks.push(Chunk {
                text: chunk_text,
                ordinal: first_ordinal + offset,
                overlap,
                metadata: metadata.clone(),
            });
        }

        debug!(
            "Split {} characters into {} chunks (size {}, overlap {})",
            text.chars().count(),
            chunks.len(),
            self.chunk_size,
            self.chunk_overlap
        );

        Ok(chunks)
    }
}

/// Break `text` into pieces of at most `limit` characters, keeping every
/// separator attached to the end of the piece it terminates
fn split_recursive<'a>(text: &'a str, separators: &[String], limit: usize, out: &mut Vec<&'a str>) {
    if text.chars().count() <= limit {
        out.push(text);
        return;
    }

    let Some((index, separator)) = separators
        .iter()
        .enumerate()
        .find(|(_, sep)| sep.is_empty() || text.contains(sep.as_str()))
    else {
        hard_cut(text, limit, out);
        return;
    };

    if separator.is_empty() {
        hard_cut(text, limit, out);
        return;
    }

    let remaining = &separators[index + 1..];
    for piece in text.split_inclusive(separator.as_str()) {
        if piece.chars().count() <= limit {
            out.push(piece);
        } else {
            split_recursive(piece, remaining, limit, out);
        }
    }
}

/// Cut text every `limit` characters
fn hard_cut<'a>(text: &'a str, limit: usize, out: &mut Vec<&'a str>) {
    let mut rest = text;
    while !rest.is_empty() {
        let end = rest
            .char_indices()
            .nth(limit)
            .map_or(rest.len(), |(idx, _)| idx);
        let (head, tail) = rest.split_at(end);
        out.push(head);
        rest = tail;
    }
}

/// Pack pieces greedily into bodies of at most `limit` characters
fn merge_pieces(pieces: &[&str], limit: usize) -> Vec<String> {
    let mut bodies = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for piece in pieces {
        let piece_len = piece.chars().count();
        if current_len + piece_len > limit && !current.is_empty() {
            bodies.push(std::mem::take(&mut current));
            current_len = 0;
        }
        current.push_str(piece);
        current_len += piece_len;
    }

    if !current.is_empty() {
        bodies.push(current);
    }

    bodies
}

/// The last `count` characters of `text`
fn tail_chars(text: &str, count: usize) -> &str {
    let total = text.chars().count();
    if count >= total {
        return text;
    }
    skip_chars(text, total - count)
}

/// `text` without its first `count` characters
fn skip_chars(text: &str, count: usize) -> &str {
    let start = text
        .char_indices()
        .nth(count)
        .map_or(text.len(), |(idx, _)| idx);
    text.split_at(start).1
}
