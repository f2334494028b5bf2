// LanceDB vector database module
// Handles vector storage and similarity search for chunk embeddings

#[cfg(test)]
mod tests;

pub mod vector_store;

use serde::{Deserialize, Serialize};

use crate::embeddings::chunking::Chunk;

/// Row stored in LanceDB: one chunk and its embedding
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// Unique identifier for this row
    pub id: String,
    /// The vector embedding of `chunk.text`
    pub vector: Vec<f32>,
    /// The chunk this embedding represents
    pub chunk: Chunk,
    /// Timestamp when this embedding was created
    pub created_at: String,
}
