// Database module
// Persisted vector index for the currently loaded document

pub mod lancedb;

pub use self::lancedb::vector_store::{IndexHandle, SearchResult, VectorStore};
