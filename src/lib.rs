use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("File not found: {}", .0.display())]
    DocumentNotFound(PathBuf),

    #[error("Cannot split empty or whitespace-only text")]
    EmptyInput,

    #[error("No content extracted from {}", .0.display())]
    EmptyContent(PathBuf),

    #[error("Failed to read document: {0}")]
    DocumentParse(String),

    #[error("Failed to write index: {0}")]
    IndexWrite(String),

    #[error("Index has not been built yet")]
    IndexNotReady,

    #[error("Embedding backend error: {0}")]
    EmbeddingBackend(String),

    #[error("Generation backend error: {0}")]
    GenerationBackend(String),

    #[error("No document loaded. Please load a document first.")]
    SessionNotLoaded,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod commands;
pub mod config;
pub mod database;
pub mod document;
pub mod embeddings;
pub mod retrieval;
pub mod session;
pub mod synthesis;

#[cfg(test)]
mod test_support;

pub use session::{IndexStatus, LoadResponse, QueryResponse, SessionController, SessionState};
