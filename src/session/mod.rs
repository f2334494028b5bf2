//! Session controller
//!
//! Owns the single live index of a session and drives the two public
//! operations: loading a document (chunk, embed, persist) and answering a
//! question about it (retrieve, deduplicate, synthesize). Every failure is
//! turned into an unsuccessful response rather than returned to the caller.


use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::database::{IndexHandle, VectorStore};
use crate::document;
use crate::embeddings::{EmbeddingBackend, OllamaClient, TextSplitter};
use crate::retrieval::{Retriever, Source};
use crate::synthesis::{AnswerSynthesizer, GenerationBackend};
use crate::{RagError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    Empty,
    Loaded,
    Error,
}

/// Outcome of [`SessionController::load_document`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadResponse {
    pub success: bool,
    /// Number of pages read from the document
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_documents: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_chunks: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LoadResponse {
    fn failure(err: &RagError) -> Self {
        Self {
            success: false,
            num_documents: None,
            num_chunks: None,
            message: None,
            error: Some(err.to_string()),
        }
    }
}

/// Outcome of [`SessionController::query`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<Source>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_sources: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QueryResponse {
    fn failure(err: &RagError) -> Self {
        Self {
            success: false,
            answer: None,
            sources: None,
            num_sources: None,
            error: Some(err.to_string()),
        }
    }
}

/// Stored size and generation of the live index
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStatus {
    pub location: PathBuf,
    pub num_chunks: usize,
    pub epoch: u64,
}

pub struct SessionController {
    splitter: TextSplitter,
    retriever: Retriever,
    synthesizer: AnswerSynthesizer,
    embedder: Box<dyn EmbeddingBackend>,
    index: VectorStore,
    state: SessionState,
    document: Option<PathBuf>,
    last_error: Option<RagError>,
}

impl SessionController {
    /// Create a session with explicit backends. The index lives at
    /// [`Config::index_path`].
    ///
    /// # Errors
    /// [`RagError::Config`] if the chunking settings are invalid
    #[inline]
    pub fn new(
        config: &Config,
        embedder: Box<dyn EmbeddingBackend>,
        generator: Box<dyn GenerationBackend>,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            splitter: TextSplitter::new(&config.chunking)?,
            retriever: Retriever::new(config.retrieval.clone()),
            synthesizer: AnswerSynthesizer::new(generator),
            embedder,
            index: VectorStore::new(config.index_path()),
            state: SessionState::Empty,
            document: None,
            last_error: None,
        })
    }

    /// Create a session backed by the Ollama server named in `config`
    #[inline]
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = OllamaClient::new(&config.ollama)?;
        Self::new(config, Box::new(client.clone()), Box::new(client))
    }

    #[inline]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Path of the currently loaded document
    #[inline]
    pub fn document(&self) -> Option<&Path> {
        self.document.as_deref()
    }

    /// The error behind the most recent failed load, with its full cause chain
    #[inline]
    pub fn last_error(&self) -> Option<&RagError> {
        self.last_error.as_ref()
    }

    #[inline]
    pub fn index(&self) -> &VectorStore {
        &self.index
    }

    /// Snapshot of the live index read back from storage
    ///
    /// # Errors
    /// [`RagError::IndexNotReady`] when no document is loaded
    #[inline]
    pub async fn index_status(&self) -> Result<IndexStatus> {
        let num_chunks = self.index.count().await?;
        Ok(IndexStatus {
            location: self.index.location().to_path_buf(),
            num_chunks,
            epoch: self.index.epoch(),
        })
    }

    /// Replace the session's document and index with the file at `path`
    ///
    /// A missing file leaves the session untouched. Any later failure leaves
    /// the session in [`SessionState::Error`] with no usable index.
    #[inline]
    pub async fn load_document<P: AsRef<Path>>(&mut self, path: P) -> LoadResponse {
        let path = path.as_ref();

        match self.try_load(path).await {
            Ok((pages, handle)) => {
                self.state = SessionState::Loaded;
                self.document = Some(path.to_path_buf());
                self.last_error = None;

                info!(
                    "Loaded {} ({} pages, {} chunks, epoch {})",
                    path.display(),
                    pages,
                    handle.num_chunks,
                    handle.epoch
                );

                LoadResponse {
                    success: true,
                    num_documents: Some(pages),
                    num_chunks: Some(handle.num_chunks),
                    message: Some(format!(
                        "Successfully loaded {} pages, created {} chunks",
                        pages, handle.num_chunks
                    )),
                    error: None,
                }
            }
            Err(err) => {
                error!("Failed to load document {}: {:?}", path.display(), err);

                if !matches!(err, RagError::DocumentNotFound(_)) {
                    self.state = SessionState::Error;
                    self.document = None;
                }
                let response = LoadResponse::failure(&err);
                self.last_error = Some(err);
                response
            }
        }
    }

    async fn try_load(&mut self, path: &Path) -> Result<(usize, IndexHandle)> {
        if !path.exists() {
            return Err(RagError::DocumentNotFound(path.to_path_buf()));
        }

        // The previous index is dropped before anything else can fail.
        self.document = None;
        self.index.reset()?;

        let loaded = document::load_document(path)?;
        let chunks = loaded.chunk(&self.splitter)?;
        if chunks.is_empty() {
            return Err(RagError::EmptyContent(path.to_path_buf()));
        }

        let handle = self.index.rebuild(&chunks, self.embedder.as_ref()).await?;
        Ok((loaded.page_count(), handle))
    }

    /// Answer `question` from the loaded document
    ///
    /// Query failures never change the session state.
    #[inline]
    pub async fn query(&self, question: &str) -> QueryResponse {
        if self.state != SessionState::Loaded {
            warn!("Query received with no document loaded");
            return QueryResponse::failure(&RagError::SessionNotLoaded);
        }

        match self.try_query(question).await {
            Ok(response) => response,
            Err(err) => {
                error!("Query failed: {:?}", err);
                QueryResponse::failure(&err)
            }
        }
    }

    async fn try_query(&self, question: &str) -> Result<QueryResponse> {
        let passages = self
            .retriever
            .retrieve(question, self.embedder.as_ref(), &self.index)
            .await?;
        let synthesis = self.synthesizer.synthesize(question, &passages)?;
        let sources = self.retriever.sources(&passages);

        info!(
            "Answered question using {} sources",
            synthesis.sources_used
        );

        Ok(QueryResponse {
            success: true,
            answer: Some(synthesis.answer),
            num_sources: Some(sources.len()),
            sources: Some(sources),
            error: None,
        })
    }
}
