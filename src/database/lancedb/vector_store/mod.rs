#[cfg(test)]
mod tests;

use super::ChunkRecord;
use crate::embeddings::EmbeddingBackend;
use crate::embeddings::chunking::Chunk;
use crate::{RagError, Result};
use arrow::array::{
    Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray, UInt32Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::Utc;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{DistanceType, Table};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

const TABLE_NAME: &str = "chunks";

/// Vector index for a single document, persisted with LanceDB.
///
/// The index is never updated in place: [`VectorStore::rebuild`] deletes the
/// storage directory and writes every chunk again, so embeddings produced by a
/// different model or chunking setup can never mix with the new ones.
pub struct VectorStore {
    location: PathBuf,
    table: Option<Table>,
    dimension: Option<usize>,
    epoch: u64,
}

/// Description of a freshly built index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexHandle {
    pub location: PathBuf,
    pub num_chunks: usize,
    pub dimension: usize,
    /// Incremented by every successful rebuild of this store
    pub epoch: u64,
}

/// A stored chunk and its similarity to the query vector
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub chunk: Chunk,
    /// Cosine similarity, higher is better
    pub score: f32,
}

impl VectorStore {
    /// Create a store rooted at `location`. Nothing is read or written until
    /// the first rebuild.
    #[inline]
    pub fn new(location: impl Into<PathBuf>) -> Self {
        Self {
            location: location.into(),
            table: None,
            dimension: None,
            epoch: 0,
        }
    }

    #[inline]
    pub fn location(&self) -> &Path {
        &self.location
    }

    /// Whether a rebuild has completed and searches can be served
    #[inline]
    pub fn is_ready(&self) -> bool {
        self.table.is_some()
    }

    #[inline]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Forget the current index and delete everything persisted at the location
    #[inline]
    pub fn reset(&mut self) -> Result<()> {
        self.table = None;
        self.dimension = None;

        if self.location.exists() {
            info!("Removing existing index at {}", self.location.display());
            std::fs::remove_dir_all(&self.location).map_err(|e| {
                RagError::IndexWrite(format!(
                    "Failed to remove {}: {}",
                    self.location.display(),
                    e
                ))
            })?;
        }

        Ok(())
    }

    /// Replace the index with `chunks`, embedding each one with `embedder`
    ///
    /// # Errors
    /// * [`RagError::IndexWrite`] if the location cannot be cleared or written
    /// * [`RagError::EmbeddingBackend`] if any chunk cannot be embedded
    ///
    /// The previous index is gone even when this fails.
    #[inline]
    pub async fn rebuild(
        &mut self,
        chunks: &[Chunk],
        embedder: &dyn EmbeddingBackend,
    ) -> Result<IndexHandle> {
        self.reset()?;

        if chunks.is_empty() {
            return Err(RagError::IndexWrite(
                "Cannot build an index without chunks".to_string(),
            ));
        }

        info!(
            "Embedding {} chunks for index at {}",
            chunks.len(),
            self.location.display()
        );

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = embedder.embed_batch(&texts)?;
        let dimension = validate_vectors(&vectors, chunks.len())?;

        std::fs::create_dir_all(&self.location).map_err(|e| {
            RagError::IndexWrite(format!(
                "Failed to create index directory {}: {}",
                self.location.display(),
                e
            ))
        })?;

        let created_at = Utc::now().to_rfc3339();
        let records: Vec<ChunkRecord> = chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| ChunkRecord {
                id: Uuid::new_v4().to_string(),
                vector,
                chunk: chunk.clone(),
                created_at: created_at.clone(),
            })
            .collect();

        let table = self.write_table(&records, dimension).await?;

        self.table = Some(table);
        self.dimension = Some(dimension);
        self.epoch += 1;

        info!(
            "Index rebuilt with {} chunks ({} dimensions, epoch {})",
            records.len(),
            dimension,
            self.epoch
        );

        Ok(IndexHandle {
            location: self.location.clone(),
            num_chunks: records.len(),
            dimension,
            epoch: self.epoch,
        })
    }

    async fn write_table(&self, records: &[ChunkRecord], dimension: usize) -> Result<Table> {
        let uri = self.location.to_string_lossy().into_owned();
        debug!("Connecting to LanceDB at {}", uri);

        let connection = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| RagError::IndexWrite(format!("Failed to connect to LanceDB: {}", e)))?;

        let schema = create_schema(dimension);
        let table = connection
            .create_empty_table(TABLE_NAME, Arc::clone(&schema))
            .execute()
            .await
            .map_err(|e| RagError::IndexWrite(format!("Failed to create table: {}", e)))?;

        let record_batch = create_record_batch(records, schema, dimension)?;
        let batch_schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), batch_schema);
        table
            .add(reader)
            .execute()
            .await
            .map_err(|e| RagError::IndexWrite(format!("Failed to insert chunks: {}", e)))?;

        Ok(table)
    }

    /// Find up to `k` chunks whose similarity to `query_vector` is at least
    /// `threshold`, best first
    ///
    /// # Errors
    /// * [`RagError::IndexNotReady`] before the first successful rebuild
    #[inline]
    pub async fn search(
        &self,
        query_vector: &[f32],
        k: usize,
        threshold: f32,
    ) -> Result<Vec<SearchResult>> {
        let table = self.table.as_ref().ok_or(RagError::IndexNotReady)?;

        if k == 0 {
            return Ok(Vec::new());
        }

        if let Some(dimension) = self.dimension {
            if query_vector.len() != dimension {
                return Err(RagError::EmbeddingBackend(format!(
                    "Query vector has {} dimensions but the index expects {}",
                    query_vector.len(),
                    dimension
                )));
            }
        }

        debug!(
            "Searching for {} nearest chunks (threshold {})",
            k, threshold
        );

        let stream = table
            .vector_search(query_vector)
            .map_err(|e| search_error("Failed to create vector search", &e))?
            .column("vector")
            .distance_type(DistanceType::Cosine)
            .limit(k)
            .execute()
            .await
            .map_err(|e| search_error("Failed to execute search", &e))?;

        let mut results = parse_search_results_stream(stream).await?;

        let found = results.len();
        results.retain(|r| r.score >= threshold);
        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        results.truncate(k);

        debug!(
            "{} of {} candidates passed the similarity threshold",
            results.len(),
            found
        );
        Ok(results)
    }

    /// Number of chunks in the current index
    #[inline]
    pub async fn count(&self) -> Result<usize> {
        let table = self.table.as_ref().ok_or(RagError::IndexNotReady)?;
        table
            .count_rows(None)
            .await
            .map_err(|e| search_error("Failed to count rows", &e))
    }
}

/// Check that there is one non-empty vector per chunk and all share a length
fn validate_vectors(vectors: &[Vec<f32>], expected: usize) -> Result<usize> {
    if vectors.len() != expected {
        return Err(RagError::EmbeddingBackend(format!(
            "Expected {} embeddings but received {}",
            expected,
            vectors.len()
        )));
    }

    let dimension = vectors.first().map_or(0, Vec::len);
    if dimension == 0 {
        return Err(RagError::EmbeddingBackend(
            "Embedding backend returned empty vectors".to_string(),
        ));
    }

    if let Some(bad) = vectors.iter().find(|v| v.len() != dimension) {
        return Err(RagError::EmbeddingBackend(format!(
            "Inconsistent embedding dimensions: {} and {}",
            dimension,
            bad.len()
        )));
    }

    Ok(dimension)
}

fn search_error(context: &str, error: &impl std::fmt::Display) -> RagError {
    warn!("{}: {}", context, error);
    RagError::Other(anyhow::anyhow!("{}: {}", context, error))
}

/// Create schema with the specified vector dimension
fn create_schema(vector_dim: usize) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new(
            "vector",
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, false)),
                vector_dim as i32,
            ),
            false,
        ),
        Field::new("ordinal", DataType::UInt32, false),
        Field::new("overlap", DataType::UInt32, false),
        Field::new("text", DataType::Utf8, false),
        Field::new("metadata", DataType::Utf8, false),
        Field::new("created_at", DataType::Utf8, false),
    ]))
}

/// Create a RecordBatch from chunk records
fn create_record_batch(
    records: &[ChunkRecord],
    schema: Arc<Schema>,
    vector_dim: usize,
) -> Result<RecordBatch> {
    let len = records.len();

    let mut ids = Vec::with_capacity(len);
    let mut flat_values = Vec::with_capacity(len * vector_dim);
    let mut ordinals = Vec::with_capacity(len);
    let mut overlaps = Vec::with_capacity(len);
    let mut texts = Vec::with_capacity(len);
    let mut metadata = Vec::with_capacity(len);
    let mut created_ats = Vec::with_capacity(len);

    for record in records {
        ids.push(record.id.as_str());
        flat_values.extend_from_slice(&record.vector);
        ordinals.push(to_u32(record.chunk.ordinal)?);
        overlaps.push(to_u32(record.chunk.overlap)?);
        texts.push(record.chunk.text.as_str());
        metadata.push(serde_json::to_string(&record.chunk.metadata).map_err(|e| {
            RagError::IndexWrite(format!("Failed to encode chunk metadata: {}", e))
        })?);
        created_ats.push(record.created_at.as_str());
    }

    let values_array = Float32Array::from(flat_values);
    let field = Arc::new(Field::new("item", DataType::Float32, false));
    let vector_array =
        FixedSizeListArray::try_new(field, vector_dim as i32, Arc::new(values_array), None)
            .map_err(|e| RagError::IndexWrite(format!("Failed to create vector array: {}", e)))?;

    let arrays: Vec<Arc<dyn Array>> = vec![
        Arc::new(StringArray::from(ids)),
        Arc::new(vector_array),
        Arc::new(UInt32Array::from(ordinals)),
        Arc::new(UInt32Array::from(overlaps)),
        Arc::new(StringArray::from(texts)),
        Arc::new(StringArray::from(metadata)),
        Arc::new(StringArray::from(created_ats)),
    ];

    RecordBatch::try_new(schema, arrays)
        .map_err(|e| RagError::IndexWrite(format!("Failed to create record batch: {}", e)))
}

fn to_u32(value: usize) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| RagError::IndexWrite(format!("Value {} does not fit the index schema", value)))
}

/// Parse search results from LanceDB stream into SearchResult structs
async fn parse_search_results_stream(
    mut results: lancedb::arrow::SendableRecordBatchStream,
) -> Result<Vec<SearchResult>> {
    let mut search_results = Vec::new();

    while let Some(batch) = results
        .try_next()
        .await
        .map_err(|e| search_error("Failed to read result stream", &e))?
    {
        search_results.extend(parse_search_batch(&batch)?);
    }

    Ok(search_results)
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .ok_or_else(|| RagError::Other(anyhow::anyhow!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| RagError::Other(anyhow::anyhow!("Invalid {} column type", name)))
}

fn u32_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a UInt32Array> {
    batch
        .column_by_name(name)
        .ok_or_else(|| RagError::Other(anyhow::anyhow!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<UInt32Array>()
        .ok_or_else(|| RagError::Other(anyhow::anyhow!("Invalid {} column type", name)))
}

/// Parse a single record batch from search results
fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<SearchResult>> {
    let texts = string_column(batch, "text")?;
    let metadata = string_column(batch, "metadata")?;
    let ordinals = u32_column(batch, "ordinal")?;
    let overlaps = u32_column(batch, "overlap")?;

    let distances = batch
        .column_by_name("_distance")
        .and_then(|col| col.as_any().downcast_ref::<Float32Array>());

    let mut search_results = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        let chunk_metadata: BTreeMap<String, String> = serde_json::from_str(metadata.value(row))
            .map_err(|e| RagError::Other(anyhow::anyhow!("Corrupt chunk metadata: {}", e)))?;

        // Rows without a distance cannot be ranked
        let distance = distances.map_or(f32::NAN, |d| {
            if d.is_null(row) { f32::NAN } else { d.value(row) }
        });

        search_results.push(SearchResult {
            chunk: Chunk {
                text: texts.value(row).to_string(),
                ordinal: ordinals.value(row) as usize,
                overlap: overlaps.value(row) as usize,
                metadata: chunk_metadata,
            },
            score: 1.0 - distance,
        });
    }

    Ok(search_results)
}
