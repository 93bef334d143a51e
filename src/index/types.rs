//! Shared types used by the vector store.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors returned by the vector store.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Filesystem interaction failed.
    #[error("index I/O failed: {0}")]
    Io(#[from] std::io::Error),
    /// Snapshot could not be serialized or deserialized.
    #[error("malformed index snapshot: {0}")]
    Snapshot(#[from] serde_json::Error),
    /// A vector's dimensionality does not match the store.
    #[error("vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimensionality the store was configured with.
        expected: usize,
        /// Dimensionality of the offending vector.
        actual: usize,
    },
}

/// Retrieval metadata stored alongside each vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Chunk text content.
    pub text: String,
    /// Stored filename of the source document.
    pub source_filename: String,
}

/// One indexed chunk: identifier, embedding, and retrieval metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorEntry {
    /// Identifier assigned at ingestion.
    pub id: String,
    /// Embedding vector produced for the chunk.
    pub vector: Vec<f32>,
    /// Payload returned to retrieval consumers.
    pub metadata: ChunkMetadata,
}

/// Scored entry returned by nearest-neighbor queries.
#[derive(Debug, Clone)]
pub struct SearchMatch {
    /// Identifier of the matched entry.
    pub id: String,
    /// Cosine similarity against the query vector.
    pub score: f32,
    /// Chunk text of the matched entry.
    pub text: String,
    /// Stored filename of the source document.
    pub source_filename: String,
}

/// On-disk snapshot layout.
#[derive(Serialize, Deserialize)]
pub(crate) struct Snapshot {
    pub(crate) dimension: usize,
    pub(crate) entries: Vec<VectorEntry>,
}
