//! Core data types and error definitions for the processing pipeline.

use crate::manifest::{ManifestError, ManifestRecord};
use anyhow::Error as TokenizerError;
use thiserror::Error;

/// Errors produced while turning raw text into chunks.
#[derive(Debug, Error)]
pub enum ChunkingError {
    /// Ingestion configured an impossible token budget.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
    /// Tokenizer resources were unavailable for the configured model.
    #[error("failed to initialize tokenizer for model '{model}': {source}")]
    Tokenizer {
        /// Embedding model we attempted to load.
        model: String,
        /// Underlying error raised by the tokenizer library.
        #[source]
        source: TokenizerError,
    },
}

/// Errors emitted by the document ingestion pipeline.
#[derive(Debug, Error)]
pub enum ProcessingError {
    /// Chunking step failed to segment the document.
    #[error("Failed to chunk document: {0}")]
    Chunking(#[from] ChunkingError),
    /// Embedding provider failed to produce vectors for the input text.
    #[error("Failed to generate embeddings: {0}")]
    Embedding(#[from] crate::embedding::EmbeddingClientError),
    /// The PDF could not be parsed at all.
    #[error("Failed to extract text from PDF: {0}")]
    Extraction(#[from] crate::extract::ExtractionError),
    /// The PDF parsed but yielded no extractable text.
    #[error("Document produced no extractable text")]
    EmptyDocument,
    /// Vector store interaction failed.
    #[error("Vector index operation failed: {0}")]
    Index(#[from] crate::index::IndexError),
    /// Manifest read or write failed.
    #[error("Manifest operation failed: {0}")]
    Manifest(#[from] ManifestError),
    /// Filesystem interaction failed.
    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    /// A blocking extraction task failed to complete.
    #[error("Extraction worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

/// Errors emitted while answering a chat question.
#[derive(Debug, Error)]
pub enum QueryError {
    /// Embedding provider failed to return a vector for the question.
    #[error("Failed to generate embeddings: {0}")]
    Embedding(#[from] crate::embedding::EmbeddingClientError),
    /// Vector store search failed.
    #[error("Vector index operation failed: {0}")]
    Index(#[from] crate::index::IndexError),
    /// Embedding provider returned no vectors.
    #[error("Embedding provider returned no vectors for the question")]
    EmptyEmbedding,
    /// Returned embedding dimension does not match configuration.
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected embedding dimension configured on the server.
        expected: usize,
        /// Actual embedding dimension produced by the provider.
        actual: usize,
    },
}

/// Result of a completed upload.
#[derive(Debug, Clone)]
pub enum IngestOutcome {
    /// Content hash was already present; nothing was re-indexed.
    Duplicate,
    /// Document was extracted, indexed, and stored.
    Indexed(IndexedDocument),
}

/// Summary of a freshly indexed document.
#[derive(Debug, Clone)]
pub struct IndexedDocument {
    /// Manifest record appended for the document.
    pub record: ManifestRecord,
    /// Number of chunks indexed for the document.
    pub chunk_count: usize,
    /// Chunk size used during processing.
    pub chunk_size: usize,
    /// Chunks skipped within the document due to duplicate text.
    pub skipped_duplicates: usize,
}
