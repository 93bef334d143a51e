//! Document processing pipeline: dedup, extraction, chunking, embedding, and retrieval.

mod answer;
pub mod chunking;
pub mod sanitize;
mod service;
pub mod types;

pub use service::{DocumentApi, DocumentService, StoragePaths};
pub use types::{ChunkingError, IndexedDocument, IngestOutcome, ProcessingError, QueryError};
