//! Processing service coordinating ingestion, retrieval, and answering.

use crate::{
    config::get_config,
    embedding::{EmbeddingClient, get_embedding_client},
    extract,
    index::{ChunkMetadata, SearchMatch, VectorEntry, VectorStore},
    manifest::{Manifest, ManifestRecord, current_timestamp_rfc3339},
    metrics::{MetricsSnapshot, ServiceMetrics},
    processing::{
        answer::{build_answer_prompt, build_extractive_answer},
        chunking::{chunk_text, dedupe_chunks, determine_chunk_size},
        sanitize::{collision_variant, sanitize_filename, timestamp_suffix},
        types::{IndexedDocument, IngestOutcome, ProcessingError, QueryError},
    },
    summarization::{SummarizationClient, SummarizationRequest, get_summarization_client},
};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use time::OffsetDateTime;
use tokio::io::AsyncReadExt;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Name of the manifest file inside the processed directory.
const MANIFEST_FILE: &str = "processed_index.json";
/// Name of the vector index snapshot inside the processed directory.
const INDEX_FILE: &str = "vector_index.json";
/// Read size used when hashing uploads, so large files never sit in memory whole.
const HASH_READ_CHUNK: usize = 8192;

/// Storage directories the service operates on.
#[derive(Debug, Clone)]
pub struct StoragePaths {
    /// Directory where uploads are spooled before processing.
    pub upload_dir: PathBuf,
    /// Directory holding processed files, the manifest, and the index snapshot.
    pub processed_dir: PathBuf,
}

/// Shared retrieval state guarded by one lock.
///
/// Manifest and vector store are mutated together during ingestion; a single mutex keeps
/// concurrent uploads from interleaving their read-modify-write cycles on either file.
struct RetrievalState {
    manifest: Manifest,
    store: VectorStore,
}

/// Coordinates the full pipeline: dedup, extraction, chunking, embedding, and retrieval.
///
/// The service owns long-lived handles to the embedding client, the optional summarization
/// client, and the metrics registry. Construct it once near process start and share it
/// through an `Arc`.
pub struct DocumentService {
    embedding_client: Box<dyn EmbeddingClient + Send + Sync>,
    summarization_client: Option<Box<dyn SummarizationClient + Send + Sync>>,
    paths: StoragePaths,
    state: Mutex<RetrievalState>,
    metrics: Arc<ServiceMetrics>,
}

/// Abstraction over the document pipeline used by the HTTP surface.
#[async_trait]
pub trait DocumentApi: Send + Sync {
    /// Directory where upload handlers should spool incoming files.
    fn upload_dir(&self) -> PathBuf;

    /// Hash, dedup, extract, chunk, embed, and store one uploaded file.
    async fn ingest_upload(
        &self,
        original_filename: &str,
        upload: NamedTempFile,
    ) -> Result<IngestOutcome, ProcessingError>;

    /// Answer a question from the indexed documents.
    async fn answer_question(&self, question: &str) -> Result<String, QueryError>;

    /// Manifest records sorted most recent first.
    async fn processed_documents(&self) -> Vec<ManifestRecord>;

    /// Retrieve the current metrics snapshot for diagnostics.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

impl DocumentService {
    /// Build a new service over the given directories, creating them as needed and loading
    /// any persisted manifest and index snapshot.
    pub async fn new(paths: StoragePaths) -> Result<Self, ProcessingError> {
        let config = get_config();
        tokio::fs::create_dir_all(&paths.upload_dir).await?;
        tokio::fs::create_dir_all(&paths.processed_dir).await?;

        let manifest = Manifest::load(&paths.processed_dir.join(MANIFEST_FILE)).await?;
        let store = VectorStore::load(
            &paths.processed_dir.join(INDEX_FILE),
            config.embedding_dimension,
        )
        .await?;
        tracing::info!(
            documents = manifest.len(),
            chunks = store.len(),
            "Retrieval state loaded"
        );

        Ok(Self {
            embedding_client: get_embedding_client(),
            summarization_client: get_summarization_client(),
            paths,
            state: Mutex::new(RetrievalState { manifest, store }),
            metrics: Arc::new(ServiceMetrics::new()),
        })
    }

    /// Ingest one uploaded file.
    ///
    /// The retrieval lock is held for the whole call so the manifest's hash-uniqueness
    /// invariant survives concurrent uploads of identical content.
    pub async fn ingest_upload(
        &self,
        original_filename: &str,
        upload: NamedTempFile,
    ) -> Result<IngestOutcome, ProcessingError> {
        let hash = hash_file(upload.path()).await?;
        tracing::debug!(filename = original_filename, hash = %hash, "Upload hashed");

        let mut state = self.state.lock().await;

        if state.manifest.find_by_hash(&hash).is_some() {
            tracing::info!(filename = original_filename, hash = %hash, "Duplicate upload skipped");
            // Dropping the temp file removes it from the upload directory.
            return Ok(IngestOutcome::Duplicate);
        }

        let pdf_path = upload.path().to_path_buf();
        let text =
            tokio::task::spawn_blocking(move || extract::extract_pdf_text(&pdf_path)).await??;
        if text.is_empty() {
            tracing::warn!(filename = original_filename, "No extractable text in upload");
            return Err(ProcessingError::EmptyDocument);
        }

        let config = get_config();
        let chunk_size =
            determine_chunk_size(config.text_splitter_chunk_size, &config.embedding_model);
        let overlap = config.text_splitter_chunk_overlap.unwrap_or(0);
        let chunks = chunk_text(&text, chunk_size, overlap, &config.embedding_model)?;
        let (prepared, skipped_duplicates) = dedupe_chunks(chunks);
        let embeddings = if prepared.is_empty() {
            Vec::new()
        } else {
            self.embedding_client
                .generate_embeddings(prepared.clone())
                .await?
        };

        debug_assert_eq!(prepared.len(), embeddings.len());

        let dest_name = self
            .available_name(&sanitize_filename(original_filename))
            .await?;

        let entries: Vec<VectorEntry> = prepared
            .into_iter()
            .zip(embeddings.into_iter())
            .map(|(text, vector)| VectorEntry {
                id: Uuid::new_v4().to_string(),
                vector,
                metadata: ChunkMetadata {
                    text,
                    source_filename: dest_name.clone(),
                },
            })
            .collect();
        let chunk_count = entries.len();

        state.store.add(entries)?;
        state.store.save().await?;

        let dest_path = self.paths.processed_dir.join(&dest_name);
        upload
            .persist(&dest_path)
            .map_err(|error| ProcessingError::Io(error.error))?;

        let record = ManifestRecord {
            filename: dest_name,
            hash,
            processed_at: current_timestamp_rfc3339(),
            path: dest_path.to_string_lossy().into_owned(),
        };
        state.manifest.append(record.clone()).await?;

        self.metrics.record_document(chunk_count as u64);
        tracing::info!(
            filename = %record.filename,
            chunks = chunk_count,
            chunk_size,
            skipped_duplicates,
            "Document indexed"
        );

        Ok(IngestOutcome::Indexed(IndexedDocument {
            record,
            chunk_count,
            chunk_size,
            skipped_duplicates,
        }))
    }

    /// Answer a question by embedding it, retrieving nearest chunks, and summarizing them.
    pub async fn answer_question(&self, question: &str) -> Result<String, QueryError> {
        let config = get_config();
        let mut vectors = self
            .embedding_client
            .generate_embeddings(vec![question.to_string()])
            .await?;
        let vector = vectors.pop().ok_or(QueryError::EmptyEmbedding)?;

        let expected = config.embedding_dimension;
        if vector.len() != expected {
            return Err(QueryError::DimensionMismatch {
                expected,
                actual: vector.len(),
            });
        }

        let matches = {
            let state = self.state.lock().await;
            state.store.search(&vector, config.search_top_k)?
        };

        if matches.is_empty() {
            return Ok(
                "I could not find any processed documents to answer from. Upload a PDF first."
                    .to_string(),
            );
        }

        let answer = self.summarize_matches(question, &matches).await;
        self.metrics.record_question();
        Ok(answer)
    }

    /// Produce the final answer text, preferring the configured abstractive provider.
    async fn summarize_matches(&self, question: &str, matches: &[SearchMatch]) -> String {
        let config = get_config();
        let max_words = config.summarization_max_words;

        if let (Some(client), Some(model)) = (
            self.summarization_client.as_ref(),
            config.summarization_model.clone(),
        ) {
            let prompt = build_answer_prompt(question, matches, max_words);
            match client
                .generate_summary(SummarizationRequest {
                    model,
                    prompt,
                    max_words,
                })
                .await
            {
                Ok(text) if !text.trim().is_empty() => return text,
                Ok(_) => {
                    tracing::warn!("Summarization provider returned empty text; using extractive answer");
                }
                Err(error) => {
                    tracing::warn!(error = %error, "Summarization provider failed; using extractive answer");
                }
            }
        }

        build_extractive_answer(matches, max_words)
    }

    /// Manifest records sorted most recent first.
    pub async fn processed_documents(&self) -> Vec<ManifestRecord> {
        self.state.lock().await.manifest.sorted_desc()
    }

    /// Return the current metrics snapshot.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Pick a destination filename inside the processed directory, disambiguating
    /// collisions with a UTC timestamp suffix (and a counter if needed within one second).
    async fn available_name(&self, sanitized: &str) -> Result<String, ProcessingError> {
        let plain = self.paths.processed_dir.join(sanitized);
        if !tokio::fs::try_exists(&plain).await? {
            return Ok(sanitized.to_string());
        }

        let suffix = timestamp_suffix(OffsetDateTime::now_utc());
        let mut candidate = collision_variant(sanitized, &suffix);
        let mut attempt = 1u32;
        while tokio::fs::try_exists(&self.paths.processed_dir.join(&candidate)).await? {
            candidate = collision_variant(sanitized, &format!("{suffix}_{attempt}"));
            attempt += 1;
        }
        Ok(candidate)
    }
}

/// Streaming SHA-256 of a file, read in fixed-size chunks.
async fn hash_file(path: &Path) -> Result<String, std::io::Error> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; HASH_READ_CHUNK];

    loop {
        let n = file.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

#[async_trait]
impl DocumentApi for DocumentService {
    fn upload_dir(&self) -> PathBuf {
        self.paths.upload_dir.clone()
    }

    async fn ingest_upload(
        &self,
        original_filename: &str,
        upload: NamedTempFile,
    ) -> Result<IngestOutcome, ProcessingError> {
        DocumentService::ingest_upload(self, original_filename, upload).await
    }

    async fn answer_question(&self, question: &str) -> Result<String, QueryError> {
        DocumentService::answer_question(self, question).await
    }

    async fn processed_documents(&self) -> Vec<ManifestRecord> {
        DocumentService::processed_documents(self).await
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        DocumentService::metrics_snapshot(self)
    }
}
