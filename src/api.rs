//! HTTP surface for DocChat.
//!
//! This module exposes a compact Axum router with a handful of endpoints:
//!
//! - `POST /upload` – Accept a multipart PDF upload, dedup it by content hash, extract and
//!   chunk its text, embed the chunks, and persist them in the vector index.
//! - `GET /processed` – List previously processed documents, most recent first.
//! - `POST /chat` – Answer a natural-language question from the indexed documents.
//! - `GET /metrics` – Observe ingestion and chat counters.
//! - Any other path – Bundled front-end assets, falling back to `index.html`.

use crate::config::get_config;
use crate::manifest::ManifestRecord;
use crate::metrics::MetricsSnapshot;
use crate::processing::{DocumentApi, IngestOutcome, ProcessingError, QueryError};
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tower_http::services::{ServeDir, ServeFile};

/// Upper bound on upload size; multipart bodies beyond this are rejected by axum.
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Build the HTTP router exposing the document chat API surface.
pub fn create_router<S>(service: Arc<S>) -> Router
where
    S: DocumentApi + 'static,
{
    let static_dir = &get_config().static_dir;
    Router::new()
        .route("/upload", post(upload_document::<S>))
        .route("/processed", get(list_processed::<S>))
        .route("/chat", post(chat::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .fallback_service(
            ServeDir::new(static_dir).not_found_service(ServeFile::new(static_dir.join("index.html"))),
        )
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(service)
}

/// Success response for the `POST /upload` endpoint.
#[derive(Serialize)]
struct UploadResponse {
    /// Human-readable outcome message.
    message: String,
    /// Manifest record for a freshly indexed document; absent for duplicates.
    #[serde(skip_serializing_if = "Option::is_none")]
    file: Option<ManifestRecord>,
}

/// Ingest one uploaded PDF.
///
/// The `file` part is streamed to a temporary file in the upload directory, then handed to
/// the processing service, which owns hashing, dedup, extraction, and indexing.
async fn upload_document<S>(
    State(service): State<Arc<S>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError>
where
    S: DocumentApi,
{
    let mut upload: Option<(String, NamedTempFile)> = None;

    while let Some(mut field) = multipart.next_field().await.map_err(|error| {
        ApiError::bad_request(format!("Malformed multipart body: {error}"))
    })? {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        if filename.is_empty() {
            return Err(ApiError::bad_request("No selected file"));
        }

        let mut temp = NamedTempFile::new_in(service.upload_dir())
            .map_err(|error| ApiError::internal(format!("Failed to spool upload: {error}")))?;
        while let Some(chunk) = field.chunk().await.map_err(|error| {
            ApiError::bad_request(format!("Upload interrupted: {error}"))
        })? {
            temp.as_file_mut().write_all(&chunk).map_err(|error| {
                ApiError::internal(format!("Failed to spool upload: {error}"))
            })?;
        }

        upload = Some((filename, temp));
        break;
    }

    let Some((filename, temp)) = upload else {
        return Err(ApiError::bad_request("No file part"));
    };

    match service.ingest_upload(&filename, temp).await? {
        IngestOutcome::Duplicate => Ok(Json(UploadResponse {
            message: "File already processed earlier. Ready to chat!".to_string(),
            file: None,
        })),
        IngestOutcome::Indexed(outcome) => {
            tracing::info!(
                filename = %outcome.record.filename,
                chunks = outcome.chunk_count,
                chunk_size = outcome.chunk_size,
                skipped_duplicates = outcome.skipped_duplicates,
                "Upload request completed"
            );
            Ok(Json(UploadResponse {
                message: "File uploaded, processed, and stored successfully!".to_string(),
                file: Some(outcome.record),
            }))
        }
    }
}

/// Response body for `GET /processed`.
#[derive(Serialize)]
struct ProcessedResponse {
    processed: Vec<ManifestRecord>,
}

/// List processed documents, most recent first.
async fn list_processed<S>(State(service): State<Arc<S>>) -> Json<ProcessedResponse>
where
    S: DocumentApi,
{
    Json(ProcessedResponse {
        processed: service.processed_documents().await,
    })
}

/// Request body for the `POST /chat` endpoint.
#[derive(Deserialize)]
struct ChatRequest {
    /// Natural-language question to answer from the indexed documents.
    #[serde(default)]
    message: String,
}

/// Response body for `POST /chat`.
#[derive(Serialize)]
struct ChatResponse {
    response: String,
}

/// Answer a chat question from the indexed documents.
async fn chat<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError>
where
    S: DocumentApi,
{
    let message = request.message.trim();
    if message.is_empty() {
        return Err(ApiError::bad_request("Message cannot be empty"));
    }

    let response = service.answer_question(message).await?;
    Ok(Json(ChatResponse { response }))
}

/// Return a concise metrics snapshot with document/chunk/question counters.
async fn get_metrics<S>(State(service): State<Arc<S>>) -> Json<MetricsSnapshot>
where
    S: DocumentApi,
{
    Json(service.metrics_snapshot())
}

/// Error wrapper mapping pipeline failures to coarse HTTP status codes with a JSON body.
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<ProcessingError> for ApiError {
    fn from(inner: ProcessingError) -> Self {
        match &inner {
            ProcessingError::EmptyDocument | ProcessingError::Extraction(_) => {
                tracing::warn!(error = %inner, "Extraction failed");
                Self::internal("Failed to extract text from PDF")
            }
            _ => {
                tracing::error!(error = %inner, "Ingestion failed");
                Self::internal(inner.to_string())
            }
        }
    }
}

impl From<QueryError> for ApiError {
    fn from(inner: QueryError) -> Self {
        tracing::error!(error = %inner, "Chat query failed");
        Self::internal(inner.to_string())
    }
}
