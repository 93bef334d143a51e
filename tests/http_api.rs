//! End-to-end tests driving the axum router against a real document service.
//!
//! Each test gets isolated storage directories; the global configuration is shared and set
//! once for the whole suite.

use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode};
use axum::response::Response;
use docchat::api::create_router;
use docchat::config::{CONFIG, Config, SummarizationProvider};
use docchat::processing::{DocumentService, StoragePaths};
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};
use regex::Regex;
use std::path::PathBuf;
use std::sync::{Arc, Once};
use tower::ServiceExt;

const BOUNDARY: &str = "itest-boundary";

fn ensure_test_config() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = CONFIG.set(Config {
            upload_dir: std::env::temp_dir(),
            processed_dir: std::env::temp_dir(),
            static_dir: PathBuf::from("build"),
            embedding_model: "all-minilm-l6-v2".into(),
            embedding_dimension: 64,
            text_splitter_chunk_size: Some(64),
            text_splitter_chunk_overlap: Some(8),
            search_top_k: 4,
            summarization_provider: SummarizationProvider::None,
            summarization_model: None,
            summarization_max_words: 80,
            ollama_url: None,
            server_port: None,
        });
    });
}

struct Harness {
    _dir: tempfile::TempDir,
    paths: StoragePaths,
    app: axum::Router,
}

impl Harness {
    async fn new() -> Self {
        ensure_test_config();
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = StoragePaths {
            upload_dir: dir.path().join("data"),
            processed_dir: dir.path().join("processed_data"),
        };
        let service = DocumentService::new(paths.clone())
            .await
            .expect("service init");
        Self {
            _dir: dir,
            paths,
            app: create_router(Arc::new(service)),
        }
    }

    /// Rebuild the service over the same directories, simulating a process restart.
    async fn restart(&mut self) {
        let service = DocumentService::new(self.paths.clone())
            .await
            .expect("service restart");
        self.app = create_router(Arc::new(service));
    }

    async fn upload(&self, filename: &str, bytes: &[u8]) -> Response {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: application/pdf\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        self.app
            .clone()
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/upload")
                    .header(
                        "content-type",
                        format!("multipart/form-data; boundary={BOUNDARY}"),
                    )
                    .body(Body::from(body))
                    .expect("request"),
            )
            .await
            .expect("router response")
    }

    async fn chat(&self, message: &str) -> Response {
        self.app
            .clone()
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/chat")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        serde_json::json!({ "message": message }).to_string(),
                    ))
                    .expect("request"),
            )
            .await
            .expect("router response")
    }

    async fn processed(&self) -> serde_json::Value {
        let response = self
            .app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/processed")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router response");
        assert_eq!(response.status(), StatusCode::OK);
        body_json(response).await
    }
}

async fn body_json(response: Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    serde_json::from_slice(&bytes).expect("json body")
}

/// Build a minimal single-page PDF with the given text in its content stream.
fn pdf_bytes(text: &str) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });
    let content = Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 24.into()]),
            Operation::new("Td", vec![72.into(), 700.into()]),
            Operation::new("Tj", vec![Object::string_literal(text)]),
            Operation::new("ET", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(
        dictionary! {},
        content.encode().expect("encode content"),
    ));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
    });
    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => vec![page_id.into()],
        "Count" => 1,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("save pdf");
    bytes
}

#[tokio::test]
async fn duplicate_content_is_indexed_once() {
    let harness = Harness::new().await;
    let bytes = pdf_bytes("Crop rotation keeps soil healthy across seasons.");

    let first = harness.upload("rotation.pdf", &bytes).await;
    assert_eq!(first.status(), StatusCode::OK);
    let first_json = body_json(first).await;
    assert_eq!(
        first_json["message"],
        "File uploaded, processed, and stored successfully!"
    );
    assert_eq!(first_json["file"]["filename"], "rotation.pdf");

    // Same content under a different name must be detected by hash, not filename.
    let second = harness.upload("rotation-copy.pdf", &bytes).await;
    assert_eq!(second.status(), StatusCode::OK);
    let second_json = body_json(second).await;
    assert_eq!(
        second_json["message"],
        "File already processed earlier. Ready to chat!"
    );
    assert!(second_json.get("file").is_none());

    let processed = harness.processed().await;
    assert_eq!(processed["processed"].as_array().expect("array").len(), 1);
}

#[tokio::test]
async fn processed_listing_is_sorted_most_recent_first() {
    let harness = Harness::new().await;
    for (name, text) in [
        ("soil.pdf", "Soil preparation starts with a pH test."),
        ("seeds.pdf", "Seed depth should be twice the seed width."),
        ("water.pdf", "Watering early in the morning reduces evaporation."),
    ] {
        let response = harness.upload(name, &pdf_bytes(text)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let processed = harness.processed().await;
    let records = processed["processed"].as_array().expect("array");
    assert_eq!(records.len(), 3);

    let timestamps: Vec<&str> = records
        .iter()
        .map(|record| record["processed_at"].as_str().expect("timestamp"))
        .collect();
    let mut sorted = timestamps.clone();
    sorted.sort_by(|a, b| b.cmp(a));
    assert_eq!(timestamps, sorted);
}

#[tokio::test]
async fn filename_collision_produces_distinct_paths() {
    let harness = Harness::new().await;

    let first = harness
        .upload("guide.pdf", &pdf_bytes("First edition of the planting guide."))
        .await;
    assert_eq!(first.status(), StatusCode::OK);

    let second = harness
        .upload("guide.pdf", &pdf_bytes("Second edition with revised spacing tables."))
        .await;
    assert_eq!(second.status(), StatusCode::OK);
    let second_json = body_json(second).await;
    let suffixed = Regex::new(r"^guide_\d{14}(_\d+)?\.pdf$").expect("regex");
    assert!(
        suffixed.is_match(second_json["file"]["filename"].as_str().expect("filename")),
        "expected timestamp-suffixed filename, got {}",
        second_json["file"]["filename"]
    );

    let processed = harness.processed().await;
    let records = processed["processed"].as_array().expect("array");
    assert_eq!(records.len(), 2);
    let paths: Vec<&str> = records
        .iter()
        .map(|record| record["path"].as_str().expect("path"))
        .collect();
    assert_ne!(paths[0], paths[1]);
    for path in paths {
        assert!(
            std::fs::metadata(path).expect("stored file").is_file(),
            "stored path {path} missing"
        );
    }
}

#[tokio::test]
async fn pdf_without_text_is_rejected_and_not_recorded() {
    let harness = Harness::new().await;

    let response = harness.upload("blank.pdf", &pdf_bytes("")).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Failed to extract text from PDF");

    let processed = harness.processed().await;
    assert!(processed["processed"].as_array().expect("array").is_empty());
}

#[tokio::test]
async fn garbage_upload_is_rejected_and_not_recorded() {
    let harness = Harness::new().await;

    let response = harness.upload("junk.pdf", b"this is not a pdf at all").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Failed to extract text from PDF");

    let processed = harness.processed().await;
    assert!(processed["processed"].as_array().expect("array").is_empty());
}

#[tokio::test]
async fn chat_answers_from_ingested_content() {
    let harness = Harness::new().await;

    let response = harness
        .upload(
            "tomatoes.pdf",
            &pdf_bytes("Tomatoes need full sun and deep, infrequent watering."),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let chat = harness.chat("How much sun do tomatoes need?").await;
    assert_eq!(chat.status(), StatusCode::OK);
    let json = body_json(chat).await;
    let answer = json["response"].as_str().expect("response");
    assert!(!answer.is_empty());
    assert!(
        answer.contains("tomatoes.pdf"),
        "extractive answer should cite its source, got: {answer}"
    );
}

#[tokio::test]
async fn chat_without_documents_reports_empty_index() {
    let harness = Harness::new().await;

    let chat = harness.chat("Anything in here?").await;
    assert_eq!(chat.status(), StatusCode::OK);
    let json = body_json(chat).await;
    let answer = json["response"].as_str().expect("response");
    assert!(answer.contains("Upload a PDF"));
}

#[tokio::test]
async fn restart_preserves_manifest_and_index() {
    let mut harness = Harness::new().await;
    let bytes = pdf_bytes("Compost piles need a balance of green and brown material.");

    let response = harness.upload("compost.pdf", &bytes).await;
    assert_eq!(response.status(), StatusCode::OK);

    harness.restart().await;

    let processed = harness.processed().await;
    assert_eq!(processed["processed"].as_array().expect("array").len(), 1);

    let chat = harness.chat("What does a compost pile need?").await;
    assert_eq!(chat.status(), StatusCode::OK);
    let json = body_json(chat).await;
    assert!(json["response"].as_str().expect("response").contains("compost.pdf"));

    // A duplicate of the original content is still detected after restart.
    let duplicate = harness.upload("compost-again.pdf", &bytes).await;
    assert_eq!(duplicate.status(), StatusCode::OK);
    let duplicate_json = body_json(duplicate).await;
    assert_eq!(
        duplicate_json["message"],
        "File already processed earlier. Ready to chat!"
    );
}
