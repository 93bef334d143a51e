//! Chunk-size heuristics and chunking helpers.
//!
//! Chunk boundaries are delegated to `semchunk-rs` under a token budget:
//!
//! - Automatic sizing: derive a budget from the embedding model's context window and clamp to
//!   a conservative range; callers can override via `TEXT_SPLITTER_CHUNK_SIZE`.
//! - Overlap: optionally include a sliding token overlap (`TEXT_SPLITTER_CHUNK_OVERLAP`) so
//!   that spans around boundaries remain visible to retrieval and downstream prompts.
//! - Token counting: prefer `tiktoken-rs` for known encodings; fall back to a whitespace
//!   counter when the model's tokenizer is unavailable (typical for local embedding models).

use anyhow::Error as TokenizerError;
use semchunk_rs::Chunker;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::sync::Arc;
use tiktoken_rs::{
    CoreBPE, cl100k_base, get_bpe_from_model, model::get_context_size, o200k_base, p50k_base,
    p50k_edit, r50k_base,
};

use super::types::ChunkingError;

type TokenCounter = Arc<dyn Fn(&str) -> usize + Send + Sync>;

const MIN_AUTOMATIC_CHUNK_SIZE: usize = 256;
const MAX_AUTOMATIC_CHUNK_SIZE: usize = 1024;

/// Determine the chunk size for an ingestion, respecting an explicit override.
///
/// Without an override the size is derived from the embedding model's context window
/// divided by `4`, clamped into `[256, 1024]`.
pub(crate) fn determine_chunk_size(override_size: Option<usize>, model: &str) -> usize {
    if let Some(explicit) = override_size {
        return explicit.max(1);
    }

    let window = model_context_window(model);
    let base = (window / 4).max(1);
    base.clamp(MIN_AUTOMATIC_CHUNK_SIZE, MAX_AUTOMATIC_CHUNK_SIZE)
}

/// Look up the context window for an embedding model by name.
pub(crate) fn model_context_window(model: &str) -> usize {
    let normalized = model.to_lowercase();
    if normalized.starts_with("text-embedding-3") || normalized.starts_with("text-embedding-ada") {
        return 8192;
    }
    match normalized.as_str() {
        "nomic-embed-text" | "mxbai-embed-large" | "mxbai-embed-large-v1" => 8192,
        value if value.contains("all-minilm") => 512,
        value if value.contains("e5-large") => 4096,
        _ => {
            tracing::trace!(model, "Using tiktoken context window estimate");
            get_context_size(&normalized)
        }
    }
}

/// Chunk text into segments using the configured token counter.
///
/// - `chunk_size` is a hard upper bound on the token count per segment.
/// - `overlap` requests a sliding-window overlap (tokens) between adjacent chunks after
///   splitting; the function guarantees the final strings respect the token budget.
///
/// Returns an empty vector when the input text is all whitespace.
pub(crate) fn chunk_text(
    text: &str,
    chunk_size: usize,
    overlap: usize,
    model: &str,
) -> Result<Vec<String>, ChunkingError> {
    if chunk_size == 0 {
        return Err(ChunkingError::InvalidChunkSize);
    }
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let token_counter = build_token_counter(model);
    Ok(chunk_text_with_counter(
        text,
        chunk_size,
        overlap,
        token_counter,
    ))
}

/// Build a token counter for the given model.
///
/// Uses a tiktoken encoding when one can be resolved and gracefully falls back to whitespace
/// tokenization otherwise. The fallback is logged at `warn` level to aid diagnosis while
/// keeping ingestion flowing.
pub(crate) fn build_token_counter(model: &str) -> TokenCounter {
    match build_tiktoken_counter(model) {
        Ok(counter) => counter,
        Err(error) => {
            tracing::warn!(
                model,
                error = %error,
                "Tokenizer unavailable for model; falling back to whitespace counter"
            );
            default_token_counter()
        }
    }
}

fn build_tiktoken_counter(model: &str) -> Result<TokenCounter, ChunkingError> {
    let normalized = model.trim();
    let target = if normalized.is_empty() {
        "cl100k_base"
    } else {
        normalized
    };
    let encoding = resolve_encoding(target).map_err(|source| ChunkingError::Tokenizer {
        model: target.to_string(),
        source,
    })?;
    let encoding = Arc::new(encoding);

    Ok(Arc::new(move |segment: &str| {
        encoding.encode_ordinary(segment).len()
    }))
}

fn resolve_encoding(model: &str) -> Result<CoreBPE, TokenizerError> {
    match get_bpe_from_model(model) {
        Ok(encoding) => Ok(encoding),
        Err(model_err) => {
            tracing::debug!(
                model,
                error = %model_err,
                "Tokenizer model lookup failed; trying encoding name"
            );
            if let Some(candidate) = encoding_from_name(model) {
                candidate
            } else {
                tracing::debug!(
                    model,
                    "Falling back to 'cl100k_base' encoding for token counting"
                );
                cl100k_base()
            }
        }
    }
}

fn encoding_from_name(name: &str) -> Option<Result<CoreBPE, TokenizerError>> {
    match name {
        "cl100k_base" => Some(cl100k_base()),
        "o200k_base" => Some(o200k_base()),
        "p50k_base" => Some(p50k_base()),
        "p50k_edit" => Some(p50k_edit()),
        "r50k_base" | "gpt2" => Some(r50k_base()),
        _ => None,
    }
}

fn default_token_counter() -> TokenCounter {
    Arc::new(|segment: &str| {
        let tokens = segment.split_whitespace().count();
        if tokens == 0 && !segment.is_empty() {
            1
        } else {
            tokens
        }
    })
}

/// Lower-level chunker that accepts an explicit token counter.
fn chunk_text_with_counter(
    text: &str,
    chunk_size: usize,
    overlap: usize,
    token_counter: TokenCounter,
) -> Vec<String> {
    let counter_for_chunker = token_counter.clone();
    let chunker = Chunker::new(
        chunk_size,
        Box::new(move |segment: &str| counter_for_chunker.as_ref()(segment)),
    );
    let base_chunks = chunker.chunk(text);
    apply_overlap(base_chunks, chunk_size, overlap, &token_counter)
}

/// Apply a token-limited overlap between the tail of the previous chunk and the current one.
///
/// Ensures the resulting overlapped chunk does not exceed `chunk_size` by trimming from the
/// start as needed.
fn apply_overlap(
    chunks: Vec<String>,
    chunk_size: usize,
    overlap: usize,
    token_counter: &TokenCounter,
) -> Vec<String> {
    if chunks.is_empty() {
        return chunks;
    }

    let effective_overlap = overlap.min(chunk_size.saturating_sub(1));
    if effective_overlap == 0 {
        return chunks;
    }

    let mut overlapped = Vec::with_capacity(chunks.len());
    let mut iter = chunks.into_iter();
    let mut previous = iter
        .next()
        .expect("chunks iterator yielded zero elements despite non-empty guard");
    overlapped.push(previous.clone());

    for current in iter {
        let tail = tail_with_token_limit(&previous, effective_overlap, token_counter);
        let mut combined = String::with_capacity(tail.len() + current.len() + 1);

        if !tail.is_empty() {
            combined.push_str(tail);
            if !ends_with_whitespace(tail) && !starts_with_whitespace(&current) {
                combined.push(' ');
            }
        }

        combined.push_str(&current);
        overlapped.push(trim_to_token_budget(&combined, chunk_size, token_counter));
        previous = current;
    }

    overlapped
}

fn tail_with_token_limit<'a>(
    text: &'a str,
    token_limit: usize,
    token_counter: &TokenCounter,
) -> &'a str {
    if token_limit == 0 {
        return "";
    }

    let trimmed_text = text.trim_start();
    if token_counter.as_ref()(trimmed_text) <= token_limit {
        return trimmed_text;
    }

    let len = text.len();
    let mut start = 0;

    while start < len {
        let next_start = text[start..]
            .char_indices()
            .nth(1)
            .map(|(offset, _)| start + offset)
            .unwrap_or(len);
        start = next_start;
        let candidate = &text[start..];
        let trimmed = candidate.trim_start();
        if token_counter.as_ref()(trimmed) <= token_limit {
            return trimmed;
        }
    }

    ""
}

fn trim_to_token_budget(text: &str, token_budget: usize, token_counter: &TokenCounter) -> String {
    if token_budget == 0 {
        return String::new();
    }

    if token_counter.as_ref()(text) <= token_budget {
        return text.to_string();
    }

    let len = text.len();
    let mut start = 0;

    while start < len {
        let next_start = text[start..]
            .char_indices()
            .nth(1)
            .map(|(offset, _)| start + offset)
            .unwrap_or(len);
        start = next_start;
        let candidate = &text[start..];
        let trimmed = candidate.trim_start();
        if token_counter.as_ref()(trimmed) <= token_budget {
            return trimmed.to_string();
        }
    }

    String::new()
}

fn starts_with_whitespace(text: &str) -> bool {
    text.chars()
        .next()
        .map(|c| c.is_whitespace())
        .unwrap_or(false)
}

fn ends_with_whitespace(text: &str) -> bool {
    text.chars()
        .next_back()
        .map(|c| c.is_whitespace())
        .unwrap_or(false)
}

/// Compute a deterministic SHA-256 hash for the chunk text.
pub(crate) fn compute_chunk_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// Remove empty and duplicate chunks within a document, keeping the first occurrence.
///
/// Returns the surviving chunks and the number of duplicates skipped.
pub(crate) fn dedupe_chunks(chunks: Vec<String>) -> (Vec<String>, usize) {
    let mut seen = HashSet::new();
    let mut prepared = Vec::new();
    let mut skipped = 0;

    for text in chunks {
        if text.trim().is_empty() {
            continue;
        }
        if seen.insert(compute_chunk_hash(&text)) {
            prepared.push(text);
        } else {
            skipped += 1;
        }
    }

    (prepared, skipped)
}
