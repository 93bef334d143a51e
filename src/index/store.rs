//! Append-only vector store with exact nearest-neighbor search.
//!
//! The store keeps every entry in memory and persists a JSON snapshot next to the processed
//! files. Queries are a brute-force cosine scan, which is exact and fast enough for the
//! document counts this server targets. There is no delete or update path: ingestion only
//! ever appends, and the dedup manifest upstream prevents re-indexing the same content.

use crate::index::types::{IndexError, SearchMatch, Snapshot, VectorEntry};
use std::cmp::Ordering;
use std::path::{Path, PathBuf};

/// In-memory vector index backed by a JSON snapshot on disk.
#[derive(Debug)]
pub struct VectorStore {
    path: PathBuf,
    dimension: usize,
    entries: Vec<VectorEntry>,
}

impl VectorStore {
    /// Load the store from its snapshot, or start empty when none exists.
    ///
    /// A snapshot recorded with a different dimensionality is rejected: mixing vectors from
    /// two embedding configurations would make every similarity score meaningless.
    pub async fn load(path: &Path, dimension: usize) -> Result<Self, IndexError> {
        let entries = match tokio::fs::read_to_string(path).await {
            Ok(raw) => {
                let snapshot: Snapshot = serde_json::from_str(&raw)?;
                if snapshot.dimension != dimension {
                    return Err(IndexError::DimensionMismatch {
                        expected: dimension,
                        actual: snapshot.dimension,
                    });
                }
                tracing::info!(
                    path = %path.display(),
                    entries = snapshot.entries.len(),
                    "Loaded vector index snapshot"
                );
                snapshot.entries
            }
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(error) => return Err(IndexError::Io(error)),
        };

        Ok(Self {
            path: path.to_path_buf(),
            dimension,
            entries,
        })
    }

    /// Append entries to the store, validating dimensionality.
    pub fn add(&mut self, entries: Vec<VectorEntry>) -> Result<(), IndexError> {
        for entry in &entries {
            if entry.vector.len() != self.dimension {
                return Err(IndexError::DimensionMismatch {
                    expected: self.dimension,
                    actual: entry.vector.len(),
                });
            }
        }
        self.entries.extend(entries);
        Ok(())
    }

    /// Persist the snapshot, replacing the previous one atomically.
    pub async fn save(&self) -> Result<(), IndexError> {
        let snapshot = Snapshot {
            dimension: self.dimension,
            entries: self.entries.clone(),
        };
        let raw = serde_json::to_string(&snapshot)?;

        let temp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, raw).await?;
        tokio::fs::rename(&temp_path, &self.path).await?;
        tracing::debug!(path = %self.path.display(), entries = self.entries.len(), "Index snapshot saved");
        Ok(())
    }

    /// Return the top-`k` entries by cosine similarity, highest first.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchMatch>, IndexError> {
        if query.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let mut scored: Vec<(f32, &VectorEntry)> = self
            .entries
            .iter()
            .map(|entry| (cosine_similarity(query, &entry.vector), entry))
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(score, entry)| SearchMatch {
                id: entry.id.clone(),
                score,
                text: entry.metadata.text.clone(),
                source_filename: entry.metadata.source_filename.clone(),
            })
            .collect())
    }

    /// Number of entries currently indexed.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}
