//! JSON manifest of processed documents.
//!
//! The manifest is the dedup ledger: one record per ingested file, keyed by the SHA-256
//! content hash. It is rewritten in full on every insert, which is acceptable at the scale
//! this server targets. Records are never mutated or deleted.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Errors raised while reading or writing the manifest file.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// Filesystem interaction failed.
    #[error("manifest I/O failed: {0}")]
    Io(#[from] std::io::Error),
    /// Records could not be serialized to JSON.
    #[error("failed to serialize manifest: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// One processed document, keyed by content hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestRecord {
    /// Stored filename, possibly timestamp-suffixed on collision.
    pub filename: String,
    /// SHA-256 content hash, lowercase hex.
    pub hash: String,
    /// RFC 3339 timestamp recorded at ingestion.
    pub processed_at: String,
    /// Path of the stored file inside the processed directory.
    pub path: String,
}

/// In-memory view of the manifest file.
pub struct Manifest {
    path: PathBuf,
    records: Vec<ManifestRecord>,
}

impl Manifest {
    /// Load the manifest from disk.
    ///
    /// A missing file yields an empty manifest; an unreadable or malformed file is logged
    /// and also treated as empty, matching the append-only recovery behavior of the
    /// original index file.
    pub async fn load(path: &Path) -> Result<Self, ManifestError> {
        let records = match tokio::fs::read_to_string(path).await {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(records) => records,
                Err(error) => {
                    tracing::warn!(path = %path.display(), error = %error, "Manifest unreadable; starting empty");
                    Vec::new()
                }
            },
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(error) => return Err(ManifestError::Io(error)),
        };

        Ok(Self {
            path: path.to_path_buf(),
            records,
        })
    }

    /// Look up a record by content hash.
    pub fn find_by_hash(&self, hash: &str) -> Option<&ManifestRecord> {
        self.records.iter().find(|record| record.hash == hash)
    }

    /// Number of records currently held.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the manifest holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Append a record and rewrite the manifest file.
    pub async fn append(&mut self, record: ManifestRecord) -> Result<(), ManifestError> {
        self.records.push(record);
        self.save().await
    }

    /// Records sorted by `processed_at` descending (most recent first).
    pub fn sorted_desc(&self) -> Vec<ManifestRecord> {
        let mut records = self.records.clone();
        records.sort_by(|a, b| b.processed_at.cmp(&a.processed_at));
        records
    }

    async fn save(&self) -> Result<(), ManifestError> {
        let raw = serde_json::to_string_pretty(&self.records)?;
        tokio::fs::write(&self.path, raw).await?;
        tracing::debug!(path = %self.path.display(), records = self.records.len(), "Manifest saved");
        Ok(())
    }
}

/// Current timestamp formatted for manifest storage.
pub fn current_timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}
