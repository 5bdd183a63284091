//! Persistent semantic memory: deduplicated documents, a flat L2 index over
//! their embeddings, and the SQLite file both are saved to.

pub mod index;
pub mod sqlite;
pub mod store;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::embedding::EmbedError;

pub use store::VectorStore;

/// Default number of results returned by [`VectorStore::search`].
pub const DEFAULT_SEARCH_LIMIT: usize = 5;

/// Errors that can occur during vector store operations.
#[derive(Debug, thiserror::Error)]
pub enum VectorStoreError {
    /// `add_document` was called with empty text.
    #[error("document text must not be empty")]
    EmptyText,
    /// The embedding provider failed.
    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbedError),
    /// Embedding dimension does not match the store's configured dimension.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
    /// The store was opened with a zero dimension.
    #[error("store dimension must be greater than 0")]
    InvalidDimension,
    /// A storage read or write failed (I/O, SQL, etc.).
    #[error("storage error: {0}")]
    Storage(String),
    /// The persisted index and record list disagree; the store cannot be used.
    #[error("index and records are inconsistent: {0}")]
    Consistency(String),
}

/// Where a stored document came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    News,
    Injury,
    Stats,
    Other,
}

impl SourceType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::News => "news",
            Self::Injury => "injury",
            Self::Stats => "stats",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "news" => Ok(Self::News),
            "injury" => Ok(Self::Injury),
            "stats" => Ok(Self::Stats),
            "other" => Ok(Self::Other),
            other => Err(format!("unknown source type '{other}'")),
        }
    }
}

/// A stored document. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub text: String,
    pub source_type: SourceType,
    /// RFC 3339 timestamp of publication, or of ingestion when none was given.
    pub timestamp: Option<String>,
    pub content_hash: String,
    /// Position of this record's vector in the index.
    pub sequence_index: usize,
}

/// A ranked match returned by [`VectorStore::search`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub text: String,
    pub source_type: SourceType,
    pub timestamp: Option<String>,
    /// Squared Euclidean distance to the query vector.
    pub distance: f32,
    /// `1 / (1 + distance)`, in (0, 1].
    pub similarity_score: f32,
}

impl SearchResult {
    fn from_record(record: &DocumentRecord, distance: f32) -> Self {
        Self {
            text: record.text.clone(),
            source_type: record.source_type,
            timestamp: record.timestamp.clone(),
            distance,
            similarity_score: similarity_from_distance(distance),
        }
    }
}

/// Result of [`VectorStore::add_document`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum AddOutcome {
    Added {
        hash: String,
        index: usize,
        document_length: usize,
    },
    /// Identical text is already stored.
    Skipped { hash: String },
}

impl AddOutcome {
    pub fn hash(&self) -> &str {
        match self {
            Self::Added { hash, .. } | Self::Skipped { hash } => hash,
        }
    }

    pub fn is_added(&self) -> bool {
        matches!(self, Self::Added { .. })
    }
}

/// Snapshot returned by [`VectorStore::get_stats`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreStats {
    pub total_documents: usize,
    pub index_size: usize,
    pub dimension: usize,
    pub source_type_counts: BTreeMap<SourceType, usize>,
}

/// Hex-encoded SHA-256 digest of the document text.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn similarity_from_distance(distance: f32) -> f32 {
    1.0 / (1.0 + distance)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_hash_is_stable_sha256_hex() {
        assert_eq!(
            content_hash("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(content_hash("abc").len(), 64);
        assert_ne!(content_hash("abc"), content_hash("abd"));
    }

    #[test]
    fn similarity_is_one_at_zero_distance_and_decreasing() {
        assert_eq!(similarity_from_distance(0.0), 1.0);
        assert!(similarity_from_distance(1.0) < similarity_from_distance(0.5));
        assert!(similarity_from_distance(1e9) > 0.0);
    }

    #[test]
    fn source_type_round_trips_through_str() {
        for ty in [SourceType::News, SourceType::Injury, SourceType::Stats, SourceType::Other] {
            assert_eq!(ty.as_str().parse::<SourceType>().unwrap(), ty);
        }
        assert!("gossip".parse::<SourceType>().is_err());
    }

    #[test]
    fn add_outcome_serializes_with_status_tag() {
        let skipped = AddOutcome::Skipped { hash: "h".into() };
        let json = serde_json::to_value(&skipped).unwrap();
        assert_eq!(json["status"], "skipped");
        assert_eq!(json["hash"], "h");
    }
}
