use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;

use crate::embedding::{EmbedError, Embedder};

use super::index::FlatIndex;
use super::sqlite::Database;
use super::{
    AddOutcome, DocumentRecord, SearchResult, SourceType, StoreStats, VectorStoreError,
    content_hash,
};

/// Records, index and hash set, mutated only as a unit.
struct StoreState {
    db: Database,
    records: Vec<DocumentRecord>,
    index: FlatIndex,
    hashes: HashSet<String>,
}

impl StoreState {
    fn load(db: Database, dimension: usize) -> Result<Self, VectorStoreError> {
        let snapshot = db.load(dimension)?;
        let mut index = FlatIndex::new(dimension);
        for vector in &snapshot.vectors {
            index.add(vector)?;
        }
        let hashes = snapshot
            .records
            .iter()
            .map(|r| r.content_hash.clone())
            .collect();
        Ok(Self {
            db,
            records: snapshot.records,
            index,
            hashes,
        })
    }
}

/// Deduplicated, persistent, similarity-ranked document store.
///
/// Position `i` of the index always holds the embedding of `records[i]`.
/// A single async mutex serializes adds with each other and with searches,
/// so no reader can observe a half-applied append.
pub struct VectorStore {
    embedder: Arc<dyn Embedder>,
    dimension: usize,
    state: Mutex<StoreState>,
}

impl VectorStore {
    /// Open (or create) a store backed by the SQLite file at `path`.
    pub fn open(
        path: &Path,
        embedder: Arc<dyn Embedder>,
        dimension: usize,
    ) -> Result<Self, VectorStoreError> {
        Self::with_database(Database::open(path)?, embedder, dimension)
    }

    /// Open a store backed by an in-memory database (for testing).
    pub fn open_in_memory(
        embedder: Arc<dyn Embedder>,
        dimension: usize,
    ) -> Result<Self, VectorStoreError> {
        Self::with_database(Database::open_in_memory()?, embedder, dimension)
    }

    fn with_database(
        db: Database,
        embedder: Arc<dyn Embedder>,
        dimension: usize,
    ) -> Result<Self, VectorStoreError> {
        if dimension == 0 {
            return Err(VectorStoreError::InvalidDimension);
        }
        db.check_model(embedder.model_name(), dimension)?;
        let state = StoreState::load(db, dimension)?;
        log::info!(
            "vector store ready: {} documents, {}d, embedder {}/{}",
            state.records.len(),
            dimension,
            embedder.provider_type(),
            embedder.model_name()
        );
        Ok(Self {
            embedder,
            dimension,
            state: Mutex::new(state),
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Store `text` unless identical text is already present.
    ///
    /// The embedder runs without the state lock held. The write reaches disk
    /// before the in-memory state changes, so a failure at any step leaves
    /// the store exactly as it was.
    pub async fn add_document(
        &self,
        text: &str,
        source_type: SourceType,
        timestamp: Option<&str>,
    ) -> Result<AddOutcome, VectorStoreError> {
        if text.is_empty() {
            return Err(VectorStoreError::EmptyText);
        }

        let hash = content_hash(text);
        if self.state.lock().await.hashes.contains(&hash) {
            log::debug!("skipping duplicate document {hash}");
            return Ok(AddOutcome::Skipped { hash });
        }

        let embedding = self.embed_one(text).await?;

        let mut state = self.state.lock().await;
        // The same text may have been added while embedding.
        if state.hashes.contains(&hash) {
            log::debug!("skipping duplicate document {hash}");
            return Ok(AddOutcome::Skipped { hash });
        }
        state.index.check_dimension(&embedding)?;

        let record = DocumentRecord {
            text: text.to_string(),
            source_type,
            timestamp: Some(
                timestamp
                    .map(str::to_string)
                    .unwrap_or_else(|| Utc::now().to_rfc3339()),
            ),
            content_hash: hash.clone(),
            sequence_index: state.records.len(),
        };
        state.db.append(&record, &embedding)?;

        let index = state.index.add(&embedding)?;
        debug_assert_eq!(index, record.sequence_index);
        state.hashes.insert(hash.clone());
        state.records.push(record);

        Ok(AddOutcome::Added {
            hash,
            index,
            document_length: text.chars().count(),
        })
    }

    /// Return up to `k` stored documents nearest to `query`, most similar first.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchResult>, VectorStoreError> {
        if self.state.lock().await.records.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let query_embedding = self.embed_one(query).await?;

        let state = self.state.lock().await;
        let limit = k.min(state.records.len());
        let hits = state.index.search(&query_embedding, limit)?;

        let mut results: Vec<SearchResult> = hits
            .into_iter()
            .filter_map(|hit| {
                state
                    .records
                    .get(hit.position)
                    .map(|record| SearchResult::from_record(record, hit.distance))
            })
            .collect();
        // Stable sort: equal scores keep their distance order.
        results.sort_by(|a, b| b.similarity_score.total_cmp(&a.similarity_score));
        Ok(results)
    }

    pub async fn get_stats(&self) -> StoreStats {
        let state = self.state.lock().await;
        let mut source_type_counts = BTreeMap::new();
        for record in &state.records {
            *source_type_counts.entry(record.source_type).or_insert(0) += 1;
        }
        StoreStats {
            total_documents: state.records.len(),
            index_size: state.index.len(),
            dimension: self.dimension,
            source_type_counts,
        }
    }

    /// Checkpoint the database so the main file holds the full state.
    pub async fn flush(&self) -> Result<(), VectorStoreError> {
        self.state.lock().await.db.checkpoint()
    }

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, VectorStoreError> {
        let vectors = self.embedder.embed(&[text]).await?;
        let vector = vectors
            .into_iter()
            .next()
            .ok_or_else(|| EmbedError::EncodingFailed("embedder returned no vectors".into()))?;
        if vector.len() != self.dimension {
            return Err(VectorStoreError::DimensionMismatch {
                expected: self.dimension,
                got: vector.len(),
            });
        }
        Ok(vector)
    }
}
