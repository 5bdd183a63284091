use std::path::Path;

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};

use super::{DocumentRecord, SourceType, VectorStoreError};

/// Everything read back from disk when a store is opened.
pub struct Snapshot {
    pub records: Vec<DocumentRecord>,
    pub vectors: Vec<Vec<f32>>,
}

/// SQLite persistence for the vector store.
///
/// The `vectors` table is the index artifact (position → embedding blob) and
/// `documents` is the record artifact. Every append writes one row to each
/// inside a single transaction, so a reload always sees matching counts.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) the database at `path`.
    pub fn open(path: &Path) -> Result<Self, VectorStoreError> {
        let conn = Connection::open(path).map_err(|e| {
            VectorStoreError::Storage(format!("failed to open database '{}': {e}", path.display()))
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self, VectorStoreError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| VectorStoreError::Storage(format!("failed to open in-memory db: {e}")))?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), VectorStoreError> {
        self.conn
            .execute_batch(
                "
                PRAGMA journal_mode = WAL;

                CREATE TABLE IF NOT EXISTS store_meta (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS vectors (
                    position INTEGER PRIMARY KEY,
                    embedding BLOB NOT NULL
                );

                CREATE TABLE IF NOT EXISTS documents (
                    sequence_index INTEGER PRIMARY KEY,
                    text TEXT NOT NULL,
                    source_type TEXT NOT NULL,
                    timestamp TEXT,
                    content_hash TEXT NOT NULL UNIQUE,
                    created_at TEXT NOT NULL
                );
                ",
            )
            .map_err(|e| VectorStoreError::Storage(format!("migration failed: {e}")))
    }

    /// Pin the store to one embedding width, and warn when the model changes.
    ///
    /// A different dimension is fatal; a different model name with the same
    /// dimension only degrades search quality, so it is logged.
    pub fn check_model(&self, model_name: &str, dimension: usize) -> Result<(), VectorStoreError> {
        let stored_dimension = self.meta("dimension")?;
        match stored_dimension {
            Some(value) => {
                let got: usize = value.parse().map_err(|_| {
                    VectorStoreError::Storage(format!("invalid stored dimension '{value}'"))
                })?;
                if got != dimension {
                    return Err(VectorStoreError::DimensionMismatch {
                        expected: dimension,
                        got,
                    });
                }
            }
            None => self.set_meta("dimension", &dimension.to_string())?,
        }

        match self.meta("model_name")? {
            Some(stored) if stored != model_name => {
                log::warn!(
                    "vector store model mismatch: stored {stored}, current {model_name}; \
                     search quality will degrade until the store is rebuilt"
                );
            }
            Some(_) => {}
            None => self.set_meta("model_name", model_name)?,
        }
        Ok(())
    }

    fn meta(&self, key: &str) -> Result<Option<String>, VectorStoreError> {
        self.conn
            .query_row(
                "SELECT value FROM store_meta WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| VectorStoreError::Storage(format!("failed to read store metadata: {e}")))
    }

    fn set_meta(&self, key: &str, value: &str) -> Result<(), VectorStoreError> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO store_meta (key, value) VALUES (?1, ?2)",
                params![key, value],
            )
            .map_err(|e| VectorStoreError::Storage(format!("failed to write store metadata: {e}")))?;
        Ok(())
    }

    /// Load both artifacts and verify they describe the same sequence.
    pub fn load(&self, dimension: usize) -> Result<Snapshot, VectorStoreError> {
        let vectors = self.load_vectors(dimension)?;
        let records = self.load_records()?;

        if vectors.len() != records.len() {
            return Err(VectorStoreError::Consistency(format!(
                "index holds {} vectors but there are {} records",
                vectors.len(),
                records.len()
            )));
        }
        Ok(Snapshot { records, vectors })
    }

    fn load_vectors(&self, dimension: usize) -> Result<Vec<Vec<f32>>, VectorStoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT position, embedding FROM vectors ORDER BY position ASC")
            .map_err(|e| VectorStoreError::Storage(format!("failed to prepare vector load: {e}")))?;
        let rows = stmt
            .query_map([], |row| {
                let position: i64 = row.get(0)?;
                let blob: Vec<u8> = row.get(1)?;
                Ok((position, blob))
            })
            .map_err(|e| VectorStoreError::Storage(format!("vector load failed: {e}")))?;

        let mut vectors = Vec::new();
        for (expected, row) in rows.enumerate() {
            let (position, blob) =
                row.map_err(|e| VectorStoreError::Storage(format!("failed to read vector row: {e}")))?;
            if position != expected as i64 {
                return Err(VectorStoreError::Consistency(format!(
                    "index position {position} found where {expected} was expected"
                )));
            }
            if blob.len() % 4 != 0 {
                return Err(VectorStoreError::Consistency(format!(
                    "vector {position} blob is {} bytes, not a whole number of f32 values",
                    blob.len()
                )));
            }
            let vector = bytes_to_embedding(&blob);
            if vector.len() != dimension {
                return Err(VectorStoreError::Consistency(format!(
                    "vector {position} has {} dimensions, store uses {dimension}",
                    vector.len()
                )));
            }
            vectors.push(vector);
        }
        Ok(vectors)
    }

    fn load_records(&self) -> Result<Vec<DocumentRecord>, VectorStoreError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT sequence_index, text, source_type, timestamp, content_hash
                 FROM documents ORDER BY sequence_index ASC",
            )
            .map_err(|e| VectorStoreError::Storage(format!("failed to prepare record load: {e}")))?;
        let rows = stmt
            .query_map([], |row| {
                let sequence_index: i64 = row.get(0)?;
                let text: String = row.get(1)?;
                let source_type: String = row.get(2)?;
                let timestamp: Option<String> = row.get(3)?;
                let content_hash: String = row.get(4)?;
                Ok((sequence_index, text, source_type, timestamp, content_hash))
            })
            .map_err(|e| VectorStoreError::Storage(format!("record load failed: {e}")))?;

        let mut records = Vec::new();
        for (expected, row) in rows.enumerate() {
            let (sequence_index, text, source_type, timestamp, content_hash) =
                row.map_err(|e| VectorStoreError::Storage(format!("failed to read record row: {e}")))?;
            if sequence_index != expected as i64 {
                return Err(VectorStoreError::Consistency(format!(
                    "record sequence index {sequence_index} found where {expected} was expected"
                )));
            }
            let source_type: SourceType =
                source_type.parse().map_err(VectorStoreError::Consistency)?;
            records.push(DocumentRecord {
                text,
                source_type,
                timestamp,
                content_hash,
                sequence_index: expected,
            });
        }
        Ok(records)
    }

    /// Durably write one vector and its record together.
    pub fn append(&mut self, record: &DocumentRecord, embedding: &[f32]) -> Result<(), VectorStoreError> {
        let tx = self
            .conn
            .transaction()
            .map_err(|e| VectorStoreError::Storage(format!("failed to begin transaction: {e}")))?;

        tx.execute(
            "INSERT INTO vectors (position, embedding) VALUES (?1, ?2)",
            params![record.sequence_index as i64, embedding_to_bytes(embedding)],
        )
        .map_err(|e| VectorStoreError::Storage(format!("failed to store vector: {e}")))?;

        tx.execute(
            "INSERT INTO documents (sequence_index, text, source_type, timestamp, content_hash, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.sequence_index as i64,
                record.text,
                record.source_type.as_str(),
                record.timestamp,
                record.content_hash,
                Utc::now().to_rfc3339(),
            ],
        )
        .map_err(|e| VectorStoreError::Storage(format!("failed to store record: {e}")))?;

        tx.commit()
            .map_err(|e| VectorStoreError::Storage(format!("failed to commit: {e}")))
    }

    /// Fold the write-ahead log back into the main database file.
    pub fn checkpoint(&self) -> Result<(), VectorStoreError> {
        self.conn
            .execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")
            .map_err(|e| VectorStoreError::Storage(format!("checkpoint failed: {e}")))
    }
}

/// Encode a `Vec<f32>` as a little-endian byte blob.
fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for &v in embedding {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a little-endian byte blob back into `Vec<f32>`.
fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}
