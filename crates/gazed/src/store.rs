//! Identity store: an in-memory collection with an injected persistence
//! backend.
//!
//! Every mutation rewrites the whole backing collection. That is O(total
//! data) per write and only acceptable while the identity count stays small
//! (a handful to low hundreds). Durability is best-effort: persist failures
//! are logged and the in-memory state keeps the mutation.

use gaze_core::IdentityRecord;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Durable storage for the identity collection.
///
/// Backends persist the whole collection at once; there is no incremental
/// update.
pub trait StorageBackend: Send + Sync {
    fn load(&self) -> Result<Vec<IdentityRecord>, StoreError>;
    fn save(&self, records: &[IdentityRecord]) -> Result<(), StoreError>;
}

/// Whole-collection JSON file backend.
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl StorageBackend for JsonFileBackend {
    fn load(&self) -> Result<Vec<IdentityRecord>, StoreError> {
        let bytes = std::fs::read(&self.path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn save(&self, records: &[IdentityRecord]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_vec(records)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

/// In-memory identity collection in insertion order, persisted through a
/// [`StorageBackend`] on every mutation.
pub struct FaceStore {
    records: Vec<IdentityRecord>,
    backend: Box<dyn StorageBackend>,
}

impl FaceStore {
    /// Load the persisted collection. Missing or corrupt storage yields an
    /// empty store; startup never fails on bad data.
    pub fn open(backend: Box<dyn StorageBackend>) -> Self {
        let records = match backend.load() {
            Ok(records) => {
                tracing::info!(count = records.len(), "loaded identities from storage");
                records
            }
            Err(StoreError::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("no persisted identities found, starting empty");
                Vec::new()
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to load identities, starting empty");
                Vec::new()
            }
        };
        Self { records, backend }
    }

    /// All records in insertion order (insertion order = registration order).
    pub fn records(&self) -> &[IdentityRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Add one record, then persist.
    pub fn append(&mut self, record: IdentityRecord) {
        self.records.push(record);
        self.persist();
    }

    /// Remove the record with the given id, then persist.
    ///
    /// Idempotent: an absent id is a successful no-op. Returns whether a
    /// record was actually removed.
    pub fn delete(&mut self, id: &str) -> bool {
        let before = self.records.len();
        self.records.retain(|r| r.id != id);
        let removed = self.records.len() != before;
        self.persist();
        removed
    }

    /// Remove every record, then persist.
    pub fn clear(&mut self) {
        self.records.clear();
        self.persist();
    }

    /// Best-effort persist: failures are logged, never propagated. The
    /// in-memory state already reflects the mutation.
    fn persist(&self) {
        if let Err(err) = self.backend.save(&self.records) {
            tracing::error!(error = %err, "failed to persist identity store");
        }
    }
}

/// In-memory backend for tests.
#[cfg(test)]
#[derive(Default)]
pub(crate) struct MemoryBackend {
    records: std::sync::Mutex<Vec<IdentityRecord>>,
}

#[cfg(test)]
impl StorageBackend for MemoryBackend {
    fn load(&self) -> Result<Vec<IdentityRecord>, StoreError> {
        Ok(self.records.lock().unwrap().clone())
    }

    fn save(&self, records: &[IdentityRecord]) -> Result<(), StoreError> {
        *self.records.lock().unwrap() = records.to_vec();
        Ok(())
    }
}
