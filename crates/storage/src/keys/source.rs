//! Sources that signing key material is loaded from at process start.
//!
//! # Usage
//!
//! ```no_run
//! use warden_storage::{FileKeySource, SigningKeySource};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let source = FileKeySource::new("/etc/warden/keys.json");
//! let records = source.load_keys().await?;
//! println!("loaded {} keys", records.len());
//! # Ok(())
//! # }
//! ```

use std::{path::PathBuf, sync::Arc};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::{
    error::{StorageError, StorageResult},
    keys::SigningKeyRecord,
};

/// Loads the full set of signing key records.
///
/// Called once at startup and again on explicit reload. Implementations
/// return every record they hold; validation (duplicate ids, more than one
/// active key, malformed material) happens in the key store.
#[async_trait]
pub trait SigningKeySource: Send + Sync {
    /// Returns every signing key record held by this source.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if the backing medium cannot be read or
    /// its content cannot be decoded.
    async fn load_keys(&self) -> StorageResult<Vec<SigningKeyRecord>>;
}

/// In-memory key source for tests and development.
#[derive(Debug, Default, Clone)]
pub struct MemoryKeySource {
    records: Arc<RwLock<Vec<SigningKeyRecord>>>,
}

impl MemoryKeySource {
    /// Creates an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a source holding the given records.
    #[must_use]
    pub fn with_records(records: Vec<SigningKeyRecord>) -> Self {
        Self { records: Arc::new(RwLock::new(records)) }
    }

    /// Appends a record.
    pub fn insert(&self, record: SigningKeyRecord) {
        self.records.write().push(record);
    }

    /// Replaces every record.
    pub fn replace(&self, records: Vec<SigningKeyRecord>) {
        *self.records.write() = records;
    }
}

#[async_trait]
impl SigningKeySource for MemoryKeySource {
    async fn load_keys(&self) -> StorageResult<Vec<SigningKeyRecord>> {
        Ok(self.records.read().clone())
    }
}

/// Key source reading a JSON array of [`SigningKeyRecord`] from disk.
#[derive(Debug, Clone)]
pub struct FileKeySource {
    path: PathBuf,
}

impl FileKeySource {
    /// Creates a source for the JSON document at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the path this source reads.
    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

#[async_trait]
impl SigningKeySource for FileKeySource {
    #[tracing::instrument(skip(self), fields(path = %self.path.display()))]
    async fn load_keys(&self) -> StorageResult<Vec<SigningKeyRecord>> {
        let bytes = tokio::fs::read(&self.path).await.map_err(|e| {
            StorageError::internal_with_source(
                format!("reading key file {}", self.path.display()),
                e,
            )
        })?;

        let records: Vec<SigningKeyRecord> = serde_json::from_slice(&bytes).map_err(|e| {
            StorageError::serialization_with_source(
                format!("decoding key file {}", self.path.display()),
                e,
            )
        })?;

        tracing::debug!(count = records.len(), "loaded signing key records");
        Ok(records)
    }
}
