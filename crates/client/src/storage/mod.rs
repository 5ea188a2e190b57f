//! Persistent key-value storage.
//!
//! The cart and the identity session are mirrored into a small string-keyed
//! store. Callers depend on the [`KeyValueStore`] trait only; which backend
//! they get is decided once, by [`open`], when the application is composed.
//!
//! # Backends
//!
//! - [`FileStore`] - one JSON file per key under the platform data directory
//! - [`MemoryStore`] - process-local map, used when the file store cannot be
//!   opened and in tests

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

/// Errors returned by a [`KeyValueStore`].
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem operation failed.
    #[error("I/O error on key {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    /// Key contains characters the backend cannot represent.
    #[error("invalid storage key: {0:?}")]
    InvalidKey(String),

    /// Backend could not be opened.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Asynchronous string-keyed storage.
///
/// Every operation may fail. Implementations must apply sequential calls from
/// one caller in order.
#[async_trait]
pub trait KeyValueStore: Send + Sync + 'static {
    /// Read the value stored under `key`, or `None` if absent.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: String) -> Result<(), StorageError>;

    /// Delete `key`. Removing an absent key succeeds.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Which storage backend to compose the application with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    /// Files under the given directory.
    File(PathBuf),
    /// Process-local memory; nothing survives a restart.
    Memory,
}

/// Open the configured backend.
///
/// A file store that cannot be opened degrades to a [`MemoryStore`] with a
/// warning: the cart keeps working for this session, it just won't survive a
/// restart.
pub async fn open(backend: &StorageBackend) -> Arc<dyn KeyValueStore> {
    match backend {
        StorageBackend::File(dir) => match FileStore::open(dir).await {
            Ok(store) => {
                tracing::info!(dir = %dir.display(), "Using file storage");
                Arc::new(store)
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    dir = %dir.display(),
                    "File storage not available, using in-memory storage"
                );
                Arc::new(MemoryStore::new())
            }
        },
        StorageBackend::Memory => {
            tracing::info!("Using in-memory storage");
            Arc::new(MemoryStore::new())
        }
    }
}

/// Reject keys that could escape the storage namespace.
pub(crate) fn validate_key(key: &str) -> Result<(), StorageError> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        && !key.starts_with('.');
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidKey(key.to_string()))
    }
}
