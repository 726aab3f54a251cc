//! Storage abstraction layer.
//!
//! Codecs address files by name through the [`Storage`] trait. Two backends
//! are provided: [`FileStorage`] for a directory on disk and [`MemoryStorage`]
//! for tests and temporary indexes.

pub mod file;
pub mod memory;
pub mod traits;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use file::{FileStorage, FileStorageConfig};
pub use memory::{MemoryStorage, MemoryStorageConfig};
pub use traits::{SharedInput, Storage, StorageError, StorageInput, StorageOutput};

use crate::error::Result;

/// Configuration selecting a storage backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StorageConfig {
    /// Files in a directory on the local file system.
    File(FileStorageConfig),
    /// Files held in memory.
    Memory(MemoryStorageConfig),
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Memory(MemoryStorageConfig::default())
    }
}

/// Creates storage backends from configuration.
pub struct StorageFactory;

impl StorageFactory {
    /// Create a storage backend for `config`.
    pub fn create(config: StorageConfig) -> Result<Arc<dyn Storage>> {
        match config {
            StorageConfig::File(file_config) => {
                log::debug!("opening file storage at {}", file_config.path.display());
                Ok(Arc::new(FileStorage::new(file_config)?))
            }
            StorageConfig::Memory(memory_config) => Ok(Arc::new(MemoryStorage::new(memory_config))),
        }
    }

    /// Create a storage backend from a JSON configuration document.
    pub fn from_json(json: &str) -> Result<Arc<dyn Storage>> {
        let config: StorageConfig = serde_json::from_str(json)?;
        Self::create(config)
    }
}
