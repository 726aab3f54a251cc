//! Storage abstraction trait and common types.

use std::fmt;
use std::io::{Read, Seek, Write};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Result, XiphosError};

/// A trait for storage backends that can store and retrieve index files.
///
/// Codecs only ever see this interface: they open inputs, create outputs and
/// delete files by name. Checksums are computed by the codec layer on top of
/// the raw streams.
pub trait Storage: Send + Sync + fmt::Debug {
    /// Open a file for reading.
    fn open_input(&self, name: &str) -> Result<Box<dyn StorageInput>>;

    /// Create a file for writing, truncating any existing file.
    fn create_output(&self, name: &str) -> Result<Box<dyn StorageOutput>>;

    /// Check if a file exists.
    fn file_exists(&self, name: &str) -> bool;

    /// Delete a file. Deleting a missing file is not an error.
    fn delete_file(&self, name: &str) -> Result<()>;

    /// List all files in the storage, sorted by name.
    fn list_files(&self) -> Result<Vec<String>>;

    /// Get the size of a file in bytes.
    fn file_size(&self, name: &str) -> Result<u64>;

    /// Rename a file.
    fn rename_file(&self, old_name: &str, new_name: &str) -> Result<()>;

    /// Sync all pending writes to storage.
    fn sync(&self) -> Result<()>;
}

/// A trait for reading data from storage.
pub trait StorageInput: Read + Seek + Send + fmt::Debug {
    /// Get the size of the input stream.
    fn size(&self) -> Result<u64>;

    /// Open an independent handle on the same file, positioned at the start.
    fn clone_input(&self) -> Result<Box<dyn StorageInput>>;
}

/// A trait for writing data to storage.
pub trait StorageOutput: Write + Send + fmt::Debug {
    /// Flush and sync the output to storage.
    fn flush_and_sync(&mut self) -> Result<()>;

    /// Get the number of bytes written so far.
    fn position(&self) -> u64;

    /// Close the output stream, publishing the file.
    fn close(&mut self) -> Result<()>;
}

/// An input shared between a reader and the enumerators it hands out.
///
/// Seeking is not safe on a shared handle, so the shared input is never read
/// directly: every consumer calls [`SharedInput::clone_input`] and owns the
/// resulting cursor.
#[derive(Clone)]
pub struct SharedInput {
    name: Arc<str>,
    size: u64,
    inner: Arc<Mutex<Box<dyn StorageInput>>>,
}

impl SharedInput {
    /// Open `name` from `storage` as a shared input.
    pub fn open(storage: &dyn Storage, name: &str) -> Result<Self> {
        let input = storage.open_input(name)?;
        let size = input.size()?;
        Ok(SharedInput {
            name: Arc::from(name),
            size,
            inner: Arc::new(Mutex::new(input)),
        })
    }

    /// The file name this input was opened from.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The length of the file in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Clone a private cursor over the file.
    pub fn clone_input(&self) -> Result<Box<dyn StorageInput>> {
        self.inner.lock().clone_input()
    }
}

impl fmt::Debug for SharedInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedInput")
            .field("name", &self.name)
            .field("size", &self.size)
            .finish()
    }
}

/// Error types specific to storage operations.
#[derive(Debug, Clone)]
pub enum StorageError {
    /// File not found.
    FileNotFound(String),

    /// Permission denied.
    PermissionDenied(String),

    /// I/O error.
    IoError(String),

    /// Storage is closed.
    StorageClosed,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::FileNotFound(name) => write!(f, "File not found: {name}"),
            StorageError::PermissionDenied(name) => write!(f, "Permission denied: {name}"),
            StorageError::IoError(msg) => write!(f, "I/O error: {msg}"),
            StorageError::StorageClosed => write!(f, "Storage is closed"),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<StorageError> for XiphosError {
    fn from(err: StorageError) -> Self {
        XiphosError::storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_display() {
        let err = StorageError::FileNotFound("_0.pst".to_string());
        assert_eq!(err.to_string(), "File not found: _0.pst");

        let err = StorageError::PermissionDenied("_0.pst".to_string());
        assert_eq!(err.to_string(), "Permission denied: _0.pst");

        let err = StorageError::IoError("connection failed".to_string());
        assert_eq!(err.to_string(), "I/O error: connection failed");

        let err = StorageError::StorageClosed;
        assert_eq!(err.to_string(), "Storage is closed");
    }

    #[test]
    fn test_storage_error_converts_to_storage_variant() {
        let err: XiphosError = StorageError::FileNotFound("_0.si".to_string()).into();
        assert!(matches!(err, XiphosError::Storage(_)));
    }
}
