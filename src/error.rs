//! Error types for the Xiphos library.
//!
//! All fallible operations return [`Result`], whose error side is the
//! [`XiphosError`] enum. Codec readers report damaged files through
//! [`XiphosError::Corruption`]; writers report broken call sequences through
//! [`XiphosError::Invariant`].
//!
//! # Examples
//!
//! ```
//! use xiphos::error::{Result, XiphosError};
//!
//! fn example_operation() -> Result<()> {
//!     Err(XiphosError::invalid_argument("Invalid input"))
//! }
//!
//! assert!(example_operation().is_err());
//! ```

use std::io;

use thiserror::Error;

/// The main error type for Xiphos operations.
#[derive(Error, Debug)]
pub enum XiphosError {
    /// I/O errors (file operations, network, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A codec file failed validation: checksum mismatch, trailing bytes,
    /// unexpected line prefix, unparseable number or unknown type tag.
    #[error("Corrupt index: {0}")]
    Corruption(String),

    /// A writer was driven in a way that would produce an invalid file.
    #[error("Invariant violated: {0}")]
    Invariant(String),

    /// Index-related errors
    #[error("Index error: {0}")]
    Index(String),

    /// Schema-related errors (field infos)
    #[error("Schema error: {0}")]
    Schema(String),

    /// Query-related errors
    #[error("Query error: {0}")]
    Query(String),

    /// Storage-related errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Field-related errors
    #[error("Field error: {0}")]
    Field(String),

    /// Function value evaluation errors
    #[error("Function error: {0}")]
    Function(String),

    /// The requested operation is not supported by this configuration
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// Invalid argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error for other cases
    #[error("Error: {0}")]
    Other(String),
}

/// Result type alias for operations that may fail with XiphosError.
pub type Result<T> = std::result::Result<T, XiphosError>;

impl XiphosError {
    /// Create a new corruption error for the given resource.
    pub fn corruption<S: Into<String>>(msg: S, resource: &str) -> Self {
        XiphosError::Corruption(format!("{} (resource={resource})", msg.into()))
    }

    /// Create a new invariant violation error.
    pub fn invariant<S: Into<String>>(msg: S) -> Self {
        XiphosError::Invariant(msg.into())
    }

    /// Create a new index error.
    pub fn index<S: Into<String>>(msg: S) -> Self {
        XiphosError::Index(msg.into())
    }

    /// Create a new schema error.
    pub fn schema<S: Into<String>>(msg: S) -> Self {
        XiphosError::Schema(msg.into())
    }

    /// Create a new query error.
    pub fn query<S: Into<String>>(msg: S) -> Self {
        XiphosError::Query(msg.into())
    }

    /// Create a new storage error.
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        XiphosError::Storage(msg.into())
    }

    /// Create a new field error.
    pub fn field<S: Into<String>>(msg: S) -> Self {
        XiphosError::Field(msg.into())
    }

    /// Create a new function evaluation error.
    pub fn function<S: Into<String>>(msg: S) -> Self {
        XiphosError::Function(msg.into())
    }

    /// Create a new unsupported operation error.
    pub fn unsupported<S: Into<String>>(msg: S) -> Self {
        XiphosError::Unsupported(msg.into())
    }

    /// Create a new invalid argument error.
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        XiphosError::InvalidArgument(msg.into())
    }

    /// Create a new generic error.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        XiphosError::Other(msg.into())
    }

    /// Whether this error reports a damaged index file.
    pub fn is_corruption(&self) -> bool {
        matches!(self, XiphosError::Corruption(_))
    }
}
