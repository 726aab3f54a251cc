//! # Xiphos
//!
//! A single-segment search engine core with a plain-text segment codec.
//!
//! ## Features
//!
//! - Human-readable, line-oriented index files with CRC32 footers
//! - Postings, stored fields, term vectors, doc values, norms and live docs
//! - FST-backed term dictionaries built lazily per field
//! - Function queries composed from value sources
//! - Pluggable storage backends

pub mod analysis;
pub mod codec;
pub mod error;
pub mod index;
pub mod search;
pub mod storage;
pub mod util;

pub mod prelude {
    pub use crate::analysis::{Analyzer, Token, WhitespaceAnalyzer};
    pub use crate::error::{Result, XiphosError};
    pub use crate::index::document::{Document, Field};
    pub use crate::index::reader::{IndexReader, LeafReader, SegmentReader};
    pub use crate::index::writer::{SegmentWriter, SegmentWriterConfig};
    pub use crate::search::searcher::IndexSearcher;
    pub use crate::storage::{MemoryStorage, Storage, StorageConfig, StorageFactory};
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
