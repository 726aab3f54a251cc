//! Indexing and segment reading.

pub mod document;
pub mod field_cache;
pub mod reader;
pub mod writer;

pub use document::{Document, Field, FieldType, FieldValue};
pub use field_cache::{FieldCache, NumericKind};
pub use reader::{IndexReader, LeafReader, LeafReaderContext, SegmentReader};
pub use writer::{SegmentWriter, SegmentWriterConfig};
