//! Doc values (`.dat`) and norms (`.len`).
//!
//! Each field is a header followed by one fixed-width record per document, so
//! a value is found by offset arithmetic instead of scanning. Numeric records
//! store the delta from the column minimum, zero-padded to a common width.
//! Binary and sorted records store raw bytes padded with spaces. Sorted and
//! sorted-set fields store their dictionary of unique values first and then
//! one ordinal record per document.
//!
//! Norms use the same format with numeric fields only, written to a separate
//! file with the `len` extension.

pub mod reader;
pub mod writer;

use std::fmt::Debug;

pub use reader::DocValuesReader;
pub use writer::DocValuesWriter;

use crate::codec::field_infos::FieldInfo;
use crate::codec::{NORMS_EXTENSION, SegmentReadState, SegmentWriteState};
use crate::error::Result;

pub(crate) const END: &str = crate::codec::line::END;
pub(crate) const FIELD: &str = "field ";
pub(crate) const TYPE: &str = "  type ";
pub(crate) const MINVALUE: &str = "  minvalue ";
pub(crate) const PATTERN: &str = "  pattern ";
pub(crate) const LENGTH: &str = "length ";
pub(crate) const MAXLENGTH: &str = "  maxlength ";
pub(crate) const NUMVALUES: &str = "  numvalues ";
pub(crate) const ORDPATTERN: &str = "  ordpattern ";

/// Marker of a document that has a value.
pub(crate) const HAS_VALUE: u8 = b'T';
/// Marker of a document without a value.
pub(crate) const MISSING: u8 = b'F';

/// Length of the `T`/`F` line that closes numeric and binary records.
const FLAG_LINE_LEN: usize = 2;
const NEWLINE_LEN: usize = 1;

/// Width of a numeric record: padded delta line plus flag line.
pub(crate) fn numeric_record_width(pattern_len: usize) -> u64 {
    (pattern_len + NEWLINE_LEN + FLAG_LINE_LEN) as u64
}

/// Width of a dictionary entry: length line plus padded bytes line.
pub(crate) fn dictionary_record_width(pattern_len: usize, max_length: usize) -> u64 {
    (LENGTH.len() + pattern_len + NEWLINE_LEN + max_length + NEWLINE_LEN) as u64
}

/// Width of a binary record: a dictionary-style entry plus flag line.
pub(crate) fn binary_record_width(pattern_len: usize, max_length: usize) -> u64 {
    dictionary_record_width(pattern_len, max_length) + FLAG_LINE_LEN as u64
}

/// Width of a per-document ordinal record.
pub(crate) fn ord_record_width(ord_pattern_len: usize) -> u64 {
    (ord_pattern_len + NEWLINE_LEN) as u64
}

/// Per-document numeric values.
pub trait NumericDocValues: Send + Debug {
    /// The value of `doc`, 0 for documents without a value.
    fn get(&mut self, doc: i32) -> Result<i64>;
}

/// Per-document byte values.
pub trait BinaryDocValues: Send + Debug {
    /// The value of `doc`, empty for documents without a value.
    fn get(&mut self, doc: i32) -> Result<Vec<u8>>;
}

/// A single value per document, deduplicated into a sorted dictionary.
pub trait SortedDocValues: Send + Debug {
    /// The ordinal of `doc`'s value, -1 when the document has none.
    fn ord(&mut self, doc: i32) -> Result<i32>;

    /// The value with ordinal `ord`.
    fn lookup_ord(&mut self, ord: i32) -> Result<Vec<u8>>;

    /// Number of unique values.
    fn value_count(&self) -> i32;

    /// The value of `doc`, `None` when the document has none.
    fn get(&mut self, doc: i32) -> Result<Option<Vec<u8>>> {
        let ord = self.ord(doc)?;
        if ord < 0 {
            Ok(None)
        } else {
            self.lookup_ord(ord).map(Some)
        }
    }

    /// The ordinal of `key` if present, otherwise `-(insertion point) - 1`.
    fn lookup_term(&mut self, key: &[u8]) -> Result<i32> {
        let mut low = 0;
        let mut high = self.value_count() - 1;
        while low <= high {
            let mid = low + (high - low) / 2;
            let term = self.lookup_ord(mid)?;
            match term.as_slice().cmp(key) {
                std::cmp::Ordering::Less => low = mid + 1,
                std::cmp::Ordering::Greater => high = mid - 1,
                std::cmp::Ordering::Equal => return Ok(mid),
            }
        }
        Ok(-(low + 1))
    }
}

/// Any number of values per document, deduplicated into a sorted dictionary.
pub trait SortedSetDocValues: Send + Debug {
    /// The ordinals of `doc`'s values in increasing order.
    fn ords(&mut self, doc: i32) -> Result<Vec<i64>>;

    /// The value with ordinal `ord`.
    fn lookup_ord(&mut self, ord: i64) -> Result<Vec<u8>>;

    /// Number of unique values.
    fn value_count(&self) -> i64;

    /// The ordinal of `key` if present, otherwise `-(insertion point) - 1`.
    fn lookup_term(&mut self, key: &[u8]) -> Result<i64> {
        let mut low = 0;
        let mut high = self.value_count() - 1;
        while low <= high {
            let mid = low + (high - low) / 2;
            let term = self.lookup_ord(mid)?;
            match term.as_slice().cmp(key) {
                std::cmp::Ordering::Less => low = mid + 1,
                std::cmp::Ordering::Greater => high = mid - 1,
                std::cmp::Ordering::Equal => return Ok(mid),
            }
        }
        Ok(-(low + 1))
    }
}

/// Whether a document has a value for a field.
pub trait DocsWithField: Send + Debug {
    fn has_value(&mut self, doc: i32) -> Result<bool>;
}

/// Writes norms: one numeric column per field with norms.
#[derive(Debug)]
pub struct NormsWriter {
    inner: DocValuesWriter,
}

impl NormsWriter {
    pub fn new(state: &SegmentWriteState) -> Result<Self> {
        Ok(NormsWriter {
            inner: DocValuesWriter::new(state, NORMS_EXTENSION)?,
        })
    }

    pub fn file_name(&self) -> &str {
        self.inner.file_name()
    }

    /// Write the norm of every document for `field`.
    pub fn add_norms_field(&mut self, field: &FieldInfo, norms: &[i64]) -> Result<()> {
        let values: Vec<Option<i64>> = norms.iter().copied().map(Some).collect();
        self.inner.add_numeric_field(field, &values)
    }

    pub fn finish(self) -> Result<()> {
        self.inner.finish()
    }

    pub fn abort(self) {
        self.inner.abort()
    }
}

/// Reads norms written by [`NormsWriter`].
#[derive(Debug)]
pub struct NormsReader {
    inner: DocValuesReader,
}

impl NormsReader {
    pub fn open(state: &SegmentReadState) -> Result<Self> {
        Ok(NormsReader {
            inner: DocValuesReader::open(state, NORMS_EXTENSION)?,
        })
    }

    pub fn norms(&self, field: &str) -> Result<Box<dyn NumericDocValues>> {
        self.inner.numeric(field)
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.inner.has_field(field)
    }

    pub fn check_integrity(&self) -> Result<()> {
        self.inner.check_integrity()
    }
}
