//! Postings (`.pst`).
//!
//! The file lists every indexed field in name order. Under each field come its
//! terms in byte order, under each term the documents containing it, and under
//! each document the positions, offsets and payloads that were indexed:
//!
//! ```text
//! field body
//!   term fox
//!     doc 3
//!       freq 1
//!       pos 2
//!       startOffset 10
//!       endOffset 13
//! END
//! checksum 00000000001234567890
//! ```
//!
//! There are no skip lists and no term index on disk. The reader builds a
//! field table when it opens the file and an FST term dictionary per field on
//! first access.

pub mod reader;
pub mod writer;

use std::fmt::Debug;

pub use reader::{PostingsReader, SeekStatus, Terms, TermsEnum};
pub use writer::PostingsWriter;

use crate::error::Result;

pub(crate) const END: &str = crate::codec::line::END;
pub(crate) const FIELD: &str = "field ";
pub(crate) const TERM: &str = "  term ";
pub(crate) const DOC: &str = "    doc ";
pub(crate) const FREQ: &str = "      freq ";
pub(crate) const POS: &str = "      pos ";
pub(crate) const START_OFFSET: &str = "      startOffset ";
pub(crate) const END_OFFSET: &str = "      endOffset ";
pub(crate) const PAYLOAD: &str = "        payload ";

/// Iterates the documents of one term in increasing doc id order.
///
/// A fresh enumerator is unpositioned (`doc_id() == -1`); once exhausted it
/// returns [`NO_MORE_DOCS`](crate::codec::NO_MORE_DOCS).
pub trait DocsEnum: Send + Debug {
    /// The current document, -1 before the first call to `next_doc`.
    fn doc_id(&self) -> i32;

    /// Advance to the next live document.
    fn next_doc(&mut self) -> Result<i32>;

    /// Advance to the first live document at or after `target`.
    fn advance(&mut self, target: i32) -> Result<i32> {
        loop {
            let doc = self.next_doc()?;
            if doc >= target {
                return Ok(doc);
            }
        }
    }

    /// Term frequency in the current document; 1 when frequencies were not
    /// indexed or not requested.
    fn freq(&self) -> i32;

    /// Upper bound on the number of documents this enumerator visits.
    fn cost(&self) -> i64;
}

/// A [`DocsEnum`] that also exposes positions, offsets and payloads.
pub trait DocsAndPositionsEnum: DocsEnum {
    /// Read the next position of the current document. Must be called at most
    /// `freq()` times per document.
    fn next_position(&mut self) -> Result<i32>;

    /// Start offset of the current position, -1 if offsets were not indexed.
    fn start_offset(&self) -> i32;

    /// End offset of the current position, -1 if offsets were not indexed.
    fn end_offset(&self) -> i32;

    /// Payload of the current position.
    fn payload(&self) -> Option<&[u8]>;
}
