//! Postings writer.

use std::sync::Arc;

use ahash::AHashSet;

use crate::codec::field_infos::{FieldInfo, IndexOptions};
use crate::codec::line::{ChecksumOutput, write_checksum, write_line, write_line_bytes};
use crate::codec::postings::{DOC, END, END_OFFSET, FIELD, FREQ, PAYLOAD, POS, START_OFFSET, TERM};
use crate::codec::{POSTINGS_EXTENSION, SegmentWriteState};
use crate::error::{Result, XiphosError};
use crate::storage::Storage;

#[derive(Debug)]
struct FieldState {
    name: String,
    index_options: IndexOptions,
    last_term: Option<Vec<u8>>,
}

#[derive(Debug)]
struct TermState {
    term: Vec<u8>,
    wrote_term: bool,
    last_doc: i32,
}

#[derive(Debug)]
struct DocState {
    freq: i32,
    positions_seen: i32,
    last_position: i32,
    last_start_offset: i32,
}

/// Streams postings into a `.pst` file.
///
/// Calls must follow the nesting `start_field`, `start_term`, `start_doc`,
/// `add_position`*, `finish_doc`, `finish_term`, and finally `finish`. Terms
/// must arrive in byte order and documents in increasing order; violations
/// are reported as [`XiphosError::Invariant`].
#[derive(Debug)]
pub struct PostingsWriter {
    storage: Arc<dyn Storage>,
    file_name: String,
    out: Option<ChecksumOutput>,
    written_fields: AHashSet<String>,
    field: Option<FieldState>,
    term: Option<TermState>,
    doc: Option<DocState>,
}

impl PostingsWriter {
    /// Create `<segment>.pst`.
    pub fn new(state: &SegmentWriteState) -> Result<Self> {
        let file_name = state.file_name(POSTINGS_EXTENSION);
        let output = state.storage.create_output(&file_name)?;
        Ok(PostingsWriter {
            storage: Arc::clone(&state.storage),
            out: Some(ChecksumOutput::new(output, file_name.clone())),
            file_name,
            written_fields: AHashSet::new(),
            field: None,
            term: None,
            doc: None,
        })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    fn out(&mut self) -> Result<&mut ChecksumOutput> {
        self.out
            .as_mut()
            .ok_or_else(|| XiphosError::invariant("postings writer already closed"))
    }

    /// Begin the postings of an indexed field.
    pub fn start_field(&mut self, field: &FieldInfo) -> Result<()> {
        if self.term.is_some() {
            return Err(XiphosError::invariant("previous term was not finished"));
        }
        let index_options = field.index_options.ok_or_else(|| {
            XiphosError::invariant(format!("field '{}' is not indexed", field.name))
        })?;
        if !self.written_fields.insert(field.name.clone()) {
            return Err(XiphosError::invariant(format!(
                "field '{}' was already written",
                field.name
            )));
        }

        write_line(self.out()?, FIELD, &field.name)?;
        self.field = Some(FieldState {
            name: field.name.clone(),
            index_options,
            last_term: None,
        });
        Ok(())
    }

    /// Begin a term of the current field. The term line is only written once
    /// the term receives its first document.
    pub fn start_term(&mut self, term: &[u8]) -> Result<()> {
        if self.term.is_some() {
            return Err(XiphosError::invariant("previous term was not finished"));
        }
        let field = self
            .field
            .as_mut()
            .ok_or_else(|| XiphosError::invariant("start_term called outside a field"))?;
        if let Some(last) = &field.last_term
            && term <= last.as_slice()
        {
            return Err(XiphosError::invariant(format!(
                "terms out of order in field '{}': '{}' after '{}'",
                field.name,
                String::from_utf8_lossy(term),
                String::from_utf8_lossy(last)
            )));
        }
        field.last_term = Some(term.to_vec());
        self.term = Some(TermState {
            term: term.to_vec(),
            wrote_term: false,
            last_doc: -1,
        });
        Ok(())
    }

    /// Begin a document of the current term. `freq` is ignored for fields
    /// indexed without frequencies.
    pub fn start_doc(&mut self, doc: i32, freq: i32) -> Result<()> {
        if self.doc.is_some() {
            return Err(XiphosError::invariant("previous document was not finished"));
        }
        let index_options = self
            .field
            .as_ref()
            .map(|f| f.index_options)
            .ok_or_else(|| XiphosError::invariant("start_doc called outside a field"))?;
        let mut term = self
            .term
            .take()
            .ok_or_else(|| XiphosError::invariant("start_doc called outside a term"))?;

        if doc < 0 || doc <= term.last_doc {
            let last = term.last_doc;
            self.term = Some(term);
            return Err(XiphosError::invariant(format!(
                "documents out of order: {doc} after {last}"
            )));
        }
        if index_options.has_freqs() && freq <= 0 {
            self.term = Some(term);
            return Err(XiphosError::invariant(format!(
                "document {doc} has non-positive frequency {freq}"
            )));
        }

        let out = self.out()?;
        if !term.wrote_term {
            write_line_bytes(out, TERM, &term.term)?;
            term.wrote_term = true;
        }
        write_line(out, DOC, doc)?;
        if index_options != IndexOptions::DocsOnly {
            write_line(out, FREQ, freq)?;
        }

        term.last_doc = doc;
        self.term = Some(term);
        self.doc = Some(DocState {
            freq,
            positions_seen: 0,
            last_position: 0,
            last_start_offset: 0,
        });
        Ok(())
    }

    /// Record one occurrence in the current document. Offsets are written
    /// only when the field indexes them; an empty payload is not written.
    pub fn add_position(
        &mut self,
        position: i32,
        payload: Option<&[u8]>,
        start_offset: i32,
        end_offset: i32,
    ) -> Result<()> {
        let index_options = self
            .field
            .as_ref()
            .map(|f| f.index_options)
            .ok_or_else(|| XiphosError::invariant("add_position called outside a field"))?;
        let doc = self
            .doc
            .as_mut()
            .ok_or_else(|| XiphosError::invariant("add_position called outside a document"))?;

        if !index_options.has_positions() {
            return Err(XiphosError::invariant(
                "positions added to a field that does not index them",
            ));
        }
        if position < doc.last_position {
            return Err(XiphosError::invariant(format!(
                "position {position} is before previous position {}",
                doc.last_position
            )));
        }
        if index_options.has_offsets() {
            if end_offset < start_offset {
                return Err(XiphosError::invariant(format!(
                    "end offset {end_offset} is before start offset {start_offset}"
                )));
            }
            if start_offset < doc.last_start_offset {
                return Err(XiphosError::invariant(format!(
                    "start offset {start_offset} is before previous start offset {}",
                    doc.last_start_offset
                )));
            }
        }
        doc.last_position = position;
        doc.positions_seen += 1;
        if index_options.has_offsets() {
            doc.last_start_offset = start_offset;
        }

        let out = self.out()?;
        write_line(out, POS, position)?;
        if index_options.has_offsets() {
            write_line(out, START_OFFSET, start_offset)?;
            write_line(out, END_OFFSET, end_offset)?;
        }
        if let Some(payload) = payload
            && !payload.is_empty()
        {
            write_line_bytes(out, PAYLOAD, payload)?;
        }
        Ok(())
    }

    pub fn finish_doc(&mut self) -> Result<()> {
        let index_options = self.field.as_ref().map(|f| f.index_options);
        let doc = self
            .doc
            .take()
            .ok_or_else(|| XiphosError::invariant("finish_doc called outside a document"))?;
        if index_options.is_some_and(IndexOptions::has_positions) && doc.positions_seen != doc.freq {
            return Err(XiphosError::invariant(format!(
                "document declared frequency {} but added {} positions",
                doc.freq, doc.positions_seen
            )));
        }
        Ok(())
    }

    /// Finish the current term. A term that received no documents leaves no
    /// trace in the file.
    pub fn finish_term(&mut self) -> Result<()> {
        if self.doc.is_some() {
            return Err(XiphosError::invariant("finish_term called inside a document"));
        }
        self.term
            .take()
            .map(|_| ())
            .ok_or_else(|| XiphosError::invariant("finish_term called outside a term"))
    }

    /// Write the end marker and checksum, and close the file.
    pub fn finish(mut self) -> Result<()> {
        if self.term.is_some() || self.doc.is_some() {
            return Err(XiphosError::invariant("postings writer finished mid-term"));
        }
        let mut out = self
            .out
            .take()
            .ok_or_else(|| XiphosError::invariant("postings writer already closed"))?;
        write_line(&mut out, END, "")?;
        write_checksum(&mut out)?;
        out.close()
    }

    /// Drop the partial output and delete the file.
    pub fn abort(mut self) {
        self.out.take();
        if let Err(e) = self.storage.delete_file(&self.file_name) {
            log::warn!("failed to delete {} on abort: {e}", self.file_name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::field_infos::FieldInfos;
    use crate::storage::MemoryStorage;

    fn field(name: &str, options: IndexOptions) -> FieldInfo {
        let mut fi = FieldInfo::new(name, 0);
        fi.indexed = true;
        fi.index_options = Some(options);
        fi
    }

    fn state(storage: &Arc<MemoryStorage>) -> SegmentWriteState {
        SegmentWriteState {
            storage: storage.clone(),
            segment_name: "_0".to_string(),
            max_doc: 10,
            field_infos: Arc::new(FieldInfos::default()),
            segment_suffix: String::new(),
        }
    }

    #[test]
    fn test_wire_format() {
        let storage = Arc::new(MemoryStorage::new_default());
        let mut writer = PostingsWriter::new(&state(&storage)).unwrap();
        writer
            .start_field(&field("body", IndexOptions::DocsAndFreqsAndPositionsAndOffsets))
            .unwrap();
        writer.start_term(b"empty").unwrap();
        writer.finish_term().unwrap();
        writer.start_term(b"fox").unwrap();
        writer.start_doc(3, 1).unwrap();
        writer.add_position(2, Some(b"p"), 10, 13).unwrap();
        writer.finish_doc().unwrap();
        writer.finish_term().unwrap();
        writer.finish().unwrap();

        let text = String::from_utf8(storage.read_all("_0.pst").unwrap()).unwrap();
        let expected = "field body\n  term fox\n    doc 3\n      freq 1\n      pos 2\n      startOffset 10\n      endOffset 13\n        payload p\nEND\n";
        assert!(text.starts_with(expected), "{text}");
    }

    #[test]
    fn test_docs_only_writes_no_freq() {
        let storage = Arc::new(MemoryStorage::new_default());
        let mut writer = PostingsWriter::new(&state(&storage)).unwrap();
        writer.start_field(&field("id", IndexOptions::DocsOnly)).unwrap();
        writer.start_term(b"a").unwrap();
        writer.start_doc(0, 5).unwrap();
        writer.finish_doc().unwrap();
        writer.finish_term().unwrap();
        writer.finish().unwrap();

        let text = String::from_utf8(storage.read_all("_0.pst").unwrap()).unwrap();
        assert!(!text.contains("freq"));
    }

    #[test]
    fn test_decreasing_start_offset_rejected() {
        let storage = Arc::new(MemoryStorage::new_default());
        let mut writer = PostingsWriter::new(&state(&storage)).unwrap();
        writer
            .start_field(&field("body", IndexOptions::DocsAndFreqsAndPositionsAndOffsets))
            .unwrap();
        writer.start_term(b"a").unwrap();
        writer.start_doc(0, 2).unwrap();
        writer.add_position(0, None, 5, 6).unwrap();
        let err = writer.add_position(1, None, 4, 6).unwrap_err();
        assert!(matches!(err, XiphosError::Invariant(_)));
        let err = writer.add_position(1, None, 7, 6).unwrap_err();
        assert!(matches!(err, XiphosError::Invariant(_)));
    }

    #[test]
    fn test_order_violations_rejected() {
        let storage = Arc::new(MemoryStorage::new_default());
        let mut writer = PostingsWriter::new(&state(&storage)).unwrap();
        let body = field("body", IndexOptions::DocsAndFreqs);
        writer.start_field(&body).unwrap();
        writer.start_term(b"b").unwrap();
        writer.start_doc(4, 1).unwrap();
        writer.finish_doc().unwrap();
        assert!(writer.start_doc(4, 1).is_err());
        writer.finish_term().unwrap();
        assert!(writer.start_term(b"a").is_err());
        assert!(writer.start_field(&body).is_err());
    }

    #[test]
    fn test_abort_deletes_file() {
        let storage = Arc::new(MemoryStorage::new_default());
        let mut writer = PostingsWriter::new(&state(&storage)).unwrap();
        writer.start_field(&field("id", IndexOptions::DocsOnly)).unwrap();
        writer.abort();
        assert!(!storage.file_exists("_0.pst"));
    }
}
