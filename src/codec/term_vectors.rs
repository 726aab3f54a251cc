//! Term vectors (`.vec`).
//!
//! Per document and per field, the terms of that field with their frequency
//! and, when recorded, positions, offsets and payloads. Documents are read
//! back whole into sorted maps.

use std::collections::BTreeMap;
use std::io::{Seek, SeekFrom};
use std::sync::Arc;

use crate::codec::field_infos::FieldInfo;
use crate::codec::line::{
    ChecksumInput, ChecksumOutput, LineBuf, check_footer, read_bool, read_value, write_checksum,
    write_line, write_line_bytes,
};
use crate::codec::{SegmentReadState, SegmentWriteState, TERM_VECTORS_EXTENSION};
use crate::error::{Result, XiphosError};
use crate::storage::{SharedInput, Storage, StorageInput};

const DOC: &str = "doc ";
const NUMFIELDS: &str = "  numfields ";
const FIELD: &str = "  field ";
const FIELDNAME: &str = "    name ";
const FIELDPOSITIONS: &str = "    positions ";
const FIELDOFFSETS: &str = "    offsets   ";
const FIELDPAYLOADS: &str = "    payloads  ";
const FIELDTERMCOUNT: &str = "    numterms ";
const TERMTEXT: &str = "    term ";
const TERMFREQ: &str = "      freq ";
const POSITION: &str = "      position ";
const PAYLOAD: &str = "        payload ";
const STARTOFFSET: &str = "        startoffset ";
const ENDOFFSET: &str = "        endoffset ";
const END: &str = crate::codec::line::END;

/// One term of a term vector.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TermVectorTerm {
    pub freq: i32,
    /// One entry per occurrence when positions were recorded.
    pub positions: Vec<i32>,
    /// One entry per occurrence when offsets were recorded.
    pub start_offsets: Vec<i32>,
    pub end_offsets: Vec<i32>,
    /// One entry per occurrence when payloads were recorded.
    pub payloads: Vec<Option<Vec<u8>>>,
}

/// The term vector of one field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TermVectorField {
    pub has_positions: bool,
    pub has_offsets: bool,
    pub has_payloads: bool,
    pub terms: BTreeMap<Vec<u8>, TermVectorTerm>,
}

/// The term vectors of one document, by field name.
pub type TermVectors = BTreeMap<String, TermVectorField>;

#[derive(Debug, Clone, Copy)]
struct FieldFlags {
    positions: bool,
    offsets: bool,
    payloads: bool,
}

/// Appends per-document term vectors to a `.vec` file.
#[derive(Debug)]
pub struct TermVectorsWriter {
    storage: Arc<dyn Storage>,
    file_name: String,
    out: Option<ChecksumOutput>,
    num_docs_written: i32,
    field: Option<FieldFlags>,
}

impl TermVectorsWriter {
    pub fn new(state: &SegmentWriteState) -> Result<Self> {
        let file_name = state.file_name(TERM_VECTORS_EXTENSION);
        let output = state.storage.create_output(&file_name)?;
        Ok(TermVectorsWriter {
            storage: Arc::clone(&state.storage),
            out: Some(ChecksumOutput::new(output, file_name.clone())),
            file_name,
            num_docs_written: 0,
            field: None,
        })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    fn out(&mut self) -> Result<&mut ChecksumOutput> {
        self.out
            .as_mut()
            .ok_or_else(|| XiphosError::invariant("term vectors writer already closed"))
    }

    /// Begin the next document, which has vectors for `num_fields` fields.
    pub fn start_document(&mut self, num_fields: usize) -> Result<()> {
        let doc = self.num_docs_written;
        let out = self.out()?;
        write_line(out, DOC, doc)?;
        write_line(out, NUMFIELDS, num_fields)?;
        self.num_docs_written += 1;
        self.field = None;
        Ok(())
    }

    pub fn start_field(
        &mut self,
        field: &FieldInfo,
        num_terms: usize,
        positions: bool,
        offsets: bool,
        payloads: bool,
    ) -> Result<()> {
        let out = self.out()?;
        write_line(out, FIELD, field.number)?;
        write_line(out, FIELDNAME, &field.name)?;
        write_line(out, FIELDPOSITIONS, positions)?;
        write_line(out, FIELDOFFSETS, offsets)?;
        write_line(out, FIELDPAYLOADS, payloads)?;
        write_line(out, FIELDTERMCOUNT, num_terms)?;
        self.field = Some(FieldFlags {
            positions,
            offsets,
            payloads,
        });
        Ok(())
    }

    pub fn start_term(&mut self, term: &[u8], freq: i32) -> Result<()> {
        let out = self.out()?;
        write_line_bytes(out, TERMTEXT, term)?;
        write_line(out, TERMFREQ, freq)
    }

    /// Record one occurrence of the current term. Only the parts enabled in
    /// `start_field` are written.
    pub fn add_position(
        &mut self,
        position: i32,
        start_offset: i32,
        end_offset: i32,
        payload: Option<&[u8]>,
    ) -> Result<()> {
        let flags = self
            .field
            .ok_or_else(|| XiphosError::invariant("add_position called outside a field"))?;
        let out = self.out()?;
        if flags.positions {
            write_line(out, POSITION, position)?;
            if flags.payloads {
                write_line_bytes(out, PAYLOAD, payload.unwrap_or(&[]))?;
            }
        }
        if flags.offsets {
            write_line(out, STARTOFFSET, start_offset)?;
            write_line(out, ENDOFFSET, end_offset)?;
        }
        Ok(())
    }

    /// Close the file after checking `num_docs` documents were written. On a
    /// mismatch the writer aborts and the file is deleted.
    pub fn finish(mut self, num_docs: i32) -> Result<()> {
        if self.num_docs_written != num_docs {
            let written = self.num_docs_written;
            self.abort();
            return Err(XiphosError::invariant(format!(
                "term vectors writer wrote {written} documents but the segment has {num_docs}"
            )));
        }
        let mut out = self
            .out
            .take()
            .ok_or_else(|| XiphosError::invariant("term vectors writer already closed"))?;
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

/// Reads per-document term vectors.
#[derive(Debug)]
pub struct TermVectorsReader {
    input: SharedInput,
    cursor: Box<dyn StorageInput>,
    offsets: Arc<Vec<u64>>,
    line: LineBuf,
}

impl TermVectorsReader {
    pub fn open(state: &SegmentReadState) -> Result<Self> {
        let file_name = state.file_name(TERM_VECTORS_EXTENSION);
        let input = SharedInput::open(state.storage.as_ref(), &file_name)?;
        let offsets = read_index(&input, state.max_doc())?;
        log::debug!("opened {file_name} with {} documents", offsets.len());
        Ok(TermVectorsReader {
            cursor: input.clone_input()?,
            input,
            offsets: Arc::new(offsets),
            line: LineBuf::new(),
        })
    }

    /// A reader with its own cursor sharing this reader's offsets.
    pub fn try_clone(&self) -> Result<Self> {
        Ok(TermVectorsReader {
            input: self.input.clone(),
            cursor: self.input.clone_input()?,
            offsets: Arc::clone(&self.offsets),
            line: LineBuf::new(),
        })
    }

    /// The term vectors of `doc`, `None` if it has none.
    pub fn get(&mut self, doc: i32) -> Result<Option<TermVectors>> {
        let offset = usize::try_from(doc)
            .ok()
            .and_then(|d| self.offsets.get(d))
            .copied()
            .ok_or_else(|| XiphosError::invalid_argument(format!("document {doc} out of range")))?;
        let res = self.input.name().to_string();
        let res = res.as_str();
        let input = &mut self.cursor;
        let line = &mut self.line;
        input.seek(SeekFrom::Start(offset))?;

        let num_fields: usize = read_value(input, line, NUMFIELDS, res)?;
        if num_fields == 0 {
            return Ok(None);
        }

        let mut fields = TermVectors::new();
        for _ in 0..num_fields {
            let _number: i32 = read_value(input, line, FIELD, res)?;
            line.read(input, res)?;
            let name = line.string(FIELDNAME, res)?;
            let has_positions = read_bool(input, line, FIELDPOSITIONS, res)?;
            let has_offsets = read_bool(input, line, FIELDOFFSETS, res)?;
            let has_payloads = read_bool(input, line, FIELDPAYLOADS, res)?;
            let num_terms: usize = read_value(input, line, FIELDTERMCOUNT, res)?;

            let mut terms = BTreeMap::new();
            for _ in 0..num_terms {
                line.read(input, res)?;
                let text = line.expect(TERMTEXT, res)?.to_vec();
                let freq: i32 = read_value(input, line, TERMFREQ, res)?;
                let mut term = TermVectorTerm {
                    freq,
                    ..TermVectorTerm::default()
                };
                if has_positions || has_offsets {
                    for _ in 0..freq {
                        if has_positions {
                            term.positions.push(read_value(input, line, POSITION, res)?);
                            if has_payloads {
                                line.read(input, res)?;
                                let payload = line.expect(PAYLOAD, res)?;
                                term.payloads
                                    .push((!payload.is_empty()).then(|| payload.to_vec()));
                            }
                        }
                        if has_offsets {
                            term.start_offsets.push(read_value(input, line, STARTOFFSET, res)?);
                            term.end_offsets.push(read_value(input, line, ENDOFFSET, res)?);
                        }
                    }
                }
                terms.insert(text, term);
            }
            fields.insert(
                name,
                TermVectorField {
                    has_positions,
                    has_offsets,
                    has_payloads,
                    terms,
                },
            );
        }
        Ok(Some(fields))
    }

    /// The footer was verified at open.
    pub fn check_integrity(&self) -> Result<()> {
        Ok(())
    }
}

fn read_index(input: &SharedInput, max_doc: i32) -> Result<Vec<u64>> {
    let res = input.name();
    let mut cin = ChecksumInput::new(input.clone_input()?);
    let mut line = LineBuf::new();
    let mut offsets = Vec::with_capacity(max_doc.max(0) as usize);
    loop {
        line.read(&mut cin, res)?;
        if line.as_bytes() == END.as_bytes() {
            break;
        }
        if line.starts_with(DOC) {
            offsets.push(cin.position());
        }
    }
    check_footer(&mut cin, res)?;
    if offsets.len() != max_doc as usize {
        return Err(XiphosError::corruption(
            format!("found {} documents but the segment has {max_doc}", offsets.len()),
            res,
        ));
    }
    Ok(offsets)
}
