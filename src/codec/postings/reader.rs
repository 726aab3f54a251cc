//! Postings reader.

use std::collections::BTreeMap;
use std::io::{Seek, SeekFrom};
use std::sync::Arc;

use ahash::AHashMap;
use fst::{IntoStreamer, Map, MapBuilder, Streamer};
use parking_lot::Mutex;

use crate::codec::field_infos::{FieldInfo, FieldInfos};
use crate::codec::line::{ChecksumInput, LineBuf, check_footer};
use crate::codec::postings::{
    DOC, DocsAndPositionsEnum, DocsEnum, END, END_OFFSET, FIELD, FREQ, PAYLOAD, POS,
    START_OFFSET, TERM,
};
use crate::codec::{NO_MORE_DOCS, POSTINGS_EXTENSION, SegmentReadState};
use crate::error::{Result, XiphosError};
use crate::storage::{SharedInput, StorageInput};
use crate::util::bits::{Bits, FixedBitSet};

/// Random access to the postings of one segment.
#[derive(Debug)]
pub struct PostingsReader {
    input: SharedInput,
    field_infos: Arc<FieldInfos>,
    /// Field name to the file pointer just past its `field` line.
    fields: BTreeMap<String, u64>,
    max_doc: i32,
    terms_cache: Mutex<AHashMap<String, Arc<Terms>>>,
}

impl PostingsReader {
    /// Open the postings file and index its fields. The whole file is read
    /// once to verify the checksum footer.
    pub fn open(state: &SegmentReadState) -> Result<Self> {
        let file_name = state.file_name(POSTINGS_EXTENSION);
        let input = SharedInput::open(state.storage.as_ref(), &file_name)?;
        let fields = read_field_index(&input)?;
        log::debug!("opened {file_name} with {} fields", fields.len());

        Ok(PostingsReader {
            input,
            field_infos: Arc::clone(&state.field_infos),
            fields,
            max_doc: state.max_doc(),
            terms_cache: Mutex::new(AHashMap::new()),
        })
    }

    /// Names of the fields with postings, in ascending order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Number of fields with postings.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The terms of `field`, or `None` if the field has no postings. The
    /// term dictionary is built on first access and cached.
    pub fn terms(&self, field: &str) -> Result<Option<Arc<Terms>>> {
        let mut cache = self.terms_cache.lock();
        if let Some(terms) = cache.get(field) {
            return Ok(Some(Arc::clone(terms)));
        }
        let Some(&start) = self.fields.get(field) else {
            return Ok(None);
        };
        let field_info = self.field_infos.field_info(field).ok_or_else(|| {
            XiphosError::corruption(
                format!("postings for unknown field '{field}'"),
                self.input.name(),
            )
        })?;

        let terms = Arc::new(Terms::load(
            self.input.clone(),
            field_info.clone(),
            start,
            self.max_doc,
        )?);
        cache.insert(field.to_string(), Arc::clone(&terms));
        Ok(Some(terms))
    }

    /// The footer was verified at open.
    pub fn check_integrity(&self) -> Result<()> {
        Ok(())
    }
}

fn read_field_index(input: &SharedInput) -> Result<BTreeMap<String, u64>> {
    let res = input.name();
    let mut cin = ChecksumInput::new(input.clone_input()?);
    let mut line = LineBuf::new();
    let mut fields = BTreeMap::new();
    loop {
        line.read(&mut cin, res)?;
        if line.as_bytes() == END.as_bytes() {
            break;
        }
        if line.starts_with(FIELD) {
            let name = line.string(FIELD, res)?;
            fields.insert(name, cin.position());
        }
    }
    check_footer(&mut cin, res)?;
    Ok(fields)
}

#[derive(Debug, Clone)]
struct TermMeta {
    term: Vec<u8>,
    /// File pointer just past the `term` line.
    docs_start: u64,
    doc_freq: i32,
    total_term_freq: i64,
}

/// The term dictionary and statistics of one field.
#[derive(Debug)]
pub struct Terms {
    field_info: FieldInfo,
    input: SharedInput,
    dict: Map<Vec<u8>>,
    meta: Vec<TermMeta>,
    sum_total_term_freq: i64,
    sum_doc_freq: i64,
    doc_count: i32,
}

impl Terms {
    fn load(input: SharedInput, field_info: FieldInfo, start: u64, max_doc: i32) -> Result<Self> {
        let res = input.name().to_string();
        let res = res.as_str();
        let mut stream = input.clone_input()?;
        stream.seek(SeekFrom::Start(start))?;

        let mut line = LineBuf::new();
        let mut meta: Vec<TermMeta> = Vec::new();
        let mut current: Option<TermMeta> = None;
        let mut visited = FixedBitSet::new(max_doc.max(0) as usize);
        let mut sum_doc_freq = 0i64;
        let mut sum_total_term_freq = 0i64;

        loop {
            line.read(&mut stream, res)?;
            if line.as_bytes() == END.as_bytes() || line.starts_with(FIELD) {
                break;
            } else if line.starts_with(TERM) {
                if let Some(done) = current.take() {
                    sum_total_term_freq += done.total_term_freq;
                    meta.push(done);
                }
                current = Some(TermMeta {
                    term: line.expect(TERM, res)?.to_vec(),
                    docs_start: stream.stream_position()?,
                    doc_freq: 0,
                    total_term_freq: 0,
                });
            } else if line.starts_with(DOC) {
                let term = current.as_mut().ok_or_else(|| {
                    XiphosError::corruption("document listed outside a term", res)
                })?;
                let doc: i32 = line.parse(DOC, res)?;
                if doc < 0 || doc >= max_doc {
                    return Err(XiphosError::corruption(
                        format!("document {doc} out of range (max_doc={max_doc})"),
                        res,
                    ));
                }
                term.doc_freq += 1;
                sum_doc_freq += 1;
                visited.set(doc as usize);
            } else if line.starts_with(FREQ) {
                let term = current.as_mut().ok_or_else(|| {
                    XiphosError::corruption("frequency listed outside a term", res)
                })?;
                let freq: i64 = line.parse(FREQ, res)?;
                term.total_term_freq += freq;
            } else if !(line.starts_with(POS)
                || line.starts_with(START_OFFSET)
                || line.starts_with(END_OFFSET)
                || line.starts_with(PAYLOAD))
            {
                return Err(XiphosError::corruption(
                    format!("unexpected line '{}'", String::from_utf8_lossy(line.as_bytes())),
                    res,
                ));
            }
        }
        if let Some(done) = current.take() {
            sum_total_term_freq += done.total_term_freq;
            meta.push(done);
        }

        let mut builder = MapBuilder::memory();
        for (ord, term) in meta.iter().enumerate() {
            builder.insert(&term.term, ord as u64).map_err(|e| {
                XiphosError::corruption(format!("invalid term order: {e}"), res)
            })?;
        }
        let bytes = builder
            .into_inner()
            .map_err(|e| XiphosError::corruption(format!("failed to build term index: {e}"), res))?;
        let dict = Map::new(bytes)
            .map_err(|e| XiphosError::corruption(format!("failed to load term index: {e}"), res))?;

        log::debug!(
            "loaded {} terms for field '{}' from {res}",
            meta.len(),
            field_info.name
        );

        Ok(Terms {
            field_info,
            input,
            dict,
            meta,
            sum_total_term_freq,
            sum_doc_freq,
            doc_count: visited.cardinality() as i32,
        })
    }

    /// An enumerator over the terms, initially unpositioned.
    pub fn iterator(self: &Arc<Self>) -> TermsEnum {
        TermsEnum {
            terms: Arc::clone(self),
            position: Position::Unpositioned,
        }
    }

    pub fn field_info(&self) -> &FieldInfo {
        &self.field_info
    }

    /// Number of unique terms.
    pub fn size(&self) -> i64 {
        self.meta.len() as i64
    }

    /// Sum of all term frequencies, -1 when frequencies were not indexed.
    pub fn sum_total_term_freq(&self) -> i64 {
        if self.field_info.has_freqs() {
            self.sum_total_term_freq
        } else {
            -1
        }
    }

    /// Sum of the document frequencies of all terms.
    pub fn sum_doc_freq(&self) -> i64 {
        self.sum_doc_freq
    }

    /// Number of documents with at least one term.
    pub fn doc_count(&self) -> i32 {
        self.doc_count
    }

    pub fn has_freqs(&self) -> bool {
        self.field_info.has_freqs()
    }

    pub fn has_positions(&self) -> bool {
        self.field_info.has_positions()
    }

    pub fn has_offsets(&self) -> bool {
        self.field_info.has_offsets()
    }

    pub fn has_payloads(&self) -> bool {
        self.field_info.has_payloads()
    }
}

/// Outcome of [`TermsEnum::seek_ceil`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekStatus {
    /// The exact term exists.
    Found,
    /// The enumerator is positioned on the next larger term.
    NotFound,
    /// No term is greater than or equal to the target.
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    Unpositioned,
    At(usize),
    Exhausted,
}

/// Walks the terms of a field in byte order.
#[derive(Debug, Clone)]
pub struct TermsEnum {
    terms: Arc<Terms>,
    position: Position,
}

impl TermsEnum {
    /// Position on `term` if it exists.
    pub fn seek_exact(&mut self, term: &[u8]) -> bool {
        match self.terms.dict.get(term) {
            Some(ord) => {
                self.position = Position::At(ord as usize);
                true
            }
            None => false,
        }
    }

    /// Position on the smallest term greater than or equal to `term`.
    pub fn seek_ceil(&mut self, term: &[u8]) -> SeekStatus {
        let found = {
            let mut stream = self.terms.dict.range().ge(term).into_stream();
            stream.next().map(|(key, ord)| (key == term, ord as usize))
        };
        match found {
            Some((exact, ord)) => {
                self.position = Position::At(ord);
                if exact {
                    SeekStatus::Found
                } else {
                    SeekStatus::NotFound
                }
            }
            None => {
                self.position = Position::Exhausted;
                SeekStatus::End
            }
        }
    }

    /// Position on the term with ordinal `ord`.
    pub fn seek_exact_ord(&mut self, ord: usize) -> Result<()> {
        if ord >= self.terms.meta.len() {
            return Err(XiphosError::invalid_argument(format!(
                "term ordinal {ord} out of range"
            )));
        }
        self.position = Position::At(ord);
        Ok(())
    }

    /// Advance to the next term.
    pub fn next(&mut self) -> Option<&[u8]> {
        let next = match self.position {
            Position::Unpositioned => 0,
            Position::At(ord) => ord + 1,
            Position::Exhausted => return None,
        };
        if next < self.terms.meta.len() {
            self.position = Position::At(next);
            Some(&self.terms.meta[next].term)
        } else {
            self.position = Position::Exhausted;
            None
        }
    }

    fn current(&self) -> Result<&TermMeta> {
        match self.position {
            Position::At(ord) => Ok(&self.terms.meta[ord]),
            _ => Err(XiphosError::invalid_argument("terms enum is not positioned on a term")),
        }
    }

    /// The current term, if positioned.
    pub fn term(&self) -> Option<&[u8]> {
        self.current().ok().map(|meta| meta.term.as_slice())
    }

    pub fn ord(&self) -> Result<usize> {
        match self.position {
            Position::At(ord) => Ok(ord),
            _ => Err(XiphosError::invalid_argument("terms enum is not positioned on a term")),
        }
    }

    pub fn doc_freq(&self) -> Result<i32> {
        Ok(self.current()?.doc_freq)
    }

    /// Total occurrences of the current term, -1 when frequencies were not
    /// indexed.
    pub fn total_term_freq(&self) -> Result<i64> {
        let meta = self.current()?;
        Ok(if self.terms.has_freqs() {
            meta.total_term_freq
        } else {
            -1
        })
    }

    /// Documents of the current term, skipping those not set in `live_docs`.
    pub fn docs(
        &self,
        live_docs: Option<Arc<dyn Bits>>,
        needs_freqs: bool,
    ) -> Result<Box<dyn DocsEnum>> {
        let meta = self.current()?;
        let mut input = self.terms.input.clone_input()?;
        input.seek(SeekFrom::Start(meta.docs_start))?;
        Ok(Box::new(TextDocsEnum {
            input,
            resource: Arc::from(self.terms.input.name()),
            line: LineBuf::new(),
            omit_tf: !needs_freqs || !self.terms.has_freqs(),
            doc_id: -1,
            tf: 1,
            live_docs,
            cost: meta.doc_freq as i64,
        }))
    }

    /// Documents and positions of the current term, or `None` when the field
    /// does not index positions.
    pub fn docs_and_positions(
        &self,
        live_docs: Option<Arc<dyn Bits>>,
    ) -> Result<Option<Box<dyn DocsAndPositionsEnum>>> {
        if !self.terms.has_positions() {
            return Ok(None);
        }
        let meta = self.current()?;
        let read_offsets = self.terms.has_offsets();
        Ok(Some(Box::new(TextDocsAndPositionsEnum {
            input: self.terms.input.clone_input()?,
            resource: Arc::from(self.terms.input.name()),
            line: LineBuf::new(),
            doc_id: -1,
            tf: 0,
            live_docs,
            next_doc_start: meta.docs_start,
            read_offsets,
            start_offset: -1,
            end_offset: -1,
            payload: None,
            cost: meta.doc_freq as i64,
        })))
    }
}

fn is_live(live_docs: &Option<Arc<dyn Bits>>, doc: i32) -> bool {
    live_docs.as_ref().is_none_or(|bits| bits.get(doc as usize))
}

#[derive(Debug)]
struct TextDocsEnum {
    input: Box<dyn StorageInput>,
    resource: Arc<str>,
    line: LineBuf,
    omit_tf: bool,
    doc_id: i32,
    tf: i32,
    live_docs: Option<Arc<dyn Bits>>,
    cost: i64,
}

impl DocsEnum for TextDocsEnum {
    fn doc_id(&self) -> i32 {
        self.doc_id
    }

    fn next_doc(&mut self) -> Result<i32> {
        if self.doc_id == NO_MORE_DOCS {
            return Ok(NO_MORE_DOCS);
        }
        let mut first = true;
        let mut term_freq = 0;
        loop {
            let line_start = self.input.stream_position()?;
            self.line.read(&mut self.input, &self.resource)?;
            if self.line.starts_with(DOC) {
                if !first && is_live(&self.live_docs, self.doc_id) {
                    self.input.seek(SeekFrom::Start(line_start))?;
                    if !self.omit_tf {
                        self.tf = term_freq;
                    }
                    return Ok(self.doc_id);
                }
                self.doc_id = self.line.parse(DOC, &self.resource)?;
                term_freq = 0;
                first = false;
            } else if self.line.starts_with(FREQ) {
                term_freq = self.line.parse(FREQ, &self.resource)?;
            } else if self.line.starts_with(POS)
                || self.line.starts_with(START_OFFSET)
                || self.line.starts_with(END_OFFSET)
                || self.line.starts_with(PAYLOAD)
            {
                continue;
            } else {
                // TERM, FIELD or END: the term's documents are done.
                if !first && is_live(&self.live_docs, self.doc_id) {
                    self.input.seek(SeekFrom::Start(line_start))?;
                    if !self.omit_tf {
                        self.tf = term_freq;
                    }
                    return Ok(self.doc_id);
                }
                self.doc_id = NO_MORE_DOCS;
                return Ok(NO_MORE_DOCS);
            }
        }
    }

    fn freq(&self) -> i32 {
        self.tf
    }

    fn cost(&self) -> i64 {
        self.cost
    }
}

#[derive(Debug)]
struct TextDocsAndPositionsEnum {
    input: Box<dyn StorageInput>,
    resource: Arc<str>,
    line: LineBuf,
    doc_id: i32,
    tf: i32,
    live_docs: Option<Arc<dyn Bits>>,
    next_doc_start: u64,
    read_offsets: bool,
    start_offset: i32,
    end_offset: i32,
    payload: Option<Vec<u8>>,
    cost: i64,
}

impl DocsEnum for TextDocsAndPositionsEnum {
    fn doc_id(&self) -> i32 {
        self.doc_id
    }

    fn next_doc(&mut self) -> Result<i32> {
        if self.doc_id == NO_MORE_DOCS {
            return Ok(NO_MORE_DOCS);
        }
        let mut first = true;
        let mut pos_start = 0;
        self.input.seek(SeekFrom::Start(self.next_doc_start))?;
        loop {
            let line_start = self.input.stream_position()?;
            self.line.read(&mut self.input, &self.resource)?;
            if self.line.starts_with(DOC) {
                if !first && is_live(&self.live_docs, self.doc_id) {
                    self.next_doc_start = line_start;
                    self.input.seek(SeekFrom::Start(pos_start))?;
                    return Ok(self.doc_id);
                }
                self.doc_id = self.line.parse(DOC, &self.resource)?;
                self.tf = 0;
                first = false;
            } else if self.line.starts_with(FREQ) {
                self.tf = self.line.parse(FREQ, &self.resource)?;
                pos_start = self.input.stream_position()?;
            } else if self.line.starts_with(POS)
                || self.line.starts_with(START_OFFSET)
                || self.line.starts_with(END_OFFSET)
                || self.line.starts_with(PAYLOAD)
            {
                continue;
            } else {
                if !first && is_live(&self.live_docs, self.doc_id) {
                    self.next_doc_start = line_start;
                    self.input.seek(SeekFrom::Start(pos_start))?;
                    return Ok(self.doc_id);
                }
                self.doc_id = NO_MORE_DOCS;
                return Ok(NO_MORE_DOCS);
            }
        }
    }

    fn freq(&self) -> i32 {
        self.tf
    }

    fn cost(&self) -> i64 {
        self.cost
    }
}

impl DocsAndPositionsEnum for TextDocsAndPositionsEnum {
    fn next_position(&mut self) -> Result<i32> {
        let res = &*self.resource;
        self.line.read(&mut self.input, res)?;
        let position = self.line.parse(POS, res)?;

        if self.read_offsets {
            self.line.read(&mut self.input, res)?;
            self.start_offset = self.line.parse(START_OFFSET, res)?;
            self.line.read(&mut self.input, res)?;
            self.end_offset = self.line.parse(END_OFFSET, res)?;
        }

        let fp = self.input.stream_position()?;
        self.line.read(&mut self.input, res)?;
        if self.line.starts_with(PAYLOAD) {
            self.payload = Some(self.line.expect(PAYLOAD, res)?.to_vec());
        } else {
            self.payload = None;
            self.input.seek(SeekFrom::Start(fp))?;
        }
        Ok(position)
    }

    fn start_offset(&self) -> i32 {
        self.start_offset
    }

    fn end_offset(&self) -> i32 {
        self.end_offset
    }

    fn payload(&self) -> Option<&[u8]> {
        self.payload.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::field_infos::IndexOptions;
    use crate::codec::postings::PostingsWriter;
    use crate::codec::segment_info::SegmentInfo;
    use crate::codec::SegmentWriteState;
    use crate::storage::{MemoryStorage, Storage};

    fn field(name: &str, number: i32, options: IndexOptions) -> FieldInfo {
        let mut fi = FieldInfo::new(name, number);
        fi.indexed = true;
        fi.index_options = Some(options);
        fi.store_payloads = options.has_positions();
        fi
    }

    /// body: "a" in docs 0, 2 (2 occurrences), "c" in 1; id: docs-only "x" in 0..4.
    fn build(storage: &Arc<MemoryStorage>) -> SegmentReadState {
        let infos = Arc::new(
            FieldInfos::new(vec![
                field("body", 0, IndexOptions::DocsAndFreqsAndPositionsAndOffsets),
                field("id", 1, IndexOptions::DocsOnly),
            ])
            .unwrap(),
        );
        let write_state = SegmentWriteState {
            storage: storage.clone(),
            segment_name: "_0".to_string(),
            max_doc: 4,
            field_infos: Arc::clone(&infos),
            segment_suffix: String::new(),
        };
        let mut writer = PostingsWriter::new(&write_state).unwrap();
        writer.start_field(infos.field_info("body").unwrap()).unwrap();
        writer.start_term(b"a").unwrap();
        writer.start_doc(0, 1).unwrap();
        writer.add_position(0, None, 0, 1).unwrap();
        writer.finish_doc().unwrap();
        writer.start_doc(2, 2).unwrap();
        writer.add_position(1, Some(b"p\n1"), 2, 3).unwrap();
        writer.add_position(4, None, 8, 9).unwrap();
        writer.finish_doc().unwrap();
        writer.finish_term().unwrap();
        writer.start_term(b"c").unwrap();
        writer.start_doc(1, 1).unwrap();
        writer.add_position(0, None, 0, 1).unwrap();
        writer.finish_doc().unwrap();
        writer.finish_term().unwrap();

        writer.start_field(infos.field_info("id").unwrap()).unwrap();
        writer.start_term(b"x").unwrap();
        for doc in 0..4 {
            writer.start_doc(doc, 1).unwrap();
            writer.finish_doc().unwrap();
        }
        writer.finish_term().unwrap();
        writer.finish().unwrap();

        SegmentReadState {
            storage: storage.clone(),
            segment_info: Arc::new(SegmentInfo::new("_0", 4)),
            field_infos: infos,
            segment_suffix: String::new(),
        }
    }

    #[test]
    fn test_field_index_and_statistics() {
        let storage = Arc::new(MemoryStorage::new_default());
        let reader = PostingsReader::open(&build(&storage)).unwrap();
        assert_eq!(reader.fields().collect::<Vec<_>>(), vec!["body", "id"]);
        assert!(reader.terms("missing").unwrap().is_none());

        let body = reader.terms("body").unwrap().unwrap();
        assert_eq!(body.size(), 2);
        assert_eq!(body.sum_doc_freq(), 3);
        assert_eq!(body.sum_total_term_freq(), 4);
        assert_eq!(body.doc_count(), 3);

        let id = reader.terms("id").unwrap().unwrap();
        assert_eq!(id.sum_total_term_freq(), -1);
        assert_eq!(id.doc_count(), 4);

        let again = reader.terms("body").unwrap().unwrap();
        assert!(Arc::ptr_eq(&body, &again));
    }

    #[test]
    fn test_seek_and_next() {
        let storage = Arc::new(MemoryStorage::new_default());
        let reader = PostingsReader::open(&build(&storage)).unwrap();
        let terms = reader.terms("body").unwrap().unwrap();
        let mut te = terms.iterator();

        assert!(te.seek_exact(b"c"));
        assert_eq!(te.doc_freq().unwrap(), 1);
        assert!(!te.seek_exact(b"b"));

        assert_eq!(te.seek_ceil(b"b"), SeekStatus::NotFound);
        assert_eq!(te.term(), Some(&b"c"[..]));
        assert_eq!(te.seek_ceil(b"a"), SeekStatus::Found);
        assert_eq!(te.total_term_freq().unwrap(), 3);
        assert_eq!(te.seek_ceil(b"d"), SeekStatus::End);
        assert!(te.next().is_none());

        let mut te = terms.iterator();
        assert_eq!(te.next(), Some(&b"a"[..]));
        assert_eq!(te.next(), Some(&b"c"[..]));
        assert_eq!(te.next(), None);
    }

    #[test]
    fn test_docs_with_deletions() {
        let storage = Arc::new(MemoryStorage::new_default());
        let reader = PostingsReader::open(&build(&storage)).unwrap();
        let terms = reader.terms("id").unwrap().unwrap();
        let mut te = terms.iterator();
        assert!(te.seek_exact(b"x"));
        assert_eq!(te.total_term_freq().unwrap(), -1);

        let mut live = FixedBitSet::all_set(4);
        live.clear(1);
        live.clear(3);
        let live: Arc<dyn Bits> = Arc::new(live);
        let mut docs = te.docs(Some(live), true).unwrap();
        assert_eq!(docs.doc_id(), -1);
        assert_eq!(docs.next_doc().unwrap(), 0);
        assert_eq!(docs.freq(), 1);
        assert_eq!(docs.next_doc().unwrap(), 2);
        assert_eq!(docs.next_doc().unwrap(), NO_MORE_DOCS);
        assert_eq!(docs.next_doc().unwrap(), NO_MORE_DOCS);

        let mut docs = te.docs(None, false).unwrap();
        assert_eq!(docs.advance(2).unwrap(), 2);
        assert_eq!(docs.next_doc().unwrap(), 3);
    }

    #[test]
    fn test_positions_offsets_and_payloads() {
        let storage = Arc::new(MemoryStorage::new_default());
        let reader = PostingsReader::open(&build(&storage)).unwrap();
        let terms = reader.terms("body").unwrap().unwrap();
        let mut te = terms.iterator();
        assert!(te.seek_exact(b"a"));

        let mut docs = te.docs(None, true).unwrap();
        assert_eq!(docs.next_doc().unwrap(), 0);
        assert_eq!(docs.next_doc().unwrap(), 2);
        assert_eq!(docs.freq(), 2);

        let mut positions = te.docs_and_positions(None).unwrap().unwrap();
        assert_eq!(positions.next_doc().unwrap(), 0);
        assert_eq!(positions.next_position().unwrap(), 0);
        assert_eq!(positions.payload(), None);
        assert_eq!(positions.next_doc().unwrap(), 2);
        assert_eq!(positions.freq(), 2);
        assert_eq!(positions.next_position().unwrap(), 1);
        assert_eq!(positions.start_offset(), 2);
        assert_eq!(positions.end_offset(), 3);
        assert_eq!(positions.payload(), Some(&b"p\n1"[..]));
        assert_eq!(positions.next_position().unwrap(), 4);
        assert_eq!(positions.payload(), None);
        assert_eq!(positions.next_doc().unwrap(), NO_MORE_DOCS);

        let id_terms = reader.terms("id").unwrap().unwrap();
        let mut te = id_terms.iterator();
        assert!(te.seek_exact(b"x"));
        assert!(te.docs_and_positions(None).unwrap().is_none());
    }

    #[test]
    fn test_positions_skip_unread_positions() {
        let storage = Arc::new(MemoryStorage::new_default());
        let reader = PostingsReader::open(&build(&storage)).unwrap();
        let terms = reader.terms("body").unwrap().unwrap();
        let mut te = terms.iterator();
        assert!(te.seek_exact(b"a"));
        let mut positions = te.docs_and_positions(None).unwrap().unwrap();
        assert_eq!(positions.next_doc().unwrap(), 0);
        assert_eq!(positions.next_doc().unwrap(), 2);
        assert_eq!(positions.next_position().unwrap(), 1);
        assert_eq!(positions.next_doc().unwrap(), NO_MORE_DOCS);
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let storage = Arc::new(MemoryStorage::new_default());
        let state = build(&storage);
        let mut bytes = storage.read_all("_0.pst").unwrap();
        bytes.extend_from_slice(b"\n");
        storage.overwrite("_0.pst", bytes);
        assert!(PostingsReader::open(&state).unwrap_err().is_corruption());
        assert!(storage.file_exists("_0.pst"));
    }
}
