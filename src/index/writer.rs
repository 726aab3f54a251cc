//! Segment writer.
//!
//! Documents are buffered and inverted in memory. [`SegmentWriter::flush`]
//! then drives every codec writer once, in a single forward pass, and
//! publishes the segment by writing its field infos and segment info last.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};

use crate::analysis::{Analyzer, Token, WhitespaceAnalyzer};
use crate::codec::SegmentWriteState;
use crate::codec::doc_values::{DocValuesWriter, NormsWriter};
use crate::codec::field_infos::{
    DocValuesType, FieldInfo, FieldInfos, FieldInfosBuilder, write_field_infos,
};
use crate::codec::live_docs::{MutableLiveDocs, write_live_docs};
use crate::codec::postings::PostingsWriter;
use crate::codec::segment_info::{SegmentInfo, write_segment_info};
use crate::codec::stored_fields::{StoredFieldsWriter, StoredValue};
use crate::codec::term_vectors::TermVectorsWriter;
use crate::codec::DOC_VALUES_EXTENSION;
use crate::error::{Result, XiphosError};
use crate::index::document::{Document, Field, FieldType, FieldValue};
use crate::search::similarity::{DefaultSimilarity, FieldInvertState, Similarity};
use crate::storage::Storage;

/// Generation given to the live-docs file written at flush.
const FLUSH_DEL_GEN: u64 = 1;

/// Configuration for a [`SegmentWriter`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentWriterConfig {
    /// Appended to the segment name of every codec file.
    pub segment_suffix: String,
    /// Recorded in the segment info.
    pub use_compound_file: bool,
    /// Extra diagnostics recorded in the segment info.
    pub diagnostics: BTreeMap<String, String>,
}

impl SegmentWriterConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[derive(Debug, Clone)]
struct Occurrence {
    position: i32,
    start_offset: i32,
    end_offset: i32,
    payload: Option<Vec<u8>>,
}

#[derive(Debug)]
struct PendingDoc {
    doc: i32,
    occurrences: Vec<Occurrence>,
}

#[derive(Debug, Default)]
struct FieldBuffer {
    terms: BTreeMap<Vec<u8>, Vec<PendingDoc>>,
    norms: Vec<(i32, i64)>,
}

#[derive(Debug)]
enum DocValuesBuffer {
    Numeric(Vec<(i32, i64)>),
    Binary(Vec<(i32, Vec<u8>)>),
    Sorted(Vec<(i32, Vec<u8>)>),
    SortedSet(BTreeMap<i32, BTreeSet<Vec<u8>>>),
}

impl DocValuesBuffer {
    fn new(dv_type: DocValuesType) -> Self {
        match dv_type {
            DocValuesType::Numeric => DocValuesBuffer::Numeric(Vec::new()),
            DocValuesType::Binary => DocValuesBuffer::Binary(Vec::new()),
            DocValuesType::Sorted => DocValuesBuffer::Sorted(Vec::new()),
            DocValuesType::SortedSet => DocValuesBuffer::SortedSet(BTreeMap::new()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct VectorFlags {
    positions: bool,
    offsets: bool,
    payloads: bool,
}

#[derive(Debug)]
struct PendingVectorField {
    name: String,
    flags: VectorFlags,
    terms: BTreeMap<Vec<u8>, Vec<Occurrence>>,
}

/// A token reduced to what the inverter needs.
struct RawToken {
    term: Vec<u8>,
    increment: u32,
    start: usize,
    end: usize,
    payload: Option<Vec<u8>>,
}

impl From<Token> for RawToken {
    fn from(token: Token) -> Self {
        RawToken {
            term: token.text.into_bytes(),
            increment: token.position_increment,
            start: token.start_offset,
            end: token.end_offset,
            payload: token.payload,
        }
    }
}

/// One indexed field of the document being inverted.
struct InvertedField {
    state: FieldInvertState,
    terms: BTreeMap<Vec<u8>, Vec<Occurrence>>,
    last_start_offset: i32,
    has_payloads: bool,
    vectors: Option<VectorFlags>,
}

/// Buffers documents for one segment and writes it on [`SegmentWriter::flush`].
#[derive(Debug)]
pub struct SegmentWriter {
    storage: Arc<dyn Storage>,
    name: String,
    config: SegmentWriterConfig,
    analyzer: Arc<dyn Analyzer>,
    similarity: Arc<dyn Similarity>,
    field_infos: FieldInfosBuilder,
    fields: BTreeMap<String, FieldBuffer>,
    doc_values: BTreeMap<String, DocValuesBuffer>,
    stored: Vec<Vec<(String, StoredValue)>>,
    vectors: Vec<Vec<PendingVectorField>>,
    deleted: AHashSet<i32>,
    num_docs: i32,
}

impl SegmentWriter {
    /// A writer for segment `name` using whitespace analysis and TF-IDF norms.
    pub fn new(storage: Arc<dyn Storage>, name: impl Into<String>, config: SegmentWriterConfig) -> Self {
        SegmentWriter {
            storage,
            name: name.into(),
            config,
            analyzer: Arc::new(WhitespaceAnalyzer::new()),
            similarity: Arc::new(DefaultSimilarity::new()),
            field_infos: FieldInfosBuilder::new(),
            fields: BTreeMap::new(),
            doc_values: BTreeMap::new(),
            stored: Vec::new(),
            vectors: Vec::new(),
            deleted: AHashSet::new(),
            num_docs: 0,
        }
    }

    pub fn with_analyzer(mut self, analyzer: Arc<dyn Analyzer>) -> Self {
        self.analyzer = analyzer;
        self
    }

    /// The similarity that computes norms. Searches over this segment should
    /// use the same one.
    pub fn with_similarity(mut self, similarity: Arc<dyn Similarity>) -> Self {
        self.similarity = similarity;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Documents added so far, deleted ones included.
    pub fn num_docs(&self) -> i32 {
        self.num_docs
    }

    /// Invert and buffer `doc`, returning its id. A rejected document leaves
    /// the buffers untouched.
    pub fn add_document(&mut self, doc: &Document) -> Result<i32> {
        let doc_id = self.num_docs;
        let mut seen: AHashMap<&str, &FieldType> = AHashMap::new();
        let mut inverted: BTreeMap<&str, InvertedField> = BTreeMap::new();
        let mut stored = Vec::new();
        let mut single_valued: AHashSet<&str> = AHashSet::new();
        let mut doc_values = Vec::new();

        for field in doc.fields() {
            self.check_field(field, &seen)?;
            seen.entry(field.name.as_str()).or_insert(&field.field_type);
            let ft = &field.field_type;

            if ft.is_indexed() {
                let target = inverted
                    .entry(field.name.as_str())
                    .or_insert_with(|| InvertedField {
                        state: FieldInvertState::new(field.name.as_str()),
                        terms: BTreeMap::new(),
                        last_start_offset: 0,
                        has_payloads: false,
                        vectors: None,
                    });
                self.invert(field, target)?;
            }

            if ft.stored {
                let value = field.value.to_stored().ok_or_else(|| {
                    XiphosError::field(format!("field '{}' cannot store its value", field.name))
                })?;
                stored.push((field.name.clone(), value));
            }

            if let Some(dv_type) = ft.doc_values_type {
                if dv_type != DocValuesType::SortedSet && !single_valued.insert(field.name.as_str()) {
                    return Err(XiphosError::field(format!(
                        "field '{}' has more than one {dv_type} doc value in one document",
                        field.name
                    )));
                }
                let value = match dv_type {
                    DocValuesType::Numeric => field.value.to_numeric().map(DocValue::Number),
                    _ => field.value.to_bytes().map(DocValue::Bytes),
                }
                .ok_or_else(|| {
                    XiphosError::field(format!(
                        "value of field '{}' does not fit {dv_type} doc values",
                        field.name
                    ))
                })?;
                doc_values.push((field.name.as_str(), dv_type, value));
            }
        }

        for field in doc.fields() {
            self.apply_field(field);
        }

        let mut vector_fields = Vec::new();
        for (name, mut field) in inverted {
            let info = self.field_infos.get_or_add(name);
            if field.has_payloads && info.has_positions() {
                info.store_payloads = true;
            }
            field.state.unique_term_count = field.terms.len() as i32;
            field.state.max_term_frequency =
                field.terms.values().map(|o| o.len() as i32).max().unwrap_or(0);
            let norm = self.similarity.compute_norm(&field.state);

            if let Some(flags) = field.vectors {
                vector_fields.push(PendingVectorField {
                    name: name.to_string(),
                    flags,
                    terms: field.terms.clone(),
                });
            }
            let buffer = self.fields.entry(name.to_string()).or_default();
            buffer.norms.push((doc_id, norm));
            for (term, occurrences) in field.terms {
                buffer.terms.entry(term).or_default().push(PendingDoc {
                    doc: doc_id,
                    occurrences,
                });
            }
        }

        for (name, dv_type, value) in doc_values {
            let buffer = self
                .doc_values
                .entry(name.to_string())
                .or_insert_with(|| DocValuesBuffer::new(dv_type));
            match (buffer, value) {
                (DocValuesBuffer::Numeric(values), DocValue::Number(v)) => values.push((doc_id, v)),
                (DocValuesBuffer::Binary(values), DocValue::Bytes(v)) => values.push((doc_id, v)),
                (DocValuesBuffer::Sorted(values), DocValue::Bytes(v)) => values.push((doc_id, v)),
                (DocValuesBuffer::SortedSet(values), DocValue::Bytes(v)) => {
                    values.entry(doc_id).or_default().insert(v);
                }
                _ => {}
            }
        }

        self.stored.push(stored);
        self.vectors.push(vector_fields);
        self.num_docs += 1;
        Ok(doc_id)
    }

    /// Mark a buffered document deleted.
    pub fn delete_document(&mut self, doc: i32) -> Result<()> {
        if doc < 0 || doc >= self.num_docs {
            return Err(XiphosError::invalid_argument(format!(
                "document {doc} out of range for {} documents",
                self.num_docs
            )));
        }
        self.deleted.insert(doc);
        Ok(())
    }

    fn check_field(&self, field: &Field, seen: &AHashMap<&str, &FieldType>) -> Result<()> {
        let ft = &field.field_type;
        let name = field.name.as_str();
        let previous = self.field_infos.get(name);

        let known_options = seen
            .get(name)
            .and_then(|t| t.index_options)
            .or_else(|| previous.and_then(|info| info.index_options));
        if let (Some(known), Some(new)) = (known_options, ft.index_options)
            && known != new
        {
            return Err(XiphosError::schema(format!(
                "field '{name}' is indexed with {known} and cannot change to {new}"
            )));
        }

        let known_dv = seen
            .get(name)
            .and_then(|t| t.doc_values_type)
            .or_else(|| previous.and_then(|info| info.doc_values_type));
        if let (Some(known), Some(new)) = (known_dv, ft.doc_values_type)
            && known != new
        {
            return Err(XiphosError::schema(format!(
                "field '{name}' has {known} doc values and cannot change to {new}"
            )));
        }

        if ft.store_term_vectors && !ft.is_indexed() {
            return Err(XiphosError::field(format!(
                "field '{name}' stores term vectors but is not indexed"
            )));
        }
        if !ft.store_term_vectors
            && (ft.store_term_vector_positions
                || ft.store_term_vector_offsets
                || ft.store_term_vector_payloads)
        {
            return Err(XiphosError::field(format!(
                "field '{name}' sets term vector options without term vectors"
            )));
        }
        if matches!(field.value, FieldValue::Tokens(_)) && !(ft.tokenized && ft.is_indexed()) {
            return Err(XiphosError::field(format!(
                "pre-analyzed field '{name}' must be indexed and tokenized"
            )));
        }
        Ok(())
    }

    fn apply_field(&mut self, field: &Field) {
        let ft = &field.field_type;
        let info = self.field_infos.get_or_add(&field.name);
        if let Some(options) = ft.index_options {
            if !info.indexed {
                info.omit_norms = ft.omit_norms;
            } else {
                info.omit_norms |= ft.omit_norms;
            }
            info.indexed = true;
            info.index_options = Some(options);
        }
        info.store_term_vectors |= ft.store_term_vectors;
        if let Some(dv_type) = ft.doc_values_type {
            info.doc_values_type = Some(dv_type);
        }
    }

    fn invert(&self, field: &Field, target: &mut InvertedField) -> Result<()> {
        let ft = &field.field_type;
        let (tokens, final_offset): (Vec<RawToken>, usize) = match (&field.value, ft.tokenized) {
            (FieldValue::Text(text), true) => (
                self.analyzer.analyze(text)?.map(RawToken::from).collect(),
                text.len(),
            ),
            (FieldValue::Tokens(tokens), _) => (
                tokens.iter().cloned().map(RawToken::from).collect(),
                tokens.last().map_or(0, |t| t.end_offset),
            ),
            (value, _) => {
                let term = value.to_term().ok_or_else(|| {
                    XiphosError::field(format!("field '{}' has no indexable value", field.name))
                })?;
                let len = term.len();
                (
                    vec![RawToken {
                        term,
                        increment: 1,
                        start: 0,
                        end: len,
                        payload: None,
                    }],
                    len,
                )
            }
        };

        let base = target.state.offset;
        for token in tokens {
            if token.increment == 0 {
                target.state.num_overlap += 1;
            }
            let position = target.state.position + token.increment as i32;
            if position < 0 {
                return Err(XiphosError::field(format!(
                    "first position increment of field '{}' must be greater than 0",
                    field.name
                )));
            }
            let start_offset = base + token.start as i32;
            let end_offset = base + token.end as i32;
            if end_offset < start_offset || start_offset < target.last_start_offset {
                return Err(XiphosError::invariant(format!(
                    "offsets of field '{}' went backwards: {start_offset}..{end_offset} after start {}",
                    field.name, target.last_start_offset
                )));
            }
            target.last_start_offset = start_offset;
            target.state.position = position;
            target.state.length += 1;
            target.has_payloads |= token.payload.is_some();
            target.terms.entry(token.term).or_default().push(Occurrence {
                position,
                start_offset,
                end_offset,
                payload: token.payload,
            });
        }
        target.state.offset = base + final_offset as i32;
        target.state.boost *= field.boost;

        if ft.store_term_vectors {
            let flags = target.vectors.get_or_insert_with(VectorFlags::default);
            flags.positions |= ft.store_term_vector_positions;
            flags.offsets |= ft.store_term_vector_offsets;
            flags.payloads |= ft.store_term_vector_payloads;
        }
        Ok(())
    }

    /// Write every file of the segment and return its info. On failure all
    /// files written so far are deleted.
    pub fn flush(mut self) -> Result<SegmentInfo> {
        let mut builder = std::mem::take(&mut self.field_infos);
        for name in self.fields.keys() {
            let info = builder.get_or_add(name);
            if info.indexed && !info.omit_norms {
                info.norms_type = Some(DocValuesType::Numeric);
            }
        }
        let field_infos = Arc::new(builder.finish()?);
        let state = SegmentWriteState {
            storage: Arc::clone(&self.storage),
            segment_name: self.name.clone(),
            max_doc: self.num_docs,
            field_infos,
            segment_suffix: self.config.segment_suffix.clone(),
        };

        let mut files = Vec::new();
        match self.write_files(&state, &mut files) {
            Ok(info) => {
                log::debug!(
                    "flushed segment {} with {} documents ({} deleted) into {} files",
                    self.name,
                    self.num_docs,
                    self.deleted.len(),
                    info.files.len()
                );
                Ok(info)
            }
            Err(e) => {
                for file in &files {
                    if let Err(delete_err) = self.storage.delete_file(file) {
                        log::warn!("failed to delete {file} after flush error: {delete_err}");
                    }
                }
                Err(e)
            }
        }
    }

    fn write_files(&self, state: &SegmentWriteState, files: &mut Vec<String>) -> Result<SegmentInfo> {
        let infos = Arc::clone(&state.field_infos);
        if infos.has_postings() {
            self.write_postings(state, &infos, files)?;
        }
        if infos.has_norms() {
            self.write_norms(state, &infos, files)?;
        }
        if infos.has_doc_values() {
            self.write_doc_values(state, &infos, files)?;
        }
        self.write_stored_fields(state, &infos, files)?;
        if infos.has_vectors() {
            self.write_term_vectors(state, &infos, files)?;
        }
        if !self.deleted.is_empty() {
            let mut live_docs = MutableLiveDocs::new(self.num_docs as usize);
            for &doc in &self.deleted {
                live_docs.clear(doc as usize)?;
            }
            files.push(write_live_docs(
                self.storage.as_ref(),
                &self.name,
                FLUSH_DEL_GEN,
                &live_docs,
            )?);
        }
        files.push(write_field_infos(
            self.storage.as_ref(),
            &self.name,
            &self.config.segment_suffix,
            &infos,
        )?);

        let mut info = SegmentInfo::new(self.name.clone(), self.num_docs);
        info.use_compound_file = self.config.use_compound_file;
        info.diagnostics = self.config.diagnostics.clone();
        info.diagnostics.insert("source".to_string(), "flush".to_string());
        info.files = files.iter().cloned().collect();
        write_segment_info(self.storage.as_ref(), &mut info)?;
        Ok(info)
    }

    fn write_postings(&self, state: &SegmentWriteState, infos: &FieldInfos, files: &mut Vec<String>) -> Result<()> {
        let mut writer = PostingsWriter::new(state)?;
        files.push(writer.file_name().to_string());
        let result = (|| -> Result<()> {
            for (name, buffer) in &self.fields {
                if buffer.terms.is_empty() {
                    continue;
                }
                let info = field_info(infos, name)?;
                let with_positions = info.has_positions();
                writer.start_field(info)?;
                for (term, docs) in &buffer.terms {
                    writer.start_term(term)?;
                    for pending in docs {
                        writer.start_doc(pending.doc, pending.occurrences.len() as i32)?;
                        if with_positions {
                            for occ in &pending.occurrences {
                                writer.add_position(
                                    occ.position,
                                    occ.payload.as_deref(),
                                    occ.start_offset,
                                    occ.end_offset,
                                )?;
                            }
                        }
                        writer.finish_doc()?;
                    }
                    writer.finish_term()?;
                }
            }
            Ok(())
        })();
        match result {
            Ok(()) => writer.finish(),
            Err(e) => {
                writer.abort();
                Err(e)
            }
        }
    }

    fn write_norms(&self, state: &SegmentWriteState, infos: &FieldInfos, files: &mut Vec<String>) -> Result<()> {
        let mut writer = NormsWriter::new(state)?;
        files.push(writer.file_name().to_string());
        let result = (|| -> Result<()> {
            for (name, buffer) in &self.fields {
                let info = field_info(infos, name)?;
                if !info.has_norms() {
                    continue;
                }
                let mut norms = vec![0i64; self.num_docs as usize];
                for &(doc, norm) in &buffer.norms {
                    norms[doc as usize] = norm;
                }
                writer.add_norms_field(info, &norms)?;
            }
            Ok(())
        })();
        match result {
            Ok(()) => writer.finish(),
            Err(e) => {
                writer.abort();
                Err(e)
            }
        }
    }

    fn write_doc_values(&self, state: &SegmentWriteState, infos: &FieldInfos, files: &mut Vec<String>) -> Result<()> {
        let max_doc = self.num_docs as usize;
        let mut writer = DocValuesWriter::new(state, DOC_VALUES_EXTENSION)?;
        files.push(writer.file_name().to_string());
        let result = (|| -> Result<()> {
            for (name, buffer) in &self.doc_values {
                let info = field_info(infos, name)?;
                match buffer {
                    DocValuesBuffer::Numeric(values) => {
                        let mut column = vec![None; max_doc];
                        for &(doc, value) in values {
                            column[doc as usize] = Some(value);
                        }
                        writer.add_numeric_field(info, &column)?;
                    }
                    DocValuesBuffer::Binary(values) => {
                        let mut column = vec![None; max_doc];
                        for (doc, value) in values {
                            column[*doc as usize] = Some(value.clone());
                        }
                        writer.add_binary_field(info, &column)?;
                    }
                    DocValuesBuffer::Sorted(values) => {
                        let dictionary: Vec<Vec<u8>> = values
                            .iter()
                            .map(|(_, v)| v.clone())
                            .collect::<BTreeSet<_>>()
                            .into_iter()
                            .collect();
                        let mut doc_to_ord = vec![-1i32; max_doc];
                        for (doc, value) in values {
                            if let Ok(ord) = dictionary.binary_search(value) {
                                doc_to_ord[*doc as usize] = ord as i32;
                            }
                        }
                        writer.add_sorted_field(info, &dictionary, &doc_to_ord)?;
                    }
                    DocValuesBuffer::SortedSet(values) => {
                        let dictionary: Vec<Vec<u8>> = values
                            .values()
                            .flatten()
                            .cloned()
                            .collect::<BTreeSet<_>>()
                            .into_iter()
                            .collect();
                        let mut doc_to_ords = vec![Vec::new(); max_doc];
                        for (doc, set) in values {
                            doc_to_ords[*doc as usize] = set
                                .iter()
                                .filter_map(|v| dictionary.binary_search(v).ok())
                                .map(|ord| ord as i64)
                                .collect();
                        }
                        writer.add_sorted_set_field(info, &dictionary, &doc_to_ords)?;
                    }
                }
            }
            Ok(())
        })();
        match result {
            Ok(()) => writer.finish(),
            Err(e) => {
                writer.abort();
                Err(e)
            }
        }
    }

    fn write_stored_fields(&self, state: &SegmentWriteState, infos: &FieldInfos, files: &mut Vec<String>) -> Result<()> {
        let mut writer = StoredFieldsWriter::new(state)?;
        files.push(writer.file_name().to_string());
        let result = (|| -> Result<()> {
            for values in &self.stored {
                writer.start_document(values.len())?;
                for (name, value) in values {
                    writer.write_field(field_info(infos, name)?, value)?;
                }
            }
            Ok(())
        })();
        match result {
            Ok(()) => writer.finish(self.num_docs),
            Err(e) => {
                writer.abort();
                Err(e)
            }
        }
    }

    fn write_term_vectors(&self, state: &SegmentWriteState, infos: &FieldInfos, files: &mut Vec<String>) -> Result<()> {
        let mut writer = TermVectorsWriter::new(state)?;
        files.push(writer.file_name().to_string());
        let result = (|| -> Result<()> {
            for fields in &self.vectors {
                writer.start_document(fields.len())?;
                for field in fields {
                    let info = field_info(infos, &field.name)?;
                    let flags = field.flags;
                    let payloads = flags.payloads && flags.positions;
                    writer.start_field(info, field.terms.len(), flags.positions, flags.offsets, payloads)?;
                    for (term, occurrences) in &field.terms {
                        writer.start_term(term, occurrences.len() as i32)?;
                        if flags.positions || flags.offsets {
                            for occ in occurrences {
                                writer.add_position(
                                    occ.position,
                                    occ.start_offset,
                                    occ.end_offset,
                                    occ.payload.as_deref(),
                                )?;
                            }
                        }
                    }
                }
            }
            Ok(())
        })();
        match result {
            Ok(()) => writer.finish(self.num_docs),
            Err(e) => {
                writer.abort();
                Err(e)
            }
        }
    }
}

enum DocValue {
    Number(i64),
    Bytes(Vec<u8>),
}

fn field_info<'a>(infos: &'a FieldInfos, name: &str) -> Result<&'a FieldInfo> {
    infos
        .field_info(name)
        .ok_or_else(|| XiphosError::invariant(format!("no field info for buffered field '{name}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::field_infos::read_field_infos;
    use crate::codec::segment_info::read_segment_info;
    use crate::storage::MemoryStorage;

    fn writer(storage: &Arc<MemoryStorage>) -> SegmentWriter {
        SegmentWriter::new(storage.clone(), "_0", SegmentWriterConfig::default())
    }

    #[test]
    fn test_flush_writes_listed_files() {
        let storage = Arc::new(MemoryStorage::new_default());
        let mut w = writer(&storage);
        w.add_document(
            &Document::new()
                .with(Field::text("body", "the quick fox", true))
                .with(Field::numeric_doc_values("rank", 3)),
        )
        .unwrap();
        w.add_document(&Document::new().with(Field::string("id", "b", true)))
            .unwrap();
        w.delete_document(1).unwrap();
        let info = w.flush().unwrap();

        let expected: BTreeSet<String> = ["_0.pst", "_0.len", "_0.dat", "_0.fld", "_0_1.liv", "_0.inf", "_0.si"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(info.files, expected);
        for file in &info.files {
            assert!(storage.file_exists(file), "{file} missing");
        }
        assert_eq!(read_segment_info(storage.as_ref(), "_0").unwrap(), info);
        assert_eq!(info.diagnostics.get("source").map(String::as_str), Some("flush"));

        let infos = read_field_infos(storage.as_ref(), "_0", "").unwrap();
        assert!(infos.field_info("body").unwrap().has_norms());
        assert!(!infos.field_info("id").unwrap().has_norms());
        assert_eq!(
            infos.field_info("rank").unwrap().doc_values_type,
            Some(DocValuesType::Numeric)
        );
    }

    #[test]
    fn test_rejected_document_leaves_no_trace() {
        let storage = Arc::new(MemoryStorage::new_default());
        let mut w = writer(&storage);
        let bad = Document::new()
            .with(Field::numeric_doc_values("n", 1))
            .with(Field::numeric_doc_values("n", 2));
        assert!(w.add_document(&bad).is_err());
        assert_eq!(w.num_docs(), 0);

        let conflicting = Document::new().with(Field::string("f", "x", false));
        w.add_document(&conflicting).unwrap();
        assert!(w.add_document(&Document::new().with(Field::text("f", "y", false))).is_err());
        assert_eq!(w.num_docs(), 1);
    }

    #[test]
    fn test_backwards_offsets_rejected() {
        let storage = Arc::new(MemoryStorage::new_default());
        let mut w = writer(&storage);
        let tokens = vec![Token::new("b", 5, 6), Token::new("a", 2, 3)];
        let err = w
            .add_document(&Document::new().with(Field::tokens("f", tokens)))
            .unwrap_err();
        assert!(matches!(err, XiphosError::Invariant(_)));
    }

    #[test]
    fn test_config_from_json() {
        let config = SegmentWriterConfig::from_json(
            r#"{"segment_suffix": "s", "diagnostics": {"os": "linux"}}"#,
        )
        .unwrap();
        assert_eq!(config.segment_suffix, "s");
        assert!(!config.use_compound_file);
        assert_eq!(config.diagnostics["os"], "linux");
    }

    #[test]
    fn test_delete_out_of_range() {
        let storage = Arc::new(MemoryStorage::new_default());
        let mut w = writer(&storage);
        assert!(w.delete_document(0).is_err());
    }
}
