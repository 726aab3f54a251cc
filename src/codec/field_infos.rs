//! Field metadata (`.inf`).
//!
//! Every field of a segment gets a unique number and a set of flags telling
//! the other formats what was recorded for it: how much of the postings were
//! indexed, whether term vectors and norms exist, and which doc-values type
//! the field carries.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use ahash::AHashMap;

use crate::codec::line::{
    ChecksumInput, ChecksumOutput, LineBuf, check_footer, read_bool, read_string, read_value,
    write_checksum, write_line,
};
use crate::codec::{FIELD_INFOS_EXTENSION, segment_file_name};
use crate::error::{Result, XiphosError};
use crate::storage::Storage;

const NUMFIELDS: &str = "number of fields ";
const NAME: &str = "  name ";
const NUMBER: &str = "  number ";
const INDEXED: &str = "  indexed ";
const INDEXOPTIONS: &str = "  index options ";
const STORETV: &str = "  term vectors ";
const PAYLOADS: &str = "  payloads ";
const NORMS: &str = "  norms ";
const NORMS_TYPE: &str = "  norms type ";
const DOCVALUES: &str = "  doc values ";
const DOCVALUES_GEN: &str = "  doc values gen ";
const NUM_ATTS: &str = "  attributes ";
const ATT_KEY: &str = "    key ";
const ATT_VALUE: &str = "    value ";

/// Wire token for "no doc values" / "no norms".
const NONE: &str = "false";

/// What an indexed field records in its postings. Variants are ordered so
/// that a later variant includes everything recorded by the earlier ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IndexOptions {
    DocsOnly,
    DocsAndFreqs,
    DocsAndFreqsAndPositions,
    DocsAndFreqsAndPositionsAndOffsets,
}

impl IndexOptions {
    pub fn has_freqs(self) -> bool {
        self >= IndexOptions::DocsAndFreqs
    }

    pub fn has_positions(self) -> bool {
        self >= IndexOptions::DocsAndFreqsAndPositions
    }

    pub fn has_offsets(self) -> bool {
        self >= IndexOptions::DocsAndFreqsAndPositionsAndOffsets
    }

    fn as_str(self) -> &'static str {
        match self {
            IndexOptions::DocsOnly => "DOCS_ONLY",
            IndexOptions::DocsAndFreqs => "DOCS_AND_FREQS",
            IndexOptions::DocsAndFreqsAndPositions => "DOCS_AND_FREQS_AND_POSITIONS",
            IndexOptions::DocsAndFreqsAndPositionsAndOffsets => {
                "DOCS_AND_FREQS_AND_POSITIONS_AND_OFFSETS"
            }
        }
    }
}

impl fmt::Display for IndexOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IndexOptions {
    type Err = XiphosError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "DOCS_ONLY" => Ok(IndexOptions::DocsOnly),
            "DOCS_AND_FREQS" => Ok(IndexOptions::DocsAndFreqs),
            "DOCS_AND_FREQS_AND_POSITIONS" => Ok(IndexOptions::DocsAndFreqsAndPositions),
            "DOCS_AND_FREQS_AND_POSITIONS_AND_OFFSETS" => {
                Ok(IndexOptions::DocsAndFreqsAndPositionsAndOffsets)
            }
            other => Err(XiphosError::schema(format!("unknown index options '{other}'"))),
        }
    }
}

/// Kind of per-document value column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocValuesType {
    Numeric,
    Binary,
    Sorted,
    SortedSet,
}

impl DocValuesType {
    pub fn as_str(self) -> &'static str {
        match self {
            DocValuesType::Numeric => "NUMERIC",
            DocValuesType::Binary => "BINARY",
            DocValuesType::Sorted => "SORTED",
            DocValuesType::SortedSet => "SORTED_SET",
        }
    }
}

impl fmt::Display for DocValuesType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocValuesType {
    type Err = XiphosError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "NUMERIC" => Ok(DocValuesType::Numeric),
            "BINARY" => Ok(DocValuesType::Binary),
            "SORTED" => Ok(DocValuesType::Sorted),
            "SORTED_SET" => Ok(DocValuesType::SortedSet),
            other => Err(XiphosError::schema(format!("unknown doc values type '{other}'"))),
        }
    }
}

fn doc_values_type_token(dv: Option<DocValuesType>) -> &'static str {
    dv.map(DocValuesType::as_str).unwrap_or(NONE)
}

fn parse_doc_values_type(token: &str, resource: &str) -> Result<Option<DocValuesType>> {
    if token == NONE {
        return Ok(None);
    }
    token
        .parse()
        .map(Some)
        .map_err(|e: XiphosError| XiphosError::corruption(e.to_string(), resource))
}

/// Metadata for one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInfo {
    pub name: String,
    pub number: i32,
    pub indexed: bool,
    /// Present exactly when the field is indexed.
    pub index_options: Option<IndexOptions>,
    pub store_term_vectors: bool,
    pub store_payloads: bool,
    pub omit_norms: bool,
    pub norms_type: Option<DocValuesType>,
    pub doc_values_type: Option<DocValuesType>,
    /// Generation of doc-values updates, -1 when never updated.
    pub doc_values_gen: i64,
    pub attributes: BTreeMap<String, String>,
}

impl FieldInfo {
    /// A field with no postings, norms or doc values.
    pub fn new(name: impl Into<String>, number: i32) -> Self {
        FieldInfo {
            name: name.into(),
            number,
            indexed: false,
            index_options: None,
            store_term_vectors: false,
            store_payloads: false,
            omit_norms: false,
            norms_type: None,
            doc_values_type: None,
            doc_values_gen: -1,
            attributes: BTreeMap::new(),
        }
    }

    pub fn has_freqs(&self) -> bool {
        self.index_options.is_some_and(IndexOptions::has_freqs)
    }

    pub fn has_positions(&self) -> bool {
        self.index_options.is_some_and(IndexOptions::has_positions)
    }

    pub fn has_offsets(&self) -> bool {
        self.index_options.is_some_and(IndexOptions::has_offsets)
    }

    pub fn has_payloads(&self) -> bool {
        self.store_payloads
    }

    pub fn has_vectors(&self) -> bool {
        self.store_term_vectors
    }

    pub fn has_norms(&self) -> bool {
        self.norms_type.is_some()
    }

    pub fn has_doc_values(&self) -> bool {
        self.doc_values_type.is_some()
    }

    /// Check the flag combination is consistent.
    pub fn validate(&self) -> Result<()> {
        if self.indexed != self.index_options.is_some() {
            return Err(XiphosError::schema(format!(
                "field '{}' has inconsistent indexed flag and index options",
                self.name
            )));
        }
        if !self.indexed && (self.store_term_vectors || self.store_payloads || self.norms_type.is_some()) {
            return Err(XiphosError::schema(format!(
                "non-indexed field '{}' cannot have term vectors, payloads or norms",
                self.name
            )));
        }
        if self.store_payloads && !self.has_positions() {
            return Err(XiphosError::schema(format!(
                "field '{}' stores payloads but does not index positions",
                self.name
            )));
        }
        Ok(())
    }
}

/// The fields of one segment, addressable by name and by number.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldInfos {
    by_number: BTreeMap<i32, FieldInfo>,
    by_name: AHashMap<String, i32>,
}

impl FieldInfos {
    /// Build from a list, rejecting inconsistent fields and duplicate names
    /// or numbers.
    pub fn new(infos: Vec<FieldInfo>) -> Result<Self> {
        let mut field_infos = FieldInfos::default();
        for info in infos {
            info.validate()?;
            if field_infos.by_name.contains_key(&info.name) {
                return Err(XiphosError::schema(format!("duplicate field name '{}'", info.name)));
            }
            if field_infos.by_number.contains_key(&info.number) {
                return Err(XiphosError::schema(format!(
                    "duplicate field number {} for '{}'",
                    info.number, info.name
                )));
            }
            field_infos.by_name.insert(info.name.clone(), info.number);
            field_infos.by_number.insert(info.number, info);
        }
        Ok(field_infos)
    }

    pub fn field_info(&self, name: &str) -> Option<&FieldInfo> {
        self.by_name.get(name).and_then(|n| self.by_number.get(n))
    }

    pub fn field_info_by_number(&self, number: i32) -> Option<&FieldInfo> {
        self.by_number.get(&number)
    }

    /// Fields in ascending number order.
    pub fn iter(&self) -> impl Iterator<Item = &FieldInfo> {
        self.by_number.values()
    }

    pub fn len(&self) -> usize {
        self.by_number.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_number.is_empty()
    }

    pub fn has_postings(&self) -> bool {
        self.iter().any(|fi| fi.indexed)
    }

    pub fn has_vectors(&self) -> bool {
        self.iter().any(FieldInfo::has_vectors)
    }

    pub fn has_norms(&self) -> bool {
        self.iter().any(FieldInfo::has_norms)
    }

    pub fn has_doc_values(&self) -> bool {
        self.iter().any(FieldInfo::has_doc_values)
    }
}

/// Accumulates field infos while documents are added, assigning numbers in
/// first-seen order and widening flags as later documents demand.
#[derive(Debug, Default)]
pub struct FieldInfosBuilder {
    infos: Vec<FieldInfo>,
    by_name: AHashMap<String, usize>,
}

impl FieldInfosBuilder {
    pub fn new() -> Self {
        FieldInfosBuilder::default()
    }

    /// The info for `name`, created with the next free number if unseen.
    pub fn get_or_add(&mut self, name: &str) -> &mut FieldInfo {
        let slot = match self.by_name.get(name) {
            Some(&slot) => slot,
            None => {
                let slot = self.infos.len();
                self.infos.push(FieldInfo::new(name, slot as i32));
                self.by_name.insert(name.to_string(), slot);
                slot
            }
        };
        &mut self.infos[slot]
    }

    pub fn get(&self, name: &str) -> Option<&FieldInfo> {
        self.by_name.get(name).map(|&slot| &self.infos[slot])
    }

    pub fn finish(self) -> Result<FieldInfos> {
        FieldInfos::new(self.infos)
    }
}

/// Name of the field-infos file for `segment`.
pub fn field_infos_file_name(segment: &str, suffix: &str) -> String {
    segment_file_name(segment, suffix, FIELD_INFOS_EXTENSION)
}

/// Write `infos` for `segment`, returning the file name.
pub fn write_field_infos(
    storage: &dyn Storage,
    segment: &str,
    suffix: &str,
    infos: &FieldInfos,
) -> Result<String> {
    let file_name = field_infos_file_name(segment, suffix);
    let output = storage.create_output(&file_name)?;
    let mut out = ChecksumOutput::new(output, file_name.clone());
    match write_body(&mut out, infos) {
        Ok(()) => {
            out.close()?;
            Ok(file_name)
        }
        Err(e) => {
            drop(out);
            if let Err(cleanup) = storage.delete_file(&file_name) {
                log::warn!("failed to delete {file_name} after write error: {cleanup}");
            }
            Err(e)
        }
    }
}

fn write_body(out: &mut ChecksumOutput, infos: &FieldInfos) -> Result<()> {
    write_line(out, NUMFIELDS, infos.len())?;
    for fi in infos.iter() {
        write_line(out, NAME, &fi.name)?;
        write_line(out, NUMBER, fi.number)?;
        write_line(out, INDEXED, fi.indexed)?;
        if let Some(options) = fi.index_options {
            write_line(out, INDEXOPTIONS, options)?;
        }
        write_line(out, STORETV, fi.store_term_vectors)?;
        write_line(out, PAYLOADS, fi.store_payloads)?;
        write_line(out, NORMS, !fi.omit_norms)?;
        write_line(out, NORMS_TYPE, doc_values_type_token(fi.norms_type))?;
        write_line(out, DOCVALUES, doc_values_type_token(fi.doc_values_type))?;
        write_line(out, DOCVALUES_GEN, fi.doc_values_gen)?;

        write_line(out, NUM_ATTS, fi.attributes.len())?;
        for (key, value) in &fi.attributes {
            write_line(out, ATT_KEY, key)?;
            write_line(out, ATT_VALUE, value)?;
        }
    }
    write_checksum(out)
}

/// Read the field infos of `segment`.
pub fn read_field_infos(storage: &dyn Storage, segment: &str, suffix: &str) -> Result<FieldInfos> {
    let file_name = field_infos_file_name(segment, suffix);
    let res = file_name.as_str();
    let mut input = ChecksumInput::new(storage.open_input(&file_name)?);
    let mut line = LineBuf::new();

    let size: usize = read_value(&mut input, &mut line, NUMFIELDS, res)?;
    let mut infos = Vec::with_capacity(size);
    for _ in 0..size {
        let name = read_string(&mut input, &mut line, NAME, res)?;
        let number: i32 = read_value(&mut input, &mut line, NUMBER, res)?;
        let indexed = read_bool(&mut input, &mut line, INDEXED, res)?;
        let index_options = if indexed {
            let token = read_string(&mut input, &mut line, INDEXOPTIONS, res)?;
            Some(
                token
                    .parse::<IndexOptions>()
                    .map_err(|e| XiphosError::corruption(e.to_string(), res))?,
            )
        } else {
            None
        };
        let store_term_vectors = read_bool(&mut input, &mut line, STORETV, res)?;
        let store_payloads = read_bool(&mut input, &mut line, PAYLOADS, res)?;
        let omit_norms = !read_bool(&mut input, &mut line, NORMS, res)?;
        let norms_type =
            parse_doc_values_type(&read_string(&mut input, &mut line, NORMS_TYPE, res)?, res)?;
        let doc_values_type =
            parse_doc_values_type(&read_string(&mut input, &mut line, DOCVALUES, res)?, res)?;
        let doc_values_gen: i64 = read_value(&mut input, &mut line, DOCVALUES_GEN, res)?;

        let num_atts: usize = read_value(&mut input, &mut line, NUM_ATTS, res)?;
        let mut attributes = BTreeMap::new();
        for _ in 0..num_atts {
            let key = read_string(&mut input, &mut line, ATT_KEY, res)?;
            let value = read_string(&mut input, &mut line, ATT_VALUE, res)?;
            attributes.insert(key, value);
        }

        infos.push(FieldInfo {
            name,
            number,
            indexed,
            index_options,
            store_term_vectors,
            store_payloads,
            omit_norms,
            norms_type,
            doc_values_type,
            doc_values_gen,
            attributes,
        });
    }

    check_footer(&mut input, res)?;
    FieldInfos::new(infos).map_err(|e| XiphosError::corruption(e.to_string(), res))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn text_field(name: &str, number: i32) -> FieldInfo {
        let mut fi = FieldInfo::new(name, number);
        fi.indexed = true;
        fi.index_options = Some(IndexOptions::DocsAndFreqsAndPositionsAndOffsets);
        fi.store_term_vectors = true;
        fi.store_payloads = true;
        fi.norms_type = Some(DocValuesType::Numeric);
        fi
    }

    #[test]
    fn test_round_trip() {
        let storage = MemoryStorage::new_default();
        let mut body = text_field("body", 0);
        body.attributes.insert("analyzer".to_string(), "whitespace".to_string());
        let mut price = FieldInfo::new("price", 1);
        price.doc_values_type = Some(DocValuesType::Numeric);
        let mut tags = FieldInfo::new("tags", 2);
        tags.doc_values_type = Some(DocValuesType::SortedSet);
        tags.doc_values_gen = 3;

        let infos = FieldInfos::new(vec![body, price, tags]).unwrap();
        let name = write_field_infos(&storage, "_0", "", &infos).unwrap();
        assert_eq!(name, "_0.inf");

        let read = read_field_infos(&storage, "_0", "").unwrap();
        assert_eq!(read, infos);
        assert!(read.field_info("body").unwrap().has_offsets());
        assert_eq!(read.field_info_by_number(2).unwrap().name, "tags");
        assert!(read.has_vectors());
        assert!(read.has_doc_values());
    }

    #[test]
    fn test_none_sentinel_on_wire() {
        let storage = MemoryStorage::new_default();
        let infos = FieldInfos::new(vec![FieldInfo::new("stored", 0)]).unwrap();
        write_field_infos(&storage, "_0", "", &infos).unwrap();

        let text = String::from_utf8(storage.read_all("_0.inf").unwrap()).unwrap();
        assert!(text.contains("  indexed false\n  term vectors false\n"));
        assert!(text.contains("  norms type false\n"));
        assert!(text.contains("  doc values false\n"));
        assert!(!text.contains("index options"));
    }

    #[test]
    fn test_payloads_require_positions() {
        let mut fi = text_field("body", 0);
        fi.index_options = Some(IndexOptions::DocsAndFreqs);
        assert!(matches!(
            FieldInfos::new(vec![fi]).unwrap_err(),
            XiphosError::Schema(_)
        ));
    }

    #[test]
    fn test_duplicates_rejected() {
        let err = FieldInfos::new(vec![text_field("a", 0), text_field("a", 1)]).unwrap_err();
        assert!(err.to_string().contains("duplicate field name"));

        let err = FieldInfos::new(vec![text_field("a", 0), text_field("b", 0)]).unwrap_err();
        assert!(err.to_string().contains("duplicate field number"));
    }

    #[test]
    fn test_builder_assigns_numbers() {
        let mut builder = FieldInfosBuilder::new();
        builder.get_or_add("title");
        builder.get_or_add("body");
        builder.get_or_add("title").store_term_vectors = false;
        let infos = builder.finish().unwrap();
        assert_eq!(infos.field_info("title").unwrap().number, 0);
        assert_eq!(infos.field_info("body").unwrap().number, 1);
    }
}
