//! Index readers.
//!
//! [`LeafReader`] is the per-segment read interface every search component
//! consumes. [`SegmentReader`] implements it over the codec files of one
//! flushed segment, and [`IndexReader`] composes leaves into a single doc id
//! space.

use std::fmt::Debug;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::codec::doc_values::{
    BinaryDocValues, DocValuesReader, DocsWithField, NormsReader, NumericDocValues,
    SortedDocValues, SortedSetDocValues,
};
use crate::codec::field_infos::{FieldInfos, read_field_infos};
use crate::codec::live_docs::{LiveDocs, read_live_docs};
use crate::codec::postings::{DocsAndPositionsEnum, DocsEnum, PostingsReader, Terms};
use crate::codec::segment_info::{SegmentInfo, read_segment_info};
use crate::codec::stored_fields::{
    DocumentStoredFieldVisitor, StoredFieldVisitor, StoredFieldsReader, StoredValue,
};
use crate::codec::term_vectors::{TermVectors, TermVectorsReader};
use crate::codec::{
    DOC_VALUES_EXTENSION, LIVE_DOCS_EXTENSION, NORMS_EXTENSION, POSTINGS_EXTENSION,
    SegmentReadState, TERM_VECTORS_EXTENSION,
};
use crate::error::{Result, XiphosError};
use crate::index::field_cache::FieldCache;
use crate::storage::Storage;
use crate::util::bits::Bits;

/// Read access to one segment.
pub trait LeafReader: Send + Sync + Debug {
    /// Number of documents, deleted ones included.
    fn max_doc(&self) -> i32;

    /// Number of live documents.
    fn num_docs(&self) -> i32;

    fn field_infos(&self) -> &FieldInfos;

    /// The terms of `field`, `None` if it has no postings.
    fn terms(&self, field: &str) -> Result<Option<Arc<Terms>>>;

    fn numeric_doc_values(&self, field: &str) -> Result<Option<Box<dyn NumericDocValues>>>;

    fn binary_doc_values(&self, field: &str) -> Result<Option<Box<dyn BinaryDocValues>>>;

    fn sorted_doc_values(&self, field: &str) -> Result<Option<Box<dyn SortedDocValues>>>;

    fn sorted_set_doc_values(&self, field: &str) -> Result<Option<Box<dyn SortedSetDocValues>>>;

    /// Which documents have a doc value for `field`.
    fn docs_with_field(&self, field: &str) -> Result<Option<Box<dyn DocsWithField>>>;

    fn norm_values(&self, field: &str) -> Result<Option<Box<dyn NumericDocValues>>>;

    /// Live documents, `None` when nothing is deleted.
    fn live_docs(&self) -> Option<Arc<dyn Bits>>;

    /// Replay the stored fields of `doc` through `visitor`.
    fn document(&self, doc: i32, visitor: &mut dyn StoredFieldVisitor) -> Result<()>;

    fn term_vectors(&self, doc: i32) -> Result<Option<TermVectors>>;

    fn field_cache(&self) -> &FieldCache;

    fn check_integrity(&self) -> Result<()>;

    fn has_deletions(&self) -> bool {
        self.num_docs() < self.max_doc()
    }

    /// Number of documents containing `term`, deleted ones included.
    fn doc_freq(&self, field: &str, term: &[u8]) -> Result<i32> {
        match self.terms(field)? {
            Some(terms) => {
                let mut terms_enum = terms.iterator();
                if terms_enum.seek_exact(term) {
                    terms_enum.doc_freq()
                } else {
                    Ok(0)
                }
            }
            None => Ok(0),
        }
    }

    /// Total occurrences of `term`, -1 when the field has no frequencies.
    fn total_term_freq(&self, field: &str, term: &[u8]) -> Result<i64> {
        match self.terms(field)? {
            Some(terms) => {
                let mut terms_enum = terms.iterator();
                if terms_enum.seek_exact(term) {
                    terms_enum.total_term_freq()
                } else {
                    Ok(0)
                }
            }
            None => Ok(0),
        }
    }

    /// Live documents containing `term`.
    fn docs(&self, field: &str, term: &[u8], needs_freqs: bool) -> Result<Option<Box<dyn DocsEnum>>> {
        let Some(terms) = self.terms(field)? else {
            return Ok(None);
        };
        let mut terms_enum = terms.iterator();
        if !terms_enum.seek_exact(term) {
            return Ok(None);
        }
        terms_enum.docs(self.live_docs(), needs_freqs).map(Some)
    }

    /// Live documents and positions of `term`, `None` if the term is absent
    /// or the field has no positions.
    fn docs_and_positions(&self, field: &str, term: &[u8]) -> Result<Option<Box<dyn DocsAndPositionsEnum>>> {
        let Some(terms) = self.terms(field)? else {
            return Ok(None);
        };
        let mut terms_enum = terms.iterator();
        if !terms_enum.seek_exact(term) {
            return Ok(None);
        }
        terms_enum.docs_and_positions(self.live_docs())
    }

    /// Every stored value of `doc`.
    fn stored_document(&self, doc: i32) -> Result<Vec<(String, StoredValue)>> {
        let mut visitor = DocumentStoredFieldVisitor::new();
        self.document(doc, &mut visitor)?;
        Ok(visitor.into_values())
    }
}

/// A reader over the files of one flushed segment.
#[derive(Debug)]
pub struct SegmentReader {
    info: Arc<SegmentInfo>,
    field_infos: Arc<FieldInfos>,
    postings: Option<PostingsReader>,
    norms: Option<NormsReader>,
    doc_values: Option<DocValuesReader>,
    stored_fields: Mutex<StoredFieldsReader>,
    term_vectors: Option<Mutex<TermVectorsReader>>,
    live_docs: Option<LiveDocs>,
    field_cache: FieldCache,
}

impl SegmentReader {
    /// Open segment `name` whose codec files carry no suffix.
    pub fn open(storage: Arc<dyn Storage>, name: &str) -> Result<Self> {
        Self::open_with_suffix(storage, name, "")
    }

    /// Open segment `name`. Only the codec files listed in its segment info
    /// are opened.
    pub fn open_with_suffix(storage: Arc<dyn Storage>, name: &str, suffix: &str) -> Result<Self> {
        let info = Arc::new(read_segment_info(storage.as_ref(), name)?);
        let field_infos = Arc::new(read_field_infos(storage.as_ref(), name, suffix)?);
        let state = SegmentReadState {
            storage: Arc::clone(&storage),
            segment_info: Arc::clone(&info),
            field_infos: Arc::clone(&field_infos),
            segment_suffix: suffix.to_string(),
        };
        let listed = |ext: &str| info.files.contains(&state.file_name(ext));

        let postings = if listed(POSTINGS_EXTENSION) {
            Some(PostingsReader::open(&state)?)
        } else {
            None
        };
        let norms = if listed(NORMS_EXTENSION) {
            Some(NormsReader::open(&state)?)
        } else {
            None
        };
        let doc_values = if listed(DOC_VALUES_EXTENSION) {
            Some(DocValuesReader::open(&state, DOC_VALUES_EXTENSION)?)
        } else {
            None
        };
        let stored_fields = Mutex::new(StoredFieldsReader::open(&state)?);
        let term_vectors = if listed(TERM_VECTORS_EXTENSION) {
            Some(Mutex::new(TermVectorsReader::open(&state)?))
        } else {
            None
        };
        let live_suffix = format!(".{LIVE_DOCS_EXTENSION}");
        let live_docs = match info.files.iter().find(|f| f.ends_with(&live_suffix)) {
            Some(file) => Some(read_live_docs(storage.as_ref(), file, info.doc_count)?),
            None => None,
        };

        log::debug!(
            "opened segment {name} with {} documents and {} fields",
            info.doc_count,
            field_infos.len()
        );
        Ok(SegmentReader {
            info,
            field_infos,
            postings,
            norms,
            doc_values,
            stored_fields,
            term_vectors,
            live_docs,
            field_cache: FieldCache::new(),
        })
    }

    pub fn segment_info(&self) -> &SegmentInfo {
        &self.info
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    /// The doc-values reader if `field` has doc values of any type.
    fn doc_values_for(&self, field: &str) -> Option<&DocValuesReader> {
        self.doc_values.as_ref().filter(|dv| dv.has_field(field))
    }
}

impl LeafReader for SegmentReader {
    fn max_doc(&self) -> i32 {
        self.info.doc_count
    }

    fn num_docs(&self) -> i32 {
        match &self.live_docs {
            Some(live) => live.num_live() as i32,
            None => self.info.doc_count,
        }
    }

    fn field_infos(&self) -> &FieldInfos {
        &self.field_infos
    }

    fn terms(&self, field: &str) -> Result<Option<Arc<Terms>>> {
        match &self.postings {
            Some(postings) => postings.terms(field),
            None => Ok(None),
        }
    }

    fn numeric_doc_values(&self, field: &str) -> Result<Option<Box<dyn NumericDocValues>>> {
        self.doc_values_for(field).map(|dv| dv.numeric(field)).transpose()
    }

    fn binary_doc_values(&self, field: &str) -> Result<Option<Box<dyn BinaryDocValues>>> {
        self.doc_values_for(field).map(|dv| dv.binary(field)).transpose()
    }

    fn sorted_doc_values(&self, field: &str) -> Result<Option<Box<dyn SortedDocValues>>> {
        self.doc_values_for(field).map(|dv| dv.sorted(field)).transpose()
    }

    fn sorted_set_doc_values(&self, field: &str) -> Result<Option<Box<dyn SortedSetDocValues>>> {
        self.doc_values_for(field).map(|dv| dv.sorted_set(field)).transpose()
    }

    fn docs_with_field(&self, field: &str) -> Result<Option<Box<dyn DocsWithField>>> {
        self.doc_values_for(field).map(|dv| dv.docs_with_field(field)).transpose()
    }

    fn norm_values(&self, field: &str) -> Result<Option<Box<dyn NumericDocValues>>> {
        match &self.norms {
            Some(norms) if norms.has_field(field) => norms.norms(field).map(Some),
            _ => Ok(None),
        }
    }

    fn live_docs(&self) -> Option<Arc<dyn Bits>> {
        self.live_docs
            .as_ref()
            .map(|live| Arc::new(live.clone()) as Arc<dyn Bits>)
    }

    fn document(&self, doc: i32, visitor: &mut dyn StoredFieldVisitor) -> Result<()> {
        self.stored_fields.lock().visit_document(doc, visitor)
    }

    fn term_vectors(&self, doc: i32) -> Result<Option<TermVectors>> {
        match &self.term_vectors {
            Some(reader) => reader.lock().get(doc),
            None => Ok(None),
        }
    }

    fn field_cache(&self) -> &FieldCache {
        &self.field_cache
    }

    fn check_integrity(&self) -> Result<()> {
        if let Some(postings) = &self.postings {
            postings.check_integrity()?;
        }
        if let Some(norms) = &self.norms {
            norms.check_integrity()?;
        }
        if let Some(doc_values) = &self.doc_values {
            doc_values.check_integrity()?;
        }
        self.stored_fields.lock().check_integrity()?;
        if let Some(vectors) = &self.term_vectors {
            vectors.lock().check_integrity()?;
        }
        Ok(())
    }
}

/// A composite of leaves sharing one doc id space. Leaf `i` owns the ids
/// `doc_base(i)..doc_base(i) + max_doc(i)`.
#[derive(Debug)]
pub struct IndexReader {
    leaves: Vec<Arc<dyn LeafReader>>,
    doc_bases: Vec<i32>,
    max_doc: i32,
    num_docs: i32,
}

impl IndexReader {
    pub fn new(leaves: Vec<Arc<dyn LeafReader>>) -> Arc<Self> {
        let mut doc_bases = Vec::with_capacity(leaves.len());
        let mut max_doc = 0;
        let mut num_docs = 0;
        for leaf in &leaves {
            doc_bases.push(max_doc);
            max_doc += leaf.max_doc();
            num_docs += leaf.num_docs();
        }
        Arc::new(IndexReader {
            leaves,
            doc_bases,
            max_doc,
            num_docs,
        })
    }

    /// Open the named segments, in order, as the leaves of one reader.
    pub fn open(storage: Arc<dyn Storage>, segments: &[&str]) -> Result<Arc<Self>> {
        let mut leaves: Vec<Arc<dyn LeafReader>> = Vec::with_capacity(segments.len());
        for name in segments {
            leaves.push(Arc::new(SegmentReader::open(Arc::clone(&storage), name)?));
        }
        Ok(IndexReader::new(leaves))
    }

    /// The leaves with their doc bases and a handle back to this reader.
    pub fn leaves(self: &Arc<Self>) -> Vec<LeafReaderContext> {
        self.leaves
            .iter()
            .zip(&self.doc_bases)
            .enumerate()
            .map(|(ord, (reader, &doc_base))| LeafReaderContext {
                ord,
                doc_base,
                reader: Arc::clone(reader),
                top: Arc::clone(self),
            })
            .collect()
    }

    pub fn max_doc(&self) -> i32 {
        self.max_doc
    }

    pub fn num_docs(&self) -> i32 {
        self.num_docs
    }

    pub fn has_deletions(&self) -> bool {
        self.num_docs < self.max_doc
    }

    /// Index of the leaf owning top-level `doc`.
    pub fn leaf_index(&self, doc: i32) -> Result<usize> {
        if doc < 0 || doc >= self.max_doc {
            return Err(XiphosError::invalid_argument(format!(
                "document {doc} out of range for {} documents",
                self.max_doc
            )));
        }
        Ok(self.doc_bases.partition_point(|&base| base <= doc) - 1)
    }

    /// Replay the stored fields of top-level `doc` through `visitor`.
    pub fn document(&self, doc: i32, visitor: &mut dyn StoredFieldVisitor) -> Result<()> {
        let leaf = self.leaf_index(doc)?;
        self.leaves[leaf].document(doc - self.doc_bases[leaf], visitor)
    }

    pub fn doc_freq(&self, field: &str, term: &[u8]) -> Result<i64> {
        let mut total = 0i64;
        for leaf in &self.leaves {
            total += leaf.doc_freq(field, term)? as i64;
        }
        Ok(total)
    }

    /// Total occurrences of `term`, -1 if any leaf lacks frequencies.
    pub fn total_term_freq(&self, field: &str, term: &[u8]) -> Result<i64> {
        let mut total = 0i64;
        for leaf in &self.leaves {
            let freq = leaf.total_term_freq(field, term)?;
            if freq < 0 {
                return Ok(-1);
            }
            total += freq;
        }
        Ok(total)
    }

    /// Documents with at least one term in `field`.
    pub fn doc_count(&self, field: &str) -> Result<i64> {
        self.sum_over_terms(field, |terms| terms.doc_count() as i64)
    }

    pub fn sum_doc_freq(&self, field: &str) -> Result<i64> {
        self.sum_over_terms(field, |terms| terms.sum_doc_freq())
    }

    /// Sum of all term frequencies in `field`, -1 if any leaf lacks them.
    pub fn sum_total_term_freq(&self, field: &str) -> Result<i64> {
        self.sum_over_terms(field, |terms| terms.sum_total_term_freq())
    }

    fn sum_over_terms(&self, field: &str, stat: impl Fn(&Terms) -> i64) -> Result<i64> {
        let mut total = 0i64;
        for leaf in &self.leaves {
            if let Some(terms) = leaf.terms(field)? {
                let value = stat(&terms);
                if value < 0 {
                    return Ok(-1);
                }
                total += value;
            }
        }
        Ok(total)
    }
}

/// One leaf of an [`IndexReader`].
#[derive(Debug, Clone)]
pub struct LeafReaderContext {
    /// Position among the leaves.
    pub ord: usize,
    /// Top-level id of the leaf's document 0.
    pub doc_base: i32,
    pub reader: Arc<dyn LeafReader>,
    top: Arc<IndexReader>,
}

impl LeafReaderContext {
    pub fn reader(&self) -> &dyn LeafReader {
        self.reader.as_ref()
    }

    /// The composite reader this leaf belongs to.
    pub fn top_level(&self) -> &Arc<IndexReader> {
        &self.top
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::NO_MORE_DOCS;
    use crate::index::document::{Document, Field, FieldValue};
    use crate::index::writer::{SegmentWriter, SegmentWriterConfig};
    use crate::storage::MemoryStorage;

    fn build(storage: &Arc<dyn Storage>, name: &str, docs: &[Document], delete: &[i32]) {
        let mut writer = SegmentWriter::new(Arc::clone(storage), name, SegmentWriterConfig::default());
        for doc in docs {
            writer.add_document(doc).unwrap();
        }
        for &doc in delete {
            writer.delete_document(doc).unwrap();
        }
        writer.flush().unwrap();
    }

    #[test]
    fn test_segment_reader_exposes_every_codec() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new_default());
        build(
            &storage,
            "_0",
            &[
                Document::new()
                    .with(Field::text("body", "red fox red", true).with_term_vectors(true, true, false))
                    .with(Field::numeric_doc_values("rank", 5))
                    .with(Field::sorted_doc_values("tag", "b")),
                Document::new()
                    .with(Field::text("body", "blue", false))
                    .with(Field::stored("raw", FieldValue::Binary(vec![0, 10, 92])))
                    .with(Field::sorted_doc_values("tag", "a")),
            ],
            &[],
        );
        let reader = SegmentReader::open(Arc::clone(&storage), "_0").unwrap();
        assert_eq!(reader.max_doc(), 2);
        assert_eq!(reader.num_docs(), 2);
        assert!(reader.live_docs().is_none());

        assert_eq!(reader.doc_freq("body", b"red").unwrap(), 1);
        assert_eq!(reader.total_term_freq("body", b"red").unwrap(), 2);
        let mut positions = reader.docs_and_positions("body", b"red").unwrap().unwrap();
        assert_eq!(positions.next_doc().unwrap(), 0);
        assert_eq!(positions.freq(), 2);
        assert_eq!(positions.next_position().unwrap(), 0);
        assert_eq!(positions.next_position().unwrap(), 2);

        let mut rank = reader.numeric_doc_values("rank").unwrap().unwrap();
        assert_eq!(rank.get(0).unwrap(), 5);
        let mut tag = reader.sorted_doc_values("tag").unwrap().unwrap();
        assert_eq!(tag.ord(0).unwrap(), 1);
        assert_eq!(tag.get(1).unwrap(), Some(b"a".to_vec()));
        assert!(reader.numeric_doc_values("missing").unwrap().is_none());
        assert!(reader.norm_values("body").unwrap().is_some());

        let stored = reader.stored_document(1).unwrap();
        assert_eq!(stored, vec![("raw".to_string(), StoredValue::Binary(vec![0, 10, 92]))]);

        let vectors = reader.term_vectors(0).unwrap().unwrap();
        assert_eq!(vectors["body"].terms[&b"red".to_vec()].positions, vec![0, 2]);
        assert!(reader.term_vectors(1).unwrap().is_none());

        reader.check_integrity().unwrap();
    }

    #[test]
    fn test_deleted_documents_are_skipped() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new_default());
        let docs: Vec<Document> = (0..4)
            .map(|_| Document::new().with(Field::string("kind", "x", false)))
            .collect();
        build(&storage, "_0", &docs, &[1, 2]);

        let reader = SegmentReader::open(Arc::clone(&storage), "_0").unwrap();
        assert_eq!(reader.num_docs(), 2);
        assert!(reader.has_deletions());
        let mut docs = reader.docs("kind", b"x", false).unwrap().unwrap();
        assert_eq!(docs.next_doc().unwrap(), 0);
        assert_eq!(docs.next_doc().unwrap(), 3);
        assert_eq!(docs.next_doc().unwrap(), NO_MORE_DOCS);
    }

    #[test]
    fn test_composite_doc_bases() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new_default());
        let doc = |v: &str| Document::new().with(Field::string("id", v, true));
        build(&storage, "_0", &[doc("a"), doc("b")], &[]);
        build(&storage, "_1", &[doc("c")], &[]);

        let reader = IndexReader::open(Arc::clone(&storage), &["_0", "_1"]).unwrap();
        assert_eq!(reader.max_doc(), 3);
        let leaves = reader.leaves();
        assert_eq!(leaves.len(), 2);
        assert_eq!(leaves[1].doc_base, 2);
        assert_eq!(leaves[1].top_level().max_doc(), 3);
        assert_eq!(reader.leaf_index(2).unwrap(), 1);
        assert_eq!(reader.doc_freq("id", b"c").unwrap(), 1);
        assert_eq!(reader.doc_count("id").unwrap(), 3);

        let mut visitor = DocumentStoredFieldVisitor::new();
        reader.document(2, &mut visitor).unwrap();
        assert_eq!(visitor.get("id"), Some(&StoredValue::String("c".to_string())));
        assert!(reader.leaf_index(3).is_err());
    }
}
