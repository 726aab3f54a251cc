//! Index statistics as values.
//!
//! Most of these are constant across the index and computed once per query.
//! `termfreq`, `tf` and `norm` vary per document. `idf`, `tf` and `norm`
//! are defined by the vector-space model and need a TF-IDF similarity.

use std::sync::Arc;

use crate::codec::doc_values::NumericDocValues;
use crate::codec::postings::DocsEnum;
use crate::error::{Result, XiphosError};
use crate::index::reader::{LeafReader, LeafReaderContext};
use crate::search::function::constant::{ConstValues, Constant};
use crate::search::function::{FunctionValues, MutableValue, ValueContext, ValueSource};
use crate::search::searcher::IndexSearcher;
use crate::search::similarity::{Similarity, TfIdfSimilarity};

fn tf_idf<'a>(similarity: &'a dyn Similarity, description: &str) -> Result<&'a dyn TfIdfSimilarity> {
    similarity.as_tf_idf().ok_or_else(|| {
        XiphosError::unsupported(format!(
            "{description} requires a TF-IDF similarity, not {}",
            similarity.name()
        ))
    })
}

/// A constant computed from the searcher, memoized in the context.
fn memo_constant<S, F>(source: &S, context: &ValueContext, compute: F) -> Result<Box<dyn FunctionValues>>
where
    S: ValueSource,
    F: FnOnce(&IndexSearcher) -> Result<Constant>,
{
    let value = context.get_or_try_insert_with(source, || compute(context.searcher()))?;
    Ok(ConstValues::boxed(source.description(), *value))
}

fn term_description(name: &str, field: &str, term: &[u8]) -> String {
    format!("{name}({field},{})", String::from_utf8_lossy(term))
}

/// `docfreq(field, term)`: number of documents containing the term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocFreqValueSource {
    field: String,
    term: Vec<u8>,
}

impl DocFreqValueSource {
    pub fn new(field: impl Into<String>, term: impl Into<Vec<u8>>) -> Self {
        DocFreqValueSource {
            field: field.into(),
            term: term.into(),
        }
    }
}

impl ValueSource for DocFreqValueSource {
    fn create_weight(&self, context: &ValueContext, _searcher: &IndexSearcher) -> Result<()> {
        self.constant(context).map(|_| ())
    }

    fn get_values(&self, context: &ValueContext, _leaf: &LeafReaderContext) -> Result<Box<dyn FunctionValues>> {
        self.constant(context)
    }

    fn description(&self) -> String {
        term_description("docfreq", &self.field, &self.term)
    }
}

impl DocFreqValueSource {
    fn constant(&self, context: &ValueContext) -> Result<Box<dyn FunctionValues>> {
        memo_constant(self, context, |searcher| {
            Ok(Constant::Int(searcher.doc_freq(&self.field, &self.term)?))
        })
    }
}

/// `totaltermfreq(field, term)`: occurrences of the term in the index, -1
/// when the field does not index frequencies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TotalTermFreqValueSource {
    field: String,
    term: Vec<u8>,
}

impl TotalTermFreqValueSource {
    pub fn new(field: impl Into<String>, term: impl Into<Vec<u8>>) -> Self {
        TotalTermFreqValueSource {
            field: field.into(),
            term: term.into(),
        }
    }
}

impl ValueSource for TotalTermFreqValueSource {
    fn create_weight(&self, context: &ValueContext, _searcher: &IndexSearcher) -> Result<()> {
        self.constant(context).map(|_| ())
    }

    fn get_values(&self, context: &ValueContext, _leaf: &LeafReaderContext) -> Result<Box<dyn FunctionValues>> {
        self.constant(context)
    }

    fn description(&self) -> String {
        term_description("totaltermfreq", &self.field, &self.term)
    }
}

impl TotalTermFreqValueSource {
    fn constant(&self, context: &ValueContext) -> Result<Box<dyn FunctionValues>> {
        memo_constant(self, context, |searcher| {
            Ok(Constant::Int(searcher.total_term_freq(&self.field, &self.term)?))
        })
    }
}

/// `sumtotaltermfreq(field)`: occurrences of all terms of the field, -1 when
/// the field does not index frequencies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SumTotalTermFreqValueSource {
    field: String,
}

impl SumTotalTermFreqValueSource {
    pub fn new(field: impl Into<String>) -> Self {
        SumTotalTermFreqValueSource { field: field.into() }
    }
}

impl ValueSource for SumTotalTermFreqValueSource {
    fn get_values(&self, context: &ValueContext, _leaf: &LeafReaderContext) -> Result<Box<dyn FunctionValues>> {
        memo_constant(self, context, |searcher| {
            Ok(Constant::Int(searcher.reader().sum_total_term_freq(&self.field)?))
        })
    }

    fn description(&self) -> String {
        format!("sumtotaltermfreq({})", self.field)
    }
}

/// `numdocs()`: number of live documents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NumDocsValueSource;

impl ValueSource for NumDocsValueSource {
    fn get_values(&self, context: &ValueContext, _leaf: &LeafReaderContext) -> Result<Box<dyn FunctionValues>> {
        let num_docs = context.searcher().reader().num_docs();
        Ok(ConstValues::boxed(self.description(), Constant::Int(num_docs as i64)))
    }

    fn description(&self) -> String {
        "numdocs()".to_string()
    }
}

/// `maxdoc()`: number of documents, deleted ones included.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaxDocValueSource;

impl ValueSource for MaxDocValueSource {
    fn get_values(&self, context: &ValueContext, _leaf: &LeafReaderContext) -> Result<Box<dyn FunctionValues>> {
        let max_doc = context.searcher().reader().max_doc();
        Ok(ConstValues::boxed(self.description(), Constant::Int(max_doc as i64)))
    }

    fn description(&self) -> String {
        "maxdoc()".to_string()
    }
}

/// `idf(field, term)`: inverse document frequency of the term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdfValueSource {
    field: String,
    term: Vec<u8>,
}

impl IdfValueSource {
    pub fn new(field: impl Into<String>, term: impl Into<Vec<u8>>) -> Self {
        IdfValueSource {
            field: field.into(),
            term: term.into(),
        }
    }
}

impl ValueSource for IdfValueSource {
    fn get_values(&self, context: &ValueContext, _leaf: &LeafReaderContext) -> Result<Box<dyn FunctionValues>> {
        let description = self.description();
        memo_constant(self, context, |searcher| {
            let similarity = tf_idf(searcher.similarity().as_ref(), &description)?;
            let doc_freq = searcher.doc_freq(&self.field, &self.term)?;
            let max_doc = searcher.reader().max_doc() as i64;
            Ok(Constant::Float(similarity.idf(doc_freq, max_doc)))
        })
    }

    fn description(&self) -> String {
        term_description("idf", &self.field, &self.term)
    }
}

/// Live-docs-agnostic postings of one term with a monotonic cursor.
#[derive(Debug)]
struct TermCursor {
    reader: Arc<dyn LeafReader>,
    field: String,
    term: Vec<u8>,
    docs: Option<Box<dyn DocsEnum>>,
    at_doc: i32,
    last_doc_requested: i32,
}

impl TermCursor {
    fn open(reader: Arc<dyn LeafReader>, field: &str, term: &[u8]) -> Result<Self> {
        let docs = Self::docs(reader.as_ref(), field, term)?;
        Ok(TermCursor {
            reader,
            field: field.to_string(),
            term: term.to_vec(),
            docs,
            at_doc: -1,
            last_doc_requested: -1,
        })
    }

    fn docs(reader: &dyn LeafReader, field: &str, term: &[u8]) -> Result<Option<Box<dyn DocsEnum>>> {
        let Some(terms) = reader.terms(field)? else {
            return Ok(None);
        };
        let mut terms_enum = terms.iterator();
        if !terms_enum.seek_exact(term) {
            return Ok(None);
        }
        terms_enum.docs(None, true).map(Some)
    }

    /// Frequency of the term in `doc`, 0 when absent.
    fn freq(&mut self, doc: i32) -> Result<i32> {
        if doc < self.last_doc_requested {
            self.docs = Self::docs(self.reader.as_ref(), &self.field, &self.term)?;
            self.at_doc = -1;
        }
        self.last_doc_requested = doc;
        let Some(docs) = self.docs.as_mut() else {
            return Ok(0);
        };
        if self.at_doc < doc {
            self.at_doc = docs.advance(doc)?;
        }
        Ok(if self.at_doc == doc { docs.freq() } else { 0 })
    }
}

/// `termfreq(field, term)`: occurrences of the term in each document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermFreqValueSource {
    field: String,
    term: Vec<u8>,
}

impl TermFreqValueSource {
    pub fn new(field: impl Into<String>, term: impl Into<Vec<u8>>) -> Self {
        TermFreqValueSource {
            field: field.into(),
            term: term.into(),
        }
    }
}

impl ValueSource for TermFreqValueSource {
    fn get_values(&self, _context: &ValueContext, leaf: &LeafReaderContext) -> Result<Box<dyn FunctionValues>> {
        Ok(Box::new(TermFreqValues {
            description: self.description(),
            cursor: TermCursor::open(Arc::clone(&leaf.reader), &self.field, &self.term)?,
            similarity: None,
        }))
    }

    fn description(&self) -> String {
        term_description("termfreq", &self.field, &self.term)
    }
}

/// `tf(field, term)`: the similarity's term-frequency factor in each
/// document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TfValueSource {
    field: String,
    term: Vec<u8>,
}

impl TfValueSource {
    pub fn new(field: impl Into<String>, term: impl Into<Vec<u8>>) -> Self {
        TfValueSource {
            field: field.into(),
            term: term.into(),
        }
    }
}

impl ValueSource for TfValueSource {
    fn get_values(&self, context: &ValueContext, leaf: &LeafReaderContext) -> Result<Box<dyn FunctionValues>> {
        let description = self.description();
        let similarity = Arc::clone(context.searcher().similarity());
        tf_idf(similarity.as_ref(), &description)?;
        Ok(Box::new(TermFreqValues {
            description,
            cursor: TermCursor::open(Arc::clone(&leaf.reader), &self.field, &self.term)?,
            similarity: Some(similarity),
        }))
    }

    fn description(&self) -> String {
        term_description("tf", &self.field, &self.term)
    }
}

#[derive(Debug)]
struct TermFreqValues {
    description: String,
    cursor: TermCursor,
    /// Present for `tf`, which maps raw frequencies through the similarity.
    similarity: Option<Arc<dyn Similarity>>,
}

impl FunctionValues for TermFreqValues {
    fn double_val(&mut self, doc: i32) -> Result<f64> {
        Ok(self.float_val(doc)? as f64)
    }

    fn float_val(&mut self, doc: i32) -> Result<f32> {
        let freq = self.cursor.freq(doc)? as f32;
        match &self.similarity {
            Some(similarity) => Ok(tf_idf(similarity.as_ref(), &self.description)?.tf(freq)),
            None => Ok(freq),
        }
    }

    fn long_val(&mut self, doc: i32) -> Result<i64> {
        match self.similarity {
            Some(_) => Ok(self.float_val(doc)? as i64),
            None => Ok(self.cursor.freq(doc)? as i64),
        }
    }

    fn str_val(&mut self, doc: i32) -> Result<Option<String>> {
        Ok(Some(match self.similarity {
            Some(_) => self.float_val(doc)?.to_string(),
            None => self.cursor.freq(doc)?.to_string(),
        }))
    }

    fn describe(&mut self, doc: i32) -> Result<String> {
        let val = self.str_val(doc)?.unwrap_or_default();
        Ok(format!("{}={}", self.description, val))
    }

    fn fill_value(&mut self, doc: i32, value: &mut MutableValue) -> Result<()> {
        *value = match self.similarity {
            Some(_) => MutableValue::Float(self.float_val(doc)?),
            None => MutableValue::Int(self.cursor.freq(doc)?),
        };
        Ok(())
    }
}

/// `norm(field)`: the decoded length norm of the field in each document, 0
/// when the field has no norms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormValueSource {
    field: String,
}

impl NormValueSource {
    pub fn new(field: impl Into<String>) -> Self {
        NormValueSource { field: field.into() }
    }
}

impl ValueSource for NormValueSource {
    fn create_weight(&self, _context: &ValueContext, searcher: &IndexSearcher) -> Result<()> {
        tf_idf(searcher.similarity().as_ref(), &self.description()).map(|_| ())
    }

    fn get_values(&self, context: &ValueContext, leaf: &LeafReaderContext) -> Result<Box<dyn FunctionValues>> {
        let description = self.description();
        let similarity = Arc::clone(context.searcher().similarity());
        tf_idf(similarity.as_ref(), &description)?;
        match leaf.reader().norm_values(&self.field)? {
            Some(norms) => Ok(Box::new(NormValues {
                description,
                norms,
                similarity,
            })),
            None => Ok(ConstValues::boxed(description, Constant::Double(0.0))),
        }
    }

    fn description(&self) -> String {
        format!("norm({})", self.field)
    }
}

#[derive(Debug)]
struct NormValues {
    description: String,
    norms: Box<dyn NumericDocValues>,
    similarity: Arc<dyn Similarity>,
}

impl FunctionValues for NormValues {
    fn double_val(&mut self, doc: i32) -> Result<f64> {
        Ok(self.float_val(doc)? as f64)
    }

    fn float_val(&mut self, doc: i32) -> Result<f32> {
        let raw = self.norms.get(doc)?;
        Ok(tf_idf(self.similarity.as_ref(), &self.description)?.decode_norm(raw))
    }

    fn describe(&mut self, doc: i32) -> Result<String> {
        let val = self.float_val(doc)?;
        Ok(format!("{}={}", self.description, val))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::document::{Document, Field};
    use crate::search::function::test_support;
    use crate::search::similarity::Bm25Similarity;

    fn corpus() -> IndexSearcher {
        test_support::searcher(&[
            vec![
                Document::new().with(Field::text("body", "a a b", false)),
                Document::new().with(Field::text("body", "b c", false)),
            ],
            vec![Document::new().with(Field::text("body", "a", false))],
        ])
    }

    fn first_value(source: &dyn ValueSource, searcher: &IndexSearcher) -> f64 {
        let context = ValueContext::new(searcher);
        source.create_weight(&context, searcher).unwrap();
        source
            .get_values(&context, &searcher.leaves()[0])
            .unwrap()
            .double_val(0)
            .unwrap()
    }

    #[test]
    fn test_index_wide_statistics() {
        let searcher = corpus();
        assert_eq!(first_value(&DocFreqValueSource::new("body", "a"), &searcher), 2.0);
        assert_eq!(first_value(&TotalTermFreqValueSource::new("body", "a"), &searcher), 3.0);
        assert_eq!(first_value(&SumTotalTermFreqValueSource::new("body"), &searcher), 6.0);
        assert_eq!(first_value(&NumDocsValueSource, &searcher), 3.0);
        assert_eq!(first_value(&MaxDocValueSource, &searcher), 3.0);
        let idf = first_value(&IdfValueSource::new("body", "a"), &searcher);
        assert!((idf - ((3.0f64 / 3.0).ln() + 1.0)).abs() < 1e-6);
    }

    #[test]
    fn test_term_frequency_per_document() {
        let searcher = corpus();
        let context = ValueContext::new(&searcher);
        let leaves = searcher.leaves();
        let mut values = TermFreqValueSource::new("body", "a")
            .get_values(&context, &leaves[0])
            .unwrap();
        assert_eq!(values.int_val(0).unwrap(), 2);
        assert_eq!(values.int_val(1).unwrap(), 0);
        assert_eq!(values.int_val(0).unwrap(), 2);

        let mut tf = TfValueSource::new("body", "a").get_values(&context, &leaves[0]).unwrap();
        assert_eq!(tf.float_val(0).unwrap(), 2f32.sqrt());
        assert_eq!(tf.float_val(1).unwrap(), 0.0);
    }

    #[test]
    fn test_norm_decodes_length() {
        let searcher = test_support::searcher(&[vec![
            Document::new().with(Field::text("body", "a b c d", false)),
        ]]);
        assert_eq!(first_value(&NormValueSource::new("body"), &searcher), 0.5);
        assert_eq!(first_value(&NormValueSource::new("none"), &searcher), 0.0);
    }

    #[test]
    fn test_vector_space_functions_need_tf_idf() {
        let searcher = corpus().with_similarity(Arc::new(Bm25Similarity::default()));
        let context = ValueContext::new(&searcher);
        let leaf = &searcher.leaves()[0];
        for source in [
            Arc::new(IdfValueSource::new("body", "a")) as Arc<dyn ValueSource>,
            Arc::new(TfValueSource::new("body", "a")),
            Arc::new(NormValueSource::new("body")),
        ] {
            match source.get_values(&context, leaf) {
                Err(XiphosError::Unsupported(msg)) => assert!(msg.contains("bm25"), "{msg}"),
                other => panic!("expected unsupported, got {other:?}"),
            }
        }
        assert_eq!(first_value(&DocFreqValueSource::new("body", "a"), &searcher), 2.0);
    }
}
