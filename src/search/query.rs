//! Queries, weights and scorers.

use std::fmt::Debug;
use std::sync::Arc;

use crate::codec::NO_MORE_DOCS;
use crate::codec::postings::DocsEnum;
use crate::error::Result;
use crate::index::reader::LeafReaderContext;
use crate::search::searcher::IndexSearcher;
use crate::search::similarity::{SimScorer, SimWeight};
use crate::util::bits::Bits;

/// Iterates document ids of one leaf in increasing order.
pub trait DocIdSetIterator: Send + Debug {
    /// The current document, -1 before the first call to `next_doc`.
    fn doc_id(&self) -> i32;

    fn next_doc(&mut self) -> Result<i32>;

    /// Move to the first document at or after `target`.
    fn advance(&mut self, target: i32) -> Result<i32> {
        let mut doc = self.doc_id();
        while doc < target {
            doc = self.next_doc()?;
        }
        Ok(doc)
    }

    fn cost(&self) -> i64;
}

/// A [`DocIdSetIterator`] that scores the documents it visits.
pub trait Scorer: DocIdSetIterator {
    fn score(&mut self) -> Result<f32>;

    fn freq(&self) -> i32;
}

/// A query compiled against one searcher.
pub trait Weight: Send + Sync + Debug {
    /// Scorer over the documents of `leaf` accepted by `accept_docs`, `None`
    /// when nothing in the leaf can match.
    fn scorer(
        &self,
        leaf: &LeafReaderContext,
        accept_docs: Option<Arc<dyn Bits>>,
    ) -> Result<Option<Box<dyn Scorer>>>;

    fn description(&self) -> String;
}

pub trait Query: Send + Sync + Debug {
    fn create_weight(&self, searcher: &IndexSearcher) -> Result<Arc<dyn Weight>>;

    fn description(&self) -> String;
}

/// Documents containing a term.
#[derive(Debug, Clone)]
pub struct TermQuery {
    field: String,
    term: Vec<u8>,
    boost: f32,
}

impl TermQuery {
    pub fn new(field: impl Into<String>, term: impl Into<Vec<u8>>) -> Self {
        TermQuery {
            field: field.into(),
            term: term.into(),
            boost: 1.0,
        }
    }

    pub fn with_boost(mut self, boost: f32) -> Self {
        self.boost = boost;
        self
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn term(&self) -> &[u8] {
        &self.term
    }
}

impl Query for TermQuery {
    fn create_weight(&self, searcher: &IndexSearcher) -> Result<Arc<dyn Weight>> {
        let collection = searcher.collection_statistics(&self.field)?;
        let term_stats = searcher.term_statistics(&self.field, &self.term)?;
        let sim_weight = searcher
            .similarity()
            .compute_weight(self.boost, &collection, &[term_stats]);
        Ok(Arc::new(TermWeight {
            description: self.description(),
            field: self.field.clone(),
            term: self.term.clone(),
            sim_weight,
        }))
    }

    fn description(&self) -> String {
        let mut description = format!("{}:{}", self.field, String::from_utf8_lossy(&self.term));
        if self.boost != 1.0 {
            description.push_str(&format!("^{}", self.boost));
        }
        description
    }
}

#[derive(Debug)]
struct TermWeight {
    description: String,
    field: String,
    term: Vec<u8>,
    sim_weight: Arc<dyn SimWeight>,
}

impl Weight for TermWeight {
    fn scorer(
        &self,
        leaf: &LeafReaderContext,
        accept_docs: Option<Arc<dyn Bits>>,
    ) -> Result<Option<Box<dyn Scorer>>> {
        let Some(terms) = leaf.reader().terms(&self.field)? else {
            return Ok(None);
        };
        let mut terms_enum = terms.iterator();
        if !terms_enum.seek_exact(&self.term) {
            return Ok(None);
        }
        let docs = terms_enum.docs(accept_docs, true)?;
        let sim_scorer = self.sim_weight.sim_scorer(leaf.reader())?;
        Ok(Some(Box::new(TermScorer { docs, sim_scorer })))
    }

    fn description(&self) -> String {
        self.description.clone()
    }
}

#[derive(Debug)]
struct TermScorer {
    docs: Box<dyn DocsEnum>,
    sim_scorer: Box<dyn SimScorer>,
}

impl DocIdSetIterator for TermScorer {
    fn doc_id(&self) -> i32 {
        self.docs.doc_id()
    }

    fn next_doc(&mut self) -> Result<i32> {
        self.docs.next_doc()
    }

    fn advance(&mut self, target: i32) -> Result<i32> {
        self.docs.advance(target)
    }

    fn cost(&self) -> i64 {
        self.docs.cost()
    }
}

impl Scorer for TermScorer {
    fn score(&mut self) -> Result<f32> {
        let doc = self.docs.doc_id();
        let freq = self.docs.freq() as f32;
        self.sim_scorer.score(doc, freq)
    }

    fn freq(&self) -> i32 {
        self.docs.freq()
    }
}

/// Every accepted document, scored with the query boost.
#[derive(Debug, Clone)]
pub struct MatchAllDocsQuery {
    boost: f32,
}

impl Default for MatchAllDocsQuery {
    fn default() -> Self {
        MatchAllDocsQuery { boost: 1.0 }
    }
}

impl MatchAllDocsQuery {
    pub fn new() -> Self {
        MatchAllDocsQuery::default()
    }

    pub fn with_boost(mut self, boost: f32) -> Self {
        self.boost = boost;
        self
    }
}

impl Query for MatchAllDocsQuery {
    fn create_weight(&self, _searcher: &IndexSearcher) -> Result<Arc<dyn Weight>> {
        Ok(Arc::new(MatchAllWeight { boost: self.boost }))
    }

    fn description(&self) -> String {
        "*:*".to_string()
    }
}

#[derive(Debug)]
struct MatchAllWeight {
    boost: f32,
}

impl Weight for MatchAllWeight {
    fn scorer(
        &self,
        leaf: &LeafReaderContext,
        accept_docs: Option<Arc<dyn Bits>>,
    ) -> Result<Option<Box<dyn Scorer>>> {
        Ok(Some(Box::new(MatchAllScorer {
            docs: AllDocsIterator::new(leaf.reader().max_doc(), accept_docs),
            score: self.boost,
        })))
    }

    fn description(&self) -> String {
        "*:*".to_string()
    }
}

#[derive(Debug)]
struct MatchAllScorer {
    docs: AllDocsIterator,
    score: f32,
}

impl DocIdSetIterator for MatchAllScorer {
    fn doc_id(&self) -> i32 {
        self.docs.doc_id()
    }

    fn next_doc(&mut self) -> Result<i32> {
        self.docs.next_doc()
    }

    fn advance(&mut self, target: i32) -> Result<i32> {
        self.docs.advance(target)
    }

    fn cost(&self) -> i64 {
        self.docs.cost()
    }
}

impl Scorer for MatchAllScorer {
    fn score(&mut self) -> Result<f32> {
        Ok(self.score)
    }

    fn freq(&self) -> i32 {
        1
    }
}

/// Walks `0..max_doc`, skipping documents not in `accept_docs`.
#[derive(Debug)]
pub(crate) struct AllDocsIterator {
    doc: i32,
    max_doc: i32,
    accept_docs: Option<Arc<dyn Bits>>,
}

impl AllDocsIterator {
    pub(crate) fn new(max_doc: i32, accept_docs: Option<Arc<dyn Bits>>) -> Self {
        AllDocsIterator {
            doc: -1,
            max_doc,
            accept_docs,
        }
    }

    fn accepted(&self, doc: i32) -> bool {
        self.accept_docs
            .as_ref()
            .is_none_or(|bits| bits.get(doc as usize))
    }
}

impl DocIdSetIterator for AllDocsIterator {
    fn doc_id(&self) -> i32 {
        self.doc
    }

    fn next_doc(&mut self) -> Result<i32> {
        if self.doc == NO_MORE_DOCS {
            return Ok(NO_MORE_DOCS);
        }
        self.advance(self.doc + 1)
    }

    fn advance(&mut self, target: i32) -> Result<i32> {
        if self.doc == NO_MORE_DOCS {
            return Ok(NO_MORE_DOCS);
        }
        let mut doc = target.max(self.doc + 1).max(0);
        while doc < self.max_doc && !self.accepted(doc) {
            doc += 1;
        }
        self.doc = if doc >= self.max_doc { NO_MORE_DOCS } else { doc };
        Ok(self.doc)
    }

    fn cost(&self) -> i64 {
        self.max_doc as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::bits::FixedBitSet;

    #[test]
    fn test_all_docs_iterator_skips_rejected() {
        let mut accept = FixedBitSet::all_set(5);
        accept.clear(0);
        accept.clear(3);
        let mut docs = AllDocsIterator::new(5, Some(Arc::new(accept)));
        assert_eq!(docs.doc_id(), -1);
        assert_eq!(docs.next_doc().unwrap(), 1);
        assert_eq!(docs.next_doc().unwrap(), 2);
        assert_eq!(docs.advance(3).unwrap(), 4);
        assert_eq!(docs.next_doc().unwrap(), NO_MORE_DOCS);
        assert_eq!(docs.next_doc().unwrap(), NO_MORE_DOCS);
    }

    #[test]
    fn test_term_query_description() {
        assert_eq!(TermQuery::new("body", "fox").description(), "body:fox");
        assert_eq!(
            TermQuery::new("body", "fox").with_boost(2.0).description(),
            "body:fox^2"
        );
    }
}
