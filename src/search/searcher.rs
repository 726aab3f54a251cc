//! Running queries over an [`IndexReader`].

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::sync::Arc;

use crate::codec::NO_MORE_DOCS;
use crate::codec::stored_fields::{DocumentStoredFieldVisitor, StoredValue};
use crate::error::Result;
use crate::index::reader::{IndexReader, LeafReaderContext};
use crate::search::function::ValueSourceComparator;
use crate::search::query::{Query, Weight};
use crate::search::similarity::{
    CollectionStatistics, DefaultSimilarity, Similarity, TermStatistics,
};

/// A hit, identified by its top-level document id.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreDoc {
    pub doc: i32,
    pub score: f32,
}

/// The best hits of a search.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TopDocs {
    /// Number of matching documents, including those not returned.
    pub total_hits: usize,
    pub score_docs: Vec<ScoreDoc>,
}

/// Higher score first, then lower doc id.
#[derive(Debug, Clone, Copy)]
struct Ranked(ScoreDoc);

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .score
            .total_cmp(&other.0.score)
            .then_with(|| other.0.doc.cmp(&self.0.doc))
    }
}

/// Searches one point-in-time [`IndexReader`]. Cheap to clone.
#[derive(Debug, Clone)]
pub struct IndexSearcher {
    reader: Arc<IndexReader>,
    similarity: Arc<dyn Similarity>,
}

impl IndexSearcher {
    pub fn new(reader: Arc<IndexReader>) -> Self {
        IndexSearcher {
            reader,
            similarity: Arc::new(DefaultSimilarity::new()),
        }
    }

    pub fn with_similarity(mut self, similarity: Arc<dyn Similarity>) -> Self {
        self.similarity = similarity;
        self
    }

    pub fn reader(&self) -> &Arc<IndexReader> {
        &self.reader
    }

    pub fn similarity(&self) -> &Arc<dyn Similarity> {
        &self.similarity
    }

    pub fn leaves(&self) -> Vec<LeafReaderContext> {
        self.reader.leaves()
    }

    pub fn doc_freq(&self, field: &str, term: &[u8]) -> Result<i64> {
        self.reader.doc_freq(field, term)
    }

    pub fn total_term_freq(&self, field: &str, term: &[u8]) -> Result<i64> {
        self.reader.total_term_freq(field, term)
    }

    pub fn term_statistics(&self, field: &str, term: &[u8]) -> Result<TermStatistics> {
        Ok(TermStatistics {
            term: term.to_vec(),
            doc_freq: self.reader.doc_freq(field, term)?,
            total_term_freq: self.reader.total_term_freq(field, term)?,
        })
    }

    pub fn collection_statistics(&self, field: &str) -> Result<CollectionStatistics> {
        Ok(CollectionStatistics {
            field: field.to_string(),
            max_doc: self.reader.max_doc() as i64,
            doc_count: self.reader.doc_count(field)?,
            sum_total_term_freq: self.reader.sum_total_term_freq(field)?,
            sum_doc_freq: self.reader.sum_doc_freq(field)?,
        })
    }

    pub fn create_weight(&self, query: &dyn Query) -> Result<Arc<dyn Weight>> {
        query.create_weight(self)
    }

    /// The `n` best hits of `query`, by descending score then ascending doc.
    pub fn search(&self, query: &dyn Query, n: usize) -> Result<TopDocs> {
        let mut heap: BinaryHeap<Reverse<Ranked>> = BinaryHeap::with_capacity(n + 1);
        let mut total_hits = 0;
        self.collect(query, |hit| {
            total_hits += 1;
            if n == 0 {
                return;
            }
            if heap.len() < n {
                heap.push(Reverse(Ranked(hit)));
            } else if let Some(Reverse(worst)) = heap.peek()
                && Ranked(hit) > *worst
            {
                heap.pop();
                heap.push(Reverse(Ranked(hit)));
            }
        })?;
        let score_docs = heap
            .into_sorted_vec()
            .into_iter()
            .map(|Reverse(Ranked(hit))| hit)
            .collect();
        log::debug!("query {} matched {total_hits} documents", query.description());
        Ok(TopDocs {
            total_hits,
            score_docs,
        })
    }

    /// The first `n` hits of `query` in the order of `comparator`.
    pub fn search_sorted(
        &self,
        query: &dyn Query,
        n: usize,
        comparator: &ValueSourceComparator,
    ) -> Result<TopDocs> {
        let mut hits = Vec::new();
        self.collect(query, |hit| hits.push(hit))?;
        let total_hits = hits.len();
        comparator.sort(self, &mut hits)?;
        hits.truncate(n);
        Ok(TopDocs {
            total_hits,
            score_docs: hits,
        })
    }

    /// Every stored value of top-level `doc`.
    pub fn document(&self, doc: i32) -> Result<Vec<(String, StoredValue)>> {
        let mut visitor = DocumentStoredFieldVisitor::new();
        self.reader.document(doc, &mut visitor)?;
        Ok(visitor.into_values())
    }

    /// Feed every live match of `query` to `visit`, leaf by leaf.
    fn collect(&self, query: &dyn Query, mut visit: impl FnMut(ScoreDoc)) -> Result<()> {
        let weight = self.create_weight(query)?;
        for leaf in self.leaves() {
            let accept_docs = leaf.reader().live_docs();
            let Some(mut scorer) = weight.scorer(&leaf, accept_docs)? else {
                continue;
            };
            loop {
                let doc = scorer.next_doc()?;
                if doc == NO_MORE_DOCS {
                    break;
                }
                let score = scorer.score()?;
                visit(ScoreDoc {
                    doc: leaf.doc_base + doc,
                    score,
                });
            }
        }
        Ok(())
    }
}
