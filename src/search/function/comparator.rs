//! Sorting hits by a value source.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::error::Result;
use crate::search::function::{FunctionValues, MutableValue, ValueContext, ValueSource};
use crate::search::searcher::{IndexSearcher, ScoreDoc};

/// Orders top-level documents by the value of a source, missing values
/// first, ties broken by ascending doc id.
#[derive(Debug, Clone)]
pub struct ValueSourceComparator {
    source: Arc<dyn ValueSource>,
    reverse: bool,
}

impl ValueSourceComparator {
    pub fn new(source: Arc<dyn ValueSource>) -> Self {
        ValueSourceComparator { source, reverse: false }
    }

    /// Sort descending instead. Doc id ties stay ascending.
    pub fn reversed(mut self) -> Self {
        self.reverse = !self.reverse;
        self
    }

    /// The sort value of every hit, in the order given.
    pub fn values(&self, searcher: &IndexSearcher, hits: &[ScoreDoc]) -> Result<Vec<MutableValue>> {
        let context = ValueContext::new(searcher);
        self.source.create_weight(&context, searcher)?;
        let leaves = searcher.leaves();
        let mut bound: Vec<Option<Box<dyn FunctionValues>>> = leaves.iter().map(|_| None).collect();

        let mut slots = vec![MutableValue::Missing; hits.len()];
        // Visit hits in doc order so per-leaf cursors only move forward.
        let mut order: Vec<usize> = (0..hits.len()).collect();
        order.sort_by_key(|&i| hits[i].doc);
        for i in order {
            let doc = hits[i].doc;
            let leaf_index = searcher.reader().leaf_index(doc)?;
            let leaf = &leaves[leaf_index];
            let values = match &mut bound[leaf_index] {
                Some(values) => values,
                slot => slot.insert(self.source.get_values(&context, leaf)?),
            };
            values.fill_value(doc - leaf.doc_base, &mut slots[i])?;
        }
        Ok(slots)
    }

    /// Sort `hits` in place.
    pub fn sort(&self, searcher: &IndexSearcher, hits: &mut Vec<ScoreDoc>) -> Result<()> {
        let values = self.values(searcher, hits)?;
        let mut keyed: Vec<(MutableValue, ScoreDoc)> = values.into_iter().zip(hits.iter().copied()).collect();
        keyed.sort_by(|(a, hit_a), (b, hit_b)| {
            let by_value = if self.reverse { b.compare(a) } else { a.compare(b) };
            by_value.then_with(|| hit_a.doc.cmp(&hit_b.doc))
        });
        *hits = keyed.into_iter().map(|(_, hit)| hit).collect();
        Ok(())
    }

    /// Compare two top-level documents.
    pub fn compare(&self, searcher: &IndexSearcher, a: i32, b: i32) -> Result<Ordering> {
        let hits = [ScoreDoc { doc: a, score: 0.0 }, ScoreDoc { doc: b, score: 0.0 }];
        let values = self.values(searcher, &hits)?;
        let by_value = values[0].compare(&values[1]);
        Ok(if self.reverse { by_value.reverse() } else { by_value })
    }
}
