//! Scoring every document by a value source.

use std::sync::Arc;

use crate::error::Result;
use crate::index::reader::LeafReaderContext;
use crate::search::function::{FunctionValues, ValueContext, ValueSource};
use crate::search::query::{AllDocsIterator, DocIdSetIterator, Query, Scorer, Weight};
use crate::search::searcher::IndexSearcher;
use crate::util::bits::Bits;

/// Matches every accepted document with the value of `source` times the
/// boost as its score.
#[derive(Debug, Clone)]
pub struct FunctionQuery {
    source: Arc<dyn ValueSource>,
    boost: f32,
}

impl FunctionQuery {
    pub fn new(source: Arc<dyn ValueSource>) -> Self {
        FunctionQuery { source, boost: 1.0 }
    }

    pub fn with_boost(mut self, boost: f32) -> Self {
        self.boost = boost;
        self
    }

    pub fn source(&self) -> &Arc<dyn ValueSource> {
        &self.source
    }
}

impl Query for FunctionQuery {
    fn create_weight(&self, searcher: &IndexSearcher) -> Result<Arc<dyn Weight>> {
        let context = ValueContext::new(searcher);
        self.source.create_weight(&context, searcher)?;
        Ok(Arc::new(FunctionWeight {
            source: Arc::clone(&self.source),
            context,
            boost: self.boost,
        }))
    }

    fn description(&self) -> String {
        if self.boost == 1.0 {
            self.source.description()
        } else {
            format!("({})^{}", self.source.description(), self.boost)
        }
    }
}

#[derive(Debug)]
struct FunctionWeight {
    source: Arc<dyn ValueSource>,
    context: ValueContext,
    boost: f32,
}

impl Weight for FunctionWeight {
    fn scorer(
        &self,
        leaf: &LeafReaderContext,
        accept_docs: Option<Arc<dyn Bits>>,
    ) -> Result<Option<Box<dyn Scorer>>> {
        let values = self.source.get_values(&self.context, leaf)?;
        Ok(Some(Box::new(FunctionScorer {
            docs: AllDocsIterator::new(leaf.reader().max_doc(), accept_docs),
            values,
            boost: self.boost,
        })))
    }

    fn description(&self) -> String {
        format!("function({})", self.source.description())
    }
}

#[derive(Debug)]
struct FunctionScorer {
    docs: AllDocsIterator,
    values: Box<dyn FunctionValues>,
    boost: f32,
}

impl DocIdSetIterator for FunctionScorer {
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

impl Scorer for FunctionScorer {
    fn score(&mut self) -> Result<f32> {
        let score = self.boost * self.values.float_val(self.docs.doc_id())?;
        // Negative infinity and NaN clamp to the lowest finite score.
        Ok(if score > f32::NEG_INFINITY { score } else { -f32::MAX })
    }

    fn freq(&self) -> i32 {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::document::{Document, Field};
    use crate::search::function::test_support;
    use crate::search::function::{
        ConstValueSource, DefFunction, LinearFloatFunction, NumericFieldSource,
    };

    #[test]
    fn test_scores_by_field_value() {
        let searcher = test_support::searcher(&[
            vec![
                Document::new().with(Field::long("price", 10, false)),
                Document::new().with(Field::long("price", 30, false)),
            ],
            vec![Document::new().with(Field::long("price", 20, false))],
        ]);
        let source: Arc<dyn ValueSource> = Arc::new(NumericFieldSource::long("price"));
        let top = searcher.search(&FunctionQuery::new(source.clone()), 10).unwrap();
        let ranked: Vec<(i32, f32)> = top.score_docs.iter().map(|hit| (hit.doc, hit.score)).collect();
        assert_eq!(ranked, vec![(1, 30.0), (2, 20.0), (0, 10.0)]);

        let inverted = LinearFloatFunction::new(source, -1.0, 0.0);
        let top = searcher
            .search(&FunctionQuery::new(Arc::new(inverted)).with_boost(2.0), 1)
            .unwrap();
        assert_eq!(top.total_hits, 3);
        assert_eq!((top.score_docs[0].doc, top.score_docs[0].score), (0, -20.0));
    }

    #[test]
    fn test_def_supplies_missing_values() {
        let searcher = test_support::searcher(&[vec![
            Document::new(),
            Document::new().with(Field::long("x", 7, false)),
        ]]);
        let def = DefFunction::new(vec![
            Arc::new(NumericFieldSource::long("x")) as Arc<dyn ValueSource>,
            Arc::new(ConstValueSource::new(42.0)),
        ])
        .unwrap();
        let query = FunctionQuery::new(Arc::new(def));
        assert_eq!(query.description(), "def(long(x),const(42))");
        let top = searcher.search(&query, 10).unwrap();
        assert_eq!(top.score_docs[0].doc, 0);
        assert_eq!(top.score_docs[0].score, 42.0);
        assert_eq!(top.score_docs[1].score, 7.0);
    }
}
