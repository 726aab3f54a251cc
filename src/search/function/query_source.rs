//! The score of a query as a value.

use std::sync::Arc;

use crate::error::Result;
use crate::index::reader::LeafReaderContext;
use crate::search::function::{FunctionValues, MutableValue, ValueContext, ValueSource};
use crate::search::query::{Query, Scorer, Weight};
use crate::search::searcher::IndexSearcher;
use crate::util::bits::Bits;

/// `query(q, default)`: the score of `q` for documents it matches, `default`
/// for the others.
#[derive(Debug, Clone)]
pub struct QueryValueSource {
    query: Arc<dyn Query>,
    default_value: f32,
}

/// The compiled weight, shared through the value context.
#[derive(Debug)]
struct CompiledQuery(Arc<dyn Weight>);

impl QueryValueSource {
    pub fn new(query: Arc<dyn Query>, default_value: f32) -> Self {
        QueryValueSource { query, default_value }
    }

    pub fn query(&self) -> &Arc<dyn Query> {
        &self.query
    }

    fn weight(&self, context: &ValueContext, searcher: &IndexSearcher) -> Result<Arc<dyn Weight>> {
        let compiled = context.get_or_try_insert_with(self, || {
            Ok(CompiledQuery(searcher.create_weight(self.query.as_ref())?))
        })?;
        Ok(Arc::clone(&compiled.0))
    }
}

impl ValueSource for QueryValueSource {
    fn create_weight(&self, context: &ValueContext, searcher: &IndexSearcher) -> Result<()> {
        self.weight(context, searcher).map(|_| ())
    }

    fn get_values(&self, context: &ValueContext, leaf: &LeafReaderContext) -> Result<Box<dyn FunctionValues>> {
        let weight = self.weight(context, context.searcher())?;
        let accept_docs = leaf.reader().live_docs();
        let scorer = weight.scorer(leaf, accept_docs.clone())?;
        Ok(Box::new(QueryValues {
            description: self.description(),
            weight,
            leaf: leaf.clone(),
            accept_docs,
            no_matches: scorer.is_none(),
            scorer,
            scorer_doc: -1,
            last_doc_requested: -1,
            default_value: self.default_value,
        }))
    }

    fn description(&self) -> String {
        format!("query({},def={})", self.query.description(), self.default_value)
    }
}

#[derive(Debug)]
struct QueryValues {
    description: String,
    weight: Arc<dyn Weight>,
    leaf: LeafReaderContext,
    accept_docs: Option<Arc<dyn Bits>>,
    scorer: Option<Box<dyn Scorer>>,
    /// Document the scorer is positioned on.
    scorer_doc: i32,
    last_doc_requested: i32,
    /// The query matches nothing in this leaf.
    no_matches: bool,
    default_value: f32,
}

impl QueryValues {
    /// Position the scorer on `doc` if it matches. Requests for a lower
    /// document than the previous one start a fresh scorer.
    fn seek(&mut self, doc: i32) -> Result<Option<&mut Box<dyn Scorer>>> {
        if self.no_matches {
            return Ok(None);
        }
        if doc < self.last_doc_requested {
            self.scorer = self.weight.scorer(&self.leaf, self.accept_docs.clone())?;
            self.scorer_doc = -1;
            if self.scorer.is_none() {
                self.no_matches = true;
                return Ok(None);
            }
        }
        self.last_doc_requested = doc;
        let Some(scorer) = self.scorer.as_mut() else {
            return Ok(None);
        };
        if self.scorer_doc < doc {
            self.scorer_doc = scorer.advance(doc)?;
        }
        Ok(if self.scorer_doc == doc { Some(scorer) } else { None })
    }
}

impl FunctionValues for QueryValues {
    fn double_val(&mut self, doc: i32) -> Result<f64> {
        Ok(self.float_val(doc)? as f64)
    }

    fn float_val(&mut self, doc: i32) -> Result<f32> {
        let default_value = self.default_value;
        match self.seek(doc)? {
            Some(scorer) => scorer.score(),
            None => Ok(default_value),
        }
    }

    fn exists(&mut self, doc: i32) -> Result<bool> {
        Ok(self.seek(doc)?.is_some())
    }

    fn describe(&mut self, doc: i32) -> Result<String> {
        let val = self.float_val(doc)?;
        Ok(format!("{}={}", self.description, val))
    }

    fn fill_value(&mut self, doc: i32, value: &mut MutableValue) -> Result<()> {
        *value = match self.seek(doc)? {
            Some(scorer) => MutableValue::Float(scorer.score()?),
            None => MutableValue::Missing,
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::document::{Document, Field};
    use crate::search::function::test_support;
    use crate::search::query::TermQuery;

    #[test]
    fn test_scores_matches_and_defaults_others() {
        let searcher = test_support::searcher(&[vec![
            Document::new().with(Field::text("body", "red", false)),
            Document::new().with(Field::text("body", "blue", false)),
            Document::new().with(Field::text("body", "red", false)),
        ]]);
        let source = QueryValueSource::new(Arc::new(TermQuery::new("body", "red")), -1.0);
        let context = ValueContext::new(&searcher);
        source.create_weight(&context, &searcher).unwrap();
        let mut values = source.get_values(&context, &searcher.leaves()[0]).unwrap();

        let first = values.float_val(0).unwrap();
        assert!(first > 0.0);
        assert_eq!(values.float_val(1).unwrap(), -1.0);
        assert!(!values.exists(1).unwrap());
        assert_eq!(values.float_val(2).unwrap(), first);
        // Going backwards restarts the scorer.
        assert_eq!(values.float_val(0).unwrap(), first);
        assert!(values.exists(0).unwrap());
    }

    #[test]
    fn test_query_without_matches_short_circuits() {
        let searcher = test_support::searcher(&[vec![Document::new().with(Field::text("body", "red", false))]]);
        let source = QueryValueSource::new(Arc::new(TermQuery::new("body", "green")), 0.5);
        let context = ValueContext::new(&searcher);
        let mut values = source.get_values(&context, &searcher.leaves()[0]).unwrap();
        assert_eq!(values.float_val(0).unwrap(), 0.5);
        assert!(!values.exists(0).unwrap());
        assert_eq!(source.description(), "query(body:green,def=0.5)");
    }
}
