//! Function queries.
//!
//! A [`ValueSource`] is a stateless expression over documents, such as a
//! field, a constant or `sum(field("x"), const(1))`. Evaluation has two
//! phases. [`ValueSource::create_weight`] runs once per top-level query and
//! may stash searcher-wide aggregates in the shared [`ValueContext`].
//! [`ValueSource::get_values`] then binds the expression to one leaf and
//! returns a [`FunctionValues`] that answers per-document accessors.

use std::any::Any;
use std::cmp::Ordering;
use std::fmt::{self, Debug};
use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::Mutex;

use crate::error::{Result, XiphosError};
use crate::index::reader::LeafReaderContext;
use crate::search::searcher::IndexSearcher;

pub mod comparator;
pub mod constant;
pub mod field;
pub mod function_query;
pub mod logic;
pub mod math;
pub mod query_source;
pub mod term_stats;

pub use self::comparator::ValueSourceComparator;
pub use self::constant::{ConstValueSource, DoubleConstValueSource, LiteralValueSource};
pub use self::field::{BytesRefFieldSource, NumericFieldSource, OrdFieldSource, ReverseOrdFieldSource};
pub use self::function_query::FunctionQuery;
pub use self::logic::{BoolOp, DefFunction, ExistsFunction, IfFunction, MultiBoolFunction, NotFunction};
pub use self::math::{
    DualFloatFunction, DualOp, LinearFloatFunction, MultiFloatFunction, MultiOp,
    RangeMapFloatFunction, ReciprocalFloatFunction, ScaleFloatFunction, SimpleFloatFunction, UnaryOp,
};
pub use self::query_source::QueryValueSource;
pub use self::term_stats::{
    DocFreqValueSource, IdfValueSource, MaxDocValueSource, NormValueSource, NumDocsValueSource,
    SumTotalTermFreqValueSource, TermFreqValueSource, TfValueSource, TotalTermFreqValueSource,
};

/// A stateless expression evaluated per document.
pub trait ValueSource: Send + Sync + Debug {
    /// Precompute searcher-wide state for one query. Composite sources must
    /// forward to their children.
    fn create_weight(&self, _context: &ValueContext, _searcher: &IndexSearcher) -> Result<()> {
        Ok(())
    }

    /// Bind this source to one leaf.
    fn get_values(&self, context: &ValueContext, leaf: &LeafReaderContext) -> Result<Box<dyn FunctionValues>>;

    fn description(&self) -> String;
}

/// Per-leaf evaluator of a [`ValueSource`].
///
/// Callers ask for documents in increasing order; evaluators that keep a
/// cursor must still answer correctly when a lower document is requested.
/// Every numeric accessor derives from [`FunctionValues::double_val`] unless
/// overridden.
pub trait FunctionValues: Send + Debug {
    fn double_val(&mut self, doc: i32) -> Result<f64>;

    fn float_val(&mut self, doc: i32) -> Result<f32> {
        Ok(self.double_val(doc)? as f32)
    }

    fn long_val(&mut self, doc: i32) -> Result<i64> {
        Ok(self.double_val(doc)? as i64)
    }

    fn int_val(&mut self, doc: i32) -> Result<i32> {
        Ok(self.long_val(doc)? as i32)
    }

    fn bool_val(&mut self, doc: i32) -> Result<bool> {
        Ok(self.int_val(doc)? != 0)
    }

    fn str_val(&mut self, doc: i32) -> Result<Option<String>> {
        Ok(Some(self.float_val(doc)?.to_string()))
    }

    fn bytes_val(&mut self, doc: i32) -> Result<Option<Vec<u8>>> {
        Ok(self.str_val(doc)?.map(String::into_bytes))
    }

    /// Whether `doc` has a value, as opposed to a default.
    fn exists(&mut self, _doc: i32) -> Result<bool> {
        Ok(true)
    }

    /// Ordinal of the value of `doc` in the leaf's sorted dictionary.
    fn ord_val(&mut self, _doc: i32) -> Result<i32> {
        Err(XiphosError::unsupported("ordinals are not available for this source"))
    }

    /// Number of ordinals in the leaf's sorted dictionary.
    fn num_ord(&self) -> Result<i32> {
        Err(XiphosError::unsupported("ordinals are not available for this source"))
    }

    /// `description=value` for `doc`.
    fn describe(&mut self, doc: i32) -> Result<String>;

    /// Load the value of `doc` for sorting.
    fn fill_value(&mut self, doc: i32, value: &mut MutableValue) -> Result<()> {
        *value = if self.exists(doc)? {
            MutableValue::Float(self.float_val(doc)?)
        } else {
            MutableValue::Missing
        };
        Ok(())
    }
}

/// A reusable holder for one document's value, ordered for sorting. Missing
/// values sort first.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum MutableValue {
    #[default]
    Missing,
    Bool(bool),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Str(String),
}

impl MutableValue {
    pub fn exists(&self) -> bool {
        !matches!(self, MutableValue::Missing)
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            MutableValue::Int(v) => Some(*v as f64),
            MutableValue::Long(v) => Some(*v as f64),
            MutableValue::Float(v) => Some(*v as f64),
            MutableValue::Double(v) => Some(*v),
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            MutableValue::Missing => 0,
            MutableValue::Bool(_) => 1,
            MutableValue::Int(_)
            | MutableValue::Long(_)
            | MutableValue::Float(_)
            | MutableValue::Double(_) => 2,
            MutableValue::Str(_) => 3,
        }
    }

    /// Total order: missing, then booleans, numbers and strings.
    pub fn compare(&self, other: &MutableValue) -> Ordering {
        match (self, other) {
            (MutableValue::Long(a), MutableValue::Long(b)) => a.cmp(b),
            (MutableValue::Int(a), MutableValue::Int(b)) => a.cmp(b),
            (MutableValue::Bool(a), MutableValue::Bool(b)) => a.cmp(b),
            (MutableValue::Str(a), MutableValue::Str(b)) => a.as_bytes().cmp(b.as_bytes()),
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => a.total_cmp(&b),
                _ => self.rank().cmp(&other.rank()),
            },
        }
    }
}

impl fmt::Display for MutableValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MutableValue::Missing => f.write_str("(null)"),
            MutableValue::Bool(v) => write!(f, "{v}"),
            MutableValue::Int(v) => write!(f, "{v}"),
            MutableValue::Long(v) => write!(f, "{v}"),
            MutableValue::Float(v) => write!(f, "{v}"),
            MutableValue::Double(v) => write!(f, "{v}"),
            MutableValue::Str(v) => f.write_str(v),
        }
    }
}

type Memo = Arc<dyn Any + Send + Sync>;

/// State shared by the sources of one top-level query.
///
/// Entries are keyed by the address of the source that stored them, so a
/// context must not outlive the query it was created for.
#[derive(Debug)]
pub struct ValueContext {
    searcher: IndexSearcher,
    memo: Mutex<AHashMap<usize, Memo>>,
}

impl ValueContext {
    pub fn new(searcher: &IndexSearcher) -> Self {
        ValueContext {
            searcher: searcher.clone(),
            memo: Mutex::new(AHashMap::new()),
        }
    }

    pub fn searcher(&self) -> &IndexSearcher {
        &self.searcher
    }

    fn key(source: &dyn ValueSource) -> usize {
        source as *const dyn ValueSource as *const () as usize
    }

    /// The value `source` stored earlier, if it has the expected type.
    pub fn get<T: Any + Send + Sync>(&self, source: &dyn ValueSource) -> Option<Arc<T>> {
        let memo = self.memo.lock().get(&Self::key(source)).cloned()?;
        memo.downcast::<T>().ok()
    }

    pub fn insert<T: Any + Send + Sync>(&self, source: &dyn ValueSource, value: Arc<T>) {
        self.memo.lock().insert(Self::key(source), value);
    }

    /// The stored value of `source`, computing and storing it first if
    /// absent. `init` runs without the lock held, so it may use the context.
    pub fn get_or_try_insert_with<T, F>(&self, source: &dyn ValueSource, init: F) -> Result<Arc<T>>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> Result<T>,
    {
        if let Some(value) = self.get::<T>(source) {
            return Ok(value);
        }
        let value = Arc::new(init()?);
        self.insert(source, Arc::clone(&value));
        Ok(value)
    }
}

/// Prefix function errors with the description of the failing source.
pub(crate) fn tag_error(description: &str, err: XiphosError) -> XiphosError {
    match err {
        XiphosError::Function(msg) => XiphosError::function(format!("{description}: {msg}")),
        other => other,
    }
}

/// Comma-joined descriptions of `sources`.
pub(crate) fn describe_all(sources: &[Arc<dyn ValueSource>]) -> String {
    sources
        .iter()
        .map(|source| source.description())
        .collect::<Vec<_>>()
        .join(",")
}

pub(crate) fn values_of(
    sources: &[Arc<dyn ValueSource>],
    context: &ValueContext,
    leaf: &LeafReaderContext,
) -> Result<Vec<Box<dyn FunctionValues>>> {
    sources
        .iter()
        .map(|source| source.get_values(context, leaf))
        .collect()
}

pub(crate) fn create_weights(
    sources: &[Arc<dyn ValueSource>],
    context: &ValueContext,
    searcher: &IndexSearcher,
) -> Result<()> {
    for source in sources {
        source.create_weight(context, searcher)?;
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::document::{Document, Field};

    #[test]
    fn test_mutable_value_order() {
        let mut values = vec![
            MutableValue::Float(2.5),
            MutableValue::Missing,
            MutableValue::Long(-1),
            MutableValue::Double(1.0),
        ];
        values.sort_by(|a, b| a.compare(b));
        assert_eq!(
            values,
            vec![
                MutableValue::Missing,
                MutableValue::Long(-1),
                MutableValue::Double(1.0),
                MutableValue::Float(2.5),
            ]
        );
        assert!(!MutableValue::default().exists());
        assert_eq!(MutableValue::Long(3).to_string(), "3");
    }

    #[test]
    fn test_context_memoizes_per_source() {
        let searcher = test_support::searcher(&[vec![Document::new().with(Field::long("n", 1, false))]]);
        let context = ValueContext::new(&searcher);
        let a = ConstValueSource::new(1.0);
        let b = ConstValueSource::new(1.0);

        let mut calls = 0;
        let first = context
            .get_or_try_insert_with(&a, || {
                calls += 1;
                Ok(7i64)
            })
            .unwrap();
        let second = context
            .get_or_try_insert_with(&a, || {
                calls += 1;
                Ok(8i64)
            })
            .unwrap();
        assert_eq!((*first, *second, calls), (7, 7, 1));
        assert!(context.get::<i64>(&b).is_none());
        assert!(context.get::<String>(&a).is_none());
        assert_eq!(context.searcher().reader().max_doc(), 1);
    }
}
