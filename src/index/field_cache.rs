//! Per-segment uninversion cache.
//!
//! Numeric fields indexed as decimal terms can be read per document by
//! walking their postings once and recording each document's term. The
//! result is cached on the segment, keyed by field and numeric kind, together
//! with the set of documents that have any term in the field.

use std::fmt;
use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::Mutex;

use crate::codec::NO_MORE_DOCS;
use crate::error::{Result, XiphosError};
use crate::index::reader::LeafReader;
use crate::util::bits::FixedBitSet;

/// How the terms of a numeric field are parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumericKind {
    Int,
    Long,
    Float,
    Double,
}

impl NumericKind {
    pub fn is_integral(self) -> bool {
        matches!(self, NumericKind::Int | NumericKind::Long)
    }
}

impl fmt::Display for NumericKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NumericKind::Int => "int",
            NumericKind::Long => "long",
            NumericKind::Float => "float",
            NumericKind::Double => "double",
        };
        f.write_str(name)
    }
}

/// Uninverted values of one field.
#[derive(Debug, Clone)]
pub enum CachedValues {
    Longs(Arc<Vec<i64>>),
    Doubles(Arc<Vec<f64>>),
}

#[derive(Debug, Default)]
struct CacheState {
    values: AHashMap<(String, NumericKind), CachedValues>,
    docs_with_field: AHashMap<String, Arc<FixedBitSet>>,
}

/// Cache owned by one segment reader.
#[derive(Debug, Default)]
pub struct FieldCache {
    state: Mutex<CacheState>,
}

impl FieldCache {
    pub fn new() -> Self {
        FieldCache::default()
    }

    /// Values of an `Int` or `Long` field, 0 for documents without a term.
    pub fn longs(&self, reader: &dyn LeafReader, field: &str, kind: NumericKind) -> Result<Arc<Vec<i64>>> {
        if !kind.is_integral() {
            return Err(XiphosError::invalid_argument(format!("{kind} values are not integral")));
        }
        match self.values(reader, field, kind)? {
            CachedValues::Longs(values) => Ok(values),
            CachedValues::Doubles(_) => Err(XiphosError::invariant("integral field cached as doubles")),
        }
    }

    /// Values of a `Float` or `Double` field, 0 for documents without a term.
    pub fn doubles(&self, reader: &dyn LeafReader, field: &str, kind: NumericKind) -> Result<Arc<Vec<f64>>> {
        if kind.is_integral() {
            return Err(XiphosError::invalid_argument(format!("{kind} values are integral")));
        }
        match self.values(reader, field, kind)? {
            CachedValues::Doubles(values) => Ok(values),
            CachedValues::Longs(_) => Err(XiphosError::invariant("floating field cached as longs")),
        }
    }

    /// Documents with at least one term in `field`.
    pub fn docs_with_field(&self, reader: &dyn LeafReader, field: &str) -> Result<Arc<FixedBitSet>> {
        let mut state = self.state.lock();
        if let Some(bits) = state.docs_with_field.get(field) {
            return Ok(Arc::clone(bits));
        }
        let mut bits = FixedBitSet::new(reader.max_doc().max(0) as usize);
        if let Some(terms) = reader.terms(field)? {
            let mut terms_enum = terms.iterator();
            while terms_enum.next().is_some() {
                let mut docs = terms_enum.docs(None, false)?;
                loop {
                    let doc = docs.next_doc()?;
                    if doc == NO_MORE_DOCS {
                        break;
                    }
                    bits.set(doc as usize);
                }
            }
        }
        let bits = Arc::new(bits);
        state.docs_with_field.insert(field.to_string(), Arc::clone(&bits));
        Ok(bits)
    }

    /// Number of cached value arrays.
    pub fn len(&self) -> usize {
        self.state.lock().values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn values(&self, reader: &dyn LeafReader, field: &str, kind: NumericKind) -> Result<CachedValues> {
        let mut state = self.state.lock();
        let key = (field.to_string(), kind);
        if let Some(values) = state.values.get(&key) {
            return Ok(values.clone());
        }

        let max_doc = reader.max_doc().max(0) as usize;
        let mut longs = if kind.is_integral() { vec![0i64; max_doc] } else { Vec::new() };
        let mut doubles = if kind.is_integral() { Vec::new() } else { vec![0f64; max_doc] };
        let mut bits = FixedBitSet::new(max_doc);

        if let Some(terms) = reader.terms(field)? {
            let mut terms_enum = terms.iterator();
            while let Some(term) = terms_enum.next() {
                let term = term.to_vec();
                let parsed = parse_term(&term, kind);
                let mut docs = terms_enum.docs(None, false)?;
                loop {
                    let doc = docs.next_doc()?;
                    if doc == NO_MORE_DOCS {
                        break;
                    }
                    match parsed {
                        Some(Parsed::Long(v)) => longs[doc as usize] = v,
                        Some(Parsed::Double(v)) => doubles[doc as usize] = v,
                        None => {
                            return Err(XiphosError::function(format!(
                                "cannot parse term '{}' of field '{field}' as {kind} in document {doc}",
                                String::from_utf8_lossy(&term)
                            )));
                        }
                    }
                    bits.set(doc as usize);
                }
            }
        }

        let values = if kind.is_integral() {
            CachedValues::Longs(Arc::new(longs))
        } else {
            CachedValues::Doubles(Arc::new(doubles))
        };
        log::debug!("uninverted field '{field}' as {kind} over {max_doc} documents");
        state.values.insert(key, values.clone());
        state
            .docs_with_field
            .entry(field.to_string())
            .or_insert_with(|| Arc::new(bits));
        Ok(values)
    }
}

#[derive(Debug, Clone, Copy)]
enum Parsed {
    Long(i64),
    Double(f64),
}

fn parse_term(term: &[u8], kind: NumericKind) -> Option<Parsed> {
    let text = std::str::from_utf8(term).ok()?;
    Some(match kind {
        NumericKind::Int => Parsed::Long(text.parse::<i32>().ok()? as i64),
        NumericKind::Long => Parsed::Long(text.parse::<i64>().ok()?),
        NumericKind::Float => Parsed::Double(text.parse::<f32>().ok()? as f64),
        NumericKind::Double => Parsed::Double(text.parse::<f64>().ok()?),
    })
}
