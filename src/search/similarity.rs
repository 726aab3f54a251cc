//! Scoring models.
//!
//! A [`Similarity`] decides two things: the norm written for each indexed
//! field of each document at flush time, and how a term's statistics and
//! per-document frequency turn into a score at search time.

use std::fmt::Debug;
use std::sync::Arc;

use crate::codec::doc_values::NumericDocValues;
use crate::error::Result;
use crate::index::reader::LeafReader;

/// Per-field statistics gathered while inverting one document.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldInvertState {
    pub name: String,
    /// Number of tokens.
    pub length: i32,
    /// Number of tokens stacked on a previous position.
    pub num_overlap: i32,
    /// Last position.
    pub position: i32,
    /// Offset just past the last token.
    pub offset: i32,
    pub max_term_frequency: i32,
    pub unique_term_count: i32,
    pub boost: f32,
}

impl FieldInvertState {
    pub fn new(name: impl Into<String>) -> Self {
        FieldInvertState {
            name: name.into(),
            length: 0,
            num_overlap: 0,
            position: -1,
            offset: 0,
            max_term_frequency: 0,
            unique_term_count: 0,
            boost: 1.0,
        }
    }
}

/// Statistics of a field across the whole index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionStatistics {
    pub field: String,
    pub max_doc: i64,
    /// Documents with at least one term in the field, -1 if unknown.
    pub doc_count: i64,
    /// -1 when the field does not index frequencies.
    pub sum_total_term_freq: i64,
    pub sum_doc_freq: i64,
}

/// Statistics of one term across the whole index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermStatistics {
    pub term: Vec<u8>,
    pub doc_freq: i64,
    /// -1 when the field does not index frequencies.
    pub total_term_freq: i64,
}

pub trait Similarity: Send + Sync + Debug {
    /// The norm stored for a field of one document.
    fn compute_norm(&self, state: &FieldInvertState) -> i64;

    /// Query-level weight of `terms` in a field.
    fn compute_weight(
        &self,
        boost: f32,
        collection: &CollectionStatistics,
        terms: &[TermStatistics],
    ) -> Arc<dyn SimWeight>;

    /// This similarity as a TF-IDF model, if it is one.
    fn as_tf_idf(&self) -> Option<&dyn TfIdfSimilarity> {
        None
    }

    fn name(&self) -> &'static str;
}

/// Query-level scoring state of a similarity.
pub trait SimWeight: Send + Sync + Debug {
    /// Bind to one segment.
    fn sim_scorer(&self, leaf: &dyn LeafReader) -> Result<Box<dyn SimScorer>>;
}

/// Segment-level scoring of a similarity.
pub trait SimScorer: Send + Debug {
    fn score(&mut self, doc: i32, freq: f32) -> Result<f32>;
}

/// The vector-space components used by the `tf`, `idf` and `norm` functions.
pub trait TfIdfSimilarity: Send + Sync + Debug {
    fn tf(&self, freq: f32) -> f32;

    fn idf(&self, doc_freq: i64, num_docs: i64) -> f32;

    fn length_norm(&self, state: &FieldInvertState) -> f32;

    fn encode_norm(&self, norm: f32) -> i64;

    fn decode_norm(&self, norm: i64) -> f32;
}

/// Encode a float into a byte with 3 mantissa bits and a zero exponent of 15.
/// Values too small round to 0 (or 1 for positive values); values too large
/// clamp to 255.
pub fn float_to_byte315(f: f32) -> u8 {
    let bits = f.to_bits() as i32;
    let small = bits >> (24 - 3);
    let zero_exp = (63 - 15) << 3;
    if small <= zero_exp {
        return if bits <= 0 { 0 } else { 1 };
    }
    if small >= zero_exp + 0x100 {
        return 255;
    }
    (small - zero_exp) as u8
}

/// Inverse of [`float_to_byte315`].
pub fn byte315_to_float(b: u8) -> f32 {
    if b == 0 {
        return 0.0;
    }
    let mut bits = (b as u32) << (24 - 3);
    bits += (63 - 15) << 24;
    f32::from_bits(bits)
}

/// Classic TF-IDF with `sqrt(freq)` term frequency and `1/sqrt(length)` norms.
#[derive(Debug, Clone, Copy)]
pub struct DefaultSimilarity {
    /// Leave stacked tokens out of the field length.
    pub discount_overlaps: bool,
}

impl Default for DefaultSimilarity {
    fn default() -> Self {
        DefaultSimilarity {
            discount_overlaps: true,
        }
    }
}

impl DefaultSimilarity {
    pub fn new() -> Self {
        DefaultSimilarity::default()
    }
}

impl TfIdfSimilarity for DefaultSimilarity {
    fn tf(&self, freq: f32) -> f32 {
        freq.sqrt()
    }

    fn idf(&self, doc_freq: i64, num_docs: i64) -> f32 {
        ((num_docs as f64 / (doc_freq + 1) as f64).ln() + 1.0) as f32
    }

    fn length_norm(&self, state: &FieldInvertState) -> f32 {
        let num_terms = if self.discount_overlaps {
            state.length - state.num_overlap
        } else {
            state.length
        };
        state.boost * (1.0 / (num_terms as f32).sqrt())
    }

    fn encode_norm(&self, norm: f32) -> i64 {
        float_to_byte315(norm) as i64
    }

    fn decode_norm(&self, norm: i64) -> f32 {
        byte315_to_float(norm as u8)
    }
}

impl Similarity for DefaultSimilarity {
    fn compute_norm(&self, state: &FieldInvertState) -> i64 {
        self.encode_norm(self.length_norm(state))
    }

    fn compute_weight(
        &self,
        boost: f32,
        collection: &CollectionStatistics,
        terms: &[TermStatistics],
    ) -> Arc<dyn SimWeight> {
        let max_doc = collection.max_doc;
        let idf: f32 = terms.iter().map(|t| self.idf(t.doc_freq, max_doc)).sum();
        Arc::new(TfIdfWeight {
            similarity: *self,
            field: collection.field.clone(),
            value: idf * idf * boost,
        })
    }

    fn as_tf_idf(&self) -> Option<&dyn TfIdfSimilarity> {
        Some(self)
    }

    fn name(&self) -> &'static str {
        "default"
    }
}

#[derive(Debug)]
struct TfIdfWeight {
    similarity: DefaultSimilarity,
    field: String,
    value: f32,
}

impl SimWeight for TfIdfWeight {
    fn sim_scorer(&self, leaf: &dyn LeafReader) -> Result<Box<dyn SimScorer>> {
        Ok(Box::new(TfIdfScorer {
            similarity: self.similarity,
            value: self.value,
            norms: leaf.norm_values(&self.field)?,
        }))
    }
}

#[derive(Debug)]
struct TfIdfScorer {
    similarity: DefaultSimilarity,
    value: f32,
    norms: Option<Box<dyn NumericDocValues>>,
}

impl SimScorer for TfIdfScorer {
    fn score(&mut self, doc: i32, freq: f32) -> Result<f32> {
        let raw = self.similarity.tf(freq) * self.value;
        Ok(match self.norms.as_mut() {
            Some(norms) => raw * self.similarity.decode_norm(norms.get(doc)?),
            None => raw,
        })
    }
}

/// Okapi BM25.
#[derive(Debug, Clone, Copy)]
pub struct Bm25Similarity {
    pub k1: f32,
    pub b: f32,
    pub discount_overlaps: bool,
}

impl Default for Bm25Similarity {
    fn default() -> Self {
        Bm25Similarity {
            k1: 1.2,
            b: 0.75,
            discount_overlaps: true,
        }
    }
}

impl Bm25Similarity {
    pub fn new(k1: f32, b: f32) -> Self {
        Bm25Similarity {
            k1,
            b,
            ..Bm25Similarity::default()
        }
    }

    fn idf(&self, doc_freq: i64, doc_count: i64) -> f32 {
        (1.0 + (doc_count - doc_freq) as f64 / (doc_freq as f64 + 0.5)).ln() as f32
    }

    fn decode_length(norm: i64) -> f32 {
        let f = byte315_to_float(norm as u8);
        1.0 / (f * f)
    }
}

impl Similarity for Bm25Similarity {
    fn compute_norm(&self, state: &FieldInvertState) -> i64 {
        let num_terms = if self.discount_overlaps {
            state.length - state.num_overlap
        } else {
            state.length
        };
        float_to_byte315(state.boost / (num_terms as f32).sqrt()) as i64
    }

    fn compute_weight(
        &self,
        boost: f32,
        collection: &CollectionStatistics,
        terms: &[TermStatistics],
    ) -> Arc<dyn SimWeight> {
        let doc_count = if collection.doc_count < 0 {
            collection.max_doc
        } else {
            collection.doc_count
        };
        let idf: f32 = terms.iter().map(|t| self.idf(t.doc_freq, doc_count)).sum();
        let avgdl = if collection.sum_total_term_freq <= 0 || collection.max_doc == 0 {
            1.0
        } else {
            (collection.sum_total_term_freq as f64 / collection.max_doc as f64) as f32
        };
        let mut cache = [0f32; 256];
        for (norm, slot) in cache.iter_mut().enumerate() {
            *slot = self.k1 * ((1.0 - self.b) + self.b * Self::decode_length(norm as i64) / avgdl);
        }
        Arc::new(Bm25Weight {
            field: collection.field.clone(),
            k1: self.k1,
            weight: idf * boost,
            cache: Arc::new(cache),
        })
    }

    fn name(&self) -> &'static str {
        "bm25"
    }
}

#[derive(Debug)]
struct Bm25Weight {
    field: String,
    k1: f32,
    weight: f32,
    cache: Arc<[f32; 256]>,
}

impl SimWeight for Bm25Weight {
    fn sim_scorer(&self, leaf: &dyn LeafReader) -> Result<Box<dyn SimScorer>> {
        Ok(Box::new(Bm25Scorer {
            k1: self.k1,
            weight: self.weight,
            cache: Arc::clone(&self.cache),
            norms: leaf.norm_values(&self.field)?,
        }))
    }
}

#[derive(Debug)]
struct Bm25Scorer {
    k1: f32,
    weight: f32,
    cache: Arc<[f32; 256]>,
    norms: Option<Box<dyn NumericDocValues>>,
}

impl SimScorer for Bm25Scorer {
    fn score(&mut self, doc: i32, freq: f32) -> Result<f32> {
        let norm = match self.norms.as_mut() {
            Some(norms) => self.cache[(norms.get(doc)? as u8) as usize],
            None => self.k1,
        };
        Ok(self.weight * (self.k1 + 1.0) * freq / (freq + norm))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_float_round_trip() {
        assert_eq!(float_to_byte315(1.0), 124);
        assert_eq!(byte315_to_float(124), 1.0);
        assert_eq!(byte315_to_float(float_to_byte315(0.5)), 0.5);
        assert_eq!(float_to_byte315(0.0), 0);
        assert_eq!(float_to_byte315(-1.0), 0);
        assert_eq!(float_to_byte315(f32::MAX), 255);
        assert_eq!(byte315_to_float(0), 0.0);
    }

    #[test]
    fn test_default_similarity_components() {
        let sim = DefaultSimilarity::new();
        assert_eq!(sim.tf(4.0), 2.0);
        assert!((sim.idf(0, 1) - 1.0).abs() < 1e-6);

        let mut state = FieldInvertState::new("body");
        state.length = 4;
        assert_eq!(sim.decode_norm(sim.compute_norm(&state)), 0.5);
        state.num_overlap = 3;
        assert_eq!(sim.decode_norm(sim.compute_norm(&state)), 1.0);
        assert!(sim.as_tf_idf().is_some());
    }

    #[test]
    fn test_bm25_is_not_tf_idf() {
        let sim = Bm25Similarity::default();
        assert!(sim.as_tf_idf().is_none());
        assert!(sim.idf(1, 10) > sim.idf(5, 10));
    }
}
