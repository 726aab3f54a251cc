//! Random-access bit sets.
//!
//! [`Bits`] is the read-only capability handed to postings enumerators and
//! scorers (live documents, docs-with-field). [`FixedBitSet`] is the concrete
//! fixed-length set backing live docs and the visited-docs accounting of the
//! postings reader.

use std::fmt::Debug;

use bit_vec::BitVec;

/// Read-only random access to a fixed number of bits.
pub trait Bits: Send + Sync + Debug {
    /// Whether bit `index` is set. Out-of-range indexes read as unset.
    fn get(&self, index: usize) -> bool;

    /// Number of addressable bits.
    fn len(&self) -> usize;

    /// Whether the set addresses no bits at all.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A fixed-length bit set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedBitSet {
    bits: BitVec,
}

impl FixedBitSet {
    /// Create a set of `len` unset bits.
    pub fn new(len: usize) -> Self {
        FixedBitSet {
            bits: BitVec::from_elem(len, false),
        }
    }

    /// Create a set of `len` bits, all set.
    pub fn all_set(len: usize) -> Self {
        FixedBitSet {
            bits: BitVec::from_elem(len, true),
        }
    }

    /// Set bit `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    pub fn set(&mut self, index: usize) {
        self.bits.set(index, true);
    }

    /// Clear bit `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    pub fn clear(&mut self, index: usize) {
        self.bits.set(index, false);
    }

    /// Number of set bits.
    pub fn cardinality(&self) -> usize {
        self.bits.iter().filter(|bit| *bit).count()
    }

    /// Iterate the indexes of set bits in ascending order.
    pub fn iter_set(&self) -> impl Iterator<Item = usize> + '_ {
        self.bits
            .iter()
            .enumerate()
            .filter_map(|(index, bit)| bit.then_some(index))
    }
}

impl Bits for FixedBitSet {
    fn get(&self, index: usize) -> bool {
        self.bits.get(index).unwrap_or(false)
    }

    fn len(&self) -> usize {
        self.bits.len()
    }
}

/// Bits that are all set, for readers without deletions.
#[derive(Debug, Clone, Copy)]
pub struct MatchAllBits {
    len: usize,
}

impl MatchAllBits {
    /// Create `len` set bits.
    pub fn new(len: usize) -> Self {
        MatchAllBits { len }
    }
}

impl Bits for MatchAllBits {
    fn get(&self, index: usize) -> bool {
        index < self.len
    }

    fn len(&self) -> usize {
        self.len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_clear_and_cardinality() {
        let mut bits = FixedBitSet::new(10);
        assert_eq!(bits.cardinality(), 0);

        bits.set(1);
        bits.set(7);
        bits.set(7);
        assert!(bits.get(1));
        assert!(!bits.get(2));
        assert_eq!(bits.cardinality(), 2);

        bits.clear(1);
        assert!(!bits.get(1));
        assert_eq!(bits.iter_set().collect::<Vec<_>>(), vec![7]);
    }

    #[test]
    fn test_out_of_range_reads_unset() {
        let bits = FixedBitSet::all_set(3);
        assert!(bits.get(2));
        assert!(!bits.get(3));
        assert_eq!(bits.len(), 3);

        let all = MatchAllBits::new(2);
        assert!(all.get(1));
        assert!(!all.get(2));
    }
}
