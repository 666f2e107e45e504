//! A dense bit vector used for dominator sets.
//!
//! Dominator computation tracks, for every basic block, the set of blocks that
//! dominate it. Blocks are addressed by small integer IDs, so a packed bit
//! vector with word-wise union/intersection is the natural representation: the
//! dataflow fixpoint reduces to a handful of `AND` loops per iteration.
//!
//! # Example
//!
//! ```rust
//! use regscope::utils::BitSet;
//!
//! let mut doms = BitSet::full(8);
//! let mut pred = BitSet::new(8);
//! pred.insert(0);
//! pred.insert(3);
//!
//! doms.intersect_with(&pred);
//! assert_eq!(doms.iter().collect::<Vec<_>>(), vec![0, 3]);
//! ```

/// A fixed-capacity bit vector supporting the set operations needed by
/// iterative dataflow: insert/remove/contains, in-place union and
/// intersection, and iteration over set bits.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct BitSet {
    /// Packed bits, 64 per word.
    words: Vec<u64>,
    /// Capacity in bits.
    len: usize,
}

impl BitSet {
    /// Creates an empty bit set able to hold `capacity` bits.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            words: vec![0; capacity.div_ceil(64)],
            len: capacity,
        }
    }

    /// Creates a bit set with every bit up to `capacity` set.
    ///
    /// This is the starting state of every non-entry block's dominator set.
    #[must_use]
    pub fn full(capacity: usize) -> Self {
        let mut set = Self::new(capacity);
        set.fill();
        set
    }

    /// Returns the capacity in bits.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if no bit is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// Sets the bit at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.len()`.
    pub fn insert(&mut self, index: usize) {
        assert!(index < self.len, "bit index out of bounds");
        self.words[index / 64] |= 1u64 << (index % 64);
    }

    /// Clears the bit at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.len()`.
    pub fn remove(&mut self, index: usize) {
        assert!(index < self.len, "bit index out of bounds");
        self.words[index / 64] &= !(1u64 << (index % 64));
    }

    /// Returns `true` if the bit at `index` is set.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.len()`.
    #[must_use]
    pub fn contains(&self, index: usize) -> bool {
        assert!(index < self.len, "bit index out of bounds");
        self.words[index / 64] & (1u64 << (index % 64)) != 0
    }

    /// Returns the number of set bits.
    #[must_use]
    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Clears every bit.
    pub fn clear(&mut self) {
        self.words.fill(0);
    }

    /// Sets every bit up to the capacity.
    pub fn fill(&mut self) {
        self.words.fill(u64::MAX);
        self.trim_excess();
    }

    /// Replaces the contents of `self` with a copy of `other`.
    ///
    /// # Panics
    ///
    /// Panics if the capacities differ.
    pub fn copy_from(&mut self, other: &Self) {
        assert_eq!(self.len, other.len, "bit set capacities must match");
        self.words.copy_from_slice(&other.words);
    }

    /// In-place union. Returns `true` if `self` changed.
    ///
    /// # Panics
    ///
    /// Panics if the capacities differ.
    pub fn union_with(&mut self, other: &Self) -> bool {
        assert_eq!(self.len, other.len, "bit set capacities must match");
        let mut changed = false;
        for (a, b) in self.words.iter_mut().zip(&other.words) {
            let merged = *a | *b;
            changed |= merged != *a;
            *a = merged;
        }
        changed
    }

    /// In-place intersection. Returns `true` if `self` changed.
    ///
    /// # Panics
    ///
    /// Panics if the capacities differ.
    pub fn intersect_with(&mut self, other: &Self) -> bool {
        assert_eq!(self.len, other.len, "bit set capacities must match");
        let mut changed = false;
        for (a, b) in self.words.iter_mut().zip(&other.words) {
            let reduced = *a & *b;
            changed |= reduced != *a;
            *a = reduced;
        }
        changed
    }

    /// Returns an iterator over the indices of set bits, in ascending order.
    pub fn iter(&self) -> Bits<'_> {
        Bits {
            set: self,
            word_idx: 0,
            current: self.words.first().copied().unwrap_or(0),
        }
    }

    /// Masks off bits past the capacity in the last word.
    fn trim_excess(&mut self) {
        let tail = self.len % 64;
        if tail != 0 {
            if let Some(last) = self.words.last_mut() {
                *last &= (1u64 << tail) - 1;
            }
        }
    }
}

impl std::fmt::Debug for BitSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// Iterator over set bits, produced by [`BitSet::iter`].
pub struct Bits<'a> {
    set: &'a BitSet,
    word_idx: usize,
    current: u64,
}

impl Iterator for Bits<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.current != 0 {
                let bit = self.current.trailing_zeros() as usize;
                self.current &= self.current - 1;
                return Some(self.word_idx * 64 + bit);
            }
            self.word_idx += 1;
            if self.word_idx >= self.set.words.len() {
                return None;
            }
            self.current = self.set.words[self.word_idx];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_remove_contains() {
        let mut set = BitSet::new(130);
        assert!(set.is_empty());

        set.insert(0);
        set.insert(64);
        set.insert(129);
        assert_eq!(set.count(), 3);
        assert!(set.contains(64));
        assert!(!set.contains(63));

        set.remove(64);
        assert!(!set.contains(64));
        assert_eq!(set.count(), 2);
    }

    #[test]
    fn test_full_respects_capacity() {
        let set = BitSet::full(70);
        assert_eq!(set.count(), 70);
        assert!(set.contains(69));
    }

    #[test]
    fn test_intersection_fixpoint_shape() {
        // dom(b) starts full and is narrowed by predecessor intersections.
        let mut doms = BitSet::full(10);
        let mut pred_a = BitSet::new(10);
        let mut pred_b = BitSet::new(10);
        pred_a.insert(0);
        pred_a.insert(2);
        pred_a.insert(5);
        pred_b.insert(0);
        pred_b.insert(5);

        assert!(doms.intersect_with(&pred_a));
        assert!(doms.intersect_with(&pred_b));
        assert!(!doms.intersect_with(&pred_b));
        assert_eq!(doms.iter().collect::<Vec<_>>(), vec![0, 5]);
    }

    #[test]
    fn test_union_reports_change() {
        let mut a = BitSet::new(16);
        let mut b = BitSet::new(16);
        b.insert(3);

        assert!(a.union_with(&b));
        assert!(!a.union_with(&b));
        assert!(a.contains(3));
    }

    #[test]
    fn test_copy_from() {
        let mut a = BitSet::new(32);
        let mut b = BitSet::new(32);
        b.insert(1);
        b.insert(31);

        a.copy_from(&b);
        assert_eq!(a, b);
    }

    #[test]
    fn test_iter_crosses_word_boundary() {
        let mut set = BitSet::new(200);
        set.insert(5);
        set.insert(63);
        set.insert(64);
        set.insert(199);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![5, 63, 64, 199]);
    }
}
