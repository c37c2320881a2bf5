//! Fixed-width bit vector over the transcripts of one locus.
//!
//! Bit `i` stands for the `i`-th transcript in the graph's sorted transcript
//! order. All binary operations require equal widths; a mismatch is a
//! programmer error and panics in every build profile, because a silently
//! truncated set corrupts every downstream partition.

use std::fmt;

const WORD_BITS: usize = 64;

#[derive(Clone, PartialEq, Eq, Hash)]
pub struct TranscriptSet {
    words: Vec<u64>,
    capacity: usize,
}

#[inline]
fn width_for(capacity: usize) -> usize {
    capacity.div_ceil(WORD_BITS).max(1)
}

impl TranscriptSet {
    /// Empty set able to hold `capacity` transcripts.
    pub fn empty(capacity: usize) -> Self {
        Self {
            words: vec![0; width_for(capacity)],
            capacity,
        }
    }

    /// Set holding every transcript `0..capacity`.
    pub fn full(capacity: usize) -> Self {
        let mut s = Self::empty(capacity);
        for i in 0..capacity {
            s.insert(i);
        }
        s
    }

    /// Singleton set for one transcript index.
    pub fn encode(capacity: usize, index: usize) -> Self {
        let mut s = Self::empty(capacity);
        s.insert(index);
        s
    }

    pub fn from_indices(capacity: usize, indices: impl IntoIterator<Item = usize>) -> Self {
        let mut s = Self::empty(capacity);
        for i in indices {
            s.insert(i);
        }
        s
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of `u64` words.
    #[inline]
    pub fn width(&self) -> usize {
        self.words.len()
    }

    #[inline]
    fn check_index(&self, index: usize) {
        assert!(
            index < self.capacity,
            "transcript index {index} out of range (capacity {})",
            self.capacity
        );
    }

    #[inline]
    fn check_width(&self, other: &TranscriptSet) {
        assert_eq!(
            self.words.len(),
            other.words.len(),
            "transcript set width mismatch"
        );
    }

    pub fn insert(&mut self, index: usize) {
        self.check_index(index);
        self.words[index / WORD_BITS] |= 1u64 << (index % WORD_BITS);
    }

    pub fn remove(&mut self, index: usize) {
        self.check_index(index);
        self.words[index / WORD_BITS] &= !(1u64 << (index % WORD_BITS));
    }

    pub fn contains(&self, index: usize) -> bool {
        self.check_index(index);
        self.words[index / WORD_BITS] & (1u64 << (index % WORD_BITS)) != 0
    }

    pub fn intersect(&self, other: &TranscriptSet) -> TranscriptSet {
        let mut out = self.clone();
        out.intersect_with(other);
        out
    }

    pub fn union(&self, other: &TranscriptSet) -> TranscriptSet {
        let mut out = self.clone();
        out.union_with(other);
        out
    }

    pub fn xor(&self, other: &TranscriptSet) -> TranscriptSet {
        self.check_width(other);
        let words = self
            .words
            .iter()
            .zip(&other.words)
            .map(|(a, b)| a ^ b)
            .collect();
        TranscriptSet {
            words,
            capacity: self.capacity,
        }
    }

    /// `self xor (self ∩ other)`: members of `self` not in `other`.
    pub fn without(&self, other: &TranscriptSet) -> TranscriptSet {
        self.xor(&self.intersect(other))
    }

    pub fn intersect_with(&mut self, other: &TranscriptSet) {
        self.check_width(other);
        for (a, b) in self.words.iter_mut().zip(&other.words) {
            *a &= *b;
        }
    }

    pub fn union_with(&mut self, other: &TranscriptSet) {
        self.check_width(other);
        for (a, b) in self.words.iter_mut().zip(&other.words) {
            *a |= *b;
        }
    }

    pub fn subtract(&mut self, other: &TranscriptSet) {
        self.check_width(other);
        for (a, b) in self.words.iter_mut().zip(&other.words) {
            *a &= !*b;
        }
    }

    pub fn intersects(&self, other: &TranscriptSet) -> bool {
        self.check_width(other);
        self.words.iter().zip(&other.words).any(|(a, b)| a & b != 0)
    }

    pub fn is_subset_of(&self, other: &TranscriptSet) -> bool {
        self.check_width(other);
        self.words.iter().zip(&other.words).all(|(a, b)| a & !b == 0)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    pub fn popcount(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Smallest member `>= from`.
    pub fn next_set_index(&self, from: usize) -> Option<usize> {
        if from >= self.words.len() * WORD_BITS {
            return None;
        }
        let mut wi = from / WORD_BITS;
        let mut word = self.words[wi] & (u64::MAX << (from % WORD_BITS));
        loop {
            if word != 0 {
                return Some(wi * WORD_BITS + word.trailing_zeros() as usize);
            }
            wi += 1;
            if wi == self.words.len() {
                return None;
            }
            word = self.words[wi];
        }
    }

    pub fn first(&self) -> Option<usize> {
        self.next_set_index(0)
    }

    /// Members in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        let mut next = self.next_set_index(0);
        std::iter::from_fn(move || {
            let cur = next?;
            next = self.next_set_index(cur + 1);
            Some(cur)
        })
    }
}

impl fmt::Debug for TranscriptSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn width_is_at_least_one_word() {
        assert_eq!(TranscriptSet::empty(0).width(), 1);
        assert_eq!(TranscriptSet::empty(64).width(), 1);
        assert_eq!(TranscriptSet::empty(65).width(), 2);
    }

    #[test]
    fn basic_algebra() {
        let a = TranscriptSet::from_indices(70, [0, 3, 65]);
        let b = TranscriptSet::from_indices(70, [3, 4, 69]);
        assert_eq!(a.intersect(&b).iter().collect::<Vec<_>>(), vec![3]);
        assert_eq!(a.union(&b).popcount(), 5);
        assert_eq!(a.without(&b).iter().collect::<Vec<_>>(), vec![0, 65]);
        assert_eq!(a.xor(&b).iter().collect::<Vec<_>>(), vec![0, 4, 65, 69]);
        assert!(a.intersects(&b));
        assert!(a.intersect(&b).is_subset_of(&a));
        assert!(!a.is_subset_of(&b));
    }

    #[test]
    fn next_set_index_crosses_words() {
        let s = TranscriptSet::from_indices(200, [5, 130]);
        assert_eq!(s.next_set_index(0), Some(5));
        assert_eq!(s.next_set_index(6), Some(130));
        assert_eq!(s.next_set_index(131), None);
        assert_eq!(s.next_set_index(10_000), None);
    }

    #[test]
    fn full_and_remove() {
        let mut s = TranscriptSet::full(3);
        assert_eq!(s.popcount(), 3);
        s.remove(1);
        assert!(!s.contains(1));
        assert_eq!(format!("{s:?}"), "{0, 2}");
    }

    #[test]
    #[should_panic(expected = "width mismatch")]
    fn width_mismatch_panics() {
        let a = TranscriptSet::empty(10);
        let b = TranscriptSet::empty(100);
        let _ = a.union(&b);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn encode_past_capacity_panics() {
        let _ = TranscriptSet::encode(3, 3);
    }
}
