use serde::{Serialize, Deserialize};

/// Genomic strand/orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize )]
pub enum Strand {
    Plus,
    Minus,
    Unknown,
}

impl Strand {
    /// Sign applied to 1-based genomic coordinates so that ascending order
    /// always runs 5' -> 3' along the transcript.
    ///
    /// "Unknown" is laid out like the plus strand.
    #[inline]
    pub fn sign(self) -> i64 {
        match self {
            Strand::Minus => -1,
            Strand::Plus | Strand::Unknown => 1,
        }
    }

    pub fn symbol(self) -> char {
        match self {
            Strand::Plus => '+',
            Strand::Minus => '-',
            Strand::Unknown => '.',
        }
    }
}

/// A contiguous genomic interval.
/// Coordinates are 0-based, half-open: [start, end)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize )]
pub struct RefBlock {
    pub start: u32,
    pub end: u32,
}

impl RefBlock {
    /// Create a new block. Panics if start >= end.
    pub fn new(start: u32, end: u32) -> Self {
        assert!(start < end, "RefBlock requires start < end");
        Self { start, end }
    }

    /// Block from GTF-style 1-based inclusive coordinates.
    pub fn from_one_based(first: u32, last: u32) -> Self {
        assert!(first >= 1, "1-based coordinates start at 1");
        Self::new(first - 1, last)
    }

    #[inline]
    pub fn len(self) -> u32 {
        self.end - self.start
    }

    /// First base, 1-based.
    #[inline]
    pub fn first_base(self) -> u32 {
        self.start + 1
    }

    /// Last base, 1-based.
    #[inline]
    pub fn last_base(self) -> u32 {
        self.end
    }

    /// True if the 1-based position lies inside the block.
    #[inline]
    pub fn contains_base(self, pos1: u32) -> bool {
        pos1 > self.start && pos1 <= self.end
    }

    /// Sort blocks and merge overlapping or touching ones.
    pub fn merge_sorted(mut blocks: Vec<RefBlock>) -> Vec<RefBlock> {
        if blocks.is_empty() {
            return blocks;
        }
        blocks.sort_by_key(|b| (b.start, b.end));

        let mut merged: Vec<RefBlock> = Vec::with_capacity(blocks.len());
        let mut cur = blocks[0];
        for &b in &blocks[1..] {
            if b.start <= cur.end {
                cur.end = cur.end.max(b.end);
            } else {
                merged.push(cur);
                cur = b;
            }
        }
        merged.push(cur);
        merged
    }
}
