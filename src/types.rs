use serde::{Serialize, Deserialize};
use std::fmt;

/// Genomic strand/orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Strand {
    Plus,
    Minus,
    #[default]
    Unknown,
}

impl Strand {
    #[inline]
    pub fn from_plus_flag(is_plus_strand: bool) -> Self {
        if is_plus_strand {
            Strand::Plus
        } else {
            Strand::Minus
        }
    }

    #[inline]
    pub fn is_plus(self) -> bool {
        self == Strand::Plus
    }

    /// Plus or Minus; Unknown cannot be walked 5'->3'.
    #[inline]
    pub fn is_oriented(self) -> bool {
        self != Strand::Unknown
    }

    pub fn symbol(self) -> char {
        match self {
            Strand::Plus => '+',
            Strand::Minus => '-',
            Strand::Unknown => '.',
        }
    }
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// A contiguous genomic interval.
/// Coordinates are 0-based, half-open: [start, end)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
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

    #[inline]
    pub fn len(self) -> u32 {
        self.end - self.start
    }

    #[inline]
    pub fn overlaps(self, other: RefBlock) -> bool {
        self.start < other.end && other.start < self.end
    }

    #[inline]
    pub fn contains(self, other: RefBlock) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Intersection with `bounds`, or None when they do not overlap.
    pub fn clip_to(self, bounds: RefBlock) -> Option<RefBlock> {
        let start = self.start.max(bounds.start);
        let end = self.end.min(bounds.end);
        (start < end).then_some(RefBlock { start, end })
    }

    /// Sort blocks by start and merge overlapping or adjacent ones.
    pub fn merge_all(mut blocks: Vec<RefBlock>) -> Vec<RefBlock> {
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

    /// Gaps between consecutive sorted, merged blocks.
    ///
    /// Gap i is `[blocks[i].end, blocks[i+1].start)`; touching blocks produce none.
    pub fn gaps(blocks: &[RefBlock]) -> Vec<RefBlock> {
        blocks
            .windows(2)
            .filter(|w| w[0].end < w[1].start)
            .map(|w| RefBlock::new(w[0].end, w[1].start))
            .collect()
    }

    /// Span of sorted blocks (first start, last end).
    pub fn span(blocks: &[RefBlock]) -> Option<RefBlock> {
        let first = blocks.first()?;
        let last = blocks.last()?;
        Some(RefBlock { start: first.start, end: last.end })
    }
}
