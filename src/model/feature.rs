use crate::model::types::{CoordinateId, FeatureId, FeatureType, PieceId};
use crate::types::{RefBlock, Strand};
use serde::{Serialize, Deserialize};

/// A typed, stranded interval on one Coordinate.
///
/// Positions are absolute on the sequence, 0-based half-open, with `start < end`
/// on both strands. On the minus strand the 5' base is `end - 1`.
///
/// `piece` is the single owning piece; ownership is only ever moved, never shared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    pub id: FeatureId,
    pub coordinate: CoordinateId,
    pub kind: FeatureType,
    pub start: u32,
    pub end: u32,
    pub strand: Strand,
    pub start_is_biological_start: bool,
    pub end_is_biological_end: bool,
    pub piece: PieceId,
}

impl Feature {
    #[inline]
    pub fn block(&self) -> RefBlock {
        RefBlock { start: self.start, end: self.end }
    }

    /// Interval in 5'->3' walk space: `(start, end)` on plus, `(-end, -start)` on minus.
    #[inline]
    pub fn walk_span(&self) -> (i64, i64) {
        walk_span(self.start, self.end, self.strand)
    }

    /// Both boundaries are true transcript termini (nothing was cut off).
    pub fn is_whole(&self) -> bool {
        self.start_is_biological_start && self.end_is_biological_end
    }
}

/// Map a genomic interval into walk space for `strand`.
#[inline]
pub fn walk_span(start: u32, end: u32, strand: Strand) -> (i64, i64) {
    match strand {
        Strand::Minus => (-(end as i64), -(start as i64)),
        _ => (start as i64, end as i64),
    }
}

/// Inverse of [`walk_span`].
#[inline]
pub fn genomic_span(walk_start: i64, walk_end: i64, strand: Strand) -> (u32, u32) {
    match strand {
        Strand::Minus => ((-walk_end) as u32, (-walk_start) as u32),
        _ => (walk_start as u32, walk_end as u32),
    }
}
