use crate::model::types::CoordinateId;
use crate::types::RefBlock;
use serde::{Serialize, Deserialize};

/// A bounded genomic region, 0-based half-open `[start, end)` on `seqid`.
///
/// Coordinates are immutable once created; re-tiling adds new ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coordinate {
    pub id: CoordinateId,
    /// Species / genome name this region belongs to.
    pub genome: String,
    pub seqid: String,
    pub start: u32,
    pub end: u32,
    pub sequence: Option<String>,
}

impl Coordinate {
    pub fn new(
        id: CoordinateId,
        genome: impl Into<String>,
        seqid: impl Into<String>,
        start: u32,
        end: u32,
    ) -> Self {
        assert!(start < end, "Coordinate requires start < end");
        Self {
            id,
            genome: genome.into(),
            seqid: seqid.into(),
            start,
            end,
            sequence: None,
        }
    }

    pub fn with_sequence(mut self, sequence: impl Into<String>) -> Self {
        let sequence = sequence.into();
        assert_eq!(
            sequence.len(),
            self.len() as usize,
            "sequence length must match the coordinate span"
        );
        self.sequence = Some(sequence);
        self
    }

    #[inline]
    pub fn len(&self) -> u32 {
        self.end - self.start
    }

    #[inline]
    pub fn block(&self) -> RefBlock {
        RefBlock { start: self.start, end: self.end }
    }

    /// Sub-sequence for the absolute range `[start, end)`, if sequence is present.
    pub fn subsequence(&self, start: u32, end: u32) -> Option<&str> {
        let seq = self.sequence.as_deref()?;
        let from = start.checked_sub(self.start)? as usize;
        let to = end.checked_sub(self.start)? as usize;
        seq.get(from..to)
    }
}
