use thiserror::Error;

use crate::model::types::CoordinateId;
use crate::types::Strand;

/// Failures while re-partitioning a transcript onto a new window.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TrimError {
    /// The window holds no feature of the transcript on this strand.
    /// Callers skip the window; sibling windows and loci are unaffected.
    #[error("no features in slice {seqid}:{start}-{end} ({strand})")]
    NoFeaturesInSlice {
        seqid: String,
        start: u32,
        end: u32,
        strand: Strand,
    },

    /// The feature graph is malformed; the whole super-locus batch is discarded.
    #[error("structural inconsistency: {0}")]
    Structural(String),
}

impl TrimError {
    pub fn is_recoverable(&self) -> bool {
        matches!(self, TrimError::NoFeaturesInSlice { .. })
    }
}

/// Failures while turning one coordinate's features into arrays.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NumerifyError {
    #[error("no features on coordinate {coordinate} ({strand})")]
    NoFeaturesInSlice { coordinate: CoordinateId, strand: Strand },

    /// Fatal for the coordinate, not retried.
    #[error("data interpretation error: {0}")]
    DataInterpretation(String),
}
