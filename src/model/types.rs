use serde::{Serialize, Deserialize};
use std::fmt;
use std::str::FromStr;

/// Internal numeric IDs (indexes into the graph's Vecs).
pub type CoordinateId = usize;
pub type FeatureId = usize;
pub type PieceId = usize;
pub type TranscriptId = usize;
pub type SuperLocusId = usize;

/// Kind of annotated interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FeatureType {
    /// Transcribed region (5' to 3' of the mature transcript, introns included).
    Transcribed,
    /// Coding region (start codon to stop codon).
    Coding,
    Intron,
    /// Intron joining two pieces of a trans-spliced transcript.
    TransSplicedIntron,
    /// Region whose annotation is known to be unreliable.
    Error,
}

impl FeatureType {
    pub fn is_intron(self) -> bool {
        matches!(self, FeatureType::Intron | FeatureType::TransSplicedIntron)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FeatureType::Transcribed => "transcribed",
            FeatureType::Coding => "coding",
            FeatureType::Intron => "intron",
            FeatureType::TransSplicedIntron => "trans_intron",
            FeatureType::Error => "error",
        }
    }
}

impl fmt::Display for FeatureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Train/dev/test tag attached to a tiled coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessingSet {
    Train,
    Dev,
    Test,
}

impl ProcessingSet {
    pub fn as_str(self) -> &'static str {
        match self {
            ProcessingSet::Train => "train",
            ProcessingSet::Dev => "dev",
            ProcessingSet::Test => "test",
        }
    }
}

impl fmt::Display for ProcessingSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ProcessingSet {
    type Err = String;

    /// Only the exact lower-case names are accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "train" => Ok(ProcessingSet::Train),
            "dev" => Ok(ProcessingSet::Dev),
            "test" => Ok(ProcessingSet::Test),
            other => Err(format!("unknown processing set '{other}' (expected train, dev or test)")),
        }
    }
}
