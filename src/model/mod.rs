pub mod types;
pub mod coordinate;
pub mod feature;
pub mod transcript;
pub mod graph;

pub use types::{
    CoordinateId, FeatureId, FeatureType, PieceId, ProcessingSet, SuperLocusId, TranscriptId,
};
pub use coordinate::Coordinate;
pub use feature::Feature;
pub use transcript::{SuperLocus, TranscribedPiece, Transcript};
pub use graph::{FeatureGraph, FeatureRows, FeatureRowsMut};
