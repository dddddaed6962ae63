pub mod queue;
pub mod trimmer;
pub mod slicer;

pub use queue::{Mutation, SliceQueue, StagedGraph};
pub use trimmer::{sorted_features, sorted_pieces, SliceOutcome, TranscriptTrimmer};
pub use slicer::{SliceController, SliceOptions, SliceReport};
