//! gene_tiler
//!
//! Re-tiles gene-structure annotations onto fixed-size genomic windows and turns
//! each window into dense per-base arrays.
//!
//! The pipeline is:
//! 1. [`AnnotationBuilder`] reads GTF/GFF3 into a [`FeatureGraph`].
//! 2. [`SliceController`] tiles every sequence with [`partition`] and splits each
//!    transcript at the window borders, one super-locus batch at a time.
//! 3. [`CoordNumerifier`] encodes every window as class, transition, mask and
//!    sequence matrices, chunked with [`Stepper`].
//!
//! All positions are 0-based, half-open, with `start < end` on both strands.

pub mod types;
pub mod error;
pub mod partition;
pub mod snapshot;
pub mod model;
pub mod index;
pub mod trim;
pub mod numerify;
pub mod annotation;

pub use annotation::{AnnotationBuilder, IdNameKeys};
pub use error::{NumerifyError, TrimError};
pub use index::IntervalIndex;
pub use model::{FeatureGraph, FeatureRows, FeatureRowsMut};
pub use numerify::mers::{count_mers, count_mers_all, MerCounter};
pub use numerify::{numerify_all, ClassGranularity, CoordChunks, CoordNumerifier, NumerifyOptions};
pub use partition::{partition, Stepper};
pub use trim::{SliceController, SliceOptions, SliceReport, TranscriptTrimmer};
pub use types::{RefBlock, Strand};
