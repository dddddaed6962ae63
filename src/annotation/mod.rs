//! GTF/GFF3 import into a [`crate::FeatureGraph`].

pub mod builder;
pub mod io;

pub use builder::{AnnotationBuilder, IdNameKeys};
pub use io::{AnnotationReader, AnnotationRecord, Dialect, Entry, ParseError};
