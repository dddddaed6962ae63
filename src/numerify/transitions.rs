//! Per-base markers for biological events.
//!
//! Rows are in genomic order relative to the coordinate start; the caller reverses
//! minus-strand chunks. A start event sits on the feature's 5' base, an end event on
//! the first base after its 3' end. Events falling outside the coordinate are dropped.

use ndarray::Array2;

use crate::model::coordinate::Coordinate;
use crate::model::feature::Feature;
use crate::model::types::FeatureType;
use crate::types::Strand;

pub const TSS: usize = 0;
pub const TTS: usize = 1;
pub const TRANSCRIBED_CUT_START: usize = 2;
pub const TRANSCRIBED_CUT_END: usize = 3;
pub const START_CODON: usize = 4;
pub const STOP_CODON: usize = 5;
pub const CODING_CUT_START: usize = 6;
pub const CODING_CUT_END: usize = 7;
pub const DONOR: usize = 8;
pub const ACCEPTOR: usize = 9;
pub const TRANS_DONOR: usize = 10;
pub const TRANS_ACCEPTOR: usize = 11;
pub const N_TRANSITIONS: usize = 12;

/// Column for the 5' and 3' event of a feature, `None` where nothing is marked.
fn event_columns(f: &Feature) -> (Option<usize>, Option<usize>) {
    let (bio_start, bio_end) = (f.start_is_biological_start, f.end_is_biological_end);
    match f.kind {
        FeatureType::Transcribed => (
            Some(if bio_start { TSS } else { TRANSCRIBED_CUT_START }),
            Some(if bio_end { TTS } else { TRANSCRIBED_CUT_END }),
        ),
        FeatureType::Coding => (
            Some(if bio_start { START_CODON } else { CODING_CUT_START }),
            Some(if bio_end { STOP_CODON } else { CODING_CUT_END }),
        ),
        FeatureType::Intron => (bio_start.then_some(DONOR), bio_end.then_some(ACCEPTOR)),
        FeatureType::TransSplicedIntron => (
            bio_start.then_some(TRANS_DONOR),
            bio_end.then_some(TRANS_ACCEPTOR),
        ),
        FeatureType::Error => (None, None),
    }
}

/// Rows of the 5' base and of the base following the 3' end, in genomic order.
fn event_rows(coord: &Coordinate, f: &Feature) -> (i64, i64) {
    let cs = coord.start as i64;
    let (s, e) = (f.start as i64, f.end as i64);
    match f.strand {
        Strand::Minus => (e - 1 - cs, s - 1 - cs),
        _ => (s - cs, e - cs),
    }
}

/// Transition matrix of one strand's features.
pub fn transition_matrix(coord: &Coordinate, features: &[&Feature]) -> Array2<i8> {
    let len = coord.len() as usize;
    let mut out = Array2::<i8>::zeros((len, N_TRANSITIONS));

    let mut mark = |row: i64, col: Option<usize>| {
        if let Some(col) = col {
            if (0..len as i64).contains(&row) {
                out[[row as usize, col]] = 1;
            }
        }
    };

    for &f in features {
        let (start_col, end_col) = event_columns(f);
        let (start_row, end_row) = event_rows(coord, f);
        mark(start_row, start_col);
        mark(end_row, end_col);
    }
    out
}
