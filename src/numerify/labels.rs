//! Base-pair class matrix and error mask.

use ndarray::{s, Array1, Array2};

use crate::error::NumerifyError;
use crate::model::coordinate::Coordinate;
use crate::model::feature::Feature;
use crate::model::types::FeatureType;
use crate::types::RefBlock;

/// Raw indicator tracks.
pub const TRANSCRIBED_COL: usize = 0;
pub const CODING_COL: usize = 1;
pub const INTRON_COL: usize = 2;
pub const N_RAW: usize = 3;

/// One-hot classes.
pub const INTERGENIC: usize = 0;
pub const UTR: usize = 1;
pub const CDS: usize = 2;
pub const INTRON: usize = 3;
pub const N_CLASSES: usize = 4;

/// Clip a feature to the coordinate; rows are relative to `coord.start`.
pub(crate) fn clipped_rows(coord: &Coordinate, f: &Feature) -> Result<RefBlock, NumerifyError> {
    let clipped = f.block().clip_to(coord.block()).ok_or_else(|| {
        NumerifyError::DataInterpretation(format!(
            "feature {} [{}, {}) lies outside coordinate {} [{}, {})",
            f.id, f.start, f.end, coord.id, coord.start, coord.end
        ))
    })?;
    Ok(RefBlock {
        start: clipped.start - coord.start,
        end: clipped.end - coord.start,
    })
}

/// Build the raw (transcribed, coding, intron) tracks and the error mask of one
/// strand, in genomic order.
///
/// The mask is 1 everywhere except under error features. Coding and intron
/// regions must be covered by transcribed regions.
pub fn raw_tracks(coord: &Coordinate, features: &[&Feature]) -> Result<(Array2<i8>, Array1<i8>), NumerifyError> {
    let len = coord.len() as usize;
    let mut matrix = Array2::<i8>::zeros((len, N_RAW));
    let mut mask = Array1::<i8>::ones(len);

    let mut transcribed: Vec<RefBlock> = Vec::new();
    let mut enclosed: Vec<(&Feature, RefBlock)> = Vec::new();

    for &f in features {
        let rows = clipped_rows(coord, f)?;
        let (a, b) = (rows.start as usize, rows.end as usize);
        match f.kind {
            FeatureType::Transcribed => {
                matrix.slice_mut(s![a..b, TRANSCRIBED_COL]).fill(1);
                transcribed.push(rows);
            }
            FeatureType::Coding => {
                matrix.slice_mut(s![a..b, CODING_COL]).fill(1);
                enclosed.push((f, rows));
            }
            FeatureType::Intron | FeatureType::TransSplicedIntron => {
                matrix.slice_mut(s![a..b, INTRON_COL]).fill(1);
                enclosed.push((f, rows));
            }
            FeatureType::Error => {
                mask.slice_mut(s![a..b]).fill(0);
            }
        }
    }

    let transcribed = RefBlock::merge_all(transcribed);
    for (f, rows) in enclosed {
        if !transcribed.iter().any(|t| t.contains(rows)) {
            return Err(NumerifyError::DataInterpretation(format!(
                "{} feature {} [{}, {}) on coordinate {} is not inside a transcribed region",
                f.kind, f.id, f.start, f.end, coord.id
            )));
        }
    }

    Ok((matrix, mask))
}

/// Combine raw tracks into the four classes.
///
/// intergenic = !T, UTR = T & !C & !I, CDS = T & C & !I, intron = T & I.
/// Exactly one class is set per base; anything else is a bug.
pub fn one_hot(raw: &Array2<i8>) -> Array2<i8> {
    let mut out = Array2::<i8>::zeros((raw.nrows(), N_CLASSES));
    for (i, row) in raw.outer_iter().enumerate() {
        let t = row[TRANSCRIBED_COL] != 0;
        let c = row[CODING_COL] != 0;
        let n = row[INTRON_COL] != 0;

        out[[i, INTERGENIC]] = (!t) as i8;
        out[[i, UTR]] = (t && !c && !n) as i8;
        out[[i, CDS]] = (t && c && !n) as i8;
        out[[i, INTRON]] = (t && n) as i8;
    }
    assert!(
        out.outer_iter().all(|row| row.sum() == 1),
        "one-hot class matrix must set exactly one class per base"
    );
    out
}
