//! Four-channel base encoding in `C, A, T, G` order.

use ndarray::Array2;

use crate::error::NumerifyError;
use crate::types::Strand;

pub const N_BASES: usize = 4;

/// IUPAC code to channel weights. Lower-case (soft-masked) bases are accepted.
pub fn decode_base(b: u8) -> Option<[f32; N_BASES]> {
    let w = match b.to_ascii_uppercase() {
        b'C' => [1.0, 0.0, 0.0, 0.0],
        b'A' => [0.0, 1.0, 0.0, 0.0],
        b'T' => [0.0, 0.0, 1.0, 0.0],
        b'G' => [0.0, 0.0, 0.0, 1.0],
        b'Y' => [0.5, 0.0, 0.5, 0.0],
        b'R' => [0.0, 0.5, 0.0, 0.5],
        b'W' => [0.0, 0.5, 0.5, 0.0],
        b'S' => [0.5, 0.0, 0.0, 0.5],
        b'K' => [0.0, 0.0, 0.5, 0.5],
        b'M' => [0.5, 0.5, 0.0, 0.0],
        b'D' => [0.0, 0.33, 0.33, 0.33],
        b'V' => [0.33, 0.33, 0.0, 0.33],
        b'H' => [0.33, 0.33, 0.33, 0.0],
        b'B' => [0.33, 0.0, 0.33, 0.33],
        b'N' => [0.25, 0.25, 0.25, 0.25],
        _ => return None,
    };
    Some(w)
}

/// Encode `seq` in genomic order. On the minus strand every base is complemented,
/// which in `C, A, T, G` order is a reversal of the channels.
pub fn encode(seq: &str, strand: Strand) -> Result<Array2<f32>, NumerifyError> {
    let mut out = Array2::<f32>::zeros((seq.len(), N_BASES));
    for (i, b) in seq.bytes().enumerate() {
        let mut w = decode_base(b).ok_or_else(|| {
            NumerifyError::DataInterpretation(format!(
                "unknown base '{}' at offset {i}",
                b.escape_ascii()
            ))
        })?;
        if strand == Strand::Minus {
            w.reverse();
        }
        for (c, v) in w.into_iter().enumerate() {
            out[[i, c]] = v;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn encodes_plus_strand() {
        let m = encode("CAtGN", Strand::Plus).unwrap();
        assert_eq!(
            m,
            array![
                [1.0, 0.0, 0.0, 0.0],
                [0.0, 1.0, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
                [0.0, 0.0, 0.0, 1.0],
                [0.25, 0.25, 0.25, 0.25]
            ]
        );
    }

    #[test]
    fn minus_strand_is_complemented() {
        let plus = encode("CATGY", Strand::Plus).unwrap();
        let minus = encode("GTACR", Strand::Minus).unwrap();
        assert_eq!(plus, minus);
    }

    #[test]
    fn unknown_base_is_an_error() {
        let err = encode("ACX", Strand::Plus).unwrap_err();
        assert!(matches!(err, NumerifyError::DataInterpretation(_)));
    }
}
