// THEORY:
// The `quality_evaluator` scores a reconstruction along the two axes that matter for
// lossy compression: how much was lost (mean squared error against the raw channel)
// and how much was saved (compression ratio of the rank-k factorization).
//
// Storage model for the ratio: the original channel costs M·N numbers. The rank-k
// factorization costs k columns of U (M each), k singular values and k columns of V
// (N each), i.e. k·(M + N + 1). The ratio shrinks as k grows and is infinite only in
// the degenerate k = 0 case.

use crate::error::{CompressionError, Result};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

/// Mean squared error between a raw channel (0..255) and its 8-bit reconstruction.
/// Differences are taken in f64 so unsigned bytes never underflow.
pub fn mse(original: &DMatrix<f64>, reconstructed: &DMatrix<u8>) -> Result<f64> {
    if original.shape() != reconstructed.shape() {
        return Err(CompressionError::dimension_mismatch(
            "mse",
            format!("{}x{}", original.nrows(), original.ncols()),
            format!("{}x{}", reconstructed.nrows(), reconstructed.ncols()),
        ));
    }

    let count = original.len();
    if count == 0 {
        return Ok(0.0);
    }

    let sum_squared: f64 = original
        .iter()
        .zip(reconstructed.iter())
        .map(|(&a, &b)| {
            let diff = a - b as f64;
            diff * diff
        })
        .sum();

    Ok(sum_squared / count as f64)
}

/// M·N / (k·(M + N + 1)); `f64::INFINITY` when the factorization costs nothing.
pub fn compression_ratio(rows: usize, cols: usize, k: usize) -> f64 {
    if k == 0 {
        return f64::INFINITY;
    }
    // Ranks are unbounded, so the sizes are formed in f64 rather than usize.
    let original_size = rows as f64 * cols as f64;
    let compressed_size = k as f64 * (rows as f64 + cols as f64 + 1.0);
    original_size / compressed_size
}

/// The score of one rank, for one channel or averaged over channels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityRecord {
    pub k: usize,
    pub compression_ratio: f64,
    pub mse: f64,
}

impl QualityRecord {
    pub fn evaluate(k: usize, original: &DMatrix<f64>, reconstructed: &DMatrix<u8>) -> Result<Self> {
        let (rows, cols) = original.shape();
        Ok(Self {
            k,
            compression_ratio: compression_ratio(rows, cols, k),
            mse: mse(original, reconstructed)?,
        })
    }

    /// Averages the error of records for the same rank. The ratio is taken from the
    /// first record since every channel of an image shares its shape.
    pub fn average(records: &[QualityRecord]) -> Option<Self> {
        let first = records.first()?;
        let mse = records.iter().map(|record| record.mse).sum::<f64>() / records.len() as f64;
        Some(Self {
            k: first.k,
            compression_ratio: first.compression_ratio,
            mse,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn compression_ratio_matches_formula() {
        let cr = compression_ratio(500, 300, 10);
        assert_abs_diff_eq!(cr, 500.0 * 300.0 / (10.0 * 801.0), epsilon = 1e-12);
        assert_abs_diff_eq!(cr, 18.73, epsilon = 0.01);
    }

    #[test]
    fn compression_ratio_survives_huge_ranks() {
        let cr = compression_ratio(500, 300, usize::MAX / 2);
        assert!(cr.is_finite());
        assert!(cr > 0.0 && cr < 1e-10);

        let cr = compression_ratio(500, 300, usize::MAX / 100);
        assert_abs_diff_eq!(cr, 150000.0 / ((usize::MAX / 100) as f64 * 801.0), epsilon = 1e-20);
    }

    #[test]
    fn compression_ratio_decreases_with_rank() {
        let ratios: Vec<f64> = [1, 5, 20, 50, 100].iter().map(|&k| compression_ratio(256, 256, k)).collect();
        for pair in ratios.windows(2) {
            assert!(pair[0] > pair[1]);
        }
    }

    #[test]
    fn rank_zero_ratio_is_infinite_not_nan() {
        let cr = compression_ratio(10, 10, 0);
        assert!(cr.is_infinite());
        assert!(!cr.is_nan());
    }

    #[test]
    fn mse_of_identical_channels_is_zero() {
        let original = DMatrix::from_row_slice(2, 2, &[0.0, 10.0, 200.0, 255.0]);
        let reconstructed = DMatrix::from_row_slice(2, 2, &[0u8, 10, 200, 255]);
        assert_eq!(mse(&original, &reconstructed).unwrap(), 0.0);
    }

    #[test]
    fn mse_does_not_underflow_on_bytes() {
        let original = DMatrix::from_row_slice(1, 2, &[0.0, 255.0]);
        let reconstructed = DMatrix::from_row_slice(1, 2, &[255u8, 0]);
        assert_eq!(mse(&original, &reconstructed).unwrap(), 255.0 * 255.0);
    }

    #[test]
    fn mse_rejects_shape_mismatch() {
        let original = DMatrix::<f64>::zeros(2, 2);
        let reconstructed = DMatrix::<u8>::zeros(2, 3);
        assert!(mse(&original, &reconstructed).is_err());
    }

    #[test]
    fn average_takes_the_mean_error() {
        let records = [
            QualityRecord { k: 5, compression_ratio: 2.0, mse: 1.0 },
            QualityRecord { k: 5, compression_ratio: 2.0, mse: 2.0 },
            QualityRecord { k: 5, compression_ratio: 2.0, mse: 6.0 },
        ];
        let average = QualityRecord::average(&records).unwrap();
        assert_eq!(average.k, 5);
        assert_eq!(average.compression_ratio, 2.0);
        assert_eq!(average.mse, 3.0);
        assert!(QualityRecord::average(&[]).is_none());
    }
}
