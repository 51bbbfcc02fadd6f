// THEORY:
// The `GramComputer` forms W = AᵀA for a normalized channel A (M x N). W is the
// bridge between the image and the eigensolver: its eigenvalues are the squared
// singular values of A and its eigenvectors are the right singular vectors.
//
// Key architectural principles:
// 1.  **Exploit Symmetry**: W[i,j] and W[j,i] are the same dot product of columns i
//     and j. Only the upper triangle is computed and then mirrored, which halves
//     the work and makes the symmetry exact rather than approximate.
// 2.  **Column Access**: Channels are stored column-major, so every dot product reads
//     two contiguous column slices.
// 3.  **Stateless**: The computer holds only its traversal strategy. Running it twice
//     on the same input yields the same bits.

use crate::core_modules::matrix_ops::TilingStrategy;
use crate::error::{CompressionError, Result};
use nalgebra::DMatrix;
use tracing::debug;

/// Computes the symmetric Gram matrix of a normalized channel.
#[derive(Debug, Clone, Copy, Default)]
pub struct GramComputer {
    strategy: TilingStrategy,
}

impl GramComputer {
    pub fn new(strategy: TilingStrategy) -> Self {
        Self { strategy }
    }

    /// Returns the N x N matrix AᵀA.
    pub fn compute(&self, a: &DMatrix<f64>) -> Result<DMatrix<f64>> {
        let (rows, cols) = a.shape();
        if rows == 0 || cols == 0 {
            return Err(CompressionError::EmptyChannel { rows, cols });
        }

        debug!(rows, cols, strategy = ?self.strategy, "computing gram matrix");

        let mut gram = DMatrix::zeros(cols, cols);
        match self.strategy.tile() {
            None => Self::fill_upper_naive(a, &mut gram),
            Some(tile) => Self::fill_upper_blocked(a, &mut gram, tile),
        }
        Self::mirror_upper(&mut gram);
        Ok(gram)
    }

    fn fill_upper_naive(a: &DMatrix<f64>, gram: &mut DMatrix<f64>) {
        let cols = a.ncols();
        for i in 0..cols {
            let column_i = a.column(i);
            gram[(i, i)] = column_i.iter().fold(0.0, |sum, &x| sum + x * x);
            for j in (i + 1)..cols {
                gram[(i, j)] = column_i
                    .iter()
                    .zip(a.column(j).iter())
                    .fold(0.0, |sum, (&x, &y)| sum + x * y);
            }
        }
    }

    /// Same per-entry summation order as the naive fill: rows ascending from zero.
    fn fill_upper_blocked(a: &DMatrix<f64>, gram: &mut DMatrix<f64>, tile: usize) {
        let (rows, cols) = a.shape();
        for ib in (0..cols).step_by(tile) {
            let i_end = (ib + tile).min(cols);
            for jb in (ib..cols).step_by(tile) {
                let j_end = (jb + tile).min(cols);
                for rb in (0..rows).step_by(tile) {
                    let r_end = (rb + tile).min(rows);
                    for j in jb..j_end {
                        let column_j = a.column(j);
                        for i in ib..i_end.min(j + 1) {
                            let column_i = a.column(i);
                            let mut sum = gram[(i, j)];
                            for r in rb..r_end {
                                sum += column_i[r] * column_j[r];
                            }
                            gram[(i, j)] = sum;
                        }
                    }
                }
            }
        }
    }

    fn mirror_upper(gram: &mut DMatrix<f64>) {
        let n = gram.ncols();
        for j in 1..n {
            for i in 0..j {
                gram[(j, i)] = gram[(i, j)];
            }
        }
    }
}

/// Convenience wrapper using the naive traversal.
pub fn compute_gram(a: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    GramComputer::default().compute(a)
}
