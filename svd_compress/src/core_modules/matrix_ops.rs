// THEORY:
// The `matrix_ops` module is the single home of the dense kernels the engine needs:
// a general product, the Gram product AᵀA and a matrix-vector product. Each kernel
// exists in two flavours, a naive triple loop and a cache-blocked (tiled) loop, and
// callers pick one through a `TilingStrategy` value instead of calling different
// functions.
//
// Key architectural principles:
// 1.  **One Contract, Many Strategies**: Tests and callers are written against
//     `multiply` and `transpose_multiply`; the strategy is a configuration detail.
// 2.  **Bit-Identical Results**: Tiling only reorders which output elements are
//     visited when. For every single output element the shared dimension is still
//     walked in ascending order from a zero start, so the floating-point additions
//     happen in exactly the same sequence and the results match bit for bit.

use crate::core_modules::gram_computer::GramComputer;
use crate::error::{CompressionError, Result};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// Default edge length of a square tile for the blocked kernels.
pub const DEFAULT_TILE: usize = 64;

/// How the dense kernels traverse their operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TilingStrategy {
    /// Straight loops over the output, one element at a time.
    #[default]
    Naive,
    /// Square tiles of `tile` x `tile` over the output and the shared dimension.
    Blocked { tile: usize },
}

impl TilingStrategy {
    pub fn blocked() -> Self {
        TilingStrategy::Blocked { tile: DEFAULT_TILE }
    }

    /// Tile edge to use; a zero tile degenerates to single elements.
    pub(crate) fn tile(self) -> Option<usize> {
        match self {
            TilingStrategy::Naive => None,
            TilingStrategy::Blocked { tile } => Some(tile.max(1)),
        }
    }
}

/// Computes `a * b`.
pub fn multiply(a: &DMatrix<f64>, b: &DMatrix<f64>, strategy: TilingStrategy) -> Result<DMatrix<f64>> {
    if a.ncols() != b.nrows() {
        return Err(CompressionError::dimension_mismatch(
            "multiply",
            format!("left operand with {} columns", b.nrows()),
            format!("{}x{} * {}x{}", a.nrows(), a.ncols(), b.nrows(), b.ncols()),
        ));
    }

    let (rows, shared, cols) = (a.nrows(), a.ncols(), b.ncols());
    let mut product = DMatrix::zeros(rows, cols);

    match strategy.tile() {
        None => {
            for j in 0..cols {
                for i in 0..rows {
                    let mut sum = 0.0;
                    for p in 0..shared {
                        sum += a[(i, p)] * b[(p, j)];
                    }
                    product[(i, j)] = sum;
                }
            }
        }
        Some(tile) => {
            for jb in (0..cols).step_by(tile) {
                let j_end = (jb + tile).min(cols);
                for ib in (0..rows).step_by(tile) {
                    let i_end = (ib + tile).min(rows);
                    for pb in (0..shared).step_by(tile) {
                        let p_end = (pb + tile).min(shared);
                        for j in jb..j_end {
                            for i in ib..i_end {
                                let mut sum = product[(i, j)];
                                for p in pb..p_end {
                                    sum += a[(i, p)] * b[(p, j)];
                                }
                                product[(i, j)] = sum;
                            }
                        }
                    }
                }
            }
        }
    }

    Ok(product)
}

/// Computes `aᵀ * a` with the symmetric fill of the Gram computation.
pub fn transpose_multiply(a: &DMatrix<f64>, strategy: TilingStrategy) -> Result<DMatrix<f64>> {
    GramComputer::new(strategy).compute(a)
}

/// Computes `a * v` as one dot product per row.
pub fn matrix_vector(a: &DMatrix<f64>, v: &DVector<f64>) -> Result<DVector<f64>> {
    if a.ncols() != v.len() {
        return Err(CompressionError::dimension_mismatch(
            "matrix-vector product",
            format!("vector of length {}", a.ncols()),
            format!("vector of length {}", v.len()),
        ));
    }

    let mut out = DVector::zeros(a.nrows());
    for (p, &weight) in v.iter().enumerate() {
        for (acc, &value) in out.iter_mut().zip(a.column(p).iter()) {
            *acc += value * weight;
        }
    }
    Ok(out)
}
