// THEORY:
// The `SvdBuilder` turns the eigenpairs of W = AᵀA into the singular value
// decomposition A = U Σ Vᵀ. This is where the "SVD from first principles" happens:
// nothing here calls a ready-made SVD routine.
//
// The derivation:
// 1.  **Singular Values**: σᵢ = √λᵢ. W is positive semi-definite, so any negative λ
//     that shows up is rounding noise and is clamped to zero before the square root.
// 2.  **Numerical Rank**: Components with σ at or below `SINGULAR_VALUE_THRESHOLD`
//     are dropped. They carry no information and would blow up the division in
//     step 3. The number of survivors is the numerical rank r.
// 3.  **Left Singular Vectors**: uᵢ = (1/σᵢ)·A·vᵢ. Since ‖A·vᵢ‖ = σᵢ, the division
//     normalizes the column for free.
//
// An all-zero channel has r = 0. That is a valid outcome, not an error: U and V
// simply have no columns and every reconstruction is black.

use crate::core_modules::eigen_solver::EigenPairs;
use crate::core_modules::matrix_ops::matrix_vector;
use crate::error::{CompressionError, Result};
use nalgebra::{DMatrix, DVector};
use tracing::{debug, warn};

/// Singular values at or below this are treated as numerically zero.
pub const SINGULAR_VALUE_THRESHOLD: f64 = 1e-10;

/// A (possibly rank-truncated) singular value decomposition A ≈ U diag(S) Vᵀ.
#[derive(Debug, Clone, PartialEq)]
pub struct SvdTriple {
    /// M x r left singular vectors.
    pub u: DMatrix<f64>,
    /// r singular values, descending and strictly positive.
    pub s: DVector<f64>,
    /// N x r right singular vectors.
    pub v: DMatrix<f64>,
}

impl SvdTriple {
    /// The numerical rank r.
    pub fn rank(&self) -> usize {
        self.s.len()
    }

    /// Shape (M, N) of the matrix this triple decomposes.
    pub fn shape(&self) -> (usize, usize) {
        (self.u.nrows(), self.v.nrows())
    }

    pub fn largest_singular_value(&self) -> Option<f64> {
        self.s.iter().next().copied()
    }

    /// Checks that U, S and V agree on r.
    pub fn validate(&self) -> Result<()> {
        let r = self.s.len();
        if self.u.ncols() != r || self.v.ncols() != r {
            return Err(CompressionError::dimension_mismatch(
                "svd triple",
                format!("U and V with {r} columns"),
                format!("U with {} columns, V with {} columns", self.u.ncols(), self.v.ncols()),
            ));
        }
        Ok(())
    }
}

/// Builds U, S and V for `a_norm` from the descending eigenpairs of its Gram matrix.
pub fn build_svd(a_norm: &DMatrix<f64>, lambdas: &DVector<f64>, v_full: &DMatrix<f64>) -> Result<SvdTriple> {
    let (rows, cols) = a_norm.shape();
    if v_full.nrows() != cols || v_full.ncols() != lambdas.len() {
        return Err(CompressionError::dimension_mismatch(
            "svd build",
            format!("{cols}x{} eigenvector matrix", lambdas.len()),
            format!("{}x{}", v_full.nrows(), v_full.ncols()),
        ));
    }

    let kept: Vec<(usize, f64)> = lambdas
        .iter()
        .enumerate()
        .map(|(i, &lambda)| (i, lambda.max(0.0).sqrt()))
        .filter(|&(_, sigma)| sigma > SINGULAR_VALUE_THRESHOLD)
        .collect();
    let rank = kept.len();

    if rank == 0 {
        warn!(rows, cols, "all singular values below threshold, numerical rank is zero");
    } else {
        debug!(rows, cols, rank, "numerical rank determined");
    }

    let s = DVector::from_iterator(rank, kept.iter().map(|&(_, sigma)| sigma));
    let v = DMatrix::from_fn(cols, rank, |row, col| v_full[(row, kept[col].0)]);

    let mut u = DMatrix::zeros(rows, rank);
    for (col, &(_, sigma)) in kept.iter().enumerate() {
        let a_v = matrix_vector(a_norm, &v.column(col).clone_owned())?;
        u.set_column(col, &(a_v * (1.0 / sigma)));
    }

    Ok(SvdTriple { u, s, v })
}

/// Builds the triple directly from an `EigenPairs` value.
pub fn build_svd_from_pairs(a_norm: &DMatrix<f64>, pairs: &EigenPairs) -> Result<SvdTriple> {
    build_svd(a_norm, &pairs.values, &pairs.vectors)
}
