// THEORY:
// The `EigenSolver` is a deliberately thin wrapper. The symmetric eigendecomposition
// is the numerically delicate step of the whole engine, so it is delegated to
// nalgebra's implicit symmetric QR algorithm rather than reimplemented here.
//
// The wrapper owns exactly two responsibilities:
// 1.  **Ordering**: nalgebra returns eigenpairs in no particular order. Everything
//     downstream assumes the strongest component comes first, so the pairs are
//     sorted by eigenvalue, largest first, moving each eigenvector column together
//     with its eigenvalue. The sort is stable, so ties keep the solver's order.
// 2.  **Failure Reporting**: If the solver does not converge within the configured
//     iteration budget, the failure is surfaced as `EigenNonConvergence`. A
//     deterministic decomposition is never retried.

use crate::error::{CompressionError, Result};
use nalgebra::{DMatrix, DVector, SymmetricEigen};
use tracing::debug;

/// Eigenvalues of a symmetric matrix in descending order, with the matching
/// eigenvectors stored as the columns of `vectors`.
#[derive(Debug, Clone, PartialEq)]
pub struct EigenPairs {
    pub values: DVector<f64>,
    pub vectors: DMatrix<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EigenSolver {
    /// Off-diagonal magnitude below which the QR iteration treats an entry as zero.
    pub tolerance: f64,
    /// Upper bound on QR sweeps. Zero means unbounded.
    pub max_iterations: usize,
}

impl Default for EigenSolver {
    fn default() -> Self {
        Self {
            tolerance: f64::EPSILON,
            max_iterations: 0,
        }
    }
}

impl EigenSolver {
    pub fn new(tolerance: f64, max_iterations: usize) -> Self {
        Self {
            tolerance,
            max_iterations,
        }
    }

    pub fn decompose(&self, w: &DMatrix<f64>) -> Result<EigenPairs> {
        let (rows, cols) = w.shape();
        if rows != cols {
            return Err(CompressionError::dimension_mismatch(
                "eigendecomposition",
                "square matrix",
                format!("{rows}x{cols}"),
            ));
        }
        if w.iter().any(|value| !value.is_finite()) {
            return Err(CompressionError::NonFiniteInput {
                operation: "eigendecomposition",
            });
        }

        debug!(dimension = rows, "running symmetric eigendecomposition");

        let eigen = SymmetricEigen::try_new(w.clone(), self.tolerance, self.max_iterations).ok_or(
            CompressionError::EigenNonConvergence {
                dimension: rows,
                max_iterations: self.max_iterations,
            },
        )?;

        Ok(Self::sort_descending(eigen.eigenvalues, eigen.eigenvectors))
    }

    fn sort_descending(values: DVector<f64>, vectors: DMatrix<f64>) -> EigenPairs {
        let mut order: Vec<usize> = (0..values.len()).collect();
        order.sort_by(|&a, &b| values[b].total_cmp(&values[a]));

        let sorted_values = DVector::from_iterator(order.len(), order.iter().map(|&i| values[i]));
        let sorted_vectors = DMatrix::from_fn(vectors.nrows(), order.len(), |row, col| vectors[(row, order[col])]);

        EigenPairs {
            values: sorted_values,
            vectors: sorted_vectors,
        }
    }
}

/// Decomposes `w` with the default solver settings.
pub fn eigen_decompose(w: &DMatrix<f64>) -> Result<EigenPairs> {
    EigenSolver::default().decompose(w)
}
