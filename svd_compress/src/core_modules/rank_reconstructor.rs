// THEORY:
// The `RankReconstructor` rebuilds an 8-bit channel from the k strongest components
// of an SVD: A_k = Σ_{i<k} σᵢ·uᵢ·vᵢᵀ, scaled back to 0..255, clamped and quantized.
//
// Key architectural principles:
// 1.  **Two Kernels, One Answer**: The sum can be accumulated one rank-1 outer product
//     at a time, or computed as the dense product (U_k·diag(S_k))·V_kᵀ. Both walk
//     the components in ascending order from a zero start with the same term
//     (σᵢ·uᵢ[r])·vᵢ[c], so they produce the same bytes. The dense form can reuse the
//     blocked multiply kernel; the outer-product form is what makes the progressive
//     mode possible.
// 2.  **Progressive Reuse**: When several ranks are requested, a single running
//     accumulator is grown from one cutoff to the next and snapshotted at each
//     requested k. The terms below the previous cutoff are never recomputed. A
//     progressive run for a single k is, by construction, the one-shot run.
// 3.  **Graceful Truncation**: A request above the numerical rank r uses all r
//     components. k = 0 (or r = 0) produces an all-black channel.
// 4.  **Saturating Quantization**: Values are clamped into 0..255 before the cast, so
//     overshoot never wraps around.

use crate::core_modules::channel::channel::MAX_INTENSITY;
use crate::core_modules::matrix_ops::{multiply, TilingStrategy};
use crate::core_modules::svd_builder::SvdTriple;
use crate::error::Result;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// How the rank-k sum is evaluated for a one-shot reconstruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconstructionStrategy {
    /// Accumulate σᵢ·uᵢ·vᵢᵀ one component at a time.
    #[default]
    OuterProduct,
    /// Evaluate (U_k·diag(S_k))·V_kᵀ with the dense multiply kernel.
    DenseMultiply,
}

/// How a scaled, clamped value becomes a byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quantization {
    /// Drop the fractional part, like an unsigned integer cast.
    #[default]
    Truncate,
    /// Round to the nearest integer.
    Round,
}

impl Quantization {
    #[inline]
    pub fn quantize(self, normalized: f64) -> u8 {
        let scaled = (normalized * MAX_INTENSITY).clamp(0.0, MAX_INTENSITY);
        match self {
            Quantization::Truncate => scaled as u8,
            Quantization::Round => scaled.round() as u8,
        }
    }
}

/// One reconstructed 8-bit channel.
#[derive(Debug, Clone, PartialEq)]
pub struct RankApproximation {
    /// The rank the caller asked for.
    pub requested_rank: usize,
    /// The number of components actually summed, min(requested, r).
    pub effective_rank: usize,
    /// M x N quantized intensities.
    pub pixels: DMatrix<u8>,
}

impl RankApproximation {
    pub fn shape(&self) -> (usize, usize) {
        self.pixels.shape()
    }

    /// The pixels in row-major order, ready for interleaving into an image buffer.
    pub fn to_row_major_bytes(&self) -> Vec<u8> {
        let (rows, cols) = self.pixels.shape();
        let mut bytes = Vec::with_capacity(rows * cols);
        for r in 0..rows {
            for c in 0..cols {
                bytes.push(self.pixels[(r, c)]);
            }
        }
        bytes
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RankReconstructor {
    strategy: ReconstructionStrategy,
    tiling: TilingStrategy,
    quantization: Quantization,
}

impl RankReconstructor {
    pub fn new(strategy: ReconstructionStrategy, tiling: TilingStrategy, quantization: Quantization) -> Self {
        Self {
            strategy,
            tiling,
            quantization,
        }
    }

    /// Reconstructs the channel from the `k` strongest components.
    pub fn reconstruct(&self, triple: &SvdTriple, k: usize) -> Result<RankApproximation> {
        triple.validate()?;
        let effective_rank = k.min(triple.rank());
        debug!(k, effective_rank, strategy = ?self.strategy, "one-shot reconstruction");

        let accumulator = match self.strategy {
            ReconstructionStrategy::OuterProduct => {
                let (rows, cols) = triple.shape();
                let mut accumulator = DMatrix::zeros(rows, cols);
                accumulate_components(&mut accumulator, triple, 0, effective_rank);
                accumulator
            }
            ReconstructionStrategy::DenseMultiply => self.dense_product(triple, effective_rank)?,
        };

        Ok(self.finalize(&accumulator, k, effective_rank))
    }

    /// Reconstructs the channel at every requested rank, growing one accumulator.
    pub fn reconstruct_progressive(
        &self,
        triple: &SvdTriple,
        ranks: &[usize],
    ) -> Result<BTreeMap<usize, RankApproximation>> {
        triple.validate()?;
        let (rows, cols) = triple.shape();
        let ordered: BTreeSet<usize> = ranks.iter().copied().collect();

        let mut accumulator = DMatrix::zeros(rows, cols);
        let mut cutoff = 0;
        let mut approximations = BTreeMap::new();

        for k in ordered {
            let effective_rank = k.min(triple.rank());
            if effective_rank > cutoff {
                accumulate_components(&mut accumulator, triple, cutoff, effective_rank);
                debug!(from = cutoff, to = effective_rank, "extended progressive accumulator");
                cutoff = effective_rank;
            }
            approximations.insert(k, self.finalize(&accumulator, k, effective_rank));
        }

        Ok(approximations)
    }

    fn dense_product(&self, triple: &SvdTriple, effective_rank: usize) -> Result<DMatrix<f64>> {
        let (rows, cols) = triple.shape();
        let scaled_u = DMatrix::from_fn(rows, effective_rank, |r, i| triple.s[i] * triple.u[(r, i)]);
        let v_t = DMatrix::from_fn(effective_rank, cols, |i, c| triple.v[(c, i)]);
        multiply(&scaled_u, &v_t, self.tiling)
    }

    fn finalize(&self, accumulator: &DMatrix<f64>, requested_rank: usize, effective_rank: usize) -> RankApproximation {
        let quantization = self.quantization;
        RankApproximation {
            requested_rank,
            effective_rank,
            pixels: accumulator.map(|value| quantization.quantize(value)),
        }
    }
}

/// Adds σᵢ·uᵢ·vᵢᵀ for i in `from..to` to `accumulator`.
fn accumulate_components(accumulator: &mut DMatrix<f64>, triple: &SvdTriple, from: usize, to: usize) {
    let rows = accumulator.nrows();
    let mut scaled_u = vec![0.0; rows];
    for i in from..to {
        let sigma = triple.s[i];
        for (scaled, &u) in scaled_u.iter_mut().zip(triple.u.column(i).iter()) {
            *scaled = sigma * u;
        }
        for (c, &v) in triple.v.column(i).iter().enumerate() {
            let mut column = accumulator.column_mut(c);
            for (cell, &scaled) in column.iter_mut().zip(scaled_u.iter()) {
                *cell += scaled * v;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::DVector;

    fn triple() -> SvdTriple {
        // Orthonormal columns built by hand so the expected images are exact.
        let u = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);
        let s = DVector::from_vec(vec![0.8, 0.4]);
        let v = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, 1.0]);
        SvdTriple { u, s, v }
    }

    #[test]
    fn quantization_clamps_instead_of_wrapping() {
        assert_eq!(Quantization::Truncate.quantize(-0.5), 0);
        assert_eq!(Quantization::Truncate.quantize(1.7), 255);
        assert_eq!(Quantization::Truncate.quantize(0.5), 127);
        assert_eq!(Quantization::Round.quantize(0.5), 128);
        assert_eq!(Quantization::Round.quantize(f64::NAN), 0);
    }

    #[test]
    fn one_shot_reconstruction_uses_the_leading_components() {
        let reconstructor = RankReconstructor::default();
        let rank_one = reconstructor.reconstruct(&triple(), 1).unwrap();
        assert_eq!(rank_one.effective_rank, 1);
        assert_eq!(rank_one.pixels, DMatrix::from_row_slice(3, 2, &[204, 0, 0, 0, 0, 0]));

        let rank_two = reconstructor.reconstruct(&triple(), 2).unwrap();
        assert_eq!(rank_two.pixels, DMatrix::from_row_slice(3, 2, &[204, 0, 0, 102, 0, 0]));
    }

    #[test]
    fn ranks_above_numerical_rank_are_clamped() {
        let approximation = RankReconstructor::default().reconstruct(&triple(), 50).unwrap();
        assert_eq!(approximation.requested_rank, 50);
        assert_eq!(approximation.effective_rank, 2);
    }

    #[test]
    fn rank_zero_is_black() {
        let approximation = RankReconstructor::default().reconstruct(&triple(), 0).unwrap();
        assert!(approximation.pixels.iter().all(|&p| p == 0));
    }

    #[test]
    fn progressive_deduplicates_and_snapshots_each_rank() {
        let approximations = RankReconstructor::default()
            .reconstruct_progressive(&triple(), &[2, 1, 2, 7])
            .unwrap();
        assert_eq!(approximations.keys().copied().collect::<Vec<_>>(), vec![1, 2, 7]);
        assert_eq!(approximations[&1].pixels[(1, 1)], 0);
        assert_eq!(approximations[&2].pixels[(1, 1)], 102);
        assert_eq!(approximations[&7].pixels, approximations[&2].pixels);
    }

    #[test]
    fn dense_and_outer_product_strategies_agree() {
        let outer = RankReconstructor::default();
        let dense = RankReconstructor::new(
            ReconstructionStrategy::DenseMultiply,
            TilingStrategy::Blocked { tile: 1 },
            Quantization::Truncate,
        );
        for k in 0..=3 {
            assert_eq!(
                outer.reconstruct(&triple(), k).unwrap(),
                dense.reconstruct(&triple(), k).unwrap()
            );
        }
    }

    #[test]
    fn inconsistent_triple_is_rejected() {
        let mut broken = triple();
        broken.s = DVector::from_vec(vec![1.0]);
        assert!(RankReconstructor::default().reconstruct(&broken, 1).is_err());
        assert!(RankReconstructor::default().reconstruct_progressive(&broken, &[1]).is_err());
    }

    #[test]
    fn row_major_bytes_follow_image_order() {
        let approximation = RankReconstructor::default().reconstruct(&triple(), 2).unwrap();
        assert_eq!(approximation.to_row_major_bytes(), vec![204, 0, 0, 102, 0, 0]);
    }
}
