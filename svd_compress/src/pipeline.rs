// THEORY:
// The `pipeline` module is the top-level API of the compression engine. It wires the
// core modules into the per-channel sequence
//
//     raw channel -> normalize -> Gram -> eigen -> SVD -> reconstruct(k...) -> evaluate
//
// and runs that sequence for each of the three color planes of an image.
//
// Key architectural principles:
// 1.  **Configuration Over Rebinding**: Which kernel runs (naive or blocked tiling,
//     outer-product or dense reconstruction, truncating or rounding quantization) is a
//     field of `CompressionConfig`, never a swap of which function is "current".
// 2.  **Independent Channels**: Each plane is decomposed by its own `ChannelPipeline`
//     run. Results meet only in the final `CompressionReport`, where the per-rank
//     records are averaged across channels.
// 3.  **Fail Fast With Context**: Any stage failure aborts that channel and is
//     wrapped with the channel and the stage it happened in. The sequential pipeline
//     stops at the first failing channel; `parallel_pipeline` reports them all.

use crate::core_modules::channel::channel::{Channel, ChannelKind, RgbChannels};
use crate::core_modules::eigen_solver::EigenSolver;
use crate::core_modules::gram_computer::GramComputer;
use crate::core_modules::matrix_ops::TilingStrategy;
use crate::core_modules::quality_evaluator::QualityRecord;
use crate::core_modules::rank_reconstructor::{Quantization, RankApproximation, RankReconstructor, ReconstructionStrategy};
use crate::core_modules::svd_builder::{build_svd_from_pairs, SvdTriple};
use crate::error::{Result, Stage};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, info_span};

/// The ranks evaluated when the caller does not choose any.
pub const DEFAULT_RANKS: [usize; 4] = [5, 20, 50, 100];

/// Configuration for the compression pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionConfig {
    /// Ranks to reconstruct and evaluate. Order and duplicates do not matter.
    pub ranks: Vec<usize>,
    /// Traversal used for the Gram matrix.
    pub gram_strategy: TilingStrategy,
    /// Traversal used by the dense reconstruction kernel.
    pub multiply_strategy: TilingStrategy,
    /// Kernel used for reconstruction.
    pub reconstruction_strategy: ReconstructionStrategy,
    /// When true, all ranks share one growing accumulator instead of one pass each.
    pub progressive: bool,
    pub quantization: Quantization,
    /// Convergence tolerance of the symmetric eigensolver.
    pub eigen_tolerance: f64,
    /// Iteration cap of the eigensolver; zero means unbounded.
    pub eigen_max_iterations: usize,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            ranks: DEFAULT_RANKS.to_vec(),
            gram_strategy: TilingStrategy::Naive,
            multiply_strategy: TilingStrategy::Naive,
            reconstruction_strategy: ReconstructionStrategy::OuterProduct,
            progressive: true,
            quantization: Quantization::Truncate,
            eigen_tolerance: f64::EPSILON,
            eigen_max_iterations: 0,
        }
    }
}

/// Everything learned about one channel.
#[derive(Debug, Clone, Serialize)]
pub struct ChannelReport {
    pub kind: ChannelKind,
    /// Number of singular values above the numerical threshold.
    pub numerical_rank: usize,
    pub largest_singular_value: Option<f64>,
    /// One record per requested rank, ascending.
    pub records: Vec<QualityRecord>,
    /// Reconstructed planes keyed by requested rank.
    #[serde(skip)]
    pub approximations: BTreeMap<usize, RankApproximation>,
}

/// The combined result for an RGB image.
#[derive(Debug, Clone, Serialize)]
pub struct CompressionReport {
    pub rows: usize,
    pub cols: usize,
    pub channels: Vec<ChannelReport>,
    /// Per-rank records with the error averaged over the three channels.
    pub averaged: Vec<QualityRecord>,
}

impl CompressionReport {
    /// Assembles the report; `channels` must be in red, green, blue order.
    pub fn from_channels(rows: usize, cols: usize, channels: Vec<ChannelReport>) -> Self {
        let mut by_rank: BTreeMap<usize, Vec<QualityRecord>> = BTreeMap::new();
        for channel in &channels {
            for record in &channel.records {
                by_rank.entry(record.k).or_default().push(*record);
            }
        }
        let averaged = by_rank
            .values()
            .filter_map(|records| QualityRecord::average(records))
            .collect();

        Self {
            rows,
            cols,
            channels,
            averaged,
        }
    }

    pub fn channel(&self, kind: ChannelKind) -> Option<&ChannelReport> {
        self.channels.iter().find(|channel| channel.kind == kind)
    }

    /// The red, green and blue reconstructions for rank `k`.
    pub fn planes_for_rank(&self, k: usize) -> Option<[&RankApproximation; 3]> {
        let red = self.channel(ChannelKind::Red)?.approximations.get(&k)?;
        let green = self.channel(ChannelKind::Green)?.approximations.get(&k)?;
        let blue = self.channel(ChannelKind::Blue)?.approximations.get(&k)?;
        Some([red, green, blue])
    }
}

/// Runs the full decomposition and evaluation for a single channel.
#[derive(Debug, Clone)]
pub struct ChannelPipeline {
    config: CompressionConfig,
    gram: GramComputer,
    eigen: EigenSolver,
    reconstructor: RankReconstructor,
}

impl ChannelPipeline {
    pub fn new(config: CompressionConfig) -> Self {
        let gram = GramComputer::new(config.gram_strategy);
        let eigen = EigenSolver::new(config.eigen_tolerance, config.eigen_max_iterations);
        let reconstructor = RankReconstructor::new(
            config.reconstruction_strategy,
            config.multiply_strategy,
            config.quantization,
        );
        Self {
            config,
            gram,
            eigen,
            reconstructor,
        }
    }

    pub fn config(&self) -> &CompressionConfig {
        &self.config
    }

    /// Normalizes the channel and derives its SVD.
    pub fn decompose(&self, channel: &Channel) -> Result<SvdTriple> {
        let kind = channel.kind;
        let normalized = channel.normalize();
        let a_norm = normalized.data();

        let w = self.gram.compute(a_norm).map_err(|e| e.in_channel(kind, Stage::Gram))?;
        let pairs = self.eigen.decompose(&w).map_err(|e| e.in_channel(kind, Stage::Eigen))?;
        let triple = build_svd_from_pairs(a_norm, &pairs).map_err(|e| e.in_channel(kind, Stage::Svd))?;

        info!(
            channel = %kind,
            rows = channel.rows(),
            cols = channel.cols(),
            rank = triple.rank(),
            sigma_1 = triple.largest_singular_value().unwrap_or(0.0),
            "channel decomposed"
        );
        Ok(triple)
    }

    /// Reconstructs every configured rank from an existing decomposition.
    pub fn reconstruct(&self, kind: ChannelKind, triple: &SvdTriple) -> Result<BTreeMap<usize, RankApproximation>> {
        if self.config.progressive {
            return self
                .reconstructor
                .reconstruct_progressive(triple, &self.config.ranks)
                .map_err(|e| e.in_channel(kind, Stage::Reconstruct));
        }

        let mut approximations = BTreeMap::new();
        for &k in &self.config.ranks {
            if approximations.contains_key(&k) {
                continue;
            }
            let approximation = self
                .reconstructor
                .reconstruct(triple, k)
                .map_err(|e| e.in_channel(kind, Stage::Reconstruct))?;
            approximations.insert(k, approximation);
        }
        Ok(approximations)
    }

    pub fn run(&self, channel: &Channel) -> Result<ChannelReport> {
        let kind = channel.kind;
        let span = info_span!("channel", channel = %kind);
        let _guard = span.enter();

        let triple = self.decompose(channel)?;
        let approximations = self.reconstruct(kind, &triple)?;

        let mut records = Vec::with_capacity(approximations.len());
        for (&k, approximation) in &approximations {
            let record = QualityRecord::evaluate(k, channel.data(), &approximation.pixels)
                .map_err(|e| e.in_channel(kind, Stage::Evaluate))?;
            debug!(k, cr = record.compression_ratio, mse = record.mse, "rank evaluated");
            records.push(record);
        }

        Ok(ChannelReport {
            kind,
            numerical_rank: triple.rank(),
            largest_singular_value: triple.largest_singular_value(),
            records,
            approximations,
        })
    }
}

/// Compresses the three channels one after another.
#[derive(Debug, Clone)]
pub struct CompressionPipeline {
    channel_pipeline: ChannelPipeline,
}

impl CompressionPipeline {
    pub fn new(config: CompressionConfig) -> Self {
        Self {
            channel_pipeline: ChannelPipeline::new(config),
        }
    }

    pub fn config(&self) -> &CompressionConfig {
        self.channel_pipeline.config()
    }

    pub fn run(&self, channels: &RgbChannels) -> Result<CompressionReport> {
        let (rows, cols) = channels.shape();
        let reports = channels
            .iter()
            .map(|channel| self.channel_pipeline.run(channel))
            .collect::<Result<Vec<_>>>()?;
        Ok(CompressionReport::from_channels(rows, cols, reports))
    }
}
