// THEORY:
// This file is the main entry point for the `svd_compress` library crate. It exposes
// the compression pipelines and the data structures they exchange with callers
// (`CompressionConfig`, `CompressionReport`, `QualityRecord`, ...).
//
// The numerical engine lives in `core_modules`, one file per stage: Gram matrix,
// eigensolver, SVD builder, rank reconstructor and quality evaluator, plus the shared
// dense kernels in `matrix_ops`. The pipelines sequence those stages for the three
// channels of an image, and `utils::image_helper` is the only place that touches
// image files.

pub mod core_modules;
pub mod error;
pub mod parallel_pipeline;
pub mod pipeline;
pub mod utils;

pub use core_modules::channel::channel::{Channel, ChannelKind, NormalizedChannel, RgbChannels};
pub use core_modules::eigen_solver::{eigen_decompose, EigenPairs, EigenSolver};
pub use core_modules::gram_computer::{compute_gram, GramComputer};
pub use core_modules::matrix_ops::{matrix_vector, multiply, transpose_multiply, TilingStrategy};
pub use core_modules::quality_evaluator::{compression_ratio, mse, QualityRecord};
pub use core_modules::rank_reconstructor::{Quantization, RankApproximation, RankReconstructor, ReconstructionStrategy};
pub use core_modules::svd_builder::{build_svd, build_svd_from_pairs, SvdTriple, SINGULAR_VALUE_THRESHOLD};
pub use error::{CompressionError, Result, Stage};
pub use parallel_pipeline::ParallelCompressionPipeline;
pub use pipeline::{ChannelPipeline, ChannelReport, CompressionConfig, CompressionPipeline, CompressionReport};
