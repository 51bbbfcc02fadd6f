use crate::core_modules::channel::channel::ChannelKind;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// The pipeline stage a channel was in when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Gram,
    Eigen,
    Svd,
    Reconstruct,
    Evaluate,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Gram => "gram",
            Stage::Eigen => "eigen",
            Stage::Svd => "svd",
            Stage::Reconstruct => "reconstruct",
            Stage::Evaluate => "evaluate",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum CompressionError {
    #[error("dimension mismatch in {operation}: expected {expected}, found {found}")]
    DimensionMismatch {
        operation: &'static str,
        expected: String,
        found: String,
    },

    #[error("channel has no data ({rows}x{cols})")]
    EmptyChannel { rows: usize, cols: usize },

    #[error("symmetric eigendecomposition of a {dimension}x{dimension} matrix did not converge within {max_iterations} iterations")]
    EigenNonConvergence {
        dimension: usize,
        max_iterations: usize,
    },

    #[error("non-finite value in {operation} input")]
    NonFiniteInput { operation: &'static str },

    #[error("image not found: {}", .path.display())]
    ResourceNotFound { path: PathBuf },

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{channel} channel failed at {stage} stage: {source}")]
    ChannelFailed {
        channel: ChannelKind,
        stage: Stage,
        #[source]
        source: Box<CompressionError>,
    },

    #[error("{} channel(s) failed: {}", .0.len(), join_messages(.0))]
    ChannelsFailed(Vec<CompressionError>),

    #[error("channel worker did not complete: {0}")]
    WorkerJoin(String),
}

impl CompressionError {
    pub(crate) fn dimension_mismatch(
        operation: &'static str,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        CompressionError::DimensionMismatch {
            operation,
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Attaches channel and stage context to a core error.
    pub fn in_channel(self, channel: ChannelKind, stage: Stage) -> Self {
        CompressionError::ChannelFailed {
            channel,
            stage,
            source: Box::new(self),
        }
    }
}

fn join_messages(errors: &[CompressionError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T> = std::result::Result<T, CompressionError>;
