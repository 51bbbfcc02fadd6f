// THEORY:
// The three color planes of an image share nothing while they are being compressed,
// so they are a natural fit for one worker per channel. Each worker owns its channel
// and its own `ChannelPipeline`; the only synchronization is the final join before
// the report is assembled.
//
// The stages are CPU-bound, so workers run on tokio's blocking pool rather than on
// the async executor threads. Unlike the sequential pipeline, a failing channel does
// not hide the others: every failure is collected and reported together.

use crate::core_modules::channel::channel::{ChannelKind, RgbChannels};
use crate::error::{CompressionError, Result};
use crate::pipeline::{ChannelPipeline, ChannelReport, CompressionConfig, CompressionReport};
use futures::future::join_all;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

pub struct ParallelCompressionPipeline {
    channel_pipeline: Arc<ChannelPipeline>,
}

impl ParallelCompressionPipeline {
    pub fn new(config: CompressionConfig) -> Self {
        Self {
            channel_pipeline: Arc::new(ChannelPipeline::new(config)),
        }
    }

    pub fn config(&self) -> &CompressionConfig {
        self.channel_pipeline.config()
    }

    pub async fn run(&self, channels: RgbChannels) -> Result<CompressionReport> {
        let (rows, cols) = channels.shape();

        let workers: Vec<(ChannelKind, JoinHandle<Result<ChannelReport>>)> = channels
            .into_array()
            .into_iter()
            .map(|channel| {
                let kind = channel.kind;
                let pipeline = Arc::clone(&self.channel_pipeline);
                debug!(channel = %kind, "spawning channel worker");
                (kind, tokio::task::spawn_blocking(move || pipeline.run(&channel)))
            })
            .collect();

        let (kinds, handles): (Vec<_>, Vec<_>) = workers.into_iter().unzip();
        let outcomes = join_all(handles).await;

        let mut reports = Vec::with_capacity(outcomes.len());
        let mut failures = Vec::new();
        for (kind, outcome) in kinds.into_iter().zip(outcomes) {
            match outcome {
                Ok(Ok(report)) => reports.push(report),
                Ok(Err(err)) => {
                    error!(channel = %kind, error = %err, "channel failed");
                    failures.push(err);
                }
                Err(join_error) => {
                    error!(channel = %kind, error = %join_error, "channel worker did not complete");
                    failures.push(CompressionError::WorkerJoin(format!("{kind} channel: {join_error}")));
                }
            }
        }

        match failures.len() {
            0 => Ok(CompressionReport::from_channels(rows, cols, reports)),
            1 => Err(failures.remove(0)),
            _ => Err(CompressionError::ChannelsFailed(failures)),
        }
    }
}
