use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};
use svd_compress::pipeline::{CompressionConfig, CompressionPipeline, CompressionReport};
use svd_compress::utils::image_helper::image_helper::{load_rgb_channels, merge_channels, save_rank_image};
use svd_compress::{ParallelCompressionPipeline, Quantization, QualityRecord, ReconstructionStrategy, TilingStrategy};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "compress_runner")]
#[command(about = "Compresses an RGB image with a truncated SVD at several ranks")]
struct Args {
    /// Image to compress
    input: PathBuf,

    /// Directory receiving compressed_k<k>.png files
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    /// JSON file with a CompressionConfig; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Comma-separated ranks, e.g. 5,20,50,100
    #[arg(long, value_delimiter = ',')]
    ranks: Option<Vec<usize>>,

    /// Use blocked kernels with this tile size
    #[arg(long)]
    tile: Option<usize>,

    /// Reconstruction kernel
    #[arg(long, value_enum)]
    strategy: Option<StrategyArg>,

    /// Round to the nearest intensity instead of truncating
    #[arg(long)]
    round: bool,

    /// Reconstruct each rank from scratch instead of one growing accumulator
    #[arg(long)]
    one_shot: bool,

    /// Run the channels one after another on the current thread
    #[arg(long)]
    sequential: bool,

    /// Write the full report as JSON to this path
    #[arg(long)]
    report: Option<PathBuf>,

    /// Skip writing the reconstructed images
    #[arg(long)]
    no_images: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum StrategyArg {
    OuterProduct,
    DenseMultiply,
}

impl From<StrategyArg> for ReconstructionStrategy {
    fn from(value: StrategyArg) -> Self {
        match value {
            StrategyArg::OuterProduct => ReconstructionStrategy::OuterProduct,
            StrategyArg::DenseMultiply => ReconstructionStrategy::DenseMultiply,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::level_filters::LevelFilter::INFO.into()),
        )
        .init();

    let args = Args::parse();

    // --- 1. Configuration ---
    let config = build_config(&args)?;
    info!(?config, "configuration resolved");

    // --- 2. Load & Split ---
    let channels = load_rgb_channels(&args.input)
        .with_context(|| format!("loading {}", args.input.display()))?;
    let (rows, cols) = channels.shape();
    info!(input = %args.input.display(), rows, cols, "starting SVD compression");

    // --- 3. Decompose, Reconstruct & Evaluate ---
    let report = if args.sequential {
        CompressionPipeline::new(config).run(&channels)?
    } else {
        ParallelCompressionPipeline::new(config).run(channels).await?
    };

    // --- 4. Merge & Save ---
    if !args.no_images {
        std::fs::create_dir_all(&args.output_dir)
            .with_context(|| format!("creating {}", args.output_dir.display()))?;
        write_images(&report, &args.output_dir)?;
    }

    // --- 5. Reporting ---
    println!("{}", format_table(&report.averaged));

    if let Some(path) = &args.report {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(path, json).with_context(|| format!("writing report to {}", path.display()))?;
        info!(path = %path.display(), "report written");
    }

    Ok(())
}

fn build_config(args: &Args) -> Result<CompressionConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))?
        }
        None => CompressionConfig::default(),
    };

    if let Some(ranks) = &args.ranks {
        config.ranks = ranks.clone();
    }
    if let Some(tile) = args.tile {
        if tile == 0 {
            bail!("--tile must be at least 1");
        }
        config.gram_strategy = TilingStrategy::Blocked { tile };
        config.multiply_strategy = TilingStrategy::Blocked { tile };
    }
    if let Some(strategy) = args.strategy {
        config.reconstruction_strategy = strategy.into();
    }
    if args.round {
        config.quantization = Quantization::Round;
    }
    if args.one_shot {
        config.progressive = false;
    }
    Ok(config)
}

fn write_images(report: &CompressionReport, directory: &Path) -> Result<()> {
    for record in &report.averaged {
        let Some([red, green, blue]) = report.planes_for_rank(record.k) else {
            bail!("missing reconstruction for k = {}", record.k);
        };
        let image = merge_channels(red, green, blue)?;
        let path = save_rank_image(directory, record.k, &image)?;
        println!("Saved k={} to {}", record.k, path.display());
    }
    Ok(())
}

/// Renders the averaged records as a fixed-width `k | CR | MSE` table.
fn format_table(records: &[QualityRecord]) -> String {
    let mut lines = vec![
        format!("{:<5} | {:<25} | {:<20}", "k", "Compression Ratio (CR)", "Mean Squared Error"),
        "-".repeat(56),
    ];
    for record in records {
        let ratio = format!("{:.2} : 1.00", record.compression_ratio);
        lines.push(format!("{:<5} | {:<25} | {:<20.2}", record.k, ratio, record.mse));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["compress_runner", "input.png"];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    #[test]
    fn flags_override_defaults() {
        let config = build_config(&args(&["--ranks", "3,1,9", "--tile", "16", "--round", "--one-shot"])).unwrap();
        assert_eq!(config.ranks, vec![3, 1, 9]);
        assert_eq!(config.gram_strategy, TilingStrategy::Blocked { tile: 16 });
        assert_eq!(config.multiply_strategy, TilingStrategy::Blocked { tile: 16 });
        assert_eq!(config.quantization, Quantization::Round);
        assert!(!config.progressive);
    }

    #[test]
    fn no_flags_keeps_the_default_config() {
        assert_eq!(build_config(&args(&[])).unwrap(), CompressionConfig::default());
    }

    #[test]
    fn zero_tile_is_rejected() {
        assert!(build_config(&args(&["--tile", "0"])).is_err());
    }

    #[test]
    fn config_file_is_read_then_overridden() {
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join("config.json");
        std::fs::write(&path, r#"{"ranks": [2, 4], "reconstruction_strategy": "dense_multiply"}"#).unwrap();

        let config = build_config(&args(&["--config", path.to_str().unwrap(), "--strategy", "outer-product"])).unwrap();
        assert_eq!(config.ranks, vec![2, 4]);
        assert_eq!(config.reconstruction_strategy, ReconstructionStrategy::OuterProduct);
    }

    #[test]
    fn table_shows_ratio_against_one() {
        let table = format_table(&[QualityRecord {
            k: 10,
            compression_ratio: 150000.0 / 8010.0,
            mse: 12.345,
        }]);
        let row = table.lines().nth(2).unwrap();
        assert!(row.starts_with("10    | 18.73 : 1.00"));
        assert!(row.contains("12.35") || row.contains("12.34"));
    }
}
