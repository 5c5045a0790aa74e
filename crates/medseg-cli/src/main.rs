//! medseg: command-line driver for the segmentation pipeline.
//!
//! Reads an image file, runs one pipeline operation, and writes the
//! result as an image file. Each subcommand maps to one operation:
//!
//! - `mean-shift`: edge-preserving smoothing (16-bit grayscale output)
//! - `eliminate`: area-filtered region mask
//! - `superpixels`: SLICO superpixels rendered with their mean colors
//! - `quantize`: k-means cluster quantization followed by Otsu
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin medseg -- [--debug] <COMMAND> <INPUT> -o <OUTPUT> [OPTIONS]
//! ```

#![allow(clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use medseg_pipeline::decode::{decode_gray16, decode_rgb8};
use medseg_pipeline::{
    AreaFilterConfig, ClusterConfig, Dimensions, MeanShiftConfig, SegmentationConfig, Segmenter,
    SuperpixelConfig, binarize_recolored,
};

/// Coarse region segmentation for grayscale medical images.
#[derive(Parser)]
#[command(name = "medseg", version)]
struct Cli {
    /// Enable debug logging.
    #[arg(long, global = true)]
    debug: bool,

    /// Full segmentation config as a JSON string.
    ///
    /// When provided, all per-command parameter flags are ignored.
    /// Missing fields take their default values.
    #[arg(long, global = true)]
    config_json: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Smooth a scan with the mean-shift filter.
    MeanShift {
        /// Input image (PNG, JPEG, BMP, TIFF).
        input: PathBuf,

        /// Output path; written as 16-bit grayscale.
        #[arg(short, long)]
        output: PathBuf,

        /// Spatial window radius in pixels.
        #[arg(long, default_value_t = MeanShiftConfig::DEFAULT_SPATIAL_RADIUS)]
        spatial_radius: u32,

        /// Color window radius in 8-bit intensity units.
        #[arg(long, default_value_t = MeanShiftConfig::DEFAULT_RANGE_RADIUS)]
        range_radius: f32,
    },

    /// Keep regions whose pixel area lies strictly inside a window.
    Eliminate {
        /// Input image (PNG, JPEG, BMP, TIFF).
        input: PathBuf,

        /// Output path for the binary mask.
        #[arg(short, long)]
        output: PathBuf,

        /// Exclusive lower bound on region area in pixels.
        #[arg(long)]
        min_area: f64,

        /// Exclusive upper bound on region area in pixels.
        #[arg(long)]
        max_area: f64,

        /// Adaptive threshold block size (odd, at least 3).
        #[arg(long, default_value_t = AreaFilterConfig::DEFAULT_BLOCK_SIZE)]
        block_size: u32,
    },

    /// Decompose an image into SLICO superpixels.
    Superpixels {
        /// Input image (PNG, JPEG, BMP, TIFF).
        input: PathBuf,

        /// Output path; each superpixel is painted with its mean color.
        #[arg(short, long)]
        output: PathBuf,

        /// Nominal superpixel edge length in pixels.
        #[arg(long, default_value_t = SuperpixelConfig::DEFAULT_REGION_SIZE)]
        region_size: u32,

        /// Number of assignment/update iterations.
        #[arg(long, default_value_t = SuperpixelConfig::DEFAULT_ITERATIONS)]
        iterations: u32,
    },

    /// Binarize an image by clustering its superpixel colors.
    Quantize {
        /// Input image (PNG, JPEG, BMP, TIFF).
        input: PathBuf,

        /// Output path for the binary image.
        #[arg(short, long)]
        output: PathBuf,

        /// Number of k-means clusters.
        #[arg(long, default_value_t = ClusterConfig::DEFAULT_CLUSTERS)]
        clusters: usize,

        /// Also write the cluster-recolored image before binarization.
        #[arg(long)]
        recolored: Option<PathBuf>,
    },
}

/// Build a [`SegmentationConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and the
/// per-command flags are ignored. Otherwise the defaults are overridden
/// by the flags of the chosen subcommand.
fn config_from_cli(cli: &Cli) -> Result<SegmentationConfig, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    let mut config = SegmentationConfig::default();
    match cli.command {
        Command::MeanShift {
            spatial_radius,
            range_radius,
            ..
        } => {
            config.mean_shift = MeanShiftConfig {
                spatial_radius,
                range_radius,
                ..config.mean_shift
            };
        }
        Command::Eliminate { block_size, .. } => config.area.block_size = block_size,
        Command::Superpixels {
            region_size,
            iterations,
            ..
        } => {
            config.superpixel = SuperpixelConfig {
                region_size,
                iterations,
            };
        }
        Command::Quantize { clusters, .. } => config.cluster.clusters = clusters,
    }
    Ok(config)
}

fn read_input(path: &Path) -> Result<Vec<u8>, String> {
    std::fs::read(path).map_err(|e| format!("Error reading {}: {e}", path.display()))
}

fn run(cli: &Cli) -> Result<(), String> {
    let config = config_from_cli(cli)?;
    tracing::debug!(?config, "resolved config");
    let segmenter = Segmenter::new(config).map_err(|e| e.to_string())?;

    match cli.command {
        Command::MeanShift {
            ref input,
            ref output,
            ..
        } => {
            let scan = decode_gray16(&read_input(input)?).map_err(|e| e.to_string())?;
            tracing::info!(dimensions = ?Dimensions::of(&scan), "mean-shift");
            let filtered = segmenter.mean_shift(&scan);
            save(&filtered, output)
        }
        Command::Eliminate {
            ref input,
            ref output,
            min_area,
            max_area,
            ..
        } => {
            let scan = decode_gray16(&read_input(input)?).map_err(|e| e.to_string())?;
            tracing::info!(
                dimensions = ?Dimensions::of(&scan),
                min_area,
                max_area,
                "area elimination"
            );
            let mask = segmenter.eliminate_by_area(&scan, min_area, max_area);
            let kept = mask.pixels().filter(|p| p.0[0] > 0).count();
            tracing::info!(foreground_pixels = kept, "mask ready");
            save(&mask, output)
        }
        Command::Superpixels {
            ref input,
            ref output,
            ..
        } => {
            let image = decode_rgb8(&read_input(input)?).map_err(|e| e.to_string())?;
            tracing::info!(dimensions = ?Dimensions::of(&image), "superpixels");
            let superpixels = segmenter.superpixels(&image);
            tracing::info!(count = superpixels.count(), "superpixels computed");
            save(&medseg_pipeline::render_means(&superpixels), output)
        }
        Command::Quantize {
            ref input,
            ref output,
            ref recolored,
            ..
        } => {
            let image = decode_rgb8(&read_input(input)?).map_err(|e| e.to_string())?;
            tracing::info!(dimensions = ?Dimensions::of(&image), "quantize");
            let painted = segmenter.recolor(&image).map_err(|e| e.to_string())?;
            if let Some(path) = recolored {
                save(&painted, path)?;
            }
            save(&binarize_recolored(&painted), output)
        }
    }
}

fn save<P>(image: &image::ImageBuffer<P, Vec<P::Subpixel>>, path: &Path) -> Result<(), String>
where
    P: image::PixelWithColorType,
    [P::Subpixel]: image::EncodableLayout,
{
    image
        .save(path)
        .map_err(|e| format!("Error writing {}: {e}", path.display()))?;
    tracing::info!(path = %path.display(), "wrote output");
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = if cli.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            eprintln!("{msg}");
            ExitCode::FAILURE
        }
    }
}
