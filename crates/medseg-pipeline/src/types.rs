//! Shared types for the medseg segmentation pipeline.

use image::{ImageBuffer, Luma};
use serde::{Deserialize, Serialize};

/// Re-export `GrayImage` so downstream crates can reference 8-bit
/// masks without depending on `image` directly.
pub use image::GrayImage;

/// Re-export `RgbImage` so downstream crates can pass color input
/// without depending on `image` directly.
pub use image::RgbImage;

/// A 16-bit single-channel image, the native depth of the source scans.
pub type Gray16Image = ImageBuffer<Luma<u16>, Vec<u16>>;

/// A per-pixel superpixel label map.
pub type LabelImage = ImageBuffer<Luma<u32>, Vec<u32>>;

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Dimensions of any image buffer.
    #[must_use]
    pub fn of<P, C>(image: &ImageBuffer<P, C>) -> Self
    where
        P: image::Pixel,
        C: std::ops::Deref<Target = [P::Subpixel]>,
    {
        Self {
            width: image.width(),
            height: image.height(),
        }
    }

    /// Total number of pixels.
    #[must_use]
    pub const fn area(self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Parameters for edge-preserving mean-shift smoothing.
///
/// Defaults are the radii the area filter has always used for tumor
/// enhancement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeanShiftConfig {
    /// Half-width of the square spatial window, in pixels.
    pub spatial_radius: u32,

    /// Maximum color distance (Euclidean, 3-channel 8-bit space) for a
    /// neighbour to contribute to the window mean.
    pub range_radius: f32,

    /// Upper bound on mean-shift iterations per pixel.
    pub max_iterations: u32,

    /// Convergence threshold on the color shift between iterations.
    pub epsilon: f32,
}

impl MeanShiftConfig {
    /// Default spatial window radius.
    pub const DEFAULT_SPATIAL_RADIUS: u32 = 45;
    /// Default color range radius.
    pub const DEFAULT_RANGE_RADIUS: f32 = 60.0;
    /// Default iteration cap.
    pub const DEFAULT_MAX_ITERATIONS: u32 = 5;
    /// Default convergence threshold.
    pub const DEFAULT_EPSILON: f32 = 1.0;

    /// Check the parameters for values the filter cannot use.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if `range_radius` or
    /// `epsilon` is negative or not finite.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if !self.range_radius.is_finite() || self.range_radius < 0.0 {
            return Err(PipelineError::InvalidConfig(format!(
                "mean-shift range_radius must be finite and non-negative, got {}",
                self.range_radius
            )));
        }
        if !self.epsilon.is_finite() || self.epsilon < 0.0 {
            return Err(PipelineError::InvalidConfig(format!(
                "mean-shift epsilon must be finite and non-negative, got {}",
                self.epsilon
            )));
        }
        Ok(())
    }
}

impl Default for MeanShiftConfig {
    fn default() -> Self {
        Self {
            spatial_radius: Self::DEFAULT_SPATIAL_RADIUS,
            range_radius: Self::DEFAULT_RANGE_RADIUS,
            max_iterations: Self::DEFAULT_MAX_ITERATIONS,
            epsilon: Self::DEFAULT_EPSILON,
        }
    }
}

/// Parameters for area-based region elimination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AreaFilterConfig {
    /// Smoothing applied before thresholding.
    pub mean_shift: MeanShiftConfig,

    /// Side length of the adaptive threshold neighbourhood. Should be odd.
    pub block_size: u32,

    /// Constant subtracted from the local mean before comparison.
    pub threshold_offset: i16,

    /// Radius of the diamond kernel used for the close/open noise pass.
    /// Radius 1 is the 3 × 3 ellipse.
    pub clean_radius: u8,

    /// Radius of the square kernel used for the final opening.
    /// Radius 4 is the 9 × 9 rectangle.
    pub line_removal_radius: u8,
}

impl AreaFilterConfig {
    /// Default adaptive threshold block size.
    pub const DEFAULT_BLOCK_SIZE: u32 = 9;
    /// Default adaptive threshold offset.
    pub const DEFAULT_THRESHOLD_OFFSET: i16 = 2;
    /// Default noise-cleaning kernel radius.
    pub const DEFAULT_CLEAN_RADIUS: u8 = 1;
    /// Default line-removal kernel radius.
    pub const DEFAULT_LINE_REMOVAL_RADIUS: u8 = 4;

    /// Check the parameters for values the filter cannot use.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if the block size is not
    /// an odd number of at least 3, or the smoothing parameters are
    /// invalid.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.block_size < 3 || self.block_size % 2 == 0 {
            return Err(PipelineError::InvalidConfig(format!(
                "block_size must be odd and at least 3, got {}",
                self.block_size
            )));
        }
        self.mean_shift.validate()
    }
}

impl Default for AreaFilterConfig {
    fn default() -> Self {
        Self {
            mean_shift: MeanShiftConfig::default(),
            block_size: Self::DEFAULT_BLOCK_SIZE,
            threshold_offset: Self::DEFAULT_THRESHOLD_OFFSET,
            clean_radius: Self::DEFAULT_CLEAN_RADIUS,
            line_removal_radius: Self::DEFAULT_LINE_REMOVAL_RADIUS,
        }
    }
}

/// Parameters for SLICO superpixel decomposition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuperpixelConfig {
    /// Approximate superpixel side length in pixels (seed grid step).
    pub region_size: u32,

    /// Number of assignment/update rounds.
    pub iterations: u32,
}

impl SuperpixelConfig {
    /// Default seed grid step.
    pub const DEFAULT_REGION_SIZE: u32 = 10;
    /// Default number of rounds.
    pub const DEFAULT_ITERATIONS: u32 = 10;

    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if `region_size` is zero.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.region_size == 0 {
            return Err(PipelineError::InvalidConfig(
                "superpixel region_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for SuperpixelConfig {
    fn default() -> Self {
        Self {
            region_size: Self::DEFAULT_REGION_SIZE,
            iterations: Self::DEFAULT_ITERATIONS,
        }
    }
}

/// Parameters for k-means quantization of superpixel colors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Number of clusters. Must be in `1..=255` and no larger than the
    /// number of distinct superpixel colors.
    pub clusters: usize,

    /// Iteration cap for a single k-means run.
    pub max_iterations: usize,

    /// Centroid movement below which a run is considered converged.
    pub convergence: f32,

    /// Number of independently seeded runs; the lowest-score run wins.
    pub runs: u32,

    /// Seed of the first run. Run `i` uses `seed + i`.
    pub seed: u64,
}

impl ClusterConfig {
    /// Default cluster count.
    pub const DEFAULT_CLUSTERS: usize = 3;
    /// Default iteration cap.
    pub const DEFAULT_MAX_ITERATIONS: usize = 300;
    /// Default convergence threshold.
    pub const DEFAULT_CONVERGENCE: f32 = 1e-4;
    /// Default number of runs.
    pub const DEFAULT_RUNS: u32 = 4;
    /// Largest cluster count `kmeans_colors` can index.
    pub const MAX_CLUSTERS: usize = u8::MAX as usize;

    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if `clusters` is outside
    /// `1..=MAX_CLUSTERS` or `runs` is zero.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if !(1..=Self::MAX_CLUSTERS).contains(&self.clusters) {
            return Err(PipelineError::InvalidConfig(format!(
                "clusters must be in 1..={}, got {}",
                Self::MAX_CLUSTERS,
                self.clusters
            )));
        }
        if self.runs == 0 {
            return Err(PipelineError::InvalidConfig(
                "k-means runs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            clusters: Self::DEFAULT_CLUSTERS,
            max_iterations: Self::DEFAULT_MAX_ITERATIONS,
            convergence: Self::DEFAULT_CONVERGENCE,
            runs: Self::DEFAULT_RUNS,
            seed: 0,
        }
    }
}

/// Every tunable of the pipeline in one serializable value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Standalone mean-shift smoothing.
    pub mean_shift: MeanShiftConfig,
    /// Area-based region elimination.
    pub area: AreaFilterConfig,
    /// Superpixel decomposition (also used by quantization).
    pub superpixel: SuperpixelConfig,
    /// K-means quantization.
    pub cluster: ClusterConfig,
}

impl SegmentationConfig {
    /// Validate every section.
    ///
    /// # Errors
    ///
    /// Returns the first [`PipelineError::InvalidConfig`] found.
    pub fn validate(&self) -> Result<(), PipelineError> {
        self.mean_shift.validate()?;
        self.area.validate()?;
        self.superpixel.validate()?;
        self.cluster.validate()
    }
}

/// Result of superpixel decomposition.
#[derive(Debug, Clone)]
pub struct Superpixels {
    /// Per-superpixel mean color, indexed by label.
    pub means: Vec<[f64; 3]>,
    /// Label of every pixel, in `0..means.len()`.
    pub labels: LabelImage,
}

impl Superpixels {
    /// Number of superpixels.
    #[must_use]
    pub const fn count(&self) -> usize {
        self.means.len()
    }
}

/// Errors that can occur during pipeline processing.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// Pipeline configuration is invalid.
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),
}
