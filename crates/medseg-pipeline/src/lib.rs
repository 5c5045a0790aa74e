//! medseg-pipeline: coarse region segmentation for grayscale medical
//! images (sans-IO).
//!
//! Four independent operations, each a pure function of an in-memory
//! image and a configuration:
//!
//! 1. [`mean_shift_filter`] — edge-preserving smoothing of a 16-bit scan
//! 2. [`eliminate_by_area`] — threshold, trace outer contours, and keep
//!    regions whose area falls inside a window
//! 3. [`slico`] — SLICO superpixels with per-superpixel mean colors
//! 4. [`kmeans_quantize`] — k-means over superpixel colors followed by
//!    Otsu binarization
//!
//! This crate has **no I/O dependencies** beyond decoding in-memory
//! bytes. Reading and writing files lives in `medseg-cli`.

pub mod area;
pub mod cluster;
pub mod decode;
pub mod intensity;
pub mod mean_shift;
pub mod superpixel;
pub mod threshold;
pub mod types;

pub use area::eliminate_by_area;
pub use cluster::{ClusterAssignment, binarize_recolored, kmeans_quantize, recolor_by_cluster};
pub use mean_shift::{mean_shift_filter, mean_shift_filter_gray8, mean_shift_rgb};
pub use superpixel::{render_means, slico};
pub use types::{
    AreaFilterConfig, ClusterConfig, Dimensions, Gray16Image, GrayImage, LabelImage,
    MeanShiftConfig, PipelineError, RgbImage, SegmentationConfig, SuperpixelConfig, Superpixels,
};

/// The four pipeline operations bound to one [`SegmentationConfig`].
///
/// Holds no state besides the configuration; every call is independent.
#[derive(Debug, Clone, Default)]
pub struct Segmenter {
    config: SegmentationConfig,
}

impl Segmenter {
    /// Create a segmenter after validating `config`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if any section of the
    /// configuration is invalid.
    pub fn new(config: SegmentationConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The configuration in use.
    #[must_use]
    pub const fn config(&self) -> &SegmentationConfig {
        &self.config
    }

    /// See [`mean_shift_filter`].
    #[must_use = "returns the filtered image"]
    pub fn mean_shift(&self, image: &Gray16Image) -> Gray16Image {
        mean_shift_filter(image, &self.config.mean_shift)
    }

    /// See [`eliminate_by_area`].
    #[must_use = "returns the region mask"]
    pub fn eliminate_by_area(
        &self,
        image: &Gray16Image,
        min_area: f64,
        max_area: f64,
    ) -> GrayImage {
        eliminate_by_area(image, min_area, max_area, &self.config.area)
    }

    /// See [`slico`].
    #[must_use = "returns the superpixel decomposition"]
    pub fn superpixels(&self, image: &RgbImage) -> Superpixels {
        slico(image, &self.config.superpixel)
    }

    /// See [`kmeans_quantize`].
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if the image has fewer
    /// distinct superpixel colors than configured clusters.
    pub fn quantize(&self, image: &RgbImage) -> Result<GrayImage, PipelineError> {
        kmeans_quantize(image, &self.config.superpixel, &self.config.cluster)
    }

    /// See [`recolor_by_cluster`].
    ///
    /// # Errors
    ///
    /// Same as [`Segmenter::quantize`].
    pub fn recolor(&self, image: &RgbImage) -> Result<RgbImage, PipelineError> {
        recolor_by_cluster(image, &self.config.superpixel, &self.config.cluster)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_segmenter_is_valid() {
        let segmenter = Segmenter::new(SegmentationConfig::default()).unwrap();
        assert_eq!(segmenter.config(), &SegmentationConfig::default());
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let config = SegmentationConfig {
            cluster: ClusterConfig {
                clusters: 300,
                ..ClusterConfig::default()
            },
            ..SegmentationConfig::default()
        };
        assert!(matches!(
            Segmenter::new(config),
            Err(PipelineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn operations_preserve_dimensions() {
        let config = SegmentationConfig {
            mean_shift: MeanShiftConfig {
                spatial_radius: 3,
                ..MeanShiftConfig::default()
            },
            area: AreaFilterConfig {
                mean_shift: MeanShiftConfig {
                    spatial_radius: 3,
                    ..MeanShiftConfig::default()
                },
                ..AreaFilterConfig::default()
            },
            ..SegmentationConfig::default()
        };
        let segmenter = Segmenter::new(config).unwrap();

        let gray = Gray16Image::from_fn(23, 17, |x, y| {
            image::Luma([u16::try_from(x * 100 + y).unwrap()])
        });
        assert_eq!(segmenter.mean_shift(&gray).dimensions(), (23, 17));
        assert_eq!(
            segmenter.eliminate_by_area(&gray, 10.0, 100.0).dimensions(),
            (23, 17)
        );

        let rgb = RgbImage::from_fn(23, 17, |x, y| {
            image::Rgb([u8::try_from(x * 10).unwrap(), u8::try_from(y * 10).unwrap(), 50])
        });
        assert_eq!(segmenter.superpixels(&rgb).labels.dimensions(), (23, 17));
        assert_eq!(segmenter.quantize(&rgb).unwrap().dimensions(), (23, 17));
    }
}
