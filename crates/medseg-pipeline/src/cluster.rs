//! Cluster-based region quantization.
//!
//! Superpixel mean colors are grouped with k-means, every pixel is
//! repainted with the centroid of its superpixel's cluster, and the
//! result is binarized with Otsu's threshold. Working on superpixel
//! means instead of raw pixels keeps the clustering small and makes the
//! regions follow superpixel boundaries.

use std::collections::HashSet;

use image::{GrayImage, Rgb, RgbImage};
use kmeans_colors::{Kmeans, get_kmeans};
use palette::Srgb;

use crate::superpixel::slico;
use crate::threshold::otsu_binarize;
use crate::types::{ClusterConfig, PipelineError, SuperpixelConfig};

/// K-means result over a set of colors.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterAssignment {
    /// Cluster index of each input color, in input order.
    pub labels: Vec<usize>,
    /// Centroid color of each cluster, in 8-bit channel units.
    pub centroids: Vec<[f64; 3]>,
}

/// Binarize a color image by clustering its superpixels.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if the configuration is
/// invalid or the image has fewer distinct superpixel colors than
/// requested clusters (which includes an empty image).
pub fn kmeans_quantize(
    image: &RgbImage,
    superpixel: &SuperpixelConfig,
    cluster: &ClusterConfig,
) -> Result<GrayImage, PipelineError> {
    let _span = tracing::debug_span!(
        "kmeans_quantize",
        width = image.width(),
        height = image.height(),
        clusters = cluster.clusters
    )
    .entered();

    let recolored = recolor_by_cluster(image, superpixel, cluster)?;
    Ok(binarize_recolored(&recolored))
}

/// Final step of [`kmeans_quantize`]: grayscale conversion and Otsu
/// binarization of an image produced by [`recolor_by_cluster`].
#[must_use = "returns the binary image"]
pub fn binarize_recolored(recolored: &RgbImage) -> GrayImage {
    otsu_binarize(&image::imageops::grayscale(recolored))
}

/// Repaint every pixel with the centroid color of its superpixel's
/// cluster.
///
/// This is [`kmeans_quantize`] without the final binarization.
///
/// # Errors
///
/// Same as [`kmeans_quantize`].
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn recolor_by_cluster(
    image: &RgbImage,
    superpixel: &SuperpixelConfig,
    cluster: &ClusterConfig,
) -> Result<RgbImage, PipelineError> {
    superpixel.validate()?;
    cluster.validate()?;

    let superpixels = slico(image, superpixel);
    let assignment = cluster_colors(&superpixels.means, cluster)?;

    let palette: Vec<Rgb<u8>> = assignment
        .labels
        .iter()
        .map(|&c| Rgb(assignment.centroids[c].map(|v| v.round().clamp(0.0, 255.0) as u8)))
        .collect();

    let labels = &superpixels.labels;
    Ok(RgbImage::from_fn(image.width(), image.height(), |x, y| {
        palette[labels.get_pixel(x, y).0[0] as usize]
    }))
}

/// Group colors (8-bit channel units) into `config.clusters` clusters.
///
/// Runs k-means++ `config.runs` times with consecutive seeds and keeps
/// the run with the lowest score.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if the configuration is
/// invalid or there are fewer distinct colors than clusters.
pub fn cluster_colors(
    colors: &[[f64; 3]],
    config: &ClusterConfig,
) -> Result<ClusterAssignment, PipelineError> {
    config.validate()?;

    let distinct = colors
        .iter()
        .map(|c| c.map(f64::to_bits))
        .collect::<HashSet<_>>()
        .len();
    if distinct < config.clusters {
        return Err(PipelineError::InvalidConfig(format!(
            "requested {} clusters but only {distinct} distinct superpixel colors",
            config.clusters
        )));
    }

    #[allow(clippy::cast_possible_truncation)]
    let points: Vec<Srgb> = colors
        .iter()
        .map(|c| Srgb::new((c[0] / 255.0) as f32, (c[1] / 255.0) as f32, (c[2] / 255.0) as f32))
        .collect();

    let best: Kmeans<Srgb> = (0..config.runs)
        .map(|run| {
            get_kmeans(
                config.clusters,
                config.max_iterations,
                config.convergence,
                false,
                &points,
                config.seed.wrapping_add(u64::from(run)),
            )
        })
        .min_by(|a, b| a.score.total_cmp(&b.score))
        .ok_or_else(|| PipelineError::InvalidConfig("k-means runs must be at least 1".into()))?;

    tracing::debug!(score = best.score, distinct, "k-means converged");

    Ok(ClusterAssignment {
        labels: best.indices.iter().map(|&i| usize::from(i)).collect(),
        centroids: best
            .centroids
            .iter()
            .map(|c| {
                [
                    f64::from(c.red) * 255.0,
                    f64::from(c.green) * 255.0,
                    f64::from(c.blue) * 255.0,
                ]
            })
            .collect(),
    })
}
