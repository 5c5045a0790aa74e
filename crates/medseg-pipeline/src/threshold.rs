//! Binarization: local adaptive thresholding and global Otsu.
//!
//! Both produce masks with values {0, 255}.

use image::{GrayImage, Luma};

/// Inverted adaptive mean threshold.
///
/// The threshold of each pixel is the mean of its `block_size ×
/// block_size` neighbourhood (borders replicate the edge pixels) minus
/// `offset`. Pixels at or below their threshold become foreground (255),
/// everything else background (0). Dark structures on a brighter
/// surround therefore light up, while flat areas of any brightness stay
/// background.
///
/// `block_size` is treated as `2 * radius + 1`; an even size behaves like
/// the next smaller odd one.
#[must_use = "returns the binary mask"]
pub fn adaptive_mean_threshold_inv(image: &GrayImage, block_size: u32, offset: i16) -> GrayImage {
    let radius = block_size / 2;
    let means = imageproc::filter::box_filter(image, radius, radius);

    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let value = i32::from(image.get_pixel(x, y).0[0]);
        let mean = i32::from(means.get_pixel(x, y).0[0]);
        if value <= mean - i32::from(offset) {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

/// Global binarization at Otsu's level.
///
/// Pixels strictly above the level become 255, the rest 0. On a constant
/// image the level is 0, so any non-zero constant comes out all 255 and
/// only an all-zero image stays all zeros.
#[must_use = "returns the binary mask"]
pub fn otsu_binarize(image: &GrayImage) -> GrayImage {
    let level = imageproc::contrast::otsu_level(image);
    tracing::debug!(level, "otsu threshold");

    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        if image.get_pixel(x, y).0[0] > level {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}
