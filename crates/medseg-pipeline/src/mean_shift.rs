//! Edge-preserving mean-shift smoothing.
//!
//! Every pixel is moved toward the local mode of the joint
//! spatial/color distribution: a square window of radius
//! `spatial_radius` is repeatedly re-centred on the mean position and
//! mean color of the neighbours whose color lies within `range_radius`
//! of the current estimate. The pixel takes the color it converges to.
//! Flat regions collapse to their mode while strong intensity steps
//! (larger than the range radius) survive, which is what makes the
//! filter useful ahead of thresholding.
//!
//! [`mean_shift_rgb`] is the filter proper (single pyramid level, color
//! input). [`mean_shift_filter`] and [`mean_shift_filter_gray8`] wrap it
//! for grayscale scans: rescale to 8-bit by the image maximum, replicate
//! to three channels, filter, convert back to gray, and rescale to the
//! original range.

use image::{GrayImage, Luma, Rgb, RgbImage};

use crate::intensity::{Rounding, max_intensity, rescale_to_u8};
use crate::types::{Gray16Image, MeanShiftConfig};

/// Smooth a 16-bit grayscale image.
///
/// The output has the same dimensions as the input and its intensities
/// are rescaled back proportionally to the input maximum (truncating).
///
/// A constant-zero image has no maximum to scale by and is returned
/// unchanged.
#[must_use = "returns the filtered image"]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn mean_shift_filter(image: &Gray16Image, config: &MeanShiftConfig) -> Gray16Image {
    let _span = tracing::debug_span!(
        "mean_shift_filter",
        width = image.width(),
        height = image.height()
    )
    .entered();

    let max = max_intensity(image);
    if max <= 0.0 {
        tracing::debug!("all-zero input, returning it unchanged");
        return image.clone();
    }

    let smoothed = smooth_gray8(&rescale_to_u8(image, Rounding::Nearest), config);
    Gray16Image::from_fn(image.width(), image.height(), |x, y| {
        let v = f32::from(smoothed.get_pixel(x, y).0[0]) / 255.0 * max;
        Luma([v as u16])
    })
}

/// Smooth an 8-bit grayscale image.
///
/// Same contract as [`mean_shift_filter`] at 8-bit depth: the result is
/// rescaled to the input maximum, and an all-zero image is returned
/// unchanged.
#[must_use = "returns the filtered image"]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn mean_shift_filter_gray8(image: &GrayImage, config: &MeanShiftConfig) -> GrayImage {
    let _span = tracing::debug_span!(
        "mean_shift_filter_gray8",
        width = image.width(),
        height = image.height()
    )
    .entered();

    let max = max_intensity(image);
    if max <= 0.0 {
        tracing::debug!("all-zero input, returning it unchanged");
        return image.clone();
    }

    let smoothed = smooth_gray8(&rescale_to_u8(image, Rounding::Nearest), config);
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let v = f32::from(smoothed.get_pixel(x, y).0[0]) / 255.0 * max;
        Luma([v as u8])
    })
}

/// Replicate to RGB, filter, and convert back to luma.
fn smooth_gray8(gray: &GrayImage, config: &MeanShiftConfig) -> GrayImage {
    let rgb = RgbImage::from_fn(gray.width(), gray.height(), |x, y| {
        let v = gray.get_pixel(x, y).0[0];
        Rgb([v, v, v])
    });
    image::imageops::grayscale(&mean_shift_rgb(&rgb, config))
}

/// Mean-shift filter a color image.
///
/// Neighbours contribute when their squared RGB distance to the current
/// color estimate is at most `range_radius²`. Each pixel iterates at most
/// `max_iterations` times (at least once), stopping early once the window
/// stops moving or the combined position and color shift is within
/// `epsilon`.
#[must_use = "returns the filtered image"]
pub fn mean_shift_rgb(image: &RgbImage, config: &MeanShiftConfig) -> RgbImage {
    let params = ShiftParams {
        width: i64::from(image.width()),
        height: i64::from(image.height()),
        spatial_radius: i64::from(config.spatial_radius),
        range_sq: f64::from(config.range_radius) * f64::from(config.range_radius),
        max_iterations: config.max_iterations.max(1),
        epsilon: f64::from(config.epsilon),
    };
    let raw = image.as_raw();

    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        Rgb(shift_pixel(raw, &params, i64::from(x), i64::from(y)))
    })
}

struct ShiftParams {
    width: i64,
    height: i64,
    spatial_radius: i64,
    range_sq: f64,
    max_iterations: u32,
    epsilon: f64,
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn shift_pixel(raw: &[u8], params: &ShiftParams, x0: i64, y0: i64) -> [u8; 3] {
    let index = |x: i64, y: i64| ((y * params.width + x) * 3) as usize;

    let (mut x, mut y) = (x0, y0);
    let start = index(x, y);
    let mut color = [
        i64::from(raw[start]),
        i64::from(raw[start + 1]),
        i64::from(raw[start + 2]),
    ];

    for _ in 0..params.max_iterations {
        let x_lo = (x - params.spatial_radius).max(0);
        let x_hi = (x + params.spatial_radius).min(params.width - 1);
        let y_lo = (y - params.spatial_radius).max(0);
        let y_hi = (y + params.spatial_radius).min(params.height - 1);

        let mut count = 0_i64;
        let (mut sum_x, mut sum_y) = (0_i64, 0_i64);
        let mut sum_c = [0_i64; 3];

        for wy in y_lo..=y_hi {
            for wx in x_lo..=x_hi {
                let i = index(wx, wy);
                let c = [
                    i64::from(raw[i]),
                    i64::from(raw[i + 1]),
                    i64::from(raw[i + 2]),
                ];
                let dist_sq = (0..3)
                    .map(|k| (c[k] - color[k]) * (c[k] - color[k]))
                    .sum::<i64>();
                if dist_sq as f64 <= params.range_sq {
                    count += 1;
                    sum_x += wx;
                    sum_y += wy;
                    for k in 0..3 {
                        sum_c[k] += c[k];
                    }
                }
            }
        }

        if count == 0 {
            break;
        }

        let new_x = sum_x.div_euclid(count);
        let new_y = sum_y.div_euclid(count);
        let new_color = sum_c.map(|s| s.div_euclid(count));

        let color_shift = (0..3)
            .map(|k| (new_color[k] - color[k]) * (new_color[k] - color[k]))
            .sum::<i64>();
        let shift = (new_x - x).abs() + (new_y - y).abs() + color_shift;
        let stationary = new_x == x && new_y == y;

        x = new_x;
        y = new_y;
        color = new_color;

        if stationary || shift as f64 <= params.epsilon {
            break;
        }
    }

    color.map(|c| c.clamp(0, 255) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(spatial_radius: u32, range_radius: f32) -> MeanShiftConfig {
        MeanShiftConfig {
            spatial_radius,
            range_radius,
            ..MeanShiftConfig::default()
        }
    }

    #[test]
    fn output_dimensions_preserved() {
        let img = Gray16Image::from_fn(17, 31, |x, y| Luma([u16::try_from(x * y).unwrap_or(0)]));
        let filtered = mean_shift_filter(&img, &config(3, 20.0));
        assert_eq!(filtered.dimensions(), (17, 31));
    }

    #[test]
    fn all_zero_image_returned_unchanged() {
        let img = Gray16Image::new(12, 9);
        let filtered = mean_shift_filter(&img, &MeanShiftConfig::default());
        assert_eq!(img, filtered);
    }

    #[test]
    fn uniform_image_stays_uniform() {
        let img = Gray16Image::from_pixel(20, 20, Luma([128]));
        let filtered = mean_shift_filter(&img, &config(5, 20.0));
        assert!(filtered.pixels().all(|p| p.0[0] == 128));
    }

    #[test]
    fn step_larger_than_range_is_preserved() {
        let img = GrayImage::from_fn(20, 10, |x, _| {
            if x < 10 { Luma([40]) } else { Luma([220]) }
        });
        let filtered = mean_shift_filter_gray8(&img, &config(4, 30.0));
        // 40 -> 46 at 8-bit -> 39.7 on the way back, truncated.
        assert_eq!(filtered.get_pixel(2, 5).0[0], 39);
        assert_eq!(filtered.get_pixel(9, 5).0[0], 39);
        // 220 is the maximum so the bright side maps back to itself.
        assert_eq!(filtered.get_pixel(10, 5).0[0], 220);
        assert_eq!(filtered.get_pixel(19, 5).0[0], 220);
    }

    #[test]
    fn small_noise_is_flattened() {
        // Alternating 100/104 checkerboard: within range, so every pixel
        // converges to the local mean.
        let img = RgbImage::from_fn(16, 16, |x, y| {
            let v = if (x + y) % 2 == 0 { 100 } else { 104 };
            Rgb([v, v, v])
        });
        let filtered = mean_shift_rgb(&img, &config(3, 20.0));
        for p in filtered.pixels() {
            assert!(
                (101..=103).contains(&p.0[0]),
                "expected smoothed value near 102, got {}",
                p.0[0]
            );
        }
    }

    #[test]
    fn zero_range_radius_keeps_isolated_pixels() {
        let mut img = RgbImage::from_pixel(9, 9, Rgb([10, 10, 10]));
        img.put_pixel(4, 4, Rgb([200, 200, 200]));
        let filtered = mean_shift_rgb(&img, &config(2, 0.0));
        assert_eq!(filtered.get_pixel(4, 4), &Rgb([200, 200, 200]));
        assert_eq!(filtered.get_pixel(0, 0), &Rgb([10, 10, 10]));
    }

    #[test]
    fn empty_image_is_handled() {
        let img = RgbImage::new(0, 0);
        let filtered = mean_shift_rgb(&img, &MeanShiftConfig::default());
        assert_eq!(filtered.dimensions(), (0, 0));
    }
}
