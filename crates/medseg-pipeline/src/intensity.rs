//! Intensity rescaling between bit depths.
//!
//! The source scans are 16-bit, while every filter in the pipeline works
//! on 8-bit data. These helpers do the conversions by scaling against the
//! image maximum (or the min/max range), with one explicit policy for
//! degenerate input: a constant-zero image has no usable maximum and is
//! mapped to all zeros instead of dividing by zero.

use image::{GrayImage, ImageBuffer, Luma, Primitive};

/// How a scaled intensity is brought back to an integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounding {
    /// Round half away from zero, saturating at 255.
    Nearest,
    /// Drop the fractional part.
    Truncate,
}

/// Largest intensity in a single-channel image, as `f32`.
///
/// Returns `0.0` for an empty image.
#[must_use]
pub fn max_intensity<T>(image: &ImageBuffer<Luma<T>, Vec<T>>) -> f32
where
    T: Primitive + Into<f32>,
{
    image
        .pixels()
        .map(|p| Into::<f32>::into(p.0[0]))
        .fold(0.0_f32, f32::max)
}

/// Rescale so that the image maximum maps to 255.
///
/// `v8 = v / max * 255`, converted with `rounding`. An image whose
/// maximum is zero (including an empty image) maps to all zeros.
#[must_use = "returns the rescaled 8-bit image"]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn rescale_to_u8<T>(image: &ImageBuffer<Luma<T>, Vec<T>>, rounding: Rounding) -> GrayImage
where
    T: Primitive + Into<f32>,
{
    let max = max_intensity(image);
    if max <= 0.0 {
        return GrayImage::new(image.width(), image.height());
    }

    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let value: f32 = image.get_pixel(x, y).0[0].into();
        let scaled = value * 255.0 / max;
        let value = match rounding {
            Rounding::Nearest => scaled.round(),
            Rounding::Truncate => scaled.trunc(),
        };
        Luma([value.clamp(0.0, 255.0) as u8])
    })
}

/// Stretch the intensity range linearly onto `[0, 255]`.
///
/// The darkest pixel becomes 0 and the brightest 255. A constant image
/// has no range to stretch and maps to all zeros.
#[must_use = "returns the contrast-normalized image"]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn normalize_min_max(image: &GrayImage) -> GrayImage {
    let Some((lo, hi)) = image.pixels().fold(None, |acc: Option<(u8, u8)>, p| {
        let v = p.0[0];
        Some(acc.map_or((v, v), |(lo, hi)| (lo.min(v), hi.max(v))))
    }) else {
        return image.clone();
    };

    if lo == hi {
        return GrayImage::new(image.width(), image.height());
    }

    let range = f32::from(hi - lo);
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let v = f32::from(image.get_pixel(x, y).0[0] - lo) * 255.0 / range;
        Luma([v.round().clamp(0.0, 255.0) as u8])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Gray16Image;

    #[test]
    fn max_maps_to_255() {
        let img = Gray16Image::from_fn(4, 1, |x, _| Luma([[0, 1000, 2000, 4000][x as usize]]));
        let scaled = rescale_to_u8(&img, Rounding::Nearest);
        let values: Vec<u8> = scaled.pixels().map(|p| p.0[0]).collect();
        // 1000/4000*255 = 63.75, 2000/4000*255 = 127.5
        assert_eq!(values, vec![0, 64, 128, 255]);
    }

    #[test]
    fn truncation_drops_fraction() {
        let img = Gray16Image::from_fn(4, 1, |x, _| Luma([[0, 1000, 2000, 4000][x as usize]]));
        let scaled = rescale_to_u8(&img, Rounding::Truncate);
        let values: Vec<u8> = scaled.pixels().map(|p| p.0[0]).collect();
        assert_eq!(values, vec![0, 63, 127, 255]);
    }

    #[test]
    fn all_zero_image_stays_zero() {
        let img = Gray16Image::new(5, 3);
        let scaled = rescale_to_u8(&img, Rounding::Nearest);
        assert_eq!(scaled.dimensions(), (5, 3));
        assert!(scaled.pixels().all(|p| p.0[0] == 0));
    }

    #[test]
    fn empty_image_has_zero_max() {
        let img = Gray16Image::new(0, 0);
        assert!(max_intensity(&img).abs() < f32::EPSILON);
        assert_eq!(rescale_to_u8(&img, Rounding::Truncate).dimensions(), (0, 0));
    }

    #[test]
    fn min_max_stretches_to_full_range() {
        let img = GrayImage::from_fn(3, 1, |x, _| Luma([[50, 100, 150][x as usize]]));
        let stretched = normalize_min_max(&img);
        let values: Vec<u8> = stretched.pixels().map(|p| p.0[0]).collect();
        assert_eq!(values, vec![0, 128, 255]);
    }

    #[test]
    fn constant_image_normalizes_to_zero() {
        let img = GrayImage::from_pixel(4, 4, Luma([77]));
        let stretched = normalize_min_max(&img);
        assert!(stretched.pixels().all(|p| p.0[0] == 0));
    }
}
