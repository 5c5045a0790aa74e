//! Area-based region elimination.
//!
//! Finds candidate regions in a grayscale scan and keeps only those whose
//! filled outline covers a pixel count inside a caller-chosen window:
//!
//! 1. rescale to 8-bit and smooth with mean-shift
//! 2. stretch contrast, then inverted adaptive mean threshold
//! 3. close + open with a small diamond kernel to drop speckle
//! 4. trace external contours and fill those with `min < area < max`
//! 5. open with a larger square kernel to strip thin line artifacts
//!
//! The result is a {0, 255} mask with the dimensions of the input.

use image::{GrayImage, Luma};
use imageproc::contours::{BorderType, Contour};
use imageproc::distance_transform::Norm;
use imageproc::point::Point;

use crate::intensity::{Rounding, normalize_min_max, rescale_to_u8};
use crate::mean_shift::mean_shift_filter_gray8;
use crate::threshold::adaptive_mean_threshold_inv;
use crate::types::{AreaFilterConfig, Gray16Image};

/// Keep only regions whose area lies strictly between `min_area` and
/// `max_area`.
///
/// Areas are pixel counts: the number of pixels covered by each region's
/// outer contour once filled. Regions exactly at either bound are dropped, so an
/// empty window (`min_area >= max_area`) always yields an all-zero mask.
#[must_use = "returns the region mask"]
pub fn eliminate_by_area(
    image: &Gray16Image,
    min_area: f64,
    max_area: f64,
    config: &AreaFilterConfig,
) -> GrayImage {
    let _span = tracing::debug_span!(
        "eliminate_by_area",
        width = image.width(),
        height = image.height(),
        min_area,
        max_area
    )
    .entered();

    let (width, height) = image.dimensions();
    if min_area.partial_cmp(&max_area) != Some(std::cmp::Ordering::Less) {
        tracing::debug!("empty area window, no region can qualify");
        return GrayImage::new(width, height);
    }

    let gray = rescale_to_u8(image, Rounding::Truncate);
    let smoothed = mean_shift_filter_gray8(&gray, &config.mean_shift);
    let normalized = normalize_min_max(&smoothed);
    let binary =
        adaptive_mean_threshold_inv(&normalized, config.block_size, config.threshold_offset);

    let cleaned = imageproc::morphology::open(
        &imageproc::morphology::close(&binary, Norm::L1, config.clean_radius),
        Norm::L1,
        config.clean_radius,
    );

    let regions = fill_regions_by_area(&cleaned, min_area, max_area);
    imageproc::morphology::open(&regions, Norm::LInf, config.line_removal_radius)
}

/// Fill every external contour of `binary` whose enclosed pixel count is
/// strictly inside `(min_area, max_area)`.
///
/// Only outermost borders are considered; holes and anything nested in
/// them are ignored, and a kept region is filled solid. A region's area
/// is the number of pixels its filled outline covers, boundary included.
#[must_use = "returns the filled region mask"]
pub fn fill_regions_by_area(binary: &GrayImage, min_area: f64, max_area: f64) -> GrayImage {
    let mut result = GrayImage::new(binary.width(), binary.height());
    let mut scratch = GrayImage::new(binary.width(), binary.height());
    let contours: Vec<Contour<i32>> = imageproc::contours::find_contours(binary);

    let mut kept = 0_usize;
    let mut external = 0_usize;
    for contour in contours
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
    {
        external += 1;
        let mut outline = contour.points;
        if outline.len() > 1 && outline.first() == outline.last() {
            outline.pop();
        }
        let Some(bounds) = Bounds::of(&outline) else {
            continue;
        };

        stamp_region(&mut scratch, &outline);
        let area = bounds.count(&scratch);
        #[allow(clippy::cast_precision_loss)]
        let keep = min_area < area as f64 && (area as f64) < max_area;
        bounds.drain(&mut scratch, keep.then_some(&mut result));
        if keep {
            kept += 1;
        }
    }

    tracing::debug!(external, kept, "area window applied");
    result
}

/// Fill the polygon traced by `outline` into `mask`.
///
/// Outlines of one or two pixels have no interior and are stamped
/// point by point.
fn stamp_region(mask: &mut GrayImage, outline: &[Point<i32>]) {
    if outline.len() < 3 {
        for p in outline {
            if let (Ok(x), Ok(y)) = (u32::try_from(p.x), u32::try_from(p.y)) {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
    } else {
        imageproc::drawing::draw_polygon_mut(mask, outline, Luma([255]));
    }
}

/// Inclusive bounding box of an outline, clipped to non-negative
/// coordinates.
#[derive(Debug, Clone, Copy)]
struct Bounds {
    x_lo: u32,
    x_hi: u32,
    y_lo: u32,
    y_hi: u32,
}

impl Bounds {
    fn of(outline: &[Point<i32>]) -> Option<Self> {
        let clip = |v: i32| u32::try_from(v.max(0)).unwrap_or(0);
        let x_lo = outline.iter().map(|p| p.x).min()?;
        let x_hi = outline.iter().map(|p| p.x).max()?;
        let y_lo = outline.iter().map(|p| p.y).min()?;
        let y_hi = outline.iter().map(|p| p.y).max()?;
        Some(Self {
            x_lo: clip(x_lo),
            x_hi: clip(x_hi),
            y_lo: clip(y_lo),
            y_hi: clip(y_hi),
        })
    }

    fn pixels(self) -> impl Iterator<Item = (u32, u32)> {
        (self.y_lo..=self.y_hi).flat_map(move |y| (self.x_lo..=self.x_hi).map(move |x| (x, y)))
    }

    /// Set pixels of `mask` inside the box.
    fn count(self, mask: &GrayImage) -> usize {
        self.pixels()
            .filter(|&(x, y)| mask.get_pixel(x, y).0[0] > 0)
            .count()
    }

    /// Clear the box in `scratch`, copying set pixels to `target` first.
    fn drain(self, scratch: &mut GrayImage, mut target: Option<&mut GrayImage>) {
        for (x, y) in self.pixels() {
            if scratch.get_pixel(x, y).0[0] > 0 {
                if let Some(target) = target.as_deref_mut() {
                    target.put_pixel(x, y, Luma([255]));
                }
                scratch.put_pixel(x, y, Luma([0]));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled_square(size: u32, x0: u32, y0: u32, side: u32) -> GrayImage {
        GrayImage::from_fn(size, size, |x, y| {
            if (x0..x0 + side).contains(&x) && (y0..y0 + side).contains(&y) {
                Luma([255])
            } else {
                Luma([0])
            }
        })
    }

    fn foreground(img: &GrayImage) -> usize {
        img.pixels().filter(|p| p.0[0] > 0).count()
    }

    #[test]
    fn square_inside_window_is_filled() {
        let binary = filled_square(20, 5, 5, 10);
        let result = fill_regions_by_area(&binary, 90.0, 110.0);
        assert_eq!(result, binary);
    }

    #[test]
    fn area_is_the_covered_pixel_count() {
        let binary = filled_square(20, 5, 5, 10);
        assert_eq!(foreground(&fill_regions_by_area(&binary, 99.0, 101.0)), 100);
    }

    #[test]
    fn bounds_are_exclusive() {
        let binary = filled_square(20, 5, 5, 10);
        assert_eq!(foreground(&fill_regions_by_area(&binary, 100.0, 200.0)), 0);
        assert_eq!(foreground(&fill_regions_by_area(&binary, 0.0, 100.0)), 0);
    }

    #[test]
    fn regions_are_judged_independently() {
        let mut binary = filled_square(40, 2, 2, 4);
        for y in 20..30 {
            for x in 20..30 {
                binary.put_pixel(x, y, Luma([255]));
            }
        }
        let result = fill_regions_by_area(&binary, 50.0, 150.0);
        assert_eq!(foreground(&result), 100);
        assert_eq!(result.get_pixel(3, 3).0[0], 0);
        assert_eq!(result.get_pixel(25, 25).0[0], 255);
    }

    #[test]
    fn ring_is_filled_solid() {
        let mut binary = filled_square(30, 5, 5, 20);
        for y in 10..20 {
            for x in 10..20 {
                binary.put_pixel(x, y, Luma([0]));
            }
        }
        let result = fill_regions_by_area(&binary, 1.0, 1000.0);
        assert_eq!(foreground(&result), 400);
        assert_eq!(result.get_pixel(15, 15).0[0], 255);
    }

    #[test]
    fn single_pixel_has_area_one() {
        let mut binary = GrayImage::new(10, 10);
        binary.put_pixel(3, 3, Luma([255]));
        assert_eq!(foreground(&fill_regions_by_area(&binary, 0.0, 2.0)), 1);
        assert_eq!(foreground(&fill_regions_by_area(&binary, 1.0, 2.0)), 0);
    }

    #[test]
    fn thin_line_counts_its_pixels() {
        let mut binary = GrayImage::new(12, 5);
        for x in 2..9 {
            binary.put_pixel(x, 2, Luma([255]));
        }
        assert_eq!(foreground(&fill_regions_by_area(&binary, 6.0, 8.0)), 7);
        assert_eq!(foreground(&fill_regions_by_area(&binary, 7.0, 8.0)), 0);
    }

    #[test]
    fn empty_window_yields_empty_mask() {
        let img = Gray16Image::from_fn(24, 24, |x, y| {
            if (8..16).contains(&x) && (8..16).contains(&y) {
                Luma([100])
            } else {
                Luma([4000])
            }
        });
        let config = AreaFilterConfig::default();
        for (lo, hi) in [(50.0, 50.0), (80.0, 10.0)] {
            let mask = eliminate_by_area(&img, lo, hi, &config);
            assert_eq!(mask.dimensions(), (24, 24));
            assert_eq!(foreground(&mask), 0);
        }
    }

    #[test]
    fn nan_bound_yields_empty_mask() {
        let img = Gray16Image::from_pixel(8, 8, Luma([10]));
        let mask = eliminate_by_area(&img, f64::NAN, 100.0, &AreaFilterConfig::default());
        assert_eq!(foreground(&mask), 0);
    }

    #[test]
    fn output_is_binary_and_same_size() {
        let img = Gray16Image::from_fn(40, 30, |x, y| {
            let dx = f64::from(x) - 20.0;
            let dy = f64::from(y) - 15.0;
            if dx.hypot(dy) < 8.0 {
                Luma([300])
            } else {
                Luma([2000])
            }
        });
        let config = AreaFilterConfig {
            mean_shift: crate::types::MeanShiftConfig {
                spatial_radius: 8,
                ..crate::types::MeanShiftConfig::default()
            },
            ..AreaFilterConfig::default()
        };
        let mask = eliminate_by_area(&img, 0.0, 10_000.0, &config);
        assert_eq!(mask.dimensions(), (40, 30));
        assert!(mask.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
        assert!(foreground(&mask) > 0);
    }
}
