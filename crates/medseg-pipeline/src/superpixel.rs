//! SLICO superpixel decomposition.
//!
//! Zero-parameter SLIC: seeds are laid on a grid with step
//! `region_size`, nudged to the lowest-gradient pixel in their 3 × 3
//! neighbourhood, then refined for a fixed number of rounds. Each round
//! assigns every pixel to the closest seed within a `2 · region_size`
//! window, where closeness combines color and position as
//!
//! ```text
//! d = dc² / maxc[k] + ds² / region_size²
//! ```
//!
//! and `maxc[k]` is the largest color distance seen inside cluster `k` in
//! the previous round. Adapting `maxc` per cluster replaces the fixed
//! compactness weight of plain SLIC. Seeds then move to the mean color
//! and position of their pixels.
//!
//! Colors are compared in the image's own RGB space; no color
//! conversion is applied.

use image::{Luma, Rgb, RgbImage};

use crate::types::{Dimensions, LabelImage, SuperpixelConfig, Superpixels};

/// Initial per-cluster color normaliser.
const INITIAL_MAX_COLOR_DIST: f32 = 100.0;

#[derive(Debug, Clone, Copy)]
struct Seed {
    color: [f32; 3],
    x: f32,
    y: f32,
}

/// Decompose `image` into superpixels.
///
/// Labels in the returned map are contiguous in `0..count`, and
/// `means[k]` is the per-channel mean color of the pixels labelled `k`.
/// Identifiers carry no meaning across different images.
#[must_use = "returns the superpixel decomposition"]
pub fn slico(image: &RgbImage, config: &SuperpixelConfig) -> Superpixels {
    let dims = Dimensions::of(image);
    let Dimensions { width, height } = dims;
    let _span = tracing::debug_span!("slico", width, height).entered();

    if dims.area() == 0 {
        return Superpixels {
            means: Vec::new(),
            labels: LabelImage::new(width, height),
        };
    }

    let step = config.region_size.max(1);
    let pixels = to_f32(image);
    let mut seeds = grid_seeds(&pixels, width, height, step);
    let labels = iterate(&pixels, width, height, step, config.iterations, &mut seeds);

    let result = compact(image, &labels, seeds.len());
    tracing::debug!(
        seeds = seeds.len(),
        superpixels = result.count(),
        "superpixels computed"
    );
    result
}

/// Paint every pixel with the mean color of its superpixel.
#[must_use = "returns the rendered image"]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn render_means(superpixels: &Superpixels) -> RgbImage {
    let labels = &superpixels.labels;
    RgbImage::from_fn(labels.width(), labels.height(), |x, y| {
        let mean = superpixels.means[labels.get_pixel(x, y).0[0] as usize];
        Rgb(mean.map(|c| c.round().clamp(0.0, 255.0) as u8))
    })
}

fn to_f32(image: &RgbImage) -> Vec<[f32; 3]> {
    image
        .pixels()
        .map(|p| p.0.map(f32::from))
        .collect()
}

fn color_dist_sq(a: [f32; 3], b: [f32; 3]) -> f32 {
    (0..3).map(|k| (a[k] - b[k]) * (a[k] - b[k])).sum()
}

/// Place seeds on a regular grid, spreading the leftover pixels evenly
/// between strips, then move each to its lowest-gradient neighbour.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn grid_seeds(pixels: &[[f32; 3]], width: u32, height: u32, step: u32) -> Vec<Seed> {
    let strips = |extent: u32| ((extent as f32 / step as f32) + 0.5).max(1.0) as u32;
    let (x_strips, y_strips) = (strips(width), strips(height));
    let x_err = (i64::from(width) - i64::from(step * x_strips)) as f32 / x_strips as f32;
    let y_err = (i64::from(height) - i64::from(step * y_strips)) as f32 / y_strips as f32;
    let offset = (step / 2) as f32;

    let gradient = gradient_magnitude(pixels, width, height);
    let index = |x: u32, y: u32| (y * width + x) as usize;

    let mut seeds = Vec::with_capacity((x_strips * y_strips) as usize);
    for sy in 0..y_strips {
        for sx in 0..x_strips {
            let gx = (sx as f32).mul_add(step as f32, offset + sx as f32 * x_err);
            let gy = (sy as f32).mul_add(step as f32, offset + sy as f32 * y_err);
            let mut x = (gx.max(0.0) as u32).min(width - 1);
            let mut y = (gy.max(0.0) as u32).min(height - 1);

            let (cx, cy) = (x, y);
            for ny in cy.saturating_sub(1)..=(cy + 1).min(height - 1) {
                for nx in cx.saturating_sub(1)..=(cx + 1).min(width - 1) {
                    if gradient[index(nx, ny)] < gradient[index(x, y)] {
                        x = nx;
                        y = ny;
                    }
                }
            }

            seeds.push(Seed {
                color: pixels[index(x, y)],
                x: x as f32,
                y: y as f32,
            });
        }
    }
    seeds
}

/// Central-difference gradient magnitude summed over channels.
/// Border pixels get `f32::MAX` so seeds never move onto them.
fn gradient_magnitude(pixels: &[[f32; 3]], width: u32, height: u32) -> Vec<f32> {
    let (w, h) = (width as usize, height as usize);
    let mut gradient = vec![f32::MAX; w * h];
    for y in 1..h.saturating_sub(1) {
        for x in 1..w.saturating_sub(1) {
            let i = y * w + x;
            gradient[i] = color_dist_sq(pixels[i - 1], pixels[i + 1])
                + color_dist_sq(pixels[i - w], pixels[i + w]);
        }
    }
    gradient
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn iterate(
    pixels: &[[f32; 3]],
    width: u32,
    height: u32,
    step: u32,
    iterations: u32,
    seeds: &mut [Seed],
) -> Vec<u32> {
    let (w, h) = (width as usize, height as usize);
    let s = step as f32;
    let spatial_weight = 1.0 / (s * s);

    let mut labels = vec![0_u32; w * h];
    let mut best = vec![f32::MAX; w * h];
    let mut color_dist = vec![0.0_f32; w * h];
    let mut max_color = vec![INITIAL_MAX_COLOR_DIST; seeds.len()];

    for round in 0..iterations {
        best.fill(f32::MAX);

        for (k, seed) in seeds.iter().enumerate() {
            let x_lo = (seed.x - s).max(0.0) as usize;
            let x_hi = ((seed.x + s).max(0.0) as usize).min(w - 1);
            let y_lo = (seed.y - s).max(0.0) as usize;
            let y_hi = ((seed.y + s).max(0.0) as usize).min(h - 1);

            for y in y_lo..=y_hi {
                for x in x_lo..=x_hi {
                    let i = y * w + x;
                    let dc = color_dist_sq(pixels[i], seed.color);
                    let dx = x as f32 - seed.x;
                    let dy = y as f32 - seed.y;
                    let dist = dc / max_color[k] + dx.mul_add(dx, dy * dy) * spatial_weight;
                    if dist < best[i] {
                        best[i] = dist;
                        labels[i] = k as u32;
                        color_dist[i] = dc;
                    }
                }
            }
        }

        // Pixels no window reached keep last round's label but contribute
        // their distance to it.
        for (i, &label) in labels.iter().enumerate() {
            if best[i] == f32::MAX {
                color_dist[i] = color_dist_sq(pixels[i], seeds[label as usize].color);
            }
        }

        if round == 0 {
            max_color.fill(1.0);
        }
        for (&label, &dc) in labels.iter().zip(&color_dist) {
            let slot = &mut max_color[label as usize];
            if *slot < dc {
                *slot = dc;
            }
        }

        update_seeds(pixels, w, &labels, seeds);
    }

    if iterations == 0 {
        assign_nearest(w, h, seeds, &mut labels);
    }
    labels
}

/// Move every non-empty seed to the mean color and position of its pixels.
#[allow(clippy::cast_precision_loss)]
fn update_seeds(pixels: &[[f32; 3]], width: usize, labels: &[u32], seeds: &mut [Seed]) {
    let mut sums = vec![[0.0_f64; 5]; seeds.len()];
    let mut counts = vec![0_u64; seeds.len()];

    for (i, (&label, color)) in labels.iter().zip(pixels).enumerate() {
        let k = label as usize;
        let acc = &mut sums[k];
        for c in 0..3 {
            acc[c] += f64::from(color[c]);
        }
        acc[3] += (i % width) as f64;
        acc[4] += (i / width) as f64;
        counts[k] += 1;
    }

    for ((seed, acc), &count) in seeds.iter_mut().zip(&sums).zip(&counts) {
        if count == 0 {
            continue;
        }
        let n = count as f64;
        #[allow(clippy::cast_possible_truncation)]
        {
            seed.color = [
                (acc[0] / n) as f32,
                (acc[1] / n) as f32,
                (acc[2] / n) as f32,
            ];
            seed.x = (acc[3] / n) as f32;
            seed.y = (acc[4] / n) as f32;
        }
    }
}

/// Spatial nearest-seed labelling, used when no refinement round runs.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn assign_nearest(width: usize, height: usize, seeds: &[Seed], labels: &mut [u32]) {
    for y in 0..height {
        for x in 0..width {
            let nearest = seeds
                .iter()
                .enumerate()
                .map(|(k, s)| {
                    let dx = x as f32 - s.x;
                    let dy = y as f32 - s.y;
                    (k, dx.mul_add(dx, dy * dy))
                })
                .min_by(|a, b| a.1.total_cmp(&b.1))
                .map_or(0, |(k, _)| k);
            labels[y * width + x] = nearest as u32;
        }
    }
}

/// Drop empty clusters, renumber labels densely, and compute the mean
/// color of every remaining superpixel from the original image.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn compact(image: &RgbImage, assignment: &[u32], seed_count: usize) -> Superpixels {
    let mut sums = vec![[0.0_f64; 3]; seed_count];
    let mut counts = vec![0_u64; seed_count];
    for (&label, pixel) in assignment.iter().zip(image.pixels()) {
        let k = label as usize;
        for c in 0..3 {
            sums[k][c] += f64::from(pixel.0[c]);
        }
        counts[k] += 1;
    }

    let mut remap = vec![u32::MAX; seed_count];
    let mut means = Vec::with_capacity(seed_count);
    for (k, (&count, sum)) in counts.iter().zip(&sums).enumerate() {
        if count > 0 {
            remap[k] = means.len() as u32;
            let n = count as f64;
            means.push([sum[0] / n, sum[1] / n, sum[2] / n]);
        }
    }

    let width = image.width();
    let labels = LabelImage::from_fn(width, image.height(), |x, y| {
        Luma([remap[assignment[(y * width + x) as usize] as usize]])
    });

    Superpixels { means, labels }
}
