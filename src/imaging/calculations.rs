//! Pure functions for resize geometry and pixel statistics.
//!
//! Nothing here touches an image decoder; every function takes dimensions or
//! raw interleaved samples so it can be unit tested with tiny literals.

use super::backend::{ChannelStats, Dominant};
use super::params::{Fit, ResizeParams};

/// What the engine must do to satisfy a [`ResizeParams`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizePlan {
    /// Leave the image untouched.
    Keep,
    /// Resample to exactly these dimensions.
    Exact { width: u32, height: u32 },
    /// Scale to cover the box, then centre-crop to it.
    CoverCrop { width: u32, height: u32 },
    /// Scale to `inner`, then letterbox onto a `width`×`height` canvas.
    Letterbox {
        width: u32,
        height: u32,
        inner: (u32, u32),
    },
}

fn scaled(value: u32, scale: f64) -> u32 {
    ((value as f64 * scale).round() as u32).max(1)
}

/// Largest size with the original aspect that fits inside `bounds`.
pub fn fit_within(original: (u32, u32), bounds: (u32, u32)) -> (u32, u32) {
    let scale = f64::min(
        bounds.0 as f64 / original.0 as f64,
        bounds.1 as f64 / original.1 as f64,
    );
    (scaled(original.0, scale), scaled(original.1, scale))
}

/// Smallest size with the original aspect that covers `bounds`.
pub fn fit_outside(original: (u32, u32), bounds: (u32, u32)) -> (u32, u32) {
    let scale = f64::max(
        bounds.0 as f64 / original.0 as f64,
        bounds.1 as f64 / original.1 as f64,
    );
    (scaled(original.0, scale), scaled(original.1, scale))
}

/// Resolve a resize request against the source dimensions.
///
/// A single edge scales the other to keep the aspect ratio; `fit` only
/// applies when both edges are given.
pub fn plan_resize(original: (u32, u32), params: &ResizeParams) -> ResizePlan {
    let (ow, oh) = original;
    if ow == 0 || oh == 0 {
        return ResizePlan::Keep;
    }

    let (width, height) = match (params.width, params.height) {
        (None, None) => return ResizePlan::Keep,
        (Some(w), None) => (w, scaled(oh, w as f64 / ow as f64)),
        (None, Some(h)) => (scaled(ow, h as f64 / oh as f64), h),
        (Some(w), Some(h)) => (w, h),
    };

    if params.without_enlargement && ow <= width && oh <= height {
        return ResizePlan::Keep;
    }

    if params.width.is_none() || params.height.is_none() {
        return ResizePlan::Exact { width, height };
    }

    match params.fit {
        Fit::Fill => ResizePlan::Exact { width, height },
        Fit::Cover => ResizePlan::CoverCrop { width, height },
        Fit::Inside => {
            let (width, height) = fit_within(original, (width, height));
            ResizePlan::Exact { width, height }
        }
        Fit::Outside => {
            let (width, height) = fit_outside(original, (width, height));
            ResizePlan::Exact { width, height }
        }
        Fit::Contain => ResizePlan::Letterbox {
            width,
            height,
            inner: fit_within(original, (width, height)),
        },
    }
}

/// Canvas that holds `original` rotated by `degrees` without clipping.
pub fn rotated_bounds(original: (u32, u32), degrees: i64) -> (u32, u32) {
    let (w, h) = (original.0 as f64, original.1 as f64);
    let radians = (degrees.rem_euclid(360) as f64).to_radians();
    let (sin, cos) = (radians.sin().abs(), radians.cos().abs());
    // tolerance keeps float noise at right angles from adding a pixel
    let edge = |v: f64| ((v - 1e-6).ceil() as u32).max(1);
    (edge(w * cos + h * sin), edge(w * sin + h * cos))
}

/// Per-channel statistics of interleaved 8-bit samples.
///
/// `stdev` is the sample standard deviation. Min/max coordinates are those of
/// the first pixel holding the extreme value in row-major order.
pub fn channel_stats(samples: &[u8], width: u32, channels: usize) -> Vec<ChannelStats> {
    let width = width.max(1) as usize;
    let pixel_count = samples.len() / channels.max(1);

    (0..channels)
        .map(|channel| {
            let mut min = u8::MAX;
            let mut max = u8::MIN;
            let (mut min_at, mut max_at) = (0usize, 0usize);
            let mut sum = 0f64;
            let mut squares_sum = 0f64;

            for (index, pixel) in samples.chunks_exact(channels).enumerate() {
                let v = pixel[channel];
                if v < min {
                    min = v;
                    min_at = index;
                }
                if v > max {
                    max = v;
                    max_at = index;
                }
                let f = v as f64;
                sum += f;
                squares_sum += f * f;
            }

            if pixel_count == 0 {
                min = 0;
            }
            let n = pixel_count as f64;
            let mean = if pixel_count > 0 { sum / n } else { 0.0 };
            let stdev = if pixel_count > 1 {
                ((squares_sum - sum * sum / n) / (n - 1.0)).max(0.0).sqrt()
            } else {
                0.0
            };

            ChannelStats {
                min,
                max,
                sum,
                squares_sum,
                mean,
                stdev,
                min_x: (min_at % width) as u32,
                min_y: (min_at / width) as u32,
                max_x: (max_at % width) as u32,
                max_y: (max_at / width) as u32,
            }
        })
        .collect()
}

/// Shannon entropy (bits) of a greyscale sample histogram.
pub fn entropy(luma: &[u8]) -> f64 {
    if luma.is_empty() {
        return 0.0;
    }
    let mut histogram = [0u64; 256];
    for &v in luma {
        histogram[v as usize] += 1;
    }
    let total = luma.len() as f64;
    histogram
        .iter()
        .filter(|&&count| count > 0)
        .map(|&count| {
            let p = count as f64 / total;
            -p * p.log2()
        })
        .sum()
}

/// Most frequent colour in a 16×16×16 RGB histogram, reported at bin centres.
pub fn dominant_color(rgb: &[u8]) -> Dominant {
    let mut histogram = vec![0u32; 4096];
    for pixel in rgb.chunks_exact(3) {
        let bin = ((pixel[0] as usize >> 4) << 8) | ((pixel[1] as usize >> 4) << 4) | (pixel[2] as usize >> 4);
        histogram[bin] += 1;
    }
    // first bin wins ties
    let (bin, _) = histogram
        .iter()
        .enumerate()
        .fold((0usize, 0u32), |best, (bin, &count)| {
            if count > best.1 { (bin, count) } else { best }
        });
    let centre = |level: usize| (level * 16 + 8) as u8;
    Dominant {
        r: centre((bin >> 8) & 0xF),
        g: centre((bin >> 4) & 0xF),
        b: centre(bin & 0xF),
    }
}
