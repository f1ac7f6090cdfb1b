//! Heuristic image quality score.
//!
//! Four raw measurements on the grayscale image, each mapped into `[0, 1]` by
//! a fixed denominator, then weighted:
//!
//! | metric    | raw measurement                            | scale | weight |
//! |-----------|--------------------------------------------|-------|--------|
//! | sharpness | variance of the Laplacian response         | 1000  | 0.3    |
//! | contrast  | standard deviation of intensities          | 100   | 0.2    |
//! | detail    | mean Canny edge map (thresholds 100 / 200) | 50    | 0.3    |
//! | noise     | mean abs difference to a denoised copy     | 30    | 0.2    |
//!
//! Noise is inverted. The scales only make scores comparable within one
//! selection; they are not calibrated across runs.

use image::{DynamicImage, GrayImage};
use imageproc::edges::canny;
use imageproc::filter::{laplacian_filter, median_filter};
use serde::Serialize;
use tracing::debug;

pub const SHARPNESS_WEIGHT: f64 = 0.3;
pub const CONTRAST_WEIGHT: f64 = 0.2;
pub const DETAIL_WEIGHT: f64 = 0.3;
pub const NOISE_WEIGHT: f64 = 0.2;

const SHARPNESS_SCALE: f64 = 1000.0;
const CONTRAST_SCALE: f64 = 100.0;
const DETAIL_SCALE: f64 = 50.0;
const NOISE_SCALE: f64 = 30.0;

const CANNY_LOW: f32 = 100.0;
const CANNY_HIGH: f32 = 200.0;
const DENOISE_RADIUS: u32 = 1;

// The 3x3 filters need at least one interior pixel.
const MIN_SIDE: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QualityMetrics {
    pub sharpness: f64,
    pub contrast: f64,
    pub detail: f64,
    pub noise: f64,
}

/// Per-metric contributions after normalization, noise already inverted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NormalizedMetrics {
    pub sharpness: f64,
    pub contrast: f64,
    pub detail: f64,
    pub noise_penalty: f64,
}

impl QualityMetrics {
    /// Raw measurements, or `None` when the image is too small to measure.
    pub fn measure(image: &DynamicImage) -> Option<Self> {
        let gray = image.to_luma8();
        if gray.width() < MIN_SIDE || gray.height() < MIN_SIDE {
            return None;
        }
        let metrics = Self {
            sharpness: laplacian_variance(&gray),
            contrast: intensity_std_dev(&gray),
            detail: mean_intensity(&canny(&gray, CANNY_LOW, CANNY_HIGH)),
            noise: mean_abs_difference(
                &gray,
                &median_filter(&gray, DENOISE_RADIUS, DENOISE_RADIUS),
            ),
        };
        let finite = [
            metrics.sharpness,
            metrics.contrast,
            metrics.detail,
            metrics.noise,
        ]
        .iter()
        .all(|value| value.is_finite());
        finite.then_some(metrics)
    }

    pub fn normalized(&self) -> NormalizedMetrics {
        NormalizedMetrics {
            sharpness: unit(self.sharpness / SHARPNESS_SCALE),
            contrast: unit(self.contrast / CONTRAST_SCALE),
            detail: unit(self.detail / DETAIL_SCALE),
            noise_penalty: 1.0 - unit(self.noise / NOISE_SCALE),
        }
    }

    pub fn score(&self) -> f64 {
        let n = self.normalized();
        let total = n.sharpness * SHARPNESS_WEIGHT
            + n.contrast * CONTRAST_WEIGHT
            + n.detail * DETAIL_WEIGHT
            + n.noise_penalty * NOISE_WEIGHT;
        total.clamp(0.0, 1.0)
    }
}

/// Quality score in `[0, 1]`; unmeasurable images score `0.0`.
pub fn score_image(image: &DynamicImage) -> f64 {
    match QualityMetrics::measure(image) {
        Some(metrics) => metrics.score(),
        None => {
            debug!(
                width = image.width(),
                height = image.height(),
                "image too small to score"
            );
            0.0
        }
    }
}

/// Decodes and scores encoded image bytes; anything undecodable scores `0.0`.
pub fn score_bytes(bytes: &[u8]) -> f64 {
    match image::load_from_memory(bytes) {
        Ok(image) => score_image(&image),
        Err(err) => {
            debug!(error = %err, bytes = bytes.len(), "image decode failed, scoring 0.0");
            0.0
        }
    }
}

fn unit(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}

fn laplacian_variance(gray: &GrayImage) -> f64 {
    let response = laplacian_filter(gray);
    let (sum, sum_sq, count) = response.pixels().fold((0.0f64, 0.0f64, 0u64), |acc, px| {
        let value = f64::from(px.0[0]);
        (acc.0 + value, acc.1 + value * value, acc.2 + 1)
    });
    variance(sum, sum_sq, count)
}

fn intensity_std_dev(gray: &GrayImage) -> f64 {
    let (sum, sum_sq, count) = gray.pixels().fold((0.0f64, 0.0f64, 0u64), |acc, px| {
        let value = f64::from(px.0[0]);
        (acc.0 + value, acc.1 + value * value, acc.2 + 1)
    });
    variance(sum, sum_sq, count).sqrt()
}

fn pixel_count(gray: &GrayImage) -> usize {
    gray.width() as usize * gray.height() as usize
}

fn mean_intensity(gray: &GrayImage) -> f64 {
    let count = pixel_count(gray);
    if count == 0 {
        return 0.0;
    }
    gray.pixels().map(|px| f64::from(px.0[0])).sum::<f64>() / count as f64
}

fn mean_abs_difference(a: &GrayImage, b: &GrayImage) -> f64 {
    let count = pixel_count(a);
    if count == 0 {
        return 0.0;
    }
    a.pixels()
        .zip(b.pixels())
        .map(|(left, right)| f64::from(left.0[0].abs_diff(right.0[0])))
        .sum::<f64>()
        / count as f64
}

fn variance(sum: f64, sum_sq: f64, count: u64) -> f64 {
    if count == 0 {
        return 0.0;
    }
    let mean = sum / count as f64;
    (sum_sq / count as f64 - mean * mean).max(0.0)
}
