//! Luminance histogram and brightness sampling.
//!
//! Pure numeric functions over a decoded frame. Large frames are visited
//! with a pixel stride so that at most `pixel_budget` pixels are read.
//!
//! # Similarity
//! Histogram intersection over normalized histograms:
//! `sum(min(h1[i], h2[i]))`, in [0, 1] where 1 = identical distributions.

use image::RgbImage;

/// Number of luminance bins.
pub const HISTOGRAM_BINS: usize = 256;

/// Default maximum number of pixels visited per frame.
pub const DEFAULT_PIXEL_BUDGET: usize = 16_384;

/// Normalized 256-bin luminance histogram (bins sum to 1.0, or 0.0 when empty).
pub type LuminanceHistogram = [f32; HISTOGRAM_BINS];

/// Rec.601 luma of an RGB triple.
#[inline]
pub fn luma(r: u8, g: u8, b: u8) -> u8 {
    ((r as u32 * 299 + g as u32 * 587 + b as u32 * 114) / 1000) as u8
}

/// Stride that keeps the number of visited pixels within `pixel_budget`.
pub fn pixel_stride(pixel_count: usize, pixel_budget: usize) -> usize {
    let budget = pixel_budget.max(1);
    pixel_count.div_ceil(budget).max(1)
}

/// Histogram and brightness of one frame, computed in a single pass.
#[derive(Debug, Clone)]
pub struct FrameSignature {
    pub histogram: LuminanceHistogram,
    /// Mean luma (0.0-1.0)
    pub brightness: f32,
    /// Pixels actually visited
    pub sampled_pixels: usize,
}

impl FrameSignature {
    pub fn compute(image: &RgbImage, pixel_budget: usize) -> Self {
        let pixel_count = (image.width() as usize) * (image.height() as usize);
        let stride = pixel_stride(pixel_count, pixel_budget);

        let mut counts = [0u32; HISTOGRAM_BINS];
        let mut luma_sum = 0u64;
        let mut sampled = 0usize;

        for px in image.as_raw().chunks_exact(3).step_by(stride) {
            let y = luma(px[0], px[1], px[2]);
            counts[y as usize] += 1;
            luma_sum += y as u64;
            sampled += 1;
        }

        let mut histogram = [0.0f32; HISTOGRAM_BINS];
        if sampled > 0 {
            let total = sampled as f32;
            for (bin, count) in histogram.iter_mut().zip(counts.iter()) {
                *bin = *count as f32 / total;
            }
        }

        let brightness = if sampled > 0 {
            (luma_sum as f64 / sampled as f64 / 255.0) as f32
        } else {
            0.0
        };

        Self {
            histogram,
            brightness,
            sampled_pixels: sampled,
        }
    }

    /// Similarity to another frame's signature.
    pub fn similarity(&self, other: &FrameSignature) -> f32 {
        histogram_intersection(&self.histogram, &other.histogram)
    }
}

/// Normalized luminance histogram of a frame.
pub fn luminance_histogram(image: &RgbImage, pixel_budget: usize) -> LuminanceHistogram {
    FrameSignature::compute(image, pixel_budget).histogram
}

/// Mean luminance of a frame, in [0, 1].
pub fn average_brightness(image: &RgbImage, pixel_budget: usize) -> f32 {
    FrameSignature::compute(image, pixel_budget).brightness
}

/// Histogram intersection of two normalized histograms, in [0, 1].
pub fn histogram_intersection(h1: &LuminanceHistogram, h2: &LuminanceHistogram) -> f32 {
    let intersection: f32 = h1.iter().zip(h2.iter()).map(|(a, b)| a.min(*b)).sum();
    intersection.clamp(0.0, 1.0)
}
