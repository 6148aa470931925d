// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Resolution-scaled thresholds and kernel sizes.

use image::GrayImage;

/// Thresholds and kernel sizes scaled to the working image.
///
/// `scale = clamp(min(h, w) / base_resolution, 0.3, 3.0)`. Everything
/// derived from it is computed on demand; the struct never changes after
/// construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdaptiveParams {
    width: u32,
    height: u32,
    scale: f64,
}

impl AdaptiveParams {
    pub fn new(width: u32, height: u32, base_resolution: f64) -> Self {
        let shorter = width.min(height) as f64;
        let scale = (shorter / base_resolution).clamp(0.3, 3.0);
        Self {
            width,
            height,
            scale,
        }
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Canny `(low, high)` thresholds from the image's own median intensity.
    pub fn canny_thresholds(&self, gray: &GrayImage) -> (f32, f32) {
        let median = median_intensity(gray);
        let low = (0.66 * median).max(0.0).floor();
        let high = (1.33 * median).min(255.0).floor();
        (low as f32, high as f32)
    }

    /// Minimum Hough votes for a line.
    pub fn hough_threshold(&self) -> u32 {
        ((self.width as f64 * self.scale / 20.0) as u32).max(100)
    }

    /// Minimum length, in pixels, of a line worth measuring.
    pub fn hough_min_line_length(&self) -> u32 {
        ((self.width as f64 * self.scale / 6.0) as u32).max(50)
    }

    /// Odd window size of roughly `grid_px * multiplier`, never below 3.
    pub fn adaptive_block_size(&self, grid_px: f64, multiplier: f64) -> u32 {
        let block = ((grid_px * multiplier).max(0.0) as u32).max(3);
        if block % 2 == 1 { block } else { block + 1 }
    }

    /// Structuring-element length of roughly `grid_px * ratio`, never below 3.
    pub fn morphology_kernel_size(&self, grid_px: f64, ratio: f64) -> u32 {
        ((grid_px * ratio).max(0.0) as u32).max(3)
    }
}

/// Median of an 8-bit image, taken from its histogram.
pub fn median_intensity(gray: &GrayImage) -> f64 {
    let mut histogram = [0u64; 256];
    for p in gray.pixels() {
        histogram[p.0[0] as usize] += 1;
    }
    let total: u64 = histogram.iter().sum();
    if total == 0 {
        return 0.0;
    }

    // Average the two middle ranks for even counts.
    let lower_rank = (total - 1) / 2;
    let upper_rank = total / 2;
    let value_at = |rank: u64| -> f64 {
        let mut seen = 0u64;
        for (value, &count) in histogram.iter().enumerate() {
            seen += count;
            if seen > rank {
                return value as f64;
            }
        }
        255.0
    };
    (value_at(lower_rank) + value_at(upper_rank)) / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn scale_is_clamped() {
        assert_eq!(AdaptiveParams::new(100, 100, 1500.0).scale(), 0.3);
        assert_eq!(AdaptiveParams::new(10_000, 9_000, 1500.0).scale(), 3.0);
        assert!((AdaptiveParams::new(1500, 1000, 1500.0).scale() - 2.0 / 3.0).abs() < 1e-12);
    }

    /// Block sizes are odd and at least 3 for any positive cell size.
    #[test]
    fn block_size_is_odd_and_bounded() {
        let params = AdaptiveParams::new(1500, 1000, 1500.0);
        for i in 1..2000 {
            let px = i as f64 * 0.05;
            for multiplier in [1.0, 2.0, 2.5, 5.0] {
                let block = params.adaptive_block_size(px, multiplier);
                assert!(block >= 3, "px {} -> {}", px, block);
                assert_eq!(block % 2, 1, "px {} -> {}", px, block);
            }
        }
    }

    #[test]
    fn hough_limits_have_floors() {
        let small = AdaptiveParams::new(600, 400, 1500.0);
        assert_eq!(small.hough_threshold(), 100);
        assert_eq!(small.hough_min_line_length(), 50);
        let large = AdaptiveParams::new(6000, 4500, 1500.0);
        assert_eq!(large.hough_threshold(), 900);
        assert_eq!(large.hough_min_line_length(), 3000);
    }

    #[test]
    fn canny_thresholds_follow_median() {
        let gray = GrayImage::from_pixel(10, 10, Luma([100u8]));
        let params = AdaptiveParams::new(10, 10, 1500.0);
        assert_eq!(params.canny_thresholds(&gray), (66.0, 133.0));
        let bright = GrayImage::from_pixel(10, 10, Luma([250u8]));
        assert_eq!(params.canny_thresholds(&bright), (165.0, 255.0));
    }

    #[test]
    fn median_of_two_values_averages() {
        let gray = GrayImage::from_fn(2, 1, |x, _| Luma([if x == 0 { 10 } else { 20 }]));
        assert_eq!(median_intensity(&gray), 15.0);
    }
}
