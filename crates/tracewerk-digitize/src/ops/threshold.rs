// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Local-mean thresholding: box-mean (summed-area table) and Gaussian-weighted
// adaptive binarization, both producing inverted masks (dark ink = 255).

use image::{GrayImage, ImageBuffer, Luma};
use imageproc::filter::gaussian_blur_f32;
use imageproc::integral_image::{integral_image, sum_image_pixels};

/// Foreground value of every binary mask in this crate.
pub const FG: u8 = 255;

/// Mark pixels darker than the local box mean minus `c`.
///
/// `block_size` is the full window width; it is forced odd. Windows are
/// clipped at the image border rather than padded.
pub fn adaptive_mean_threshold_inv(gray: &GrayImage, block_size: u32, c: f64) -> GrayImage {
    let (width, height) = gray.dimensions();
    let sums = BoxSums::new(gray);
    let radius = block_size.max(3) / 2;

    GrayImage::from_fn(width, height, |x, y| {
        let value = gray.get_pixel(x, y).0[0] as f64;
        Luma([if value <= sums.window_mean(x, y, radius) - c { FG } else { 0 }])
    })
}

/// Mark pixels darker than the Gaussian-weighted local mean minus `c`.
pub fn adaptive_gaussian_threshold_inv(gray: &GrayImage, block_size: u32, c: f64) -> GrayImage {
    let local = gaussian_local_mean(gray, block_size);
    let (width, height) = gray.dimensions();
    GrayImage::from_fn(width, height, |x, y| {
        let value = gray.get_pixel(x, y).0[0] as f64;
        let mean = local.get_pixel(x, y).0[0] as f64;
        Luma([if value <= mean - c { FG } else { 0 }])
    })
}

/// Gaussian-weighted local mean with the sigma a `block_size` window implies,
/// rounded to 8 bits.
pub fn gaussian_local_mean(gray: &GrayImage, block_size: u32) -> GrayImage {
    gaussian_blur_f32(gray, sigma_for_block(block_size))
}

/// Sigma of a Gaussian kernel of `block_size` taps, as used by the usual
/// adaptive-threshold formulation.
pub fn sigma_for_block(block_size: u32) -> f32 {
    let k = block_size.max(3) as f32;
    0.3 * ((k - 1.0) * 0.5 - 1.0) + 0.8
}

/// Summed-area table for constant-time box means.
struct BoxSums {
    table: ImageBuffer<Luma<u64>, Vec<u64>>,
    width: u32,
    height: u32,
}

impl BoxSums {
    fn new(gray: &GrayImage) -> Self {
        Self {
            table: integral_image(gray),
            width: gray.width(),
            height: gray.height(),
        }
    }

    /// Mean over the `(2 * radius + 1)` square around `(x, y)`, clipped to
    /// the image.
    fn window_mean(&self, x: u32, y: u32, radius: u32) -> f64 {
        let left = x.saturating_sub(radius);
        let top = y.saturating_sub(radius);
        let right = x.saturating_add(radius).min(self.width - 1);
        let bottom = y.saturating_add(radius).min(self.height - 1);
        let [sum] = sum_image_pixels(&self.table, left, top, right, bottom);
        let count = (right - left + 1) as u64 * (bottom - top + 1) as u64;
        sum as f64 / count as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_mean_is_clipped_at_the_border() {
        let sums = BoxSums::new(&GrayImage::from_pixel(20, 10, Luma([77u8])));
        assert!((sums.window_mean(0, 0, 5) - 77.0).abs() < 1e-9);

        // Left half 0, right half 200.
        let split = GrayImage::from_fn(20, 10, |x, _| Luma([if x < 10 { 0 } else { 200 }]));
        let sums = BoxSums::new(&split);
        assert!((sums.window_mean(9, 5, 1) - 200.0 / 3.0).abs() < 1e-9);
        assert!((sums.window_mean(19, 9, 3) - 200.0).abs() < 1e-9);
        assert!((sums.window_mean(0, 0, 100) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn uniform_image_has_no_foreground() {
        let gray = GrayImage::from_pixel(30, 30, Luma([200u8]));
        let mask = adaptive_mean_threshold_inv(&gray, 11, 5.0);
        assert!(mask.pixels().all(|p| p.0[0] == 0));
        let mask = adaptive_gaussian_threshold_inv(&gray, 11, 5.0);
        assert!(mask.pixels().all(|p| p.0[0] == 0));
    }

    #[test]
    fn dark_line_on_white_is_foreground() {
        let mut gray = GrayImage::from_pixel(40, 40, Luma([250u8]));
        for x in 0..40 {
            gray.put_pixel(x, 20, Luma([20u8]));
        }
        for mask in [
            adaptive_mean_threshold_inv(&gray, 15, 10.0),
            adaptive_gaussian_threshold_inv(&gray, 15, 10.0),
        ] {
            assert_eq!(mask.get_pixel(20, 20).0[0], FG);
            assert_eq!(mask.get_pixel(20, 5).0[0], 0);
        }
    }

    #[test]
    fn sigma_grows_with_block() {
        assert!((sigma_for_block(3) - 0.8).abs() < 1e-6);
        assert!(sigma_for_block(31) > sigma_for_block(11));
    }
}
