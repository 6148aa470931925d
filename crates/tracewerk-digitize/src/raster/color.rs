// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Colour-space helpers: BT.601 luma and 8-bit HSV planes.

use image::{GrayImage, Luma, RgbImage};

/// BT.601 luma of an RGB image, rounded to the nearest integer.
pub fn luma(rgb: &RgbImage) -> GrayImage {
    let (w, h) = rgb.dimensions();
    GrayImage::from_fn(w, h, |x, y| {
        let [r, g, b] = rgb.get_pixel(x, y).0;
        Luma([luma_of(r, g, b)])
    })
}

#[inline]
pub fn luma_of(r: u8, g: u8, b: u8) -> u8 {
    (0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64)
        .round()
        .clamp(0.0, 255.0) as u8
}

/// Convert one pixel to 8-bit HSV: hue in `0..180`, saturation and value in
/// `0..=255`.
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> (u8, u8, u8) {
    let (rf, gf, bf) = (r as f64, g as f64, b as f64);
    let v = rf.max(gf).max(bf);
    let min = rf.min(gf).min(bf);
    let delta = v - min;

    let s = if v > 0.0 { delta * 255.0 / v } else { 0.0 };

    let h = if delta == 0.0 {
        0.0
    } else if v == rf {
        60.0 * (gf - bf) / delta
    } else if v == gf {
        120.0 + 60.0 * (bf - rf) / delta
    } else {
        240.0 + 60.0 * (rf - gf) / delta
    };
    let h = if h < 0.0 { h + 360.0 } else { h };

    (
        ((h / 2.0).round() as u32 % 180) as u8,
        s.round().clamp(0.0, 255.0) as u8,
        v as u8,
    )
}

/// Hue, saturation and value as separate single-channel images.
#[derive(Debug, Clone)]
pub struct HsvPlanes {
    pub hue: GrayImage,
    pub saturation: GrayImage,
    pub value: GrayImage,
}

impl HsvPlanes {
    pub fn from_rgb(rgb: &RgbImage) -> Self {
        let (w, h) = rgb.dimensions();
        let mut hue = GrayImage::new(w, h);
        let mut saturation = GrayImage::new(w, h);
        let mut value = GrayImage::new(w, h);
        for (x, y, px) in rgb.enumerate_pixels() {
            let [r, g, b] = px.0;
            let (hh, ss, vv) = rgb_to_hsv(r, g, b);
            hue.put_pixel(x, y, Luma([hh]));
            saturation.put_pixel(x, y, Luma([ss]));
            value.put_pixel(x, y, Luma([vv]));
        }
        Self {
            hue,
            saturation,
            value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primaries() {
        assert_eq!(rgb_to_hsv(255, 0, 0), (0, 255, 255));
        assert_eq!(rgb_to_hsv(0, 255, 0), (60, 255, 255));
        assert_eq!(rgb_to_hsv(0, 0, 255), (120, 255, 255));
    }

    #[test]
    fn grays_have_no_saturation() {
        assert_eq!(rgb_to_hsv(0, 0, 0), (0, 0, 0));
        assert_eq!(rgb_to_hsv(128, 128, 128), (0, 0, 128));
    }

    #[test]
    fn pale_pink_grid_is_bright_and_weakly_saturated() {
        let (_, s, v) = rgb_to_hsv(235, 185, 185);
        assert_eq!(v, 235);
        assert!(s < 80, "saturation {}", s);
    }

    #[test]
    fn luma_weights() {
        assert_eq!(luma_of(255, 255, 255), 255);
        assert_eq!(luma_of(0, 0, 0), 0);
        assert_eq!(luma_of(255, 0, 0), 76);
    }
}
