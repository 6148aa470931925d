// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Synthetic strips and masks for unit tests.

use image::{GrayImage, Luma, Rgb, RgbImage};

use crate::ops::FG;
use crate::raster::RasterImage;

pub const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
pub const PINK_GRID: Rgb<u8> = Rgb([235, 185, 185]);
pub const RED_INK: Rgb<u8> = Rgb([220, 30, 30]);

/// White page with 2px black rules every 30 rows. Positive `tilt_deg`
/// makes the rules descend to the right.
pub fn ruled_page(width: u32, height: u32, tilt_deg: f64) -> RasterImage {
    let slope = tilt_deg.to_radians().tan();
    let cx = width as f64 / 2.0;
    let mut rgb = RgbImage::from_pixel(width, height, WHITE);
    let mut y0 = -90.0;
    while y0 < height as f64 + 90.0 {
        for x in 0..width {
            let y = (y0 + (x as f64 - cx) * slope).round() as i64;
            for yy in y..y + 2 {
                if yy >= 0 && yy < height as i64 {
                    rgb.put_pixel(x, yy as u32, Rgb([0, 0, 0]));
                }
            }
        }
        y0 += 30.0;
    }
    RasterImage::from_rgb(rgb)
}

/// White page with 1px grid lines of `color` every `spacing` pixels.
pub fn grid_paper(width: u32, height: u32, spacing: u32, color: Rgb<u8>) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        if x % spacing == 0 || y % spacing == 0 { color } else { WHITE }
    })
}

/// Vertical centre of the trace at column `x` for a sine of `periods` full
/// cycles across `width`, centred on `center_y` with the given peak-to-peak
/// height.
pub fn sine_y(x: f64, width: u32, center_y: f64, peak_to_peak: f64, periods: f64) -> f64 {
    let phase = 2.0 * std::f64::consts::PI * periods * x / width as f64;
    center_y - peak_to_peak / 2.0 * phase.sin()
}

/// Paint a roughly 3px-thick curve: each column is filled between the curve
/// heights at `x` and `x + 1`, widened by one pixel on each side.
pub fn draw_thick_curve(width: u32, height: u32, mut put: impl FnMut(u32, u32), curve: impl Fn(f64) -> f64) {
    for x in 0..width {
        let a = curve(x as f64).round() as i64;
        let b = curve(x as f64 + 1.0).round() as i64;
        let (lo, hi) = (a.min(b) - 1, a.max(b) + 1);
        for y in lo..=hi {
            if y >= 0 && y < height as i64 {
                put(x, y as u32);
            }
        }
    }
}

/// Standard test strip: 10px pink grid and a red three-period sine, 100px
/// peak to peak, centred vertically.
pub fn ecg_strip(width: u32, height: u32) -> RasterImage {
    ecg_strip_leads(width, height, &[height as f64 / 2.0], 100.0)
}

/// 10px pink grid with one red three-period sine per entry of `centers`.
pub fn ecg_strip_leads(width: u32, height: u32, centers: &[f64], peak_to_peak: f64) -> RasterImage {
    let mut rgb = grid_paper(width, height, 10, PINK_GRID);
    for &center in centers {
        draw_thick_curve(
            width,
            height,
            |x, y| rgb.put_pixel(x, y, RED_INK),
            |x| sine_y(x, width, center, peak_to_peak, 3.0),
        );
    }
    RasterImage::from_rgb(rgb)
}

/// Binary mask holding one thick sine per entry of `centers`.
pub fn sine_mask(width: u32, height: u32, centers: &[f64], peak_to_peak: f64, periods: f64) -> GrayImage {
    let mut mask = GrayImage::new(width, height);
    for &center in centers {
        draw_thick_curve(
            width,
            height,
            |x, y| mask.put_pixel(x, y, Luma([FG])),
            |x| sine_y(x, width, center, peak_to_peak, periods),
        );
    }
    mask
}
