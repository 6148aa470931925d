// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Contrast-limited adaptive histogram equalization (CLAHE).

use image::{GrayImage, Luma, Rgb, RgbImage};

use crate::raster::color::luma;

/// Tile grid and clip limit for CLAHE.
#[derive(Debug, Clone, Copy)]
pub struct ClaheParams {
    pub tiles_x: u32,
    pub tiles_y: u32,
    /// Histogram bins are clipped at `clip_limit` times the uniform bin height.
    pub clip_limit: f64,
}

impl Default for ClaheParams {
    fn default() -> Self {
        Self {
            tiles_x: 8,
            tiles_y: 8,
            clip_limit: 2.0,
        }
    }
}

/// Equalize a grayscale image tile by tile, blending neighbouring tile
/// mappings bilinearly.
pub fn clahe(gray: &GrayImage, params: ClaheParams) -> GrayImage {
    let (w, h) = gray.dimensions();
    if w == 0 || h == 0 {
        return gray.clone();
    }
    let tiles_x = params.tiles_x.clamp(1, w);
    let tiles_y = params.tiles_y.clamp(1, h);
    // Balanced split: with at most one tile per pixel every tile is non-empty.
    let edge = |i: u32, tiles: u32, len: u32| (i as u64 * len as u64 / tiles as u64) as u32;
    let tile_w = w as f64 / tiles_x as f64;
    let tile_h = h as f64 / tiles_y as f64;

    let mut luts = vec![[0u8; 256]; (tiles_x * tiles_y) as usize];
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let (x0, x1) = (edge(tx, tiles_x, w), edge(tx + 1, tiles_x, w));
            let (y0, y1) = (edge(ty, tiles_y, h), edge(ty + 1, tiles_y, h));
            luts[(ty * tiles_x + tx) as usize] = tile_lut(gray, x0, y0, x1, y1, params.clip_limit);
        }
    }

    GrayImage::from_fn(w, h, |x, y| {
        let v = gray.get_pixel(x, y).0[0] as usize;
        // Position relative to tile centres.
        let gx = (x as f64 + 0.5) / tile_w - 0.5;
        let gy = (y as f64 + 0.5) / tile_h - 0.5;
        let tx0 = gx.floor().clamp(0.0, (tiles_x - 1) as f64) as u32;
        let ty0 = gy.floor().clamp(0.0, (tiles_y - 1) as f64) as u32;
        let tx1 = (tx0 + 1).min(tiles_x - 1);
        let ty1 = (ty0 + 1).min(tiles_y - 1);
        let fx = (gx - tx0 as f64).clamp(0.0, 1.0);
        let fy = (gy - ty0 as f64).clamp(0.0, 1.0);

        let at = |tx: u32, ty: u32| luts[(ty * tiles_x + tx) as usize][v] as f64;
        let top = at(tx0, ty0) * (1.0 - fx) + at(tx1, ty0) * fx;
        let bottom = at(tx0, ty1) * (1.0 - fx) + at(tx1, ty1) * fx;
        Luma([(top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8])
    })
}

/// Apply CLAHE to the luma of a colour image and shift every channel by the
/// luma change, so hue survives enhancement.
pub fn clahe_color(rgb: &RgbImage, params: ClaheParams) -> RgbImage {
    let before = luma(rgb);
    let after = clahe(&before, params);
    let (w, h) = rgb.dimensions();
    RgbImage::from_fn(w, h, |x, y| {
        let delta = after.get_pixel(x, y).0[0] as i32 - before.get_pixel(x, y).0[0] as i32;
        let [r, g, b] = rgb.get_pixel(x, y).0;
        let shift = |c: u8| (c as i32 + delta).clamp(0, 255) as u8;
        Rgb([shift(r), shift(g), shift(b)])
    })
}

fn tile_lut(gray: &GrayImage, x0: u32, y0: u32, x1: u32, y1: u32, clip_limit: f64) -> [u8; 256] {
    let mut hist = [0u32; 256];
    for y in y0..y1 {
        for x in x0..x1 {
            hist[gray.get_pixel(x, y).0[0] as usize] += 1;
        }
    }
    let area = (x1.saturating_sub(x0) * y1.saturating_sub(y0)).max(1);

    let limit = ((clip_limit * area as f64 / 256.0) as u32).max(1);
    let mut excess = 0u32;
    for bin in hist.iter_mut() {
        if *bin > limit {
            excess += *bin - limit;
            *bin = limit;
        }
    }
    let per_bin = excess / 256;
    let residual = (excess % 256) as usize;
    for bin in hist.iter_mut() {
        *bin += per_bin;
    }
    if residual > 0 {
        let step = (256 / residual).max(1);
        for i in (0..256).step_by(step).take(residual) {
            hist[i] += 1;
        }
    }

    let scale = 255.0 / area as f64;
    let mut lut = [0u8; 256];
    let mut cumulative = 0u32;
    for (i, &count) in hist.iter().enumerate() {
        cumulative += count;
        lut[i] = (cumulative as f64 * scale).round().clamp(0.0, 255.0) as u8;
    }
    lut
}
