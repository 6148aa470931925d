// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// HSV colour separation. Pale, unsaturated pixels are grid; dark or
// strongly coloured pixels are trace and are never touched.

use image::{GrayImage, Rgb};
use tracewerk_core::types::GridInfo;
use tracing::{debug, info, instrument};

use super::{GridRemoval, GridRemovalOutput};
use crate::ops::morphology::{close, count_foreground, mask_from_fn, open, union};
use crate::ops::FG;
use crate::raster::RasterImage;

/// Saturation above which a pixel is taken to be coloured ink.
const INK_SATURATION: u8 = 130;
/// Pixels at or above this luma count as paper in the speckle pass.
const PAPER_LUMA: u8 = 200;
const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

/// `(min value, max saturation)` of grid candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HsvGridThresholds {
    pub value_min: u8,
    pub saturation_max: u8,
}

impl HsvGridThresholds {
    pub const CONSERVATIVE: Self = Self {
        value_min: 170,
        saturation_max: 80,
    };
    pub const AGGRESSIVE: Self = Self {
        value_min: 130,
        saturation_max: 120,
    };
}

/// Removes pale grid lines by colour.
#[derive(Debug, Clone, Copy)]
pub struct ColorGridRemover {
    thresholds: HsvGridThresholds,
}

impl ColorGridRemover {
    pub fn new(aggressive: bool) -> Self {
        Self {
            thresholds: if aggressive {
                HsvGridThresholds::AGGRESSIVE
            } else {
                HsvGridThresholds::CONSERVATIVE
            },
        }
    }

    pub fn thresholds(&self) -> HsvGridThresholds {
        self.thresholds
    }
}

impl GridRemoval for ColorGridRemover {
    fn name(&self) -> &'static str {
        "color"
    }

    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    fn remove(&self, image: &RasterImage, _grid: &GridInfo) -> GridRemovalOutput {
        let (width, height) = image.dimensions();
        let hsv = image.hsv();
        let gray = image.gray();

        // Darkness is relative to the page: a dim photo gets a lower cut-off.
        let mean_gray = if width == 0 || height == 0 {
            0.0
        } else {
            gray.pixels().map(|p| p.0[0] as f64).sum::<f64>() / (width as f64 * height as f64)
        };
        let dark_cutoff = (0.6 * mean_gray).clamp(60.0, 140.0);
        let check_saturation = !image.was_grayscale();
        debug!(dark_cutoff, check_saturation, "Protection thresholds");

        let protect_mask = mask_from_fn(width, height, |x, y| {
            let dark = (gray.get_pixel(x, y).0[0] as f64) < dark_cutoff;
            let inked = check_saturation && hsv.saturation.get_pixel(x, y).0[0] > INK_SATURATION;
            dark || inked
        });

        let HsvGridThresholds {
            value_min,
            saturation_max,
        } = self.thresholds;
        let candidate = |x: u32, y: u32| {
            hsv.value.get_pixel(x, y).0[0] >= value_min
                && hsv.saturation.get_pixel(x, y).0[0] <= saturation_max
                && protect_mask.get_pixel(x, y).0[0] != FG
        };

        let mut cleaned = image.as_rgb().clone();
        for (x, y, pixel) in cleaned.enumerate_pixels_mut() {
            if candidate(x, y) {
                *pixel = WHITE;
            }
        }
        // Only visibly coloured candidates are reported as grid.
        let grid_mask = mask_from_fn(width, height, |x, y| {
            candidate(x, y) && gray.get_pixel(x, y).0[0] < 250
        });

        let removed_speckles = remove_speckles(&mut cleaned, &protect_mask);

        info!(
            grid_pixels = count_foreground(&grid_mask),
            protected_pixels = count_foreground(&protect_mask),
            removed_speckles,
            "Colour grid removal complete"
        );

        GridRemovalOutput {
            cleaned: image.with_pixels(cleaned),
            grid_mask,
            protect_mask,
            trace_hint: None,
        }
    }
}

/// Whiten ink that survives neither a 2x2 opening nor sits in the
/// protection mask, after a 3x3 closing reconnects the remainder.
///
/// Returns the number of pixels whitened.
fn remove_speckles(image: &mut image::RgbImage, protect_mask: &GrayImage) -> usize {
    let (width, height) = image.dimensions();
    let ink = mask_from_fn(width, height, |x, y| {
        let [r, g, b] = image.get_pixel(x, y).0;
        crate::raster::color::luma_of(r, g, b) < PAPER_LUMA
    });
    let keep = union(&close(&open(&ink, 2, 2), 3, 3), protect_mask);

    let mut removed = 0;
    for (x, y, pixel) in image.enumerate_pixels_mut() {
        if ink.get_pixel(x, y).0[0] == FG && keep.get_pixel(x, y).0[0] != FG {
            *pixel = WHITE;
            removed += 1;
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{PINK_GRID, RED_INK, ecg_strip, grid_paper};
    use image::RgbImage;
    use tracewerk_core::types::DetectionMethod;

    fn grid_info() -> GridInfo {
        GridInfo::new(10.0, 0.9, DetectionMethod::Projection, 25.0, 10.0)
    }

    #[test]
    fn presets() {
        assert_eq!(ColorGridRemover::new(false).thresholds(), HsvGridThresholds::CONSERVATIVE);
        assert_eq!(ColorGridRemover::new(true).thresholds(), HsvGridThresholds::AGGRESSIVE);
    }

    #[test]
    fn pale_grid_is_whitened() {
        let page = RasterImage::from_rgb(grid_paper(120, 80, 10, PINK_GRID));
        let out = ColorGridRemover::new(false).remove(&page, &grid_info());
        assert!(out.cleaned.as_rgb().pixels().all(|p| *p == WHITE));
        assert!(count_foreground(&out.grid_mask) > 0);
        assert_eq!(count_foreground(&out.protect_mask), 0);
        assert!(out.trace_hint.is_none());
    }

    /// Every trace pixel survives untouched.
    #[test]
    fn red_trace_is_preserved() {
        let strip = ecg_strip(600, 400);
        let out = ColorGridRemover::new(true).remove(&strip, &grid_info());
        for (x, y, p) in strip.as_rgb().enumerate_pixels() {
            if *p == RED_INK {
                assert_eq!(out.cleaned.as_rgb().get_pixel(x, y), &RED_INK, "({}, {})", x, y);
                assert_eq!(out.protect_mask.get_pixel(x, y).0[0], FG);
            }
        }
    }

    #[test]
    fn isolated_grey_speck_is_removed() {
        let mut rgb = RgbImage::from_pixel(40, 40, WHITE);
        rgb.put_pixel(20, 20, Rgb([150, 150, 150]));
        let page = RasterImage::from_rgb(rgb);
        let out = ColorGridRemover::new(false).remove(&page, &grid_info());
        assert_eq!(out.cleaned.as_rgb().get_pixel(20, 20), &WHITE);
    }
}
