// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Morphological grid removal with trace protection and inpainting.
//
// The trace is located first and protected. Grid lines are then found by
// directional opening of a local-mean binarization, and the unprotected
// grid pixels are filled from their surroundings.

use image::{GrayImage, Luma, RgbImage};
use imageproc::distance_transform::Norm;
use imageproc::filter::gaussian_blur_f32;
use imageproc::morphology::dilate as dilate_norm;
use tracewerk_core::config::FallbackStrategy;
use tracewerk_core::types::GridInfo;
use tracing::{debug, info, instrument};

use super::{GridRemoval, GridRemovalOutput};
use crate::ops::components::filter_components;
use crate::ops::inpaint::inpaint_telea;
use crate::ops::morphology::{
    close, count_foreground, difference, dilate, intersection, mask_from_fn, open, union,
};
use crate::ops::threshold::{adaptive_mean_threshold_inv, gaussian_local_mean};
use crate::params::AdaptiveParams;
use crate::raster::RasterImage;

const HINT_SIGMA: f32 = 0.8;
/// Grid confidence above which the protection mask is only lightly dilated.
const CONFIDENT_GRID: f64 = 0.7;

/// Protects the trace, extracts grid lines morphologically and inpaints
/// them.
#[derive(Debug, Clone, Copy)]
pub struct MorphologyGridRemover {
    params: AdaptiveParams,
    strategy: FallbackStrategy,
}

impl MorphologyGridRemover {
    pub fn new(params: AdaptiveParams, strategy: FallbackStrategy) -> Self {
        Self { params, strategy }
    }

    /// Protection mask and the trace hint it was derived from.
    pub fn protection(&self, image: &RasterImage, grid: &GridInfo) -> (GrayImage, GrayImage) {
        let grid_px = grid.small_box_px;
        let hint = trace_hint(image.as_rgb());
        let local_mean = gaussian_local_mean(&hint, self.params.adaptive_block_size(grid_px, 2.5));
        let (permissive_offset, strict_offset) = self.strategy.protection_offsets();

        let above = |offset: f64| {
            mask_from_fn(hint.width(), hint.height(), |x, y| {
                let value = hint.get_pixel(x, y).0[0] as f64;
                value > local_mean.get_pixel(x, y).0[0] as f64 + offset
            })
        };
        let permissive = above(permissive_offset);
        let strict = above(strict_offset);

        // Bridge small gaps in either direction, but only near strong
        // evidence so faint grid lines are not swept in.
        let k = ((grid_px / 4.0) as u32).max(2);
        let bridged = union(&close(&permissive, 1, k), &close(&permissive, k, 1));
        let near_strict = dilate(&strict, 2 * k + 1, 2 * k + 1);
        let candidate = union(&strict, &intersection(&bridged, &near_strict));

        // Area is in pixels, so the floor scales with the cell area.
        let min_area = 1.5 * grid_px * grid_px;
        let min_long_side = 0.8 * grid_px;
        let traces = filter_components(&candidate, |c| {
            c.area as f64 > min_area
                || (c.aspect_ratio() > 3.0 && c.long_side() as f64 > min_long_side)
        });

        let radius = if grid.confidence > CONFIDENT_GRID {
            (0.04 * grid_px).max(2.0)
        } else {
            (0.08 * grid_px).max(3.0)
        };
        let protect = dilate_norm(&traces, Norm::L1, radius.min(255.0) as u8);
        debug!(
            permissive = count_foreground(&permissive),
            strict = count_foreground(&strict),
            kept = count_foreground(&traces),
            radius,
            "Trace protection"
        );
        (protect, hint)
    }

    /// Horizontal and vertical grid line mask.
    pub fn grid_lines(&self, image: &RasterImage, grid: &GridInfo) -> GrayImage {
        let gray = image.gray();
        let binary = adaptive_mean_threshold_inv(
            &gray,
            self.params.adaptive_block_size(grid.small_box_px, 5.0),
            10.0,
        );
        let k = self.params.morphology_kernel_size(grid.small_box_px, 0.5);
        union(&open(&binary, 1, k), &open(&binary, k, 1))
    }
}

impl GridRemoval for MorphologyGridRemover {
    fn name(&self) -> &'static str {
        "morphology"
    }

    #[instrument(skip_all, fields(width = image.width(), height = image.height(), strategy = %self.strategy))]
    fn remove(&self, image: &RasterImage, grid: &GridInfo) -> GridRemovalOutput {
        let (protect_mask, hint) = self.protection(image, grid);
        let grid_mask = self.grid_lines(image, grid);
        let to_fill = difference(&grid_mask, &protect_mask);

        let radius = (0.1 * grid.small_box_px).max(3.0) as u32;
        let cleaned = inpaint_telea(image.as_rgb(), &to_fill, radius);
        info!(
            grid_pixels = count_foreground(&grid_mask),
            protected_pixels = count_foreground(&protect_mask),
            inpainted = count_foreground(&to_fill),
            radius,
            "Morphological grid removal complete"
        );

        GridRemovalOutput {
            cleaned: image.with_pixels(cleaned),
            grid_mask,
            protect_mask,
            trace_hint: Some(hint),
        }
    }
}

/// Trace likelihood on a 0..255 scale: the larger of normalized red excess
/// and normalized darkness, lightly blurred.
pub fn trace_hint(rgb: &RgbImage) -> GrayImage {
    let (width, height) = rgb.dimensions();
    let mut red_excess = Vec::with_capacity((width * height) as usize);
    let mut darkness = Vec::with_capacity((width * height) as usize);
    for p in rgb.pixels() {
        let [r, g, b] = p.0;
        red_excess.push(r as f64 - (g as f64 + b as f64) / 2.0);
        darkness.push(255.0 - crate::raster::color::luma_of(r, g, b) as f64);
    }
    normalize(&mut red_excess);
    normalize(&mut darkness);

    let mut hint = GrayImage::new(width, height);
    for (i, pixel) in hint.pixels_mut().enumerate() {
        *pixel = Luma([red_excess[i].max(darkness[i]).round() as u8]);
    }
    gaussian_blur_f32(&hint, HINT_SIGMA)
}

/// Stretch values to `0..=255`. A constant input becomes all zeros.
fn normalize(values: &mut [f64]) {
    let (min, max) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let range = max - min;
    for v in values.iter_mut() {
        *v = if range > 0.0 { (*v - min) / range * 255.0 } else { 0.0 };
    }
}
