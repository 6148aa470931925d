// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Binary trace mask from the grid-free image.

use image::GrayImage;
use tracewerk_core::config::MaskMode;
use tracewerk_core::types::GridInfo;
use tracing::{debug, instrument};

use crate::ops::clahe::{ClaheParams, clahe_color};
use crate::ops::morphology::{count_foreground, open};
use crate::ops::skeleton::skeletonize;
use crate::ops::threshold::adaptive_gaussian_threshold_inv;
use crate::params::AdaptiveParams;
use crate::raster::RasterImage;
use crate::raster::color::luma;

/// Offset below the local mean a pixel must reach to count as ink.
const INK_OFFSET: f64 = 5.0;

/// Contrast-enhanced image and the mask thresholded from it.
#[derive(Debug, Clone)]
pub struct TraceMaskOutput {
    pub enhanced: RasterImage,
    pub mask: GrayImage,
}

/// Builds the trace mask consumed by signal extraction.
#[derive(Debug, Clone, Copy)]
pub struct TraceMaskBuilder {
    params: AdaptiveParams,
    mode: MaskMode,
}

impl TraceMaskBuilder {
    pub fn new(params: AdaptiveParams, mode: MaskMode) -> Self {
        Self { params, mode }
    }

    /// Enhance `cleaned` with CLAHE, threshold it and drop speckles shorter
    /// than `max(2, grid / 8)` pixels vertically. Returns the enhanced image
    /// alongside the mask.
    ///
    /// In `Thick` mode the stroke keeps its full width; `Skeleton` thins it
    /// to one pixel.
    #[instrument(skip_all, fields(mode = %self.mode, grid_px = grid.small_box_px))]
    pub fn build(&self, cleaned: &RasterImage, grid: &GridInfo) -> TraceMaskOutput {
        let enhanced = clahe_color(cleaned.as_rgb(), ClaheParams::default());
        let gray = luma(&enhanced);

        let block = self.params.adaptive_block_size(grid.small_box_px, 2.0);
        let binary = adaptive_gaussian_threshold_inv(&gray, block, INK_OFFSET);

        let min_run = ((grid.small_box_px / 8.0) as u32).max(2);
        let mask = open(&binary, 1, min_run);
        debug!(
            block,
            min_run,
            thresholded = count_foreground(&binary),
            kept = count_foreground(&mask),
            "Trace mask"
        );

        let mask = match self.mode {
            MaskMode::Thick => mask,
            MaskMode::Skeleton => skeletonize(&mask),
        };
        TraceMaskOutput {
            enhanced: cleaned.with_pixels(enhanced),
            mask,
        }
    }
}
