// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Grid removal strategies.
//
// Both strategies produce the same output shape so the rest of the pipeline
// never needs to know which one ran. The choice is made once, from
// `DigitizerConfig::grid_removal_method`.

pub mod color;
pub mod morphology;

use image::GrayImage;
use tracewerk_core::config::{DigitizerConfig, GridRemovalMethod};
use tracewerk_core::types::GridInfo;

use crate::params::AdaptiveParams;
use crate::raster::RasterImage;

pub use color::ColorGridRemover;
pub use morphology::MorphologyGridRemover;

/// Result of removing the grid from one image.
#[derive(Debug, Clone)]
pub struct GridRemovalOutput {
    /// Image with grid pixels whitened or inpainted.
    pub cleaned: RasterImage,
    /// Pixels classified as grid.
    pub grid_mask: GrayImage,
    /// Pixels that were never modified because they look like trace.
    pub protect_mask: GrayImage,
    /// Continuous trace-likelihood map, when the strategy computes one.
    pub trace_hint: Option<GrayImage>,
}

/// A way of suppressing grid lines while keeping the trace intact.
pub trait GridRemoval: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    fn remove(&self, image: &RasterImage, grid: &GridInfo) -> GridRemovalOutput;
}

/// Build the strategy selected by the configuration.
pub fn grid_remover(config: &DigitizerConfig, params: AdaptiveParams) -> Box<dyn GridRemoval> {
    match config.grid_removal_method {
        GridRemovalMethod::Color => Box::new(ColorGridRemover::new(config.aggressive_grid_removal)),
        GridRemovalMethod::Morphology => {
            Box::new(MorphologyGridRemover::new(params, config.fallback_strategy))
        }
    }
}
