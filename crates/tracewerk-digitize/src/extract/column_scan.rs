// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-column median scan over a skeleton mask. Suited to single-lead,
// low-noise strips; the averaging-window extractor handles everything else.

use image::GrayImage;
use tracewerk_core::types::BoundingBox;
use tracing::{debug, instrument};

use super::{PixelTrace, resample};
use crate::ops::FG;
use crate::ops::signal::{gaussian_filter1d, median};

const PROJECTION_SIGMA: f64 = 2.0;
/// A row is active when at least this fraction of columns is foreground.
const ACTIVE_ROW_FRACTION: f64 = 0.10;
/// Minimum lead band height, in grid cells.
const MIN_LEAD_CELLS: f64 = 8.0;

#[derive(Debug, Clone, Copy)]
pub struct ColumnScanExtractor {
    grid_px: f64,
    multi_lead: bool,
}

impl ColumnScanExtractor {
    pub fn new(grid_px: f64, multi_lead: bool) -> Self {
        Self {
            grid_px,
            multi_lead,
        }
    }

    /// One trace per lead band, each spanning the full image width.
    #[instrument(skip_all, fields(width = mask.width(), height = mask.height()))]
    pub fn traces(&self, mask: &GrayImage) -> Vec<PixelTrace> {
        let whole = vec![(0, mask.height())];
        let bands = if self.multi_lead {
            let found = lead_bands(mask, self.grid_px);
            if found.is_empty() { whole } else { found }
        } else {
            whole
        };
        debug!(bands = bands.len(), "Lead bands");

        bands
            .into_iter()
            .map(|(start, end)| scan_band(mask, start, end))
            .filter(|trace| !trace.rows.is_empty())
            .collect()
    }
}

/// Row bands `[start, end)` whose smoothed foreground count exceeds 10% of
/// the width for more than eight grid cells.
pub fn lead_bands(mask: &GrayImage, grid_px: f64) -> Vec<(u32, u32)> {
    let (width, height) = mask.dimensions();
    let counts: Vec<f64> = (0..height)
        .map(|y| (0..width).filter(|&x| mask.get_pixel(x, y).0[0] == FG).count() as f64)
        .collect();
    let smoothed = gaussian_filter1d(&counts, PROJECTION_SIGMA);
    let threshold = width as f64 * ACTIVE_ROW_FRACTION;
    let min_height = (grid_px * MIN_LEAD_CELLS) as u32;

    let mut bands = Vec::new();
    let mut start: Option<u32> = None;
    for y in 0..=height {
        let active = y < height && smoothed[y as usize] > threshold;
        match (active, start) {
            (true, None) => start = Some(y),
            (false, Some(s)) => {
                if y - s > min_height {
                    bands.push((s, y));
                }
                start = None;
            }
            _ => {}
        }
    }
    bands
}

/// Median foreground row of every column within `[start, end)`, resampled
/// over the full width with the ends held.
fn scan_band(mask: &GrayImage, start: u32, end: u32) -> PixelTrace {
    let width = mask.width();
    let mut xs = Vec::new();
    let mut ys = Vec::new();
    for x in 0..width {
        let rows: Vec<f64> = (start..end)
            .filter(|&y| mask.get_pixel(x, y).0[0] == FG)
            .map(|y| y as f64)
            .collect();
        if !rows.is_empty() {
            xs.push(x as f64);
            ys.push(median(&rows));
        }
    }

    let region = BoundingBox {
        x_min: 0.0,
        y_min: start as f64,
        x_max: width.saturating_sub(1) as f64,
        y_max: end as f64,
    };
    if xs.is_empty() {
        return PixelTrace {
            rows: Vec::new(),
            x_start: 0.0,
            coverage: 0.0,
            region,
        };
    }

    PixelTrace {
        rows: resample(&xs, &ys, 0.0, width as usize),
        x_start: 0.0,
        coverage: xs.len() as f64 / width as f64,
        region,
    }
}
