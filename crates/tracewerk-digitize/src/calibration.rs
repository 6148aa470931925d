// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Calibration pulse detection.
//
// A standard pulse is a 1 mV step lasting 0.2 s, printed at the left edge
// of the strip. Its height in pixels fixes the vertical scale and its bottom
// edge is the 0 mV baseline. Without a pulse the nominal voltage scale and
// the image centre are used instead.

use image::GrayImage;
use tracewerk_core::types::{CalibrationInfo, GridInfo, PixelRect};
use tracing::{debug, info, instrument, warn};

use crate::ops::FG;
use crate::ops::signal::{gaussian_filter1d, mean, std_dev};

/// Pulse duration in seconds.
const PULSE_DURATION_S: f64 = 0.2;
const PROJECTION_SIGMA: f64 = 1.5;
const ACCEPT_CONFIDENCE: f64 = 0.5;
const FALLBACK_CONFIDENCE: f64 = 0.3;

/// Finds the calibration pulse in the left part of a trace mask.
#[derive(Debug, Clone, Copy)]
pub struct CalibrationPulseDetector {
    grid: GridInfo,
    search_fraction: f64,
}

impl CalibrationPulseDetector {
    pub fn new(grid: GridInfo, search_fraction: f64) -> Self {
        Self {
            grid,
            search_fraction: search_fraction.clamp(0.0, 1.0),
        }
    }

    /// Expected pulse `(width, height)` in pixels.
    pub fn expected_size(&self) -> (f64, f64) {
        let px = self.grid.small_box_px;
        (
            PULSE_DURATION_S * self.grid.paper_speed_mm_s * px,
            self.grid.voltage_scale_mm_per_mv * px,
        )
    }

    /// Locate the pulse, or fall back to the nominal scale.
    #[instrument(skip_all, fields(width = mask.width(), height = mask.height()))]
    pub fn detect(&self, mask: &GrayImage) -> CalibrationInfo {
        let roi_width = (mask.width() as f64 * self.search_fraction) as u32;
        let (expected_width, expected_height) = self.expected_size();

        if let Some(region) = find_plateau(mask, roi_width, expected_width, expected_height) {
            let confidence = score_pulse(mask, region, expected_width, expected_height);
            debug!(?region, confidence, "Calibration pulse candidate");
            if confidence > ACCEPT_CONFIDENCE {
                let height = region.height as f64;
                let calibration = CalibrationInfo {
                    baseline_y: (region.y + region.height) as f64,
                    mv_per_pixel: 1.0 / height,
                    pulse_detected: true,
                    confidence,
                    pulse_region: Some(region),
                    pulse_height_px: Some(height),
                };
                info!(
                    baseline_y = calibration.baseline_y,
                    pulse_height_px = height,
                    confidence,
                    "Calibration pulse detected"
                );
                return calibration;
            }
        }

        warn!("Calibration pulse not found; using nominal voltage scale");
        self.fallback(mask.height())
    }

    /// Baseline at the image centre, scale from the grid.
    pub fn fallback(&self, height: u32) -> CalibrationInfo {
        CalibrationInfo {
            baseline_y: height as f64 / 2.0,
            mv_per_pixel: 1.0 / self.grid.pixels_per_mv(),
            pulse_detected: false,
            confidence: FALLBACK_CONFIDENCE,
            pulse_region: None,
            pulse_height_px: None,
        }
    }
}

/// First band of rows, within the left `roi_width` columns, whose smoothed
/// foreground count stays above 30% of the expected width and whose height
/// and width are plausible for a pulse.
fn find_plateau(
    mask: &GrayImage,
    roi_width: u32,
    expected_width: f64,
    expected_height: f64,
) -> Option<PixelRect> {
    if roi_width == 0 || mask.height() == 0 || expected_width <= 0.0 || expected_height <= 0.0 {
        return None;
    }
    let height = mask.height() as usize;
    let is_fg = |x: u32, y: u32| mask.get_pixel(x, y).0[0] == FG;

    let counts: Vec<f64> = (0..mask.height())
        .map(|y| (0..roi_width).filter(|&x| is_fg(x, y)).count() as f64)
        .collect();
    let smoothed = gaussian_filter1d(&counts, PROJECTION_SIGMA);
    let threshold = 0.3 * expected_width;

    let mut start: Option<usize> = None;
    for y in 0..=height {
        let above = y < height && smoothed[y] > threshold;
        match (above, start) {
            (true, None) => start = Some(y),
            (false, Some(s)) => {
                start = None;
                // Smoothing bleeds into neighbouring rows; trim to the raw
                // rows that really carry the plateau.
                let Some(first) = (s..y).find(|&r| counts[r] > threshold) else {
                    continue;
                };
                let Some(last) = (s..y).rev().find(|&r| counts[r] > threshold) else {
                    continue;
                };
                let band = (last + 1 - first) as f64;
                let height_ratio = band / expected_height;
                if !(0.6 < height_ratio && height_ratio < 1.5) {
                    continue;
                }

                let columns: Vec<u32> = (0..roi_width)
                    .filter(|&x| (first..=last).any(|r| is_fg(x, r as u32)))
                    .collect();
                let (Some(&x1), Some(&x2)) = (columns.first(), columns.last()) else {
                    continue;
                };
                let width = x2 - x1 + 1;
                let width_ratio = width as f64 / expected_width;
                if 0.5 < width_ratio && width_ratio < 2.0 {
                    return Some(PixelRect {
                        x: x1,
                        y: first as u32,
                        width,
                        height: band as u32,
                    });
                }
            }
            _ => {}
        }
    }
    None
}

/// Confidence that `region` holds a pulse: dimensions (40%), flat top and
/// bottom (30%) and fill (30%).
fn score_pulse(mask: &GrayImage, region: PixelRect, expected_width: f64, expected_height: f64) -> f64 {
    if region.width == 0 || region.height == 0 {
        return 0.0;
    }
    let (w, h) = (region.width as f64, region.height as f64);
    let width_score = 1.0 - ((w - expected_width).abs() / expected_width).min(1.0);
    let height_score = 1.0 - ((h - expected_height).abs() / expected_height).min(1.0);
    let dimension_score = (width_score + height_score) / 2.0;

    let row_counts: Vec<f64> = (region.y..region.y + region.height)
        .map(|y| {
            (region.x..region.x + region.width)
                .filter(|&x| mask.get_pixel(x, y).0[0] == FG)
                .count() as f64
        })
        .collect();

    let flatness_score = if row_counts.len() > 4 {
        let third = row_counts.len() / 3;
        let top = std_dev(&row_counts[..third]);
        let bottom = std_dev(&row_counts[row_counts.len() - third..]);
        1.0 - ((top + bottom) / (2.0 * mean(&row_counts) + 1.0)).min(1.0)
    } else {
        0.5
    };

    let filled: f64 = row_counts.iter().sum();
    let coverage_score = (filled / (w * h * 0.8).max(1.0)).min(1.0);

    0.4 * dimension_score + 0.3 * flatness_score + 0.3 * coverage_score
}
