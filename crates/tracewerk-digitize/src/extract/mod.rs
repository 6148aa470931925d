// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Signal extraction: trace mask to calibrated per-lead voltage signals.
//
// An extractor turns the mask into pixel traces (one row position per
// column). This module converts them to millivolts and seconds and scores
// each lead.

pub mod averaging;
pub mod column_scan;

use image::GrayImage;
use tracewerk_core::config::MaskMode;
use tracewerk_core::diagnostics::{Stage, Warning, WarningKind};
use tracewerk_core::types::{BoundingBox, CalibrationInfo, GridInfo, LeadSignal};
use tracing::{info, instrument, warn};

use crate::ops::signal::{interp, percentile};

pub use averaging::AveragingWindowExtractor;
pub use column_scan::ColumnScanExtractor;

/// Coverage below which a lead is flagged as mostly interpolated.
const LOW_COVERAGE: f64 = 0.5;

/// One lead in pixel coordinates, sampled once per pixel column.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelTrace {
    /// Row position of the trace at `x_start + i`.
    pub rows: Vec<f64>,
    pub x_start: f64,
    /// Fraction of the span that had a trace sample before interpolation.
    pub coverage: f64,
    pub region: BoundingBox,
}

/// Leads and extraction warnings for one mask.
#[derive(Debug, Clone, Default)]
pub struct ExtractedLeads {
    pub leads: Vec<LeadSignal>,
    pub warnings: Vec<Warning>,
}

/// Converts a trace mask into calibrated lead signals.
#[derive(Debug, Clone, Copy)]
pub struct SignalExtractor {
    grid: GridInfo,
    mode: MaskMode,
    multi_lead: bool,
    min_lead_points: usize,
}

impl SignalExtractor {
    pub fn new(grid: GridInfo, mode: MaskMode, multi_lead: bool, min_lead_points: usize) -> Self {
        Self {
            grid,
            mode,
            multi_lead,
            min_lead_points,
        }
    }

    /// Pixel traces from the extractor matching the mask mode.
    pub fn traces(&self, mask: &GrayImage) -> Vec<PixelTrace> {
        match self.mode {
            MaskMode::Thick => AveragingWindowExtractor::new(
                self.grid.small_box_px,
                self.multi_lead,
                self.min_lead_points,
            )
            .traces(mask),
            MaskMode::Skeleton => {
                ColumnScanExtractor::new(self.grid.small_box_px, self.multi_lead).traces(mask)
            }
        }
    }

    /// Extract, calibrate and score every lead in `mask`.
    #[instrument(skip_all, fields(mode = %self.mode, multi_lead = self.multi_lead))]
    pub fn extract(&self, mask: &GrayImage, calibration: &CalibrationInfo) -> ExtractedLeads {
        let sampling_rate = self.grid.sampling_rate();
        let mut out = ExtractedLeads::default();

        for (index, trace) in self.traces(mask).into_iter().enumerate() {
            if trace.rows.is_empty() {
                continue;
            }
            let signal_mv: Vec<f64> = trace.rows.iter().map(|&row| calibration.row_to_mv(row)).collect();
            let quality = lead_quality(&signal_mv, trace.coverage);
            if trace.coverage < LOW_COVERAGE {
                warn!(lead = index, coverage = trace.coverage, "Lead is mostly interpolated");
                out.warnings.push(Warning::new(
                    Stage::Extraction,
                    WarningKind::LowLeadCoverage {
                        lead: index,
                        coverage: trace.coverage,
                    },
                ));
            }

            let lead = LeadSignal::new(signal_mv, sampling_rate, trace.region, quality, trace.coverage);
            info!(
                lead = index,
                samples = lead.len(),
                coverage = lead.coverage,
                quality = lead.quality_score,
                "Lead extracted"
            );
            out.leads.push(lead);
        }

        if out.leads.is_empty() {
            warn!("No leads detected");
            out.warnings
                .push(Warning::new(Stage::Extraction, WarningKind::NoLeadsDetected));
        }
        out
    }
}

/// Lead quality: 40% coverage, 30% amplitude plausibility, 30% continuity.
///
/// Peak-to-peak amplitude between 0.3 and 5 mV scores 1. The 95th
/// percentile of sample-to-sample jumps scores 1 below 0.5 mV and falls to
/// zero 2 mV above that.
pub fn lead_quality(signal_mv: &[f64], coverage: f64) -> f64 {
    if signal_mv.is_empty() {
        return 0.0;
    }
    let (min, max) = signal_mv
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let peak_to_peak = max - min;
    let amplitude_score = if peak_to_peak > 0.3 && peak_to_peak < 5.0 {
        1.0
    } else if peak_to_peak <= 0.3 {
        peak_to_peak / 0.3
    } else {
        (1.0 - (peak_to_peak - 5.0) / 5.0).max(0.0)
    };

    let continuity_score = if signal_mv.len() > 1 {
        let jumps: Vec<f64> = signal_mv.windows(2).map(|w| (w[1] - w[0]).abs()).collect();
        let p95 = percentile(&jumps, 95.0);
        if p95 < 0.5 { 1.0 } else { (1.0 - (p95 - 0.5) / 2.0).max(0.0) }
    } else {
        0.5
    };

    (0.4 * coverage.clamp(0.0, 1.0) + 0.3 * amplitude_score + 0.3 * continuity_score).clamp(0.0, 1.0)
}

/// Linear interpolation of `(xs, ys)` at `x_start + i` for `i in 0..len`.
/// Values outside the observed range hold the nearest end.
pub fn resample(xs: &[f64], ys: &[f64], x_start: f64, len: usize) -> Vec<f64> {
    (0..len).map(|i| interp(x_start + i as f64, xs, ys)).collect()
}
