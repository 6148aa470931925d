// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Tracewerk digitizer.

use serde::{Deserialize, Serialize};

/// Which detector produced the grid estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    /// Peak spacing in the row/column darkness projections.
    Projection,
    /// Offsets of near-axis Hough lines.
    Hough,
    /// Confidence-weighted combination of projection and Hough.
    Fusion,
    /// Resolution-based guess used when both detectors fail.
    FallbackHeuristic,
}

/// Estimated grid geometry. One small box is 1 mm of paper.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridInfo {
    /// Pixel size of one small grid box. Always positive.
    pub small_box_px: f64,
    pub pixels_per_mm_est: f64,
    /// Detection confidence in `[0, 1]`.
    pub confidence: f64,
    pub detection_method: DetectionMethod,
    pub paper_speed_mm_s: f64,
    pub voltage_scale_mm_per_mv: f64,
}

impl GridInfo {
    /// Build grid info for a box size, paper speed and voltage scale.
    pub fn new(
        small_box_px: f64,
        confidence: f64,
        detection_method: DetectionMethod,
        paper_speed_mm_s: f64,
        voltage_scale_mm_per_mv: f64,
    ) -> Self {
        let small_box_px = if small_box_px.is_finite() && small_box_px > 0.0 {
            small_box_px
        } else {
            1.0
        };
        Self {
            small_box_px,
            pixels_per_mm_est: small_box_px,
            confidence: confidence.clamp(0.0, 1.0),
            detection_method,
            paper_speed_mm_s,
            voltage_scale_mm_per_mv,
        }
    }

    /// Horizontal samples per second of the extracted signal.
    pub fn sampling_rate(&self) -> f64 {
        self.pixels_per_mm_est * self.paper_speed_mm_s
    }

    /// Pixels per millivolt at the nominal voltage scale.
    pub fn pixels_per_mv(&self) -> f64 {
        self.pixels_per_mm_est * self.voltage_scale_mm_per_mv
    }
}

/// Axis-aligned pixel rectangle, inclusive of `x`/`y`, exclusive of the far edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Vertical calibration. Row `baseline_y` is 0 mV; rows above are positive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationInfo {
    pub baseline_y: f64,
    pub mv_per_pixel: f64,
    pub pulse_detected: bool,
    pub confidence: f64,
    pub pulse_region: Option<PixelRect>,
    pub pulse_height_px: Option<f64>,
}

impl CalibrationInfo {
    /// Convert an image row to millivolts.
    pub fn row_to_mv(&self, row: f64) -> f64 {
        (self.baseline_y - row) * self.mv_per_pixel
    }
}

/// Region of the working image that a lead was extracted from.
///
/// Coordinates are pixels of the deskewed image (`Preprocessed::trace_mask`
/// and `preprocessed_image`), not of the input. They differ only when
/// deskewing rotated the input.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
}

impl BoundingBox {
    pub fn width(&self) -> f64 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> f64 {
        self.y_max - self.y_min
    }
}

/// One calibrated lead.
///
/// `time_s` always has the same length as `signal_mv`, starts at zero and
/// advances by exactly `1 / sampling_rate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadSignal {
    pub signal_mv: Vec<f64>,
    pub time_s: Vec<f64>,
    /// Extent of the trace in deskewed-image pixels.
    pub region: BoundingBox,
    pub quality_score: f64,
    pub sampling_rate: f64,
    /// Fraction of the lead's horizontal span that had a trace sample
    /// before interpolation.
    pub coverage: f64,
}

impl LeadSignal {
    /// Build a lead, generating the time axis from the sampling rate.
    pub fn new(
        signal_mv: Vec<f64>,
        sampling_rate: f64,
        region: BoundingBox,
        quality_score: f64,
        coverage: f64,
    ) -> Self {
        let time_s = (0..signal_mv.len())
            .map(|i| i as f64 / sampling_rate)
            .collect();
        Self {
            signal_mv,
            time_s,
            region,
            quality_score: quality_score.clamp(0.0, 1.0),
            sampling_rate,
            coverage: coverage.clamp(0.0, 1.0),
        }
    }

    pub fn len(&self) -> usize {
        self.signal_mv.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signal_mv.is_empty()
    }

    /// Length of the recording in seconds.
    pub fn duration_s(&self) -> f64 {
        self.time_s.last().copied().unwrap_or(0.0)
    }

    /// `(min, max)` of the signal in millivolts, `None` for an empty lead.
    pub fn amplitude_range_mv(&self) -> Option<(f64, f64)> {
        let mut values = self.signal_mv.iter().copied();
        let first = values.next()?;
        Some(values.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v))))
    }
}

/// Per-stage confidence scores, all in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityScores {
    pub image_quality: f64,
    pub grid_detection: f64,
    pub trace_protection: f64,
    pub trace_continuity: f64,
    pub overall: f64,
}

/// Foreground statistics of a trace mask.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TraceQuality {
    /// Foreground pixels over all pixels.
    pub coverage: f64,
    /// Columns with at least one foreground pixel over all columns.
    pub continuity: f64,
    /// Foreground pixels per column.
    pub density: f64,
}

/// Outcome of skew correction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeskewMethod {
    /// Fewer than three lines were found.
    None,
    /// Lines were found but none of them near horizontal.
    InsufficientLines,
    /// The median tilt was below half a degree; nothing was rotated.
    SkippedSmallAngle,
    /// The image was rotated by the median tilt of the detected lines.
    HoughMedian,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeskewInfo {
    pub angle_deg: f64,
    pub confidence: f64,
    pub method: DeskewMethod,
    pub num_lines: usize,
}

impl DeskewInfo {
    pub fn failed(method: DeskewMethod, num_lines: usize) -> Self {
        Self {
            angle_deg: 0.0,
            confidence: 0.0,
            method,
            num_lines,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region() -> BoundingBox {
        BoundingBox {
            x_min: 0.0,
            y_min: 10.0,
            x_max: 99.0,
            y_max: 40.0,
        }
    }

    #[test]
    fn lead_time_axis_is_uniform() {
        let lead = LeadSignal::new(vec![0.0; 250], 250.0, region(), 0.8, 1.0);
        assert_eq!(lead.signal_mv.len(), lead.time_s.len());
        assert_eq!(lead.time_s[0], 0.0);
        for pair in lead.time_s.windows(2) {
            let step = pair[1] - pair[0];
            assert!(step > 0.0);
            assert!((step - 1.0 / 250.0).abs() < 1e-12, "step {}", step);
        }
        assert!((lead.duration_s() - 249.0 / 250.0).abs() < 1e-12);
    }

    #[test]
    fn amplitude_range_of_empty_lead_is_none() {
        let lead = LeadSignal::new(Vec::new(), 250.0, region(), 0.0, 0.0);
        assert!(lead.is_empty());
        assert_eq!(lead.amplitude_range_mv(), None);
        assert_eq!(lead.duration_s(), 0.0);
    }

    #[test]
    fn amplitude_range_spans_extremes() {
        let lead = LeadSignal::new(vec![0.1, -0.4, 1.2, 0.0], 100.0, region(), 0.5, 0.5);
        assert_eq!(lead.amplitude_range_mv(), Some((-0.4, 1.2)));
    }

    #[test]
    fn grid_sampling_rate_uses_paper_speed() {
        let grid = GridInfo::new(10.0, 0.8, DetectionMethod::Fusion, 25.0, 10.0);
        assert_eq!(grid.sampling_rate(), 250.0);
        assert_eq!(grid.pixels_per_mv(), 100.0);
    }

    #[test]
    fn grid_box_size_is_always_positive() {
        let grid = GridInfo::new(0.0, 2.0, DetectionMethod::FallbackHeuristic, 25.0, 10.0);
        assert!(grid.small_box_px > 0.0);
        assert_eq!(grid.confidence, 1.0);
    }

    #[test]
    fn calibration_rows_above_baseline_are_positive() {
        let cal = CalibrationInfo {
            baseline_y: 300.0,
            mv_per_pixel: 0.01,
            pulse_detected: true,
            confidence: 0.9,
            pulse_region: None,
            pulse_height_px: Some(100.0),
        };
        assert!((cal.row_to_mv(200.0) - 1.0).abs() < 1e-12);
        assert!(cal.row_to_mv(350.0) < 0.0);
    }
}
