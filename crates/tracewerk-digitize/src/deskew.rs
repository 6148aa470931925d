// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Skew correction. Measures the tilt of near-horizontal lines with Canny
// and the Hough transform, then rotates the strip level.

use image::GrayImage;
use imageproc::edges::canny;
use imageproc::hough::{LineDetectionOptions, PolarLine, detect_lines};
use tracewerk_core::types::{DeskewInfo, DeskewMethod};
use tracing::{debug, info, instrument, warn};

use crate::ops::signal::{median, std_dev};
use crate::params::AdaptiveParams;
use crate::raster::RasterImage;

/// Tilts below this many degrees are left alone.
const MIN_ROTATION_DEG: f64 = 0.5;

/// Lines tilted more than this are not considered horizontal.
const MAX_TILT_DEG: f64 = 45.0;

const REFINE_STEP_DEG: f64 = 0.1;
/// Refinement covers `REFINE_STEPS` steps either side of the Hough angle.
const REFINE_STEPS: i32 = 10;

/// Detects and removes small rotations introduced by scanning or
/// photographing.
#[derive(Debug, Clone, Copy)]
pub struct GeometricCorrector {
    params: AdaptiveParams,
}

impl GeometricCorrector {
    pub fn new(params: AdaptiveParams) -> Self {
        Self { params }
    }

    /// Measure skew and return the levelled image.
    ///
    /// ## Pipeline
    ///
    /// 1. Canny with thresholds derived from the median intensity
    /// 2. Hough line detection with a resolution-scaled vote threshold
    /// 3. Keep lines within 45 degrees of horizontal
    /// 4. Median tilt; confidence falls with the spread of tilts
    /// 5. Refine the whole-degree median to 0.1 degree by maximising the
    ///    sharpness of the sheared edge projection within one degree
    /// 6. Rotate about the centre unless the tilt is below half a degree
    ///
    /// Never fails: with too few lines the image is returned unchanged with
    /// zero confidence.
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn deskew(&self, image: &RasterImage) -> (RasterImage, DeskewInfo) {
        let gray = image.gray();
        let (low, high) = self.params.canny_thresholds(&gray);
        let edges = canny(&gray, low, high.max(low + 1.0));
        debug!(low, high, "Canny edge detection complete");

        let vote_threshold = self
            .params
            .hough_threshold()
            .max(self.params.hough_min_line_length());
        let lines = detect_lines(
            &edges,
            LineDetectionOptions {
                vote_threshold,
                suppression_radius: 8,
            },
        );
        debug!(line_count = lines.len(), vote_threshold, "Hough lines detected");

        if lines.len() < 3 {
            warn!(line_count = lines.len(), "Too few lines to measure skew; leaving image unchanged");
            return (image.clone(), DeskewInfo::failed(DeskewMethod::None, lines.len()));
        }

        let tilts = near_horizontal_tilts(&lines);
        if tilts.is_empty() {
            warn!(line_count = lines.len(), "No near-horizontal lines; leaving image unchanged");
            return (
                image.clone(),
                DeskewInfo::failed(DeskewMethod::InsufficientLines, 0),
            );
        }

        let coarse_deg = median(&tilts);
        let angle_deg = refine_tilt(&edges, coarse_deg);
        debug!(coarse_deg, angle_deg, "Tilt refined");
        let confidence = 1.0 - (std_dev(&tilts) / 10.0).min(1.0);

        if angle_deg.abs() < MIN_ROTATION_DEG {
            debug!(angle_deg, confidence, "Skew below rotation threshold");
            return (
                image.clone(),
                DeskewInfo {
                    angle_deg,
                    confidence,
                    method: DeskewMethod::SkippedSmallAngle,
                    num_lines: tilts.len(),
                },
            );
        }

        let rotated = image.rotated(angle_deg);
        info!(angle_deg, confidence, num_lines = tilts.len(), "Skew corrected");
        (
            rotated,
            DeskewInfo {
                angle_deg,
                confidence,
                method: DeskewMethod::HoughMedian,
                num_lines: tilts.len(),
            },
        )
    }
}

/// Tilt in degrees of every line within 45 degrees of horizontal.
///
/// A `PolarLine` satisfies `x cos(theta) + y sin(theta) = r`, so a level row
/// has `theta = 90` and a row descending to the right has `theta > 90`.
fn near_horizontal_tilts(lines: &[PolarLine]) -> Vec<f64> {
    lines
        .iter()
        .map(|line| line.angle_in_degrees as f64 - 90.0)
        .filter(|tilt| tilt.abs() < MAX_TILT_DEG)
        .collect()
}

/// Search `coarse_deg ± 1` in 0.1 degree steps for the tilt at which edge
/// pixels, projected along lines of that tilt, pile into the fewest rows.
///
/// Sharpness is the sum of squared row counts. Hough angles are whole
/// degrees; this recovers the fraction.
fn refine_tilt(edges: &GrayImage, coarse_deg: f64) -> f64 {
    let points: Vec<(f64, f64)> = edges
        .enumerate_pixels()
        .filter(|(_, _, p)| p.0[0] > 0)
        .map(|(x, y, _)| (x as f64, y as f64))
        .collect();
    if points.is_empty() {
        return coarse_deg;
    }
    let cx = edges.width() as f64 / 2.0;
    let height = edges.height() as f64;

    let mut best = (coarse_deg, f64::NEG_INFINITY);
    for step in -REFINE_STEPS..=REFINE_STEPS {
        let tilt = coarse_deg + step as f64 * REFINE_STEP_DEG;
        let slope = tilt.to_radians().tan();
        let margin = (cx * slope.abs()).ceil() + 1.0;
        let mut rows = vec![0u32; (height + 2.0 * margin) as usize + 1];
        for &(x, y) in &points {
            let row = (y - (x - cx) * slope + margin).round();
            if row >= 0.0 && (row as usize) < rows.len() {
                rows[row as usize] += 1;
            }
        }
        let sharpness: f64 = rows.iter().map(|&c| (c as f64).powi(2)).sum();
        if sharpness > best.1 {
            best = (tilt, sharpness);
        }
    }
    best.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ruled_page;

    fn corrector_for(image: &RasterImage) -> GeometricCorrector {
        GeometricCorrector::new(AdaptiveParams::new(image.width(), image.height(), 1500.0))
    }

    #[test]
    fn tilts_are_relative_to_horizontal() {
        let lines = [
            PolarLine { r: 10.0, angle_in_degrees: 90 },
            PolarLine { r: 10.0, angle_in_degrees: 93 },
            PolarLine { r: 10.0, angle_in_degrees: 0 },
        ];
        assert_eq!(near_horizontal_tilts(&lines), vec![0.0, 3.0]);
    }

    /// An aligned image is measured as level and left untouched.
    #[test]
    fn aligned_page_is_not_rotated() {
        let page = ruled_page(800, 600, 0.0);
        let (out, info) = corrector_for(&page).deskew(&page);
        assert_eq!(info.method, DeskewMethod::SkippedSmallAngle);
        assert!(info.angle_deg.abs() <= 1.0, "angle {}", info.angle_deg);
        assert_eq!(out.as_rgb(), page.as_rgb());
    }

    #[test]
    fn tilted_page_is_measured_and_levelled() {
        let page = ruled_page(800, 600, 3.0);
        let corrector = corrector_for(&page);
        let (levelled, info) = corrector.deskew(&page);
        assert_eq!(info.method, DeskewMethod::HoughMedian);
        assert!((info.angle_deg - 3.0).abs() <= 1.0, "angle {}", info.angle_deg);
        assert!(info.confidence > 0.5, "confidence {}", info.confidence);

        let (_, again) = corrector.deskew(&levelled);
        assert!(again.angle_deg.abs() <= 1.0, "residual {}", again.angle_deg);
    }

    /// Fractional tilts are measured to a tenth of a degree, not rounded to
    /// the Hough bin.
    #[test]
    fn fractional_tilt_is_recovered() {
        for tilt in [0.6, 1.3, 2.4] {
            let page = ruled_page(800, 600, tilt);
            let (_, info) = corrector_for(&page).deskew(&page);
            assert_eq!(info.method, DeskewMethod::HoughMedian, "tilt {tilt}");
            assert!((info.angle_deg - tilt).abs() <= 0.15, "tilt {tilt}: measured {}", info.angle_deg);
        }
    }

    #[test]
    fn small_fractional_tilt_is_skipped() {
        let page = ruled_page(800, 600, 0.3);
        let (out, info) = corrector_for(&page).deskew(&page);
        assert_eq!(info.method, DeskewMethod::SkippedSmallAngle);
        assert!((info.angle_deg - 0.3).abs() <= 0.15, "measured {}", info.angle_deg);
        assert_eq!(out.as_rgb(), page.as_rgb());
    }

    #[test]
    fn refinement_keeps_coarse_angle_without_edges() {
        assert_eq!(refine_tilt(&GrayImage::new(50, 50), 2.0), 2.0);
    }

    #[test]
    fn blank_page_reports_no_lines() {
        let page = RasterImage::from_rgb(image::RgbImage::from_pixel(300, 200, image::Rgb([255, 255, 255])));
        let (out, info) = corrector_for(&page).deskew(&page);
        assert_eq!(info.method, DeskewMethod::None);
        assert_eq!(info.angle_deg, 0.0);
        assert_eq!(info.confidence, 0.0);
        assert_eq!(out.dimensions(), (300, 200));
    }
}
