// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Grid spacing estimation. Two independent detectors (darkness projections
// and Hough line offsets) are fused, with a resolution heuristic when both
// fail.

use std::collections::HashMap;

use image::GrayImage;
use imageproc::edges::canny;
use imageproc::hough::{LineDetectionOptions, PolarLine, detect_lines};
use tracewerk_core::types::{DetectionMethod, GridInfo};
use tracing::{debug, info, instrument, warn};

use crate::ops::signal::{find_peaks, gaussian_filter1d, median, percentile};
use crate::raster::RasterImage;

const PROJECTION_SIGMA: f64 = 2.0;
const PEAK_DISTANCE: usize = 5;
const MIN_PEAKS_PER_AXIS: usize = 4;
const MIN_HOUGH_LINES: usize = 8;
/// Offsets closer than this belong to the two edges of one printed line.
const EDGE_MERGE_PX: f64 = 3.0;
const FALLBACK_CONFIDENCE: f64 = 0.3;

/// One detector's opinion of the small-box size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridEstimate {
    pub spacing_px: f64,
    pub confidence: f64,
    pub method: DetectionMethod,
}

/// Estimates the small-box pixel size of the printed grid.
#[derive(Debug, Clone, Copy)]
pub struct GridDetector {
    paper_speed_mm_s: f64,
    voltage_scale_mm_per_mv: f64,
}

impl GridDetector {
    pub fn new(paper_speed_mm_s: f64, voltage_scale_mm_per_mv: f64) -> Self {
        Self {
            paper_speed_mm_s,
            voltage_scale_mm_per_mv,
        }
    }

    /// Detect the grid. Always returns an estimate; when neither detector
    /// succeeds the result is a low-confidence guess from the image size.
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn detect(&self, image: &RasterImage) -> GridInfo {
        let gray = image.gray();
        let estimates: Vec<GridEstimate> = [detect_projection(&gray), detect_hough(&gray)]
            .into_iter()
            .flatten()
            .collect();

        let estimate = match estimates.as_slice() {
            [] => {
                let estimate = fallback_estimate(gray.width(), gray.height());
                warn!(
                    spacing_px = estimate.spacing_px,
                    "Grid not detected; using resolution heuristic"
                );
                estimate
            }
            [single] => *single,
            several => fuse(several),
        };

        info!(
            small_box_px = estimate.spacing_px,
            confidence = estimate.confidence,
            method = ?estimate.method,
            "Grid detected"
        );
        GridInfo::new(
            estimate.spacing_px,
            estimate.confidence,
            estimate.method,
            self.paper_speed_mm_s,
            self.voltage_scale_mm_per_mv,
        )
    }
}

/// Peak spacing of the smoothed row and column darkness projections.
///
/// The prominence floor is derived from the column projection and shared
/// by both axes.
pub fn detect_projection(gray: &GrayImage) -> Option<GridEstimate> {
    let (width, height) = gray.dimensions();
    if width == 0 || height == 0 {
        return None;
    }

    let mut columns = vec![0.0f64; width as usize];
    let mut rows = vec![0.0f64; height as usize];
    for (x, y, p) in gray.enumerate_pixels() {
        let darkness = 255.0 - p.0[0] as f64;
        columns[x as usize] += darkness;
        rows[y as usize] += darkness;
    }
    columns.iter_mut().for_each(|v| *v /= height as f64);
    rows.iter_mut().for_each(|v| *v /= width as f64);

    let columns = gaussian_filter1d(&columns, PROJECTION_SIGMA);
    let rows = gaussian_filter1d(&rows, PROJECTION_SIGMA);

    let spread = percentile(&columns, 75.0) - percentile(&columns, 50.0);
    let min_prominence = (0.4 * spread).max(5.0);

    let peaks_x = find_peaks(&columns, PEAK_DISTANCE, min_prominence);
    let peaks_y = find_peaks(&rows, PEAK_DISTANCE, min_prominence);
    debug!(
        peaks_x = peaks_x.len(),
        peaks_y = peaks_y.len(),
        min_prominence,
        "Projection peaks"
    );
    if peaks_x.len() < MIN_PEAKS_PER_AXIS || peaks_y.len() < MIN_PEAKS_PER_AXIS {
        return None;
    }

    let sx = median(&spacings(&peaks_x.iter().map(|&p| p as f64).collect::<Vec<_>>()));
    let sy = median(&spacings(&peaks_y.iter().map(|&p| p as f64).collect::<Vec<_>>()));
    Some(GridEstimate {
        spacing_px: (sx + sy) / 2.0,
        confidence: axis_agreement(sx, sy).min(0.9),
        method: DetectionMethod::Projection,
    })
}

/// Median offset spacing of near-vertical and near-horizontal Hough lines.
pub fn detect_hough(gray: &GrayImage) -> Option<GridEstimate> {
    let (width, height) = gray.dimensions();
    if width < 3 || height < 3 {
        return None;
    }

    let edges = canny(gray, 50.0, 150.0);
    let lines = detect_lines(
        &edges,
        LineDetectionOptions {
            vote_threshold: (width.min(height) / 4).max(100),
            suppression_radius: 2,
        },
    );
    debug!(line_count = lines.len(), "Grid Hough lines");
    if lines.len() < MIN_HOUGH_LINES {
        return None;
    }

    // theta near 90 is a horizontal row; theta near 0 or 180 is a column.
    let rows: Vec<PolarLine> = lines
        .iter()
        .copied()
        .filter(|l| (85..=95).contains(&l.angle_in_degrees))
        .collect();
    let columns: Vec<PolarLine> = lines
        .iter()
        .copied()
        .filter(|l| l.angle_in_degrees < 5 || l.angle_in_degrees > 175)
        .collect();

    let sy = bucket_spacing(&rows)?;
    let sx = bucket_spacing(&columns)?;
    Some(GridEstimate {
        spacing_px: (sx + sy) / 2.0,
        confidence: (axis_agreement(sx, sy) * 0.85).min(0.85),
        method: DetectionMethod::Hough,
    })
}

/// Median spacing of one angle bucket, or `None` when it holds too few
/// lines.
fn bucket_spacing(lines: &[PolarLine]) -> Option<f64> {
    if lines.len() < MIN_PEAKS_PER_AXIS {
        return None;
    }

    // Near-axis neighbours of a strong line leak through suppression at an
    // angle one or two degrees off; only the most common angle is trusted.
    let mut counts: HashMap<u32, usize> = HashMap::new();
    for line in lines {
        *counts.entry(line.angle_in_degrees).or_default() += 1;
    }
    let modal = counts
        .iter()
        .max_by_key(|&(angle, count)| (*count, std::cmp::Reverse(*angle)))
        .map(|(angle, _)| *angle)?;

    let mut offsets: Vec<f64> = lines
        .iter()
        .filter(|l| l.angle_in_degrees == modal)
        .map(|l| l.r.abs() as f64)
        .collect();
    offsets.sort_by(f64::total_cmp);

    let mut merged: Vec<f64> = Vec::with_capacity(offsets.len());
    let mut group: Vec<f64> = Vec::new();
    for offset in offsets {
        if let Some(&last) = group.last()
            && offset - last > EDGE_MERGE_PX
        {
            merged.push(group.iter().sum::<f64>() / group.len() as f64);
            group.clear();
        }
        group.push(offset);
    }
    if !group.is_empty() {
        merged.push(group.iter().sum::<f64>() / group.len() as f64);
    }

    let diffs: Vec<f64> = spacings(&merged)
        .into_iter()
        .filter(|d| *d > 3.0 && *d < 100.0)
        .collect();
    if diffs.is_empty() {
        None
    } else {
        Some(median(&diffs))
    }
}

/// Confidence-weighted spacing of several estimates.
pub fn fuse(estimates: &[GridEstimate]) -> GridEstimate {
    let total: f64 = estimates.iter().map(|e| e.confidence).sum();
    let mean_confidence = total / estimates.len() as f64;
    let spacing_px = if total > 0.0 {
        estimates.iter().map(|e| e.spacing_px * e.confidence).sum::<f64>() / total
    } else {
        estimates.iter().map(|e| e.spacing_px).sum::<f64>() / estimates.len() as f64
    };
    GridEstimate {
        spacing_px,
        confidence: (mean_confidence * 1.1).min(0.95),
        method: DetectionMethod::Fusion,
    }
}

/// Roughly 200 small boxes across the shorter side, never below 4 px.
pub fn fallback_estimate(width: u32, height: u32) -> GridEstimate {
    GridEstimate {
        spacing_px: (width.min(height) as f64 / 200.0).max(4.0),
        confidence: FALLBACK_CONFIDENCE,
        method: DetectionMethod::FallbackHeuristic,
    }
}

fn spacings(positions: &[f64]) -> Vec<f64> {
    positions.windows(2).map(|w| w[1] - w[0]).collect()
}

fn axis_agreement(sx: f64, sy: f64) -> f64 {
    let larger = sx.max(sy);
    if larger <= 0.0 {
        return 0.0;
    }
    1.0 - (sx - sy).abs() / larger
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{PINK_GRID, WHITE, ecg_strip, grid_paper};
    use image::{Rgb, RgbImage};

    fn detector() -> GridDetector {
        GridDetector::new(25.0, 10.0)
    }

    /// Detected spacing is within 2 px of the drawn spacing.
    #[test]
    fn dark_grid_round_trip() {
        for spacing in [10u32, 12, 16] {
            let page = RasterImage::from_rgb(grid_paper(400, 400, spacing, Rgb([60, 60, 60])));
            let grid = detector().detect(&page);
            assert!(
                (grid.small_box_px - spacing as f64).abs() <= 2.0,
                "spacing {} detected {}",
                spacing,
                grid.small_box_px
            );
            assert!(grid.confidence > 0.5, "confidence {}", grid.confidence);
            assert_eq!(grid.paper_speed_mm_s, 25.0);
        }
    }

    #[test]
    fn projection_finds_pale_grid() {
        let gray = RasterImage::from_rgb(grid_paper(300, 300, 10, PINK_GRID)).gray();
        let estimate = detect_projection(&gray).expect("pale grid has projection peaks");
        assert!((estimate.spacing_px - 10.0).abs() <= 1.0);
        assert_eq!(estimate.confidence, 0.9);
    }

    #[test]
    fn hough_finds_dark_grid() {
        let gray = RasterImage::from_rgb(grid_paper(400, 400, 12, Rgb([60, 60, 60]))).gray();
        let estimate = detect_hough(&gray).expect("dark grid has Hough lines");
        assert!((estimate.spacing_px - 12.0).abs() <= 2.0, "{}", estimate.spacing_px);
        assert!(estimate.confidence <= 0.85);
    }

    #[test]
    fn trace_does_not_disturb_spacing() {
        let grid = detector().detect(&ecg_strip(600, 400));
        assert!((grid.small_box_px - 10.0).abs() <= 2.0, "{}", grid.small_box_px);
    }

    #[test]
    fn blank_page_falls_back() {
        let page = RasterImage::from_rgb(RgbImage::from_pixel(1000, 800, WHITE));
        let grid = detector().detect(&page);
        assert_eq!(grid.detection_method, DetectionMethod::FallbackHeuristic);
        assert_eq!(grid.small_box_px, 4.0);
        assert_eq!(grid.confidence, 0.3);
    }

    #[test]
    fn fallback_scales_with_size() {
        assert_eq!(fallback_estimate(3000, 2000).spacing_px, 10.0);
        assert_eq!(fallback_estimate(100, 100).spacing_px, 4.0);
    }

    #[test]
    fn fusion_weights_by_confidence() {
        let fused = fuse(&[
            GridEstimate {
                spacing_px: 10.0,
                confidence: 0.9,
                method: DetectionMethod::Projection,
            },
            GridEstimate {
                spacing_px: 12.0,
                confidence: 0.3,
                method: DetectionMethod::Hough,
            },
        ]);
        assert!((fused.spacing_px - 10.5).abs() < 1e-9);
        assert!((fused.confidence - 0.66).abs() < 1e-9);
        assert_eq!(fused.method, DetectionMethod::Fusion);
    }

    #[test]
    fn bucket_merges_edge_pairs() {
        let lines: Vec<PolarLine> = (0..6)
            .flat_map(|i| {
                let centre = 20.0 + 15.0 * i as f32;
                [
                    PolarLine { r: centre - 1.0, angle_in_degrees: 0 },
                    PolarLine { r: centre + 1.0, angle_in_degrees: 0 },
                ]
            })
            .chain([PolarLine { r: 33.0, angle_in_degrees: 1 }])
            .collect();
        assert_eq!(bucket_spacing(&lines), Some(15.0));
    }
}
