// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Averaging-window extraction from a full-thickness trace mask.
//
// 1. Each column is split into vertical blobs; every blob becomes a
//    weighted point at its centre.
// 2. Points within half a grid cell horizontally are averaged together,
//    provided they stay vertically close to the running mean.
// 3. Averaged points are chained left to right into lead tracks.
// 4. Each track is resampled onto a one-pixel horizontal grid.

use image::GrayImage;
use tracewerk_core::types::BoundingBox;
use tracing::{debug, instrument};

use super::{PixelTrace, resample};
use crate::ops::FG;

/// Vertical blob separation, in grid cells.
const Y_STEP_CELLS: f64 = 0.4;
/// Horizontal averaging half-width, in grid cells.
const X_STEP_CELLS: f64 = 0.5;

/// Centre of one vertical run of foreground pixels in a column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlobPoint {
    pub x: f64,
    pub y: f64,
    /// Pixel count of the blob.
    pub weight: f64,
    pub column: u32,
}

/// Weighted mean of the blob points merged in one window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AveragedPoint {
    pub x: f64,
    pub y: f64,
    pub weight: f64,
    /// Distinct mask columns that contributed.
    pub columns: usize,
    pub first_column: u32,
    pub last_column: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct AveragingWindowExtractor {
    x_step: f64,
    y_step: f64,
    multi_lead: bool,
    min_lead_points: usize,
}

impl AveragingWindowExtractor {
    pub fn new(grid_px: f64, multi_lead: bool, min_lead_points: usize) -> Self {
        Self {
            x_step: X_STEP_CELLS * grid_px,
            y_step: Y_STEP_CELLS * grid_px,
            multi_lead,
            min_lead_points,
        }
    }

    #[instrument(skip_all, fields(width = mask.width(), height = mask.height()))]
    pub fn traces(&self, mask: &GrayImage) -> Vec<PixelTrace> {
        let blobs = column_blobs(mask, self.y_step);
        let averaged = average_windows(&blobs, self.x_step, self.y_step);
        let mut tracks = separate_leads(averaged, self.x_step, self.y_step);
        let found = tracks.len();
        tracks.retain(|t| t.len() >= self.min_lead_points);

        if !self.multi_lead
            && let Some(dominant) = tracks.iter().max_by_key(|t| t.len()).cloned()
        {
            tracks = vec![dominant];
        }
        debug!(
            blobs = blobs.len(),
            tracks_found = found,
            tracks_kept = tracks.len(),
            "Lead tracks"
        );

        // Top to bottom, so lead indices follow the printed layout.
        tracks.sort_by(|a, b| mean_y(a).total_cmp(&mean_y(b)));
        tracks.iter().map(|t| to_pixel_trace(t)).collect()
    }
}

/// Split every column into runs separated by more than `y_step` rows.
pub fn column_blobs(mask: &GrayImage, y_step: f64) -> Vec<BlobPoint> {
    let (width, height) = mask.dimensions();
    let mut points = Vec::new();

    for x in 0..width {
        let mut run: Option<(u32, u32, f64)> = None; // (last row, count, row sum)
        for y in 0..height {
            if mask.get_pixel(x, y).0[0] != FG {
                continue;
            }
            run = match run {
                Some((last, count, sum)) if (y as f64) <= last as f64 + y_step => {
                    Some((y, count + 1, sum + y as f64))
                }
                Some(finished) => {
                    points.push(blob_point(x, finished));
                    Some((y, 1, y as f64))
                }
                None => Some((y, 1, y as f64)),
            };
        }
        if let Some(finished) = run {
            points.push(blob_point(x, finished));
        }
    }
    points
}

fn blob_point(x: u32, (_, count, sum): (u32, u32, f64)) -> BlobPoint {
    BlobPoint {
        x: x as f64 + 0.5,
        y: sum / count as f64 + 0.5,
        weight: count as f64,
        column: x,
    }
}

/// Merge each unconsumed seed with the unconsumed points within `x_step`
/// of it horizontally and `y_step` of the running mean vertically.
///
/// `points` must be ordered by column, as `column_blobs` returns them.
pub fn average_windows(points: &[BlobPoint], x_step: f64, y_step: f64) -> Vec<AveragedPoint> {
    let mut consumed = vec![false; points.len()];
    let mut averaged = Vec::new();

    for i in 0..points.len() {
        if consumed[i] {
            continue;
        }
        consumed[i] = true;
        let seed = points[i];
        let mut acc = AveragedPoint {
            x: seed.x,
            y: seed.y,
            weight: seed.weight,
            columns: 1,
            first_column: seed.column,
            last_column: seed.column,
        };

        for j in i + 1..points.len() {
            let p = points[j];
            if p.x - seed.x > x_step {
                break;
            }
            if consumed[j] || (p.y - acc.y).abs() > y_step {
                continue;
            }
            consumed[j] = true;
            let total = acc.weight + p.weight;
            acc.x = (acc.x * acc.weight + p.x * p.weight) / total;
            acc.y = (acc.y * acc.weight + p.y * p.weight) / total;
            acc.weight = total;
            if p.column != acc.last_column {
                acc.columns += 1;
                acc.last_column = p.column;
            }
        }
        averaged.push(acc);
    }
    averaged
}

/// Chain averaged points into tracks, left to right.
///
/// A point joins the most recently extended track whose last point is
/// within `2 * y_step` vertically and `3 * x_step` horizontally; ties go to
/// the vertically closest. Otherwise it starts a new track.
pub fn separate_leads(mut points: Vec<AveragedPoint>, x_step: f64, y_step: f64) -> Vec<Vec<AveragedPoint>> {
    points.sort_by(|a, b| a.x.total_cmp(&b.x));
    let mut tracks: Vec<Vec<AveragedPoint>> = Vec::new();

    for p in points {
        let best = tracks
            .iter()
            .enumerate()
            .filter_map(|(i, t)| t.last().map(|last| (i, last)))
            .filter(|(_, last)| (p.y - last.y).abs() < 2.0 * y_step && p.x - last.x < 3.0 * x_step)
            .max_by(|(_, a), (_, b)| {
                a.x.total_cmp(&b.x)
                    .then_with(|| (p.y - b.y).abs().total_cmp(&(p.y - a.y).abs()))
            })
            .map(|(i, _)| i);

        match best {
            Some(i) => tracks[i].push(p),
            None => tracks.push(vec![p]),
        }
    }
    tracks
}

fn mean_y(track: &[AveragedPoint]) -> f64 {
    if track.is_empty() {
        return 0.0;
    }
    track.iter().map(|p| p.y).sum::<f64>() / track.len() as f64
}

/// Resample a track onto whole-pixel steps from its first point.
fn to_pixel_trace(track: &[AveragedPoint]) -> PixelTrace {
    let mut xs: Vec<f64> = Vec::with_capacity(track.len());
    let mut ys: Vec<f64> = Vec::with_capacity(track.len());
    for p in track {
        match xs.last() {
            // Points sharing an x are collapsed to their mean.
            Some(&last_x) if p.x <= last_x => {
                if let Some(y) = ys.last_mut() {
                    *y = (*y + p.y) / 2.0;
                }
            }
            _ => {
                xs.push(p.x);
                ys.push(p.y);
            }
        }
    }

    let (x_first, x_last) = match (xs.first(), xs.last()) {
        (Some(&first), Some(&last)) => (first, last),
        _ => {
            return PixelTrace {
                rows: Vec::new(),
                x_start: 0.0,
                coverage: 0.0,
                region: BoundingBox {
                    x_min: 0.0,
                    y_min: 0.0,
                    x_max: 0.0,
                    y_max: 0.0,
                },
            };
        }
    };
    let len = (x_last - x_first).floor() as usize + 1;
    let rows = resample(&xs, &ys, x_first, len);

    let first_column = track.iter().map(|p| p.first_column).min().unwrap_or(0);
    let last_column = track.iter().map(|p| p.last_column).max().unwrap_or(0);
    let span = (last_column - first_column + 1) as f64;
    let observed: usize = track.iter().map(|p| p.columns).sum();

    let (y_min, y_max) = ys
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &y| (lo.min(y), hi.max(y)));
    PixelTrace {
        rows,
        x_start: x_first,
        coverage: (observed as f64 / span).clamp(0.0, 1.0),
        region: BoundingBox {
            x_min: x_first,
            y_min,
            x_max: x_last,
            y_max,
        },
    }
}
