// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Trace mask statistics and the overall quality score.

use image::GrayImage;
use tracewerk_core::diagnostics::{Stage, Warning, WarningKind};
use tracewerk_core::types::{DeskewInfo, QualityScores, TraceQuality};

use crate::ops::FG;

const MIN_CONTINUITY: f64 = 0.7;
const MIN_STAGE_CONFIDENCE: f64 = 0.5;

pub struct QualityAssessor;

impl QualityAssessor {
    /// Foreground fraction, column continuity and per-column density.
    pub fn assess_trace_quality(mask: &GrayImage) -> TraceQuality {
        let (width, height) = mask.dimensions();
        if width == 0 || height == 0 {
            return TraceQuality {
                coverage: 0.0,
                continuity: 0.0,
                density: 0.0,
            };
        }

        let mut foreground = 0usize;
        let mut columns_hit = vec![false; width as usize];
        for (x, _, p) in mask.enumerate_pixels() {
            if p.0[0] == FG {
                foreground += 1;
                columns_hit[x as usize] = true;
            }
        }
        let columns = columns_hit.iter().filter(|&&hit| hit).count();

        TraceQuality {
            coverage: foreground as f64 / (width as f64 * height as f64),
            continuity: columns as f64 / width as f64,
            density: foreground as f64 / width as f64,
        }
    }

    /// `0.2 * image + 0.3 * grid + 0.5 * continuity`. Trace protection is
    /// reported as the grid confidence it was steered by.
    pub fn compute_overall(image_quality: f64, grid_confidence: f64, trace: &TraceQuality) -> QualityScores {
        let overall = 0.2 * image_quality + 0.3 * grid_confidence + 0.5 * trace.continuity;
        QualityScores {
            image_quality,
            grid_detection: grid_confidence,
            trace_protection: grid_confidence,
            trace_continuity: trace.continuity,
            overall: overall.clamp(0.0, 1.0),
        }
    }

    /// Warnings for every stage score below its floor.
    pub fn warnings(scores: &QualityScores, deskew: &DeskewInfo, quality_threshold: f64) -> Vec<Warning> {
        let mut warnings = Vec::new();
        if deskew.confidence < MIN_STAGE_CONFIDENCE {
            warnings.push(Warning::new(
                Stage::Deskew,
                WarningKind::LowDeskewConfidence {
                    confidence: deskew.confidence,
                },
            ));
        }
        if scores.grid_detection < MIN_STAGE_CONFIDENCE {
            warnings.push(Warning::new(
                Stage::GridDetection,
                WarningKind::LowGridConfidence {
                    confidence: scores.grid_detection,
                },
            ));
        }
        if scores.trace_continuity < MIN_CONTINUITY {
            warnings.push(Warning::new(
                Stage::TraceMask,
                WarningKind::LowTraceContinuity {
                    continuity: scores.trace_continuity,
                },
            ));
        }
        if scores.overall < quality_threshold {
            warnings.push(Warning::new(
                Stage::Quality,
                WarningKind::LowOverallQuality {
                    overall: scores.overall,
                    threshold: quality_threshold,
                },
            ));
        }
        warnings
    }
}
