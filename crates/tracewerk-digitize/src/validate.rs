// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Input quality gate: resolution, brightness, and contrast sub-scores.

use serde::Serialize;
use tracewerk_core::diagnostics::{Stage, Warning, WarningKind};
use tracing::{info, instrument, warn};

use crate::ops::signal::{mean, std_dev};
use crate::raster::RasterImage;

pub const MIN_RESOLUTION: u32 = 600;
pub const RECOMMENDED_RESOLUTION: u32 = 1500;

/// Outcome of validating one input image.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    /// Mean of the three sub-scores.
    pub quality_score: f64,
    pub resolution_score: f64,
    pub brightness_score: f64,
    pub contrast_score: f64,
    pub mean_brightness: f64,
    pub std_brightness: f64,
    pub warnings: Vec<Warning>,
}

/// Lenient input gate. Only an empty image or an overall score below the
/// threshold is rejected; everything else becomes a warning.
#[derive(Debug, Clone, Copy)]
pub struct ImageValidator {
    quality_threshold: f64,
}

impl ImageValidator {
    pub fn new(quality_threshold: f64) -> Self {
        Self { quality_threshold }
    }

    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn validate(&self, image: &RasterImage) -> ValidationReport {
        if image.is_empty() {
            warn!("Image is empty");
            return ValidationReport {
                is_valid: false,
                quality_score: 0.0,
                resolution_score: 0.0,
                brightness_score: 0.0,
                contrast_score: 0.0,
                mean_brightness: 0.0,
                std_brightness: 0.0,
                warnings: Vec::new(),
            };
        }

        let mut warnings = Vec::new();
        let min_dim = image.width().min(image.height());
        let resolution_score = resolution_score(min_dim);
        if min_dim < MIN_RESOLUTION {
            warnings.push(Warning::new(
                Stage::Validation,
                WarningKind::LowResolution {
                    min_dimension: min_dim,
                    minimum: MIN_RESOLUTION,
                },
            ));
        } else if min_dim < RECOMMENDED_RESOLUTION {
            warnings.push(Warning::new(
                Stage::Validation,
                WarningKind::BelowRecommendedResolution {
                    min_dimension: min_dim,
                    recommended: RECOMMENDED_RESOLUTION,
                },
            ));
        }

        let values: Vec<f64> = image.gray().pixels().map(|p| p.0[0] as f64).collect();
        let mean_brightness = mean(&values);
        let std_brightness = std_dev(&values);

        let brightness_score = if (30.0..=225.0).contains(&mean_brightness) {
            1.0
        } else {
            warnings.push(Warning::new(
                Stage::Validation,
                WarningKind::UnusualBrightness {
                    mean: mean_brightness,
                },
            ));
            0.5
        };

        let contrast_score = (std_brightness / 50.0).min(1.0);
        if std_brightness < 20.0 {
            warnings.push(Warning::new(
                Stage::Validation,
                WarningKind::LowContrast {
                    std_dev: std_brightness,
                },
            ));
        }

        let quality_score = (resolution_score + brightness_score + contrast_score) / 3.0;
        let is_valid = quality_score >= self.quality_threshold;
        for w in &warnings {
            warn!(warning = %w, "Validation warning");
        }
        info!(quality_score, is_valid, "Image validated");

        ValidationReport {
            is_valid,
            quality_score,
            resolution_score,
            brightness_score,
            contrast_score,
            mean_brightness,
            std_brightness,
            warnings,
        }
    }
}

/// Linear ramp: 0..0.7 below the minimum, 0.7..1.0 up to the recommended size.
///
/// Both pieces meet at the minimum and the top piece reaches 1.0 exactly at
/// the recommended size, so a larger image never scores lower.
fn resolution_score(min_dim: u32) -> f64 {
    let d = min_dim as f64;
    let min = MIN_RESOLUTION as f64;
    let rec = RECOMMENDED_RESOLUTION as f64;
    if d >= rec {
        1.0
    } else if d >= min {
        0.7 + 0.3 * (d - min) / (rec - min)
    } else {
        0.7 * d / min
    }
}
