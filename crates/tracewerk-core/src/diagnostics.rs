// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pipeline warnings and plain-language explanations.
//
// A warning never stops a run. Each one names the stage that raised it, what
// was measured, and a suggestion the operator can act on (rescan, crop,
// change strategy). Fatal errors get the same treatment via `humanize_error`.

use std::fmt;

use serde::Serialize;

use crate::error::TracewerkError;

/// How much a warning should worry the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Worth knowing, output is usually fine.
    Info,
    /// Output is usable but one stage ran on a fallback.
    Degraded,
    /// Output is probably wrong and should be checked by hand.
    Unreliable,
}

/// Pipeline stage that produced a warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Validation,
    Deskew,
    GridDetection,
    GridRemoval,
    TraceMask,
    Calibration,
    Extraction,
    Quality,
}

/// What was observed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WarningKind {
    LowResolution { min_dimension: u32, minimum: u32 },
    BelowRecommendedResolution { min_dimension: u32, recommended: u32 },
    UnusualBrightness { mean: f64 },
    LowContrast { std_dev: f64 },
    LowDeskewConfidence { confidence: f64 },
    LowGridConfidence { confidence: f64 },
    LowTraceContinuity { continuity: f64 },
    CalibrationPulseMissing,
    NoLeadsDetected,
    LowLeadCoverage { lead: usize, coverage: f64 },
    LowOverallQuality { overall: f64, threshold: f64 },
}

/// A non-fatal finding attached to a run's output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Warning {
    pub stage: Stage,
    #[serde(flatten)]
    pub kind: WarningKind,
}

impl Warning {
    pub fn new(stage: Stage, kind: WarningKind) -> Self {
        Self { stage, kind }
    }

    pub fn severity(&self) -> Severity {
        match self.kind {
            WarningKind::BelowRecommendedResolution { .. }
            | WarningKind::UnusualBrightness { .. }
            | WarningKind::LowDeskewConfidence { .. } => Severity::Info,
            WarningKind::LowResolution { .. }
            | WarningKind::LowContrast { .. }
            | WarningKind::LowGridConfidence { .. }
            | WarningKind::CalibrationPulseMissing
            | WarningKind::LowLeadCoverage { .. } => Severity::Degraded,
            WarningKind::LowTraceContinuity { .. }
            | WarningKind::NoLeadsDetected
            | WarningKind::LowOverallQuality { .. } => Severity::Unreliable,
        }
    }

    /// What the operator can do about it.
    pub fn suggestion(&self) -> &'static str {
        match self.kind {
            WarningKind::LowResolution { .. } => {
                "Rescan at a higher resolution (at least 300 dpi) so grid lines are several pixels apart."
            }
            WarningKind::BelowRecommendedResolution { .. } => {
                "Results are usually fine, but a higher-resolution scan improves grid detection."
            }
            WarningKind::UnusualBrightness { .. } => {
                "Avoid glare and shadows; scan or photograph the strip under even lighting."
            }
            WarningKind::LowContrast { .. } => {
                "The trace is faint. Increase scanner contrast or use the morphology strategy."
            }
            WarningKind::LowDeskewConfidence { .. } => {
                "Skew could not be measured reliably. Place the strip square to the scanner edge."
            }
            WarningKind::LowGridConfidence { .. } => {
                "Grid spacing is uncertain, so time and voltage scales may be off. Check them against a known interval."
            }
            WarningKind::LowTraceContinuity { .. } => {
                "The trace is broken in many places. Try a more conservative fallback strategy."
            }
            WarningKind::CalibrationPulseMissing => {
                "No calibration pulse was found; voltages assume 10 mm/mV. Include the pulse at the left edge if possible."
            }
            WarningKind::NoLeadsDetected => {
                "No trace could be followed. Check that the image contains an ECG trace and try the other grid removal method."
            }
            WarningKind::LowLeadCoverage { .. } => {
                "Part of this lead was interpolated across gaps. Treat fine detail with caution."
            }
            WarningKind::LowOverallQuality { .. } => {
                "Overall quality is low. Review the mask and signals by hand before using them."
            }
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            WarningKind::LowResolution { min_dimension, minimum } => write!(
                f,
                "low resolution: shorter side is {min_dimension}px (minimum {minimum}px)"
            ),
            WarningKind::BelowRecommendedResolution { min_dimension, recommended } => write!(
                f,
                "shorter side is {min_dimension}px, below the recommended {recommended}px"
            ),
            WarningKind::UnusualBrightness { mean } => {
                write!(f, "unusual brightness: mean intensity {mean:.1}")
            }
            WarningKind::LowContrast { std_dev } => {
                write!(f, "low contrast: intensity std {std_dev:.1}")
            }
            WarningKind::LowDeskewConfidence { confidence } => {
                write!(f, "low deskew confidence: {confidence:.2}")
            }
            WarningKind::LowGridConfidence { confidence } => {
                write!(f, "low grid detection confidence: {confidence:.2}")
            }
            WarningKind::LowTraceContinuity { continuity } => {
                write!(f, "low trace continuity: {continuity:.2}")
            }
            WarningKind::CalibrationPulseMissing => {
                f.write_str("calibration pulse not detected, using grid-based calibration")
            }
            WarningKind::NoLeadsDetected => f.write_str("no leads detected"),
            WarningKind::LowLeadCoverage { lead, coverage } => {
                write!(f, "lead {lead} covers only {:.0}% of its span", coverage * 100.0)
            }
            WarningKind::LowOverallQuality { overall, threshold } => write!(
                f,
                "overall quality {overall:.2} is below the threshold {threshold:.2}"
            ),
        }
    }
}

// -- Fatal errors -------------------------------------------------------------

/// A plain-language version of a fatal error.
#[derive(Debug, Clone)]
pub struct HumanError {
    pub message: String,
    pub suggestion: String,
    /// Whether a different input or setting could succeed.
    pub retriable: bool,
}

/// Explain a `TracewerkError` to someone who is not reading the source.
pub fn humanize_error(err: &TracewerkError) -> HumanError {
    match err {
        TracewerkError::EmptyImage => HumanError {
            message: "The image is empty.".into(),
            suggestion: "Check that the file is a scan or photo of an ECG strip.".into(),
            retriable: true,
        },
        TracewerkError::ImageDecode(detail) => HumanError {
            message: "The image could not be read.".into(),
            suggestion: format!("Save the scan as PNG or JPEG and try again. ({detail})"),
            retriable: true,
        },
        TracewerkError::ImageEncode(detail) => HumanError {
            message: "An output image could not be written.".into(),
            suggestion: format!("Check free disk space and the output folder. ({detail})"),
            retriable: true,
        },
        TracewerkError::QualityTooLow { score, threshold } => HumanError {
            message: "The image quality is too low to digitize.".into(),
            suggestion: format!(
                "Rescan at a higher resolution with even lighting (quality {score:.2}, needed {threshold:.2})."
            ),
            retriable: true,
        },
        TracewerkError::InvalidConfig(detail) => HumanError {
            message: "The settings are not valid.".into(),
            suggestion: detail.clone(),
            retriable: false,
        },
        TracewerkError::NotPreprocessed => HumanError {
            message: "Signals were requested before the image was processed.".into(),
            suggestion: "Process the image first, then extract signals.".into(),
            retriable: false,
        },
        TracewerkError::Io(io) => HumanError {
            message: "A file could not be read or written.".into(),
            suggestion: format!("Check the path and permissions. ({io})"),
            retriable: true,
        },
        TracewerkError::Serialization(detail) => HumanError {
            message: "A settings or report file is malformed.".into(),
            suggestion: format!("Fix the JSON and try again. ({detail})"),
            retriable: false,
        },
    }
}
