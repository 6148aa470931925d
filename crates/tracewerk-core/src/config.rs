// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Digitizer configuration.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TracewerkError};

/// How grid lines are separated from the ECG trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GridRemovalMethod {
    /// HSV colour separation. Fast, suited to colour scans with a pale grid.
    Color,
    /// Adaptive trace protection, morphological grid extraction, and
    /// inpainting. Slower, robust to photos and monochrome prints.
    Morphology,
}

/// How permissive trace protection is in the morphology strategy.
///
/// Each level is a pair of offsets (permissive, strict) above the local
/// mean of the trace hint. Lower offsets protect more pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackStrategy {
    Conservative,
    Balanced,
    Aggressive,
}

impl FallbackStrategy {
    /// `(permissive, strict)` threshold offsets on the 0..255 hint scale.
    ///
    /// The hint is min-max stretched, so pink grid lines sit a few dozen
    /// levels above their local mean; offsets below that protect the grid.
    pub fn protection_offsets(self) -> (f64, f64) {
        match self {
            Self::Conservative => (20.0, 44.0),
            Self::Balanced => (32.0, 64.0),
            Self::Aggressive => (44.0, 88.0),
        }
    }
}

/// Shape of the final trace mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaskMode {
    /// Full-thickness trace, consumed by the averaging-window extractor.
    Thick,
    /// One-pixel skeleton with a per-column median scan. Single lead,
    /// low-noise scans only.
    Skeleton,
}

/// Settings for one digitization run.
///
/// Every field has a default, so a partial JSON document is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DigitizerConfig {
    /// Grid removal strategy.
    pub grid_removal_method: GridRemovalMethod,
    /// Use the wider HSV thresholds in colour separation.
    pub aggressive_grid_removal: bool,
    /// Trace protection level in morphology removal.
    pub fallback_strategy: FallbackStrategy,
    /// Separate the mask into several leads instead of keeping the dominant one.
    pub multi_lead: bool,
    /// Minimum image quality accepted by the validator, and the overall
    /// quality below which a warning is raised.
    pub quality_threshold: f64,
    /// Paper speed in mm/s (standard 25).
    pub paper_speed_mm_s: f64,
    /// Vertical scale in mm/mV (standard 10).
    pub voltage_scale_mm_per_mv: f64,
    /// Trace mask shape.
    pub mask_mode: MaskMode,
    /// Fraction of the image width, from the left edge, searched for the
    /// calibration pulse.
    pub calibration_search_fraction: f64,
    /// Resolution (shorter side, px) at which adaptive parameters have scale 1.
    pub base_resolution: f64,
    /// Tracks with fewer averaged points than this are discarded.
    pub min_lead_points: usize,
}

impl Default for DigitizerConfig {
    fn default() -> Self {
        Self {
            grid_removal_method: GridRemovalMethod::Morphology,
            aggressive_grid_removal: false,
            fallback_strategy: FallbackStrategy::Balanced,
            multi_lead: true,
            quality_threshold: 0.3,
            paper_speed_mm_s: 25.0,
            voltage_scale_mm_per_mv: 10.0,
            mask_mode: MaskMode::Thick,
            calibration_search_fraction: 0.2,
            base_resolution: 1500.0,
            min_lead_points: 10,
        }
    }
}

impl DigitizerConfig {
    /// Parse a (possibly partial) JSON config and validate it.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    /// Reject values the pipeline cannot work with.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.quality_threshold) {
            return Err(TracewerkError::InvalidConfig(format!(
                "quality_threshold must be within [0, 1], got {}",
                self.quality_threshold
            )));
        }
        if !(self.paper_speed_mm_s.is_finite() && self.paper_speed_mm_s > 0.0) {
            return Err(TracewerkError::InvalidConfig(format!(
                "paper_speed_mm_s must be positive, got {}",
                self.paper_speed_mm_s
            )));
        }
        if !(self.voltage_scale_mm_per_mv.is_finite() && self.voltage_scale_mm_per_mv > 0.0) {
            return Err(TracewerkError::InvalidConfig(format!(
                "voltage_scale_mm_per_mv must be positive, got {}",
                self.voltage_scale_mm_per_mv
            )));
        }
        if !(self.calibration_search_fraction > 0.0 && self.calibration_search_fraction <= 1.0) {
            return Err(TracewerkError::InvalidConfig(format!(
                "calibration_search_fraction must be within (0, 1], got {}",
                self.calibration_search_fraction
            )));
        }
        if !(self.base_resolution.is_finite() && self.base_resolution > 0.0) {
            return Err(TracewerkError::InvalidConfig(format!(
                "base_resolution must be positive, got {}",
                self.base_resolution
            )));
        }
        if self.min_lead_points < 2 {
            return Err(TracewerkError::InvalidConfig(format!(
                "min_lead_points must be at least 2, got {}",
                self.min_lead_points
            )));
        }
        Ok(())
    }
}

// -- Text forms ---------------------------------------------------------------

impl fmt::Display for GridRemovalMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Color => "color",
            Self::Morphology => "morphology",
        })
    }
}

impl FromStr for GridRemovalMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "color" | "colour" => Ok(Self::Color),
            "morphology" | "morph" => Ok(Self::Morphology),
            other => Err(format!(
                "unknown grid removal method '{other}' (expected color or morphology)"
            )),
        }
    }
}

impl fmt::Display for FallbackStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Conservative => "conservative",
            Self::Balanced => "balanced",
            Self::Aggressive => "aggressive",
        })
    }
}

impl FromStr for FallbackStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "conservative" => Ok(Self::Conservative),
            "balanced" => Ok(Self::Balanced),
            "aggressive" => Ok(Self::Aggressive),
            other => Err(format!(
                "unknown fallback strategy '{other}' (expected conservative, balanced or aggressive)"
            )),
        }
    }
}

impl fmt::Display for MaskMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Thick => "thick",
            Self::Skeleton => "skeleton",
        })
    }
}

impl FromStr for MaskMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "thick" => Ok(Self::Thick),
            "skeleton" => Ok(Self::Skeleton),
            other => Err(format!(
                "unknown mask mode '{other}' (expected thick or skeleton)"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = DigitizerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.grid_removal_method, GridRemovalMethod::Morphology);
        assert_eq!(config.fallback_strategy, FallbackStrategy::Balanced);
        assert!(config.multi_lead);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config =
            DigitizerConfig::from_json_str(r#"{"grid_removal_method": "color", "multi_lead": false}"#)
                .expect("valid config");
        assert_eq!(config.grid_removal_method, GridRemovalMethod::Color);
        assert!(!config.multi_lead);
        assert_eq!(config.paper_speed_mm_s, 25.0);
        assert_eq!(config.min_lead_points, 10);
    }

    #[test]
    fn out_of_range_threshold_is_rejected() {
        let err = DigitizerConfig::from_json_str(r#"{"quality_threshold": 1.5}"#).unwrap_err();
        assert!(matches!(err, TracewerkError::InvalidConfig(_)));
    }

    #[test]
    fn zero_paper_speed_is_rejected() {
        let config = DigitizerConfig {
            paper_speed_mm_s: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"fallback_strategy": "aggressive"}"#).expect("write");
        let config = DigitizerConfig::load(&path).expect("load");
        assert_eq!(config.fallback_strategy, FallbackStrategy::Aggressive);
    }

    #[test]
    fn enum_text_forms_round_trip() {
        for method in [GridRemovalMethod::Color, GridRemovalMethod::Morphology] {
            assert_eq!(method.to_string().parse::<GridRemovalMethod>(), Ok(method));
        }
        for strategy in [
            FallbackStrategy::Conservative,
            FallbackStrategy::Balanced,
            FallbackStrategy::Aggressive,
        ] {
            assert_eq!(strategy.to_string().parse::<FallbackStrategy>(), Ok(strategy));
        }
        assert!("sideways".parse::<MaskMode>().is_err());
    }

    #[test]
    fn stricter_strategies_use_higher_offsets() {
        let (c_lo, c_hi) = FallbackStrategy::Conservative.protection_offsets();
        let (a_lo, a_hi) = FallbackStrategy::Aggressive.protection_offsets();
        assert!(c_lo < a_lo && c_hi < a_hi);
    }
}
