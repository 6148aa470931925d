// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The digitization pipeline.
//
// `Digitizer::process` runs the image stages (validate, deskew, detect grid,
// remove grid, build trace mask, score) and returns a `Preprocessed` value.
// `Digitizer::extract_signals` turns that into calibrated leads. `Session`
// wraps the two calls for callers that prefer a stateful two-step protocol.

use image::GrayImage;
use tracewerk_core::config::DigitizerConfig;
use tracewerk_core::diagnostics::{Stage, Warning, WarningKind};
use tracewerk_core::error::{Result, TracewerkError};
use tracewerk_core::types::{CalibrationInfo, DeskewInfo, GridInfo, LeadSignal, QualityScores, TraceQuality};
use tracing::{info, instrument, warn};

use crate::calibration::CalibrationPulseDetector;
use crate::deskew::GeometricCorrector;
use crate::extract::SignalExtractor;
use crate::grid::{GridDetector, grid_remover};
use crate::params::AdaptiveParams;
use crate::quality::QualityAssessor;
use crate::raster::RasterImage;
use crate::trace_mask::{TraceMaskBuilder, TraceMaskOutput};
use crate::validate::{ImageValidator, ValidationReport};

/// Masks kept from grid removal for inspection.
#[derive(Debug, Clone)]
pub struct Intermediates {
    /// Trace-likelihood map (morphology removal only).
    pub trace_hint: Option<GrayImage>,
    pub protect_mask: GrayImage,
    pub grid_mask: GrayImage,
}

/// Output of the image stages.
#[derive(Debug, Clone)]
pub struct Preprocessed {
    /// Deskewed, grid-free and contrast-enhanced image the mask was
    /// thresholded from.
    pub preprocessed_image: RasterImage,
    pub trace_mask: GrayImage,
    pub grid_info: GridInfo,
    pub quality: QualityScores,
    pub warnings: Vec<Warning>,
    pub deskew: DeskewInfo,
    pub trace_quality: TraceQuality,
    pub validation: ValidationReport,
    pub intermediates: Intermediates,
}

/// Output of signal extraction.
#[derive(Debug, Clone)]
pub struct SignalExtraction {
    pub calibration: CalibrationInfo,
    pub leads: Vec<LeadSignal>,
    pub warnings: Vec<Warning>,
}

/// Both phases of one run.
#[derive(Debug, Clone)]
pub struct Digitization {
    pub preprocessed: Preprocessed,
    pub signals: SignalExtraction,
}

impl Digitization {
    /// Warnings from every stage, in pipeline order.
    pub fn warnings(&self) -> impl Iterator<Item = &Warning> {
        self.preprocessed.warnings.iter().chain(self.signals.warnings.iter())
    }
}

/// Runs the pipeline with one validated configuration.
///
/// Holds no per-image state, so one instance can be shared across threads.
#[derive(Debug, Clone)]
pub struct Digitizer {
    config: DigitizerConfig,
}

impl Digitizer {
    pub fn new(config: DigitizerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &DigitizerConfig {
        &self.config
    }

    /// Run every image stage on `image`.
    ///
    /// Fails only on an empty image or one below the quality gate. Weak
    /// stages are reported in `Preprocessed::warnings`.
    #[instrument(skip_all, fields(width = image.width(), height = image.height(), method = %self.config.grid_removal_method))]
    pub fn process(&self, image: &RasterImage) -> Result<Preprocessed> {
        if image.is_empty() {
            return Err(TracewerkError::EmptyImage);
        }

        let validation = ImageValidator::new(self.config.quality_threshold).validate(image);
        if !validation.is_valid {
            warn!(score = validation.quality_score, "Image rejected by quality gate");
            return Err(TracewerkError::QualityTooLow {
                score: validation.quality_score,
                threshold: self.config.quality_threshold,
            });
        }
        let mut warnings = validation.warnings.clone();

        let (width, height) = image.dimensions();
        let params = AdaptiveParams::new(width, height, self.config.base_resolution);
        let (deskewed, deskew) = GeometricCorrector::new(params).deskew(image);

        let params = AdaptiveParams::new(deskewed.width(), deskewed.height(), self.config.base_resolution);
        let grid_info = GridDetector::new(self.config.paper_speed_mm_s, self.config.voltage_scale_mm_per_mv)
            .detect(&deskewed);

        let remover = grid_remover(&self.config, params);
        let removal = remover.remove(&deskewed, &grid_info);
        info!(strategy = remover.name(), "Grid removed");

        let TraceMaskOutput { enhanced, mask: trace_mask } =
            TraceMaskBuilder::new(params, self.config.mask_mode).build(&removal.cleaned, &grid_info);
        let trace_quality = QualityAssessor::assess_trace_quality(&trace_mask);
        let quality = QualityAssessor::compute_overall(validation.quality_score, grid_info.confidence, &trace_quality);
        warnings.extend(QualityAssessor::warnings(&quality, &deskew, self.config.quality_threshold));

        info!(
            grid_px = grid_info.small_box_px,
            continuity = trace_quality.continuity,
            overall = quality.overall,
            warnings = warnings.len(),
            "Preprocessing complete"
        );

        Ok(Preprocessed {
            preprocessed_image: enhanced,
            trace_mask,
            grid_info,
            quality,
            warnings,
            deskew,
            trace_quality,
            validation,
            intermediates: Intermediates {
                trace_hint: removal.trace_hint,
                protect_mask: removal.protect_mask,
                grid_mask: removal.grid_mask,
            },
        })
    }

    /// Calibrate against the pulse (or the grid) and extract every lead.
    #[instrument(skip_all, fields(grid_px = preprocessed.grid_info.small_box_px))]
    pub fn extract_signals(&self, preprocessed: &Preprocessed) -> SignalExtraction {
        let mask = &preprocessed.trace_mask;
        let grid = preprocessed.grid_info;
        let mut warnings = Vec::new();

        let calibration =
            CalibrationPulseDetector::new(grid, self.config.calibration_search_fraction).detect(mask);
        if !calibration.pulse_detected {
            warnings.push(Warning::new(Stage::Calibration, WarningKind::CalibrationPulseMissing));
        }

        let extracted = SignalExtractor::new(
            grid,
            self.config.mask_mode,
            self.config.multi_lead,
            self.config.min_lead_points,
        )
        .extract(mask, &calibration);
        warnings.extend(extracted.warnings);

        info!(
            leads = extracted.leads.len(),
            pulse_detected = calibration.pulse_detected,
            "Signal extraction complete"
        );
        SignalExtraction {
            calibration,
            leads: extracted.leads,
            warnings,
        }
    }

    /// `process` followed by `extract_signals`.
    pub fn run(&self, image: &RasterImage) -> Result<Digitization> {
        let preprocessed = self.process(image)?;
        let signals = self.extract_signals(&preprocessed);
        Ok(Digitization { preprocessed, signals })
    }
}

/// Two-step protocol over a `Digitizer`: `process` first, then
/// `extract_signals` on the stored result.
#[derive(Debug)]
pub struct Session {
    digitizer: Digitizer,
    preprocessed: Option<Preprocessed>,
}

impl Session {
    pub fn new(config: DigitizerConfig) -> Result<Self> {
        Ok(Self {
            digitizer: Digitizer::new(config)?,
            preprocessed: None,
        })
    }

    /// Process `image`, replacing any earlier result.
    pub fn process(&mut self, image: &RasterImage) -> Result<&Preprocessed> {
        self.preprocessed = None;
        let preprocessed = self.digitizer.process(image)?;
        Ok(self.preprocessed.insert(preprocessed))
    }

    pub fn preprocessed(&self) -> Option<&Preprocessed> {
        self.preprocessed.as_ref()
    }

    pub fn extract_signals(&self) -> Result<SignalExtraction> {
        let preprocessed = self.preprocessed.as_ref().ok_or(TracewerkError::NotPreprocessed)?;
        Ok(self.digitizer.extract_signals(preprocessed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ecg_strip, ecg_strip_leads};
    use image::RgbImage;
    use tracewerk_core::config::GridRemovalMethod;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn digitizer_is_shareable() {
        assert_send_sync::<Digitizer>();
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = DigitizerConfig {
            quality_threshold: 1.5,
            ..DigitizerConfig::default()
        };
        assert!(matches!(Digitizer::new(config), Err(TracewerkError::InvalidConfig(_))));
    }

    #[test]
    fn empty_image_is_an_error() {
        let digitizer = Digitizer::new(DigitizerConfig::default()).expect("default config");
        let empty = RasterImage::from_rgb(RgbImage::new(0, 0));
        assert!(matches!(digitizer.process(&empty), Err(TracewerkError::EmptyImage)));
    }

    #[test]
    fn strict_threshold_rejects_image() {
        let config = DigitizerConfig {
            quality_threshold: 0.95,
            ..DigitizerConfig::default()
        };
        let digitizer = Digitizer::new(config).expect("valid config");
        match digitizer.process(&ecg_strip(400, 300)) {
            Err(TracewerkError::QualityTooLow { score, threshold }) => {
                assert!(score < threshold);
                assert_eq!(threshold, 0.95);
            }
            other => panic!("expected QualityTooLow, got {other:?}"),
        }
    }

    #[test]
    fn session_requires_process_first() {
        let session = Session::new(DigitizerConfig::default()).expect("default config");
        assert!(session.preprocessed().is_none());
        assert!(matches!(session.extract_signals(), Err(TracewerkError::NotPreprocessed)));
    }

    /// A 1500x1000 strip with one red sine on a pink 1 mm grid comes out as
    /// a single lead whose amplitude matches the drawn 100 px peak to peak.
    fn assert_single_sine_lead(method: GridRemovalMethod) {
        let config = DigitizerConfig {
            grid_removal_method: method,
            ..DigitizerConfig::default()
        };
        let mut session = Session::new(config).expect("valid config");
        let preprocessed = session.process(&ecg_strip(1500, 1000)).expect("strip is processed");
        assert!((preprocessed.grid_info.small_box_px - 10.0).abs() <= 2.0);
        assert_eq!(preprocessed.trace_mask.dimensions(), (1500, 1000));
        assert!(preprocessed.trace_quality.continuity > 0.9);

        let signals = session.extract_signals().expect("preprocessed");
        assert!(!signals.calibration.pulse_detected);
        assert!(
            signals
                .warnings
                .iter()
                .any(|w| matches!(w.kind, WarningKind::CalibrationPulseMissing))
        );
        assert_eq!(signals.leads.len(), 1, "method {method}");

        let lead = &signals.leads[0];
        let expected = 100.0 * signals.calibration.mv_per_pixel;
        let (lo, hi) = lead.amplitude_range_mv().expect("lead has samples");
        assert!(
            ((hi - lo) - expected).abs() <= 0.1 * expected,
            "method {method}: peak to peak {} vs {expected}",
            hi - lo
        );
        assert!(lead.coverage > 0.9, "method {method}: coverage {}", lead.coverage);
        assert_eq!(lead.signal_mv.len(), lead.time_s.len());
    }

    #[test]
    fn color_removal_end_to_end() {
        assert_single_sine_lead(GridRemovalMethod::Color);
    }

    #[test]
    fn morphology_removal_end_to_end() {
        assert_single_sine_lead(GridRemovalMethod::Morphology);
    }

    #[test]
    fn run_collects_warnings_from_both_phases() {
        let digitizer = Digitizer::new(DigitizerConfig::default()).expect("default config");
        let result = digitizer.run(&ecg_strip(600, 400)).expect("strip is processed");
        let count = result.warnings().count();
        assert_eq!(
            count,
            result.preprocessed.warnings.len() + result.signals.warnings.len()
        );
        assert!(result.preprocessed.intermediates.trace_hint.is_some());
    }

    /// A 41-row strip leaves CLAHE with tiles a few rows tall.
    #[test]
    fn thin_strip_is_processed() {
        let config = DigitizerConfig {
            quality_threshold: 0.0,
            ..DigitizerConfig::default()
        };
        let digitizer = Digitizer::new(config).expect("valid config");
        let result = digitizer.run(&ecg_strip(600, 41)).expect("thin strip is processed");
        assert_eq!(result.preprocessed.trace_mask.dimensions(), (600, 41));
        assert_eq!(result.preprocessed.preprocessed_image.dimensions(), (600, 41));
    }

    #[test]
    fn two_lead_strip_yields_two_leads() {
        let digitizer = Digitizer::new(DigitizerConfig::default()).expect("default config");
        let result = digitizer
            .run(&ecg_strip_leads(1500, 1000, &[300.0, 700.0], 100.0))
            .expect("strip is processed");
        let signals = &result.signals;
        assert_eq!(signals.leads.len(), 2);

        let expected = 100.0 * signals.calibration.mv_per_pixel;
        for (lead, centre) in signals.leads.iter().zip([300.0, 700.0]) {
            let (lo, hi) = lead.amplitude_range_mv().expect("lead has samples");
            assert!(((hi - lo) - expected).abs() <= 0.1 * expected, "peak to peak {}", hi - lo);
            assert!(lead.coverage > 0.9, "coverage {}", lead.coverage);
            // Regions are in working-image pixels.
            let region = &lead.region;
            assert!(region.y_min < centre && centre < region.y_max);
            assert!(region.x_min >= 0.0 && region.x_max <= 1500.0);
            assert!(region.y_min >= 0.0 && region.y_max <= 1000.0);
        }
    }
}
