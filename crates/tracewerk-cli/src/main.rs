// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Tracewerk command-line digitizer.
//
// Entry point. Initialises logging, builds the configuration from an optional
// JSON file plus flags, runs the pipeline on one image and writes the
// preprocessed image, the trace mask and a JSON signal report.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use serde::Serialize;
use tracewerk_core::config::{DigitizerConfig, FallbackStrategy, GridRemovalMethod, MaskMode};
use tracewerk_core::diagnostics::{Severity, Warning, humanize_error};
use tracewerk_core::error::{Result, TracewerkError};
use tracewerk_core::types::{BoundingBox, CalibrationInfo, DeskewInfo, GridInfo, LeadSignal, QualityScores, TraceQuality};
use tracewerk_digitize::{Digitization, Digitizer, RasterImage, save_gray};

/// Digitize a scanned or photographed ECG strip into per-lead signals.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
struct Args {
    /// Input image (PNG, JPEG, ...).
    input: PathBuf,
    /// Directory to write preproc.png, mask.png and signals.json into.
    #[arg(long, short = 'o', default_value = "tracewerk-out")]
    output_dir: PathBuf,
    /// JSON config file; flags below override its values.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Grid removal method: color or morphology.
    #[arg(long)]
    method: Option<GridRemovalMethod>,
    /// Wider HSV thresholds for colour grid removal.
    #[arg(long, default_value_t = false)]
    aggressive: bool,
    /// Trace protection level: conservative, balanced or aggressive.
    #[arg(long)]
    strategy: Option<FallbackStrategy>,
    /// Keep only the dominant lead.
    #[arg(long, default_value_t = false)]
    single_lead: bool,
    /// Minimum accepted image quality in [0, 1].
    #[arg(long)]
    quality_threshold: Option<f64>,
    /// Trace mask shape: thick or skeleton.
    #[arg(long)]
    mask_mode: Option<MaskMode>,
    /// Also write the trace hint, protection mask and grid mask.
    #[arg(long, default_value_t = false)]
    debug: bool,
}

impl Args {
    fn digitizer_config(&self) -> Result<DigitizerConfig> {
        let mut config = match &self.config {
            Some(path) => DigitizerConfig::load(path)?,
            None => DigitizerConfig::default(),
        };
        if let Some(method) = self.method {
            config.grid_removal_method = method;
        }
        if self.aggressive {
            config.aggressive_grid_removal = true;
        }
        if let Some(strategy) = self.strategy {
            config.fallback_strategy = strategy;
        }
        if self.single_lead {
            config.multi_lead = false;
        }
        if let Some(threshold) = self.quality_threshold {
            config.quality_threshold = threshold;
        }
        if let Some(mode) = self.mask_mode {
            config.mask_mode = mode;
        }
        Ok(config)
    }
}

// -- Report -------------------------------------------------------------------

#[derive(Serialize)]
struct Report<'a> {
    input: String,
    grid: &'a GridInfo,
    calibration: &'a CalibrationInfo,
    quality: &'a QualityScores,
    deskew: &'a DeskewInfo,
    trace_quality: &'a TraceQuality,
    warnings: Vec<WarningReport<'a>>,
    leads: Vec<LeadReport<'a>>,
}

#[derive(Serialize)]
struct WarningReport<'a> {
    #[serde(flatten)]
    warning: &'a Warning,
    severity: Severity,
    message: String,
    suggestion: &'static str,
}

#[derive(Serialize)]
struct LeadReport<'a> {
    index: usize,
    sampling_rate: f64,
    duration_s: f64,
    amplitude_range_mv: Option<(f64, f64)>,
    quality_score: f64,
    coverage: f64,
    region: &'a BoundingBox,
    time_s: &'a [f64],
    signal_mv: &'a [f64],
}

impl<'a> LeadReport<'a> {
    fn new(index: usize, lead: &'a LeadSignal) -> Self {
        Self {
            index,
            sampling_rate: lead.sampling_rate,
            duration_s: lead.duration_s(),
            amplitude_range_mv: lead.amplitude_range_mv(),
            quality_score: lead.quality_score,
            coverage: lead.coverage,
            region: &lead.region,
            time_s: &lead.time_s,
            signal_mv: &lead.signal_mv,
        }
    }
}

fn report<'a>(input: &Path, result: &'a Digitization) -> Report<'a> {
    let pre = &result.preprocessed;
    Report {
        input: input.display().to_string(),
        grid: &pre.grid_info,
        calibration: &result.signals.calibration,
        quality: &pre.quality,
        deskew: &pre.deskew,
        trace_quality: &pre.trace_quality,
        warnings: result
            .warnings()
            .map(|warning| WarningReport {
                warning,
                severity: warning.severity(),
                message: warning.to_string(),
                suggestion: warning.suggestion(),
            })
            .collect(),
        leads: result
            .signals
            .leads
            .iter()
            .enumerate()
            .map(|(i, lead)| LeadReport::new(i, lead))
            .collect(),
    }
}

// -- Run ----------------------------------------------------------------------

fn run(args: &Args) -> Result<Digitization> {
    let digitizer = Digitizer::new(args.digitizer_config()?)?;
    let image = RasterImage::from_bytes(&std::fs::read(&args.input)?)?;
    let result = digitizer.run(&image)?;

    std::fs::create_dir_all(&args.output_dir)?;
    let pre = &result.preprocessed;
    std::fs::write(args.output_dir.join("preproc.png"), pre.preprocessed_image.to_png_bytes()?)?;
    save_gray(&pre.trace_mask, args.output_dir.join("mask.png"))?;

    if args.debug {
        let stages = &pre.intermediates;
        if let Some(hint) = &stages.trace_hint {
            save_gray(hint, args.output_dir.join("trace_hint.png"))?;
        }
        save_gray(&stages.protect_mask, args.output_dir.join("protect_mask.png"))?;
        save_gray(&stages.grid_mask, args.output_dir.join("grid_mask.png"))?;
    }

    let json = serde_json::to_string_pretty(&report(&args.input, &result))?;
    std::fs::write(args.output_dir.join("signals.json"), json)?;
    tracing::info!(output_dir = %args.output_dir.display(), "Outputs written");
    Ok(result)
}

fn print_summary(result: &Digitization) {
    let pre = &result.preprocessed;
    let calibration = &result.signals.calibration;
    println!(
        "Grid: {:.2} px/mm ({:?}, confidence {:.2})",
        pre.grid_info.small_box_px, pre.grid_info.detection_method, pre.grid_info.confidence
    );
    println!(
        "Calibration: {} (baseline row {:.1}, {:.4} mV/px)",
        if calibration.pulse_detected { "pulse detected" } else { "grid fallback" },
        calibration.baseline_y,
        calibration.mv_per_pixel
    );
    println!("Quality: {:.2}", pre.quality.overall);
    println!("Leads: {}", result.signals.leads.len());
    for (i, lead) in result.signals.leads.iter().enumerate() {
        let (lo, hi) = lead.amplitude_range_mv().unwrap_or((0.0, 0.0));
        println!(
            "  lead {i}: {:.2} s, {lo:.2}..{hi:.2} mV, coverage {:.0}%, quality {:.2}",
            lead.duration_s(),
            lead.coverage * 100.0,
            lead.quality_score
        );
    }
    for warning in result.warnings() {
        println!("Warning [{:?}]: {warning}", warning.severity());
        println!("  {}", warning.suggestion());
    }
}

/// Exit status: 2 when the input image is at fault, 1 for everything else.
fn exit_code(err: &TracewerkError) -> u8 {
    if err.is_input_error() { 2 } else { 1 }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    tracing::info!(input = %args.input.display(), "Tracewerk starting");

    match run(&args) {
        Ok(result) => {
            print_summary(&result);
            ExitCode::SUCCESS
        }
        Err(err) => {
            let human = humanize_error(&err);
            tracing::error!(error = %err, "Digitization failed");
            eprintln!("{}", human.message);
            eprintln!("{}", human.suggestion);
            ExitCode::from(exit_code(&err))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    /// Pink 10 px grid with a red sine, 600x400.
    fn write_strip(path: &Path) {
        let mut rgb = RgbImage::from_fn(600, 400, |x, y| {
            if x % 10 == 0 || y % 10 == 0 { Rgb([235, 185, 185]) } else { Rgb([255, 255, 255]) }
        });
        for x in 0..600u32 {
            let y = 200.0 - 50.0 * (std::f64::consts::TAU * 3.0 * x as f64 / 600.0).sin();
            let y = y.round() as u32;
            for row in y - 1..=y + 1 {
                rgb.put_pixel(x, row, Rgb([220, 30, 30]));
            }
        }
        rgb.save(path).expect("write test image");
    }

    #[test]
    fn flags_override_config_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config_path = dir.path().join("config.json");
        std::fs::write(&config_path, r#"{"grid_removal_method": "color", "quality_threshold": 0.2}"#)
            .expect("write config");

        let args = Args::parse_from([
            "tracewerk",
            "in.png",
            "--config",
            config_path.to_str().expect("utf-8 path"),
            "--quality-threshold",
            "0.4",
            "--single-lead",
            "--mask-mode",
            "skeleton",
        ]);
        let config = args.digitizer_config().expect("valid config");
        assert_eq!(config.grid_removal_method, GridRemovalMethod::Color);
        assert_eq!(config.quality_threshold, 0.4);
        assert!(!config.multi_lead);
        assert_eq!(config.mask_mode, MaskMode::Skeleton);
        assert_eq!(config.fallback_strategy, FallbackStrategy::Balanced);
    }

    #[test]
    fn writes_outputs_and_report() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("strip.png");
        write_strip(&input);
        let out = dir.path().join("out");

        let args = Args::parse_from([
            "tracewerk",
            input.to_str().expect("utf-8 path"),
            "--output-dir",
            out.to_str().expect("utf-8 path"),
            "--debug",
        ]);
        let result = run(&args).expect("strip is digitized");

        for name in ["preproc.png", "mask.png", "signals.json", "protect_mask.png", "grid_mask.png", "trace_hint.png"] {
            assert!(out.join(name).exists(), "{name} missing");
        }
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(out.join("signals.json")).expect("read report"))
                .expect("report is JSON");
        let leads = json["leads"].as_array().expect("leads array");
        assert_eq!(leads.len(), result.signals.leads.len());
        assert!(json["grid"]["small_box_px"].as_f64().is_some());
        assert!(
            json["warnings"]
                .as_array()
                .expect("warnings array")
                .iter()
                .any(|w| w["kind"] == "calibration_pulse_missing")
        );
    }

    #[test]
    fn missing_input_is_an_io_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let args = Args::parse_from([
            "tracewerk",
            dir.path().join("absent.png").to_str().expect("utf-8 path"),
        ]);
        let err = run(&args).expect_err("no such file");
        assert!(matches!(err, TracewerkError::Io(_)));
        assert_eq!(exit_code(&err), 1);
    }

    #[test]
    fn undecodable_input_exits_with_input_status() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("broken.png");
        std::fs::write(&input, b"not an image").expect("write input");
        let args = Args::parse_from(["tracewerk", input.to_str().expect("utf-8 path")]);
        let err = run(&args).expect_err("garbage bytes");
        assert!(matches!(err, TracewerkError::ImageDecode(_)));
        assert_eq!(exit_code(&err), 2);
        assert_eq!(exit_code(&TracewerkError::InvalidConfig("x".into())), 1);
    }

    #[test]
    fn written_preview_decodes_back() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("strip.png");
        write_strip(&input);
        let out = dir.path().join("out");
        let args = Args::parse_from([
            "tracewerk",
            input.to_str().expect("utf-8 path"),
            "--output-dir",
            out.to_str().expect("utf-8 path"),
        ]);
        let result = run(&args).expect("strip is digitized");
        let preview = RasterImage::from_bytes(&std::fs::read(out.join("preproc.png")).expect("read preview"))
            .expect("preview is PNG");
        assert_eq!(preview.as_rgb(), result.preprocessed.preprocessed_image.as_rgb());
    }
}
