// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// tracewerk-digitize: image-to-signal pipeline for scanned ECG strips.
//
// Validates and deskews the input, estimates the grid, removes it while
// protecting the trace, builds a binary trace mask, finds the calibration
// pulse and extracts calibrated per-lead signals.

pub mod calibration;
pub mod deskew;
pub mod extract;
pub mod grid;
pub mod ops;
pub mod params;
pub mod pipeline;
pub mod quality;
pub mod raster;
pub mod trace_mask;
pub mod validate;

#[cfg(test)]
mod testing;

// Re-export the primary structs so callers can use `tracewerk_digitize::Digitizer` etc.
pub use calibration::CalibrationPulseDetector;
pub use deskew::GeometricCorrector;
pub use extract::{AveragingWindowExtractor, SignalExtractor};
pub use grid::{GridDetector, GridRemoval, GridRemovalOutput, grid_remover};
pub use params::AdaptiveParams;
pub use pipeline::{Digitization, Digitizer, Intermediates, Preprocessed, Session, SignalExtraction};
pub use quality::QualityAssessor;
pub use raster::{RasterImage, save_gray};
pub use trace_mask::{TraceMaskBuilder, TraceMaskOutput};
pub use validate::{ImageValidator, ValidationReport};
