// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Tracewerk.

use thiserror::Error;

/// Top-level error type for all Tracewerk operations.
///
/// Only conditions that stop a run are errors. Degraded-but-usable results
/// (weak grid, missing calibration pulse, broken traces) are reported as
/// [`crate::diagnostics::Warning`] values alongside the output.
#[derive(Debug, Error)]
pub enum TracewerkError {
    // -- Input errors --
    #[error("image is empty")]
    EmptyImage,

    #[error("image decoding failed: {0}")]
    ImageDecode(String),

    #[error("image encoding failed: {0}")]
    ImageEncode(String),

    #[error("image quality {score:.2} is below the threshold {threshold:.2}")]
    QualityTooLow { score: f64, threshold: f64 },

    // -- Usage errors --
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("signal extraction requested before the image was preprocessed")]
    NotPreprocessed,

    // -- Storage / persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl TracewerkError {
    /// Whether the error is caused by the input image rather than by the
    /// caller or the environment.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::EmptyImage | Self::ImageDecode(_) | Self::QualityTooLow { .. }
        )
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, TracewerkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_error_message_carries_both_numbers() {
        let err = TracewerkError::QualityTooLow {
            score: 0.21,
            threshold: 0.3,
        };
        assert_eq!(
            err.to_string(),
            "image quality 0.21 is below the threshold 0.30"
        );
        assert!(err.is_input_error());
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: TracewerkError = io.into();
        assert!(matches!(err, TracewerkError::Io(_)));
        assert!(!err.is_input_error());
    }
}
