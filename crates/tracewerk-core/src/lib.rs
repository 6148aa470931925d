// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Tracewerk core: types, configuration and error definitions shared by all crates.

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod types;

pub use config::{DigitizerConfig, FallbackStrategy, GridRemovalMethod, MaskMode};
pub use diagnostics::{Severity, Stage, Warning, WarningKind};
pub use error::{Result, TracewerkError};
pub use types::*;
