// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Grid detection and removal.

pub mod detect;
pub mod remove;

pub use detect::GridDetector;
pub use remove::{GridRemoval, GridRemovalOutput, grid_remover};
