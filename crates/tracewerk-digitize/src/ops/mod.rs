// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image and signal primitives shared by the pipeline stages.

pub mod clahe;
pub mod components;
pub mod inpaint;
pub mod morphology;
pub mod signal;
pub mod skeleton;
pub mod threshold;

pub use threshold::FG;
