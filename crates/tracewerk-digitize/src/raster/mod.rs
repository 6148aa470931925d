// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The RGB working image and its colour-space views.

pub mod buffer;
pub mod color;

pub use buffer::{RasterImage, save_gray};
pub use color::HsvPlanes;
