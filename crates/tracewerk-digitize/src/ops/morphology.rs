// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Binary morphology with rectangular structuring elements, plus the
// element-wise mask algebra the grid and trace stages combine masks with.
//
// Rectangles are separable, so every operation runs as a horizontal pass
// followed by a vertical pass over per-line prefix counts. Pixels outside
// the image never constrain erosion and never feed dilation.

use image::{GrayImage, Luma};

use super::threshold::FG;

#[derive(Debug, Clone, Copy)]
enum Axis {
    Horizontal,
    Vertical,
}

#[derive(Debug, Clone, Copy)]
enum Op {
    Erode,
    Dilate,
}

/// Erode with a `kw` x `kh` rectangle.
pub fn erode(mask: &GrayImage, kw: u32, kh: u32) -> GrayImage {
    let horizontal = pass(mask, kw, Axis::Horizontal, Op::Erode);
    pass(&horizontal, kh, Axis::Vertical, Op::Erode)
}

/// Dilate with a `kw` x `kh` rectangle.
pub fn dilate(mask: &GrayImage, kw: u32, kh: u32) -> GrayImage {
    let horizontal = pass(mask, kw, Axis::Horizontal, Op::Dilate);
    pass(&horizontal, kh, Axis::Vertical, Op::Dilate)
}

/// Opening: keeps the parts of the mask a `kw` x `kh` rectangle fits inside.
pub fn open(mask: &GrayImage, kw: u32, kh: u32) -> GrayImage {
    dilate(&erode(mask, kw, kh), kw, kh)
}

/// Closing: fills gaps narrower than a `kw` x `kh` rectangle.
pub fn close(mask: &GrayImage, kw: u32, kh: u32) -> GrayImage {
    erode(&dilate(mask, kw, kh), kw, kh)
}

/// One separable pass along `axis` with a segment of length `k`.
///
/// The segment anchor sits at `k / 2`. Dilation uses the reflected segment,
/// so `open`/`close` are exact for even lengths too.
fn pass(mask: &GrayImage, k: u32, axis: Axis, op: Op) -> GrayImage {
    if k <= 1 {
        return mask.clone();
    }
    let (w, h) = mask.dimensions();
    let (lines, len) = match axis {
        Axis::Horizontal => (h, w),
        Axis::Vertical => (w, h),
    };
    let k = k as i64;
    let anchor = k / 2;
    let (lo_off, hi_off) = match op {
        Op::Erode => (-anchor, k - 1 - anchor),
        Op::Dilate => (anchor + 1 - k, anchor),
    };

    let mut out = GrayImage::new(w, h);
    let mut prefix = vec![0u32; len as usize + 1];
    for line in 0..lines {
        let at = |i: u32| match axis {
            Axis::Horizontal => (i, line),
            Axis::Vertical => (line, i),
        };
        for i in 0..len {
            let (x, y) = at(i);
            prefix[i as usize + 1] = prefix[i as usize] + u32::from(mask.get_pixel(x, y).0[0] > 0);
        }
        for i in 0..len {
            let lo = (i as i64 + lo_off).clamp(0, len as i64) as usize;
            let hi = (i as i64 + hi_off + 1).clamp(0, len as i64) as usize;
            let count = prefix[hi] - prefix[lo];
            let on = match op {
                Op::Erode => hi > lo && count as usize == hi - lo,
                Op::Dilate => count > 0,
            };
            if on {
                let (x, y) = at(i);
                out.put_pixel(x, y, Luma([FG]));
            }
        }
    }
    out
}

// -- Mask algebra -------------------------------------------------------------

/// Build a mask from a per-pixel predicate.
pub fn mask_from_fn(width: u32, height: u32, f: impl Fn(u32, u32) -> bool) -> GrayImage {
    GrayImage::from_fn(width, height, |x, y| Luma([if f(x, y) { FG } else { 0 }]))
}

pub fn union(a: &GrayImage, b: &GrayImage) -> GrayImage {
    zip(a, b, |p, q| p || q)
}

pub fn intersection(a: &GrayImage, b: &GrayImage) -> GrayImage {
    zip(a, b, |p, q| p && q)
}

/// Pixels of `a` that are not in `b`.
pub fn difference(a: &GrayImage, b: &GrayImage) -> GrayImage {
    zip(a, b, |p, q| p && !q)
}

pub fn count_foreground(mask: &GrayImage) -> usize {
    mask.pixels().filter(|p| p.0[0] > 0).count()
}

fn zip(a: &GrayImage, b: &GrayImage, f: impl Fn(bool, bool) -> bool) -> GrayImage {
    let (w, h) = a.dimensions();
    mask_from_fn(w, h, |x, y| {
        let q = x < b.width() && y < b.height() && b.get_pixel(x, y).0[0] > 0;
        f(a.get_pixel(x, y).0[0] > 0, q)
    })
}
