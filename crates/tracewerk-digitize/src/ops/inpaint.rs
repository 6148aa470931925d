// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Fast-marching inpainting (Telea 2004).
//
// Masked pixels are filled in order of their distance to the known region.
// Each filled pixel is a weighted average of known or already-filled pixels
// within `radius`. Weights combine inverse squared distance, alignment with
// the marching direction and similarity of arrival time.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use image::{GrayImage, Rgb, RgbImage};

const INF: f64 = 1.0e6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flag {
    Known,
    Band,
    Inside,
}

/// Min-heap entry on arrival time.
#[derive(Debug, Clone, Copy)]
struct Front {
    t: f64,
    x: u32,
    y: u32,
}

impl PartialEq for Front {
    fn eq(&self, other: &Self) -> bool {
        self.t.total_cmp(&other.t) == Ordering::Equal
    }
}

impl Eq for Front {}

impl PartialOrd for Front {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Front {
    fn cmp(&self, other: &Self) -> Ordering {
        other.t.total_cmp(&self.t)
    }
}

/// Fill every foreground pixel of `mask` in `image`.
pub fn inpaint_telea(image: &RgbImage, mask: &GrayImage, radius: u32) -> RgbImage {
    let (w, h) = image.dimensions();
    let idx = |x: u32, y: u32| y as usize * w as usize + x as usize;

    let mut out = image.clone();
    let mut flags = vec![Flag::Known; (w as usize) * (h as usize)];
    let mut times = vec![0.0f64; flags.len()];
    let mut heap = BinaryHeap::new();

    for y in 0..h {
        for x in 0..w {
            if mask.get_pixel(x, y).0[0] > 0 {
                flags[idx(x, y)] = Flag::Inside;
                times[idx(x, y)] = INF;
            }
        }
    }
    if !flags.contains(&Flag::Inside) {
        return out;
    }

    // Known pixels touching the hole form the initial narrow band.
    for y in 0..h {
        for x in 0..w {
            if flags[idx(x, y)] != Flag::Known {
                continue;
            }
            let touches_hole = neighbours4(x, y, w, h).any(|(nx, ny)| flags[idx(nx, ny)] == Flag::Inside);
            if touches_hole {
                flags[idx(x, y)] = Flag::Band;
                heap.push(Front { t: 0.0, x, y });
            }
        }
    }

    let radius = radius.max(1) as i64;
    while let Some(Front { x, y, .. }) = heap.pop() {
        if flags[idx(x, y)] == Flag::Known {
            continue;
        }
        flags[idx(x, y)] = Flag::Known;

        for (nx, ny) in neighbours4(x, y, w, h) {
            if flags[idx(nx, ny)] != Flag::Inside {
                continue;
            }
            let t = arrival_time(&flags, &times, w, h, nx, ny);
            times[idx(nx, ny)] = t;
            flags[idx(nx, ny)] = Flag::Band;

            let value = weighted_fill(&out, &flags, &times, nx, ny, radius);
            out.put_pixel(nx, ny, value);
            heap.push(Front { t, x: nx, y: ny });
        }
    }

    out
}

fn neighbours4(x: u32, y: u32, w: u32, h: u32) -> impl Iterator<Item = (u32, u32)> {
    let (x, y) = (x as i64, y as i64);
    [(x - 1, y), (x + 1, y), (x, y - 1), (x, y + 1)]
        .into_iter()
        .filter(move |&(nx, ny)| nx >= 0 && ny >= 0 && nx < w as i64 && ny < h as i64)
        .map(|(nx, ny)| (nx as u32, ny as u32))
}

/// Eikonal update from the four quadrant neighbour pairs.
fn arrival_time(flags: &[Flag], times: &[f64], w: u32, h: u32, x: u32, y: u32) -> f64 {
    let get = |dx: i64, dy: i64| -> Option<f64> {
        let (nx, ny) = (x as i64 + dx, y as i64 + dy);
        if nx < 0 || ny < 0 || nx >= w as i64 || ny >= h as i64 {
            return None;
        }
        let i = ny as usize * w as usize + nx as usize;
        (flags[i] != Flag::Inside).then_some(times[i])
    };

    let pairs = [((0, -1), (-1, 0)), ((0, 1), (-1, 0)), ((0, -1), (1, 0)), ((0, 1), (1, 0))];
    pairs
        .iter()
        .map(|&((ax, ay), (bx, by))| solve(get(ax, ay), get(bx, by)))
        .fold(INF, f64::min)
}

fn solve(a: Option<f64>, b: Option<f64>) -> f64 {
    match (a, b) {
        (Some(t1), Some(t2)) => {
            let d = 2.0 - (t1 - t2) * (t1 - t2);
            if d < 0.0 {
                return 1.0 + t1.min(t2);
            }
            let r = d.sqrt();
            let s = (t1 + t2 - r) / 2.0;
            if s >= t1 && s >= t2 {
                s
            } else {
                let s = s + r;
                if s >= t1 && s >= t2 { s } else { 1.0 + t1.min(t2) }
            }
        }
        (Some(t), None) | (None, Some(t)) => 1.0 + t,
        (None, None) => INF,
    }
}

fn weighted_fill(img: &RgbImage, flags: &[Flag], times: &[f64], x: u32, y: u32, radius: i64) -> Rgb<u8> {
    let (w, h) = img.dimensions();
    let idx = |x: i64, y: i64| y as usize * w as usize + x as usize;
    let t_here = times[idx(x as i64, y as i64)];

    // Gradient of the arrival time gives the marching direction.
    let grad = |dx: i64, dy: i64| -> f64 {
        let fwd = (x as i64 + dx, y as i64 + dy);
        let back = (x as i64 - dx, y as i64 - dy);
        let sample = |(px, py): (i64, i64)| {
            (px >= 0 && py >= 0 && px < w as i64 && py < h as i64 && flags[idx(px, py)] != Flag::Inside)
                .then(|| times[idx(px, py)])
        };
        match (sample(fwd), sample(back)) {
            (Some(f), Some(b)) => (f - b) / 2.0,
            (Some(f), None) => f - t_here,
            (None, Some(b)) => t_here - b,
            (None, None) => 0.0,
        }
    };
    let (gx, gy) = (grad(1, 0), grad(0, 1));

    let mut acc = [0.0f64; 3];
    let mut total = 0.0f64;
    for ky in (y as i64 - radius)..=(y as i64 + radius) {
        for kx in (x as i64 - radius)..=(x as i64 + radius) {
            if kx < 0 || ky < 0 || kx >= w as i64 || ky >= h as i64 {
                continue;
            }
            if flags[idx(kx, ky)] == Flag::Inside {
                continue;
            }
            let (rx, ry) = ((x as i64 - kx) as f64, (y as i64 - ky) as f64);
            let dist2 = rx * rx + ry * ry;
            if dist2 == 0.0 || dist2 > (radius * radius) as f64 {
                continue;
            }
            let dist = dist2.sqrt();
            let dir = ((rx * gx + ry * gy) / dist).abs().max(1e-6);
            let dst = 1.0 / dist2;
            let lev = 1.0 / (1.0 + (times[idx(kx, ky)] - t_here).abs());
            let weight = dir * dst * lev;

            let px = img.get_pixel(kx as u32, ky as u32).0;
            for c in 0..3 {
                acc[c] += weight * px[c] as f64;
            }
            total += weight;
        }
    }

    if total <= 0.0 {
        return *img.get_pixel(x, y);
    }
    let mut out = [0u8; 3];
    for c in 0..3 {
        out[c] = (acc[c] / total).round().clamp(0.0, 255.0) as u8;
    }
    Rgb(out)
}
