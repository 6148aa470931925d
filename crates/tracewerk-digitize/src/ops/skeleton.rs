// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Zhang–Suen thinning.

use image::{GrayImage, Luma};

use super::threshold::FG;

/// Thin a binary mask to one-pixel-wide strokes.
pub fn skeletonize(mask: &GrayImage) -> GrayImage {
    let (w, h) = mask.dimensions();
    let (wi, hi) = (w as i64, h as i64);
    let mut on: Vec<bool> = mask.pixels().map(|p| p.0[0] > 0).collect();
    let at = |on: &[bool], x: i64, y: i64| -> bool {
        x >= 0 && y >= 0 && x < wi && y < hi && on[(y * wi + x) as usize]
    };

    loop {
        let mut changed = false;
        for step in 0..2 {
            let mut remove = Vec::new();
            for y in 0..hi {
                for x in 0..wi {
                    if !on[(y * wi + x) as usize] {
                        continue;
                    }
                    // P2..P9 clockwise from north.
                    let n = [
                        at(&on, x, y - 1),
                        at(&on, x + 1, y - 1),
                        at(&on, x + 1, y),
                        at(&on, x + 1, y + 1),
                        at(&on, x, y + 1),
                        at(&on, x - 1, y + 1),
                        at(&on, x - 1, y),
                        at(&on, x - 1, y - 1),
                    ];
                    let b = n.iter().filter(|&&v| v).count();
                    if !(2..=6).contains(&b) {
                        continue;
                    }
                    let a = (0..8).filter(|&i| !n[i] && n[(i + 1) % 8]).count();
                    if a != 1 {
                        continue;
                    }
                    let (p2, p4, p6, p8) = (n[0], n[2], n[4], n[6]);
                    let clear = if step == 0 {
                        !(p2 && p4 && p6) && !(p4 && p6 && p8)
                    } else {
                        !(p2 && p4 && p8) && !(p2 && p6 && p8)
                    };
                    if clear {
                        remove.push((y * wi + x) as usize);
                    }
                }
            }
            if !remove.is_empty() {
                changed = true;
                for i in remove {
                    on[i] = false;
                }
            }
        }
        if !changed {
            break;
        }
    }

    GrayImage::from_fn(w, h, |x, y| {
        Luma([if on[(y as i64 * wi + x as i64) as usize] { FG } else { 0 }])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::morphology::count_foreground;

    #[test]
    fn thick_bar_thins_to_single_row() {
        let mut m = GrayImage::new(30, 11);
        for y in 3..8 {
            for x in 2..28 {
                m.put_pixel(x, y, Luma([FG]));
            }
        }
        let skel = skeletonize(&m);
        for x in 6..24 {
            let column: u32 = (0..11).map(|y| u32::from(skel.get_pixel(x, y).0[0] > 0)).sum();
            assert_eq!(column, 1, "column {} has {} pixels", x, column);
        }
    }

    #[test]
    fn empty_stays_empty() {
        assert_eq!(count_foreground(&skeletonize(&GrayImage::new(8, 8))), 0);
    }
}
