// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Connected-component statistics and shape-based component filtering.

use image::{GrayImage, Luma};
use imageproc::region_labelling::{Connectivity, connected_components};

use super::threshold::FG;

/// Area and bounding box of one 8-connected component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentStats {
    pub area: u32,
    pub x_min: u32,
    pub y_min: u32,
    pub x_max: u32,
    pub y_max: u32,
}

impl ComponentStats {
    pub fn width(&self) -> u32 {
        self.x_max - self.x_min + 1
    }

    pub fn height(&self) -> u32 {
        self.y_max - self.y_min + 1
    }

    /// Longer bounding-box side over the shorter one.
    pub fn aspect_ratio(&self) -> f64 {
        let (w, h) = (self.width() as f64, self.height() as f64);
        w.max(h) / w.min(h)
    }

    pub fn long_side(&self) -> u32 {
        self.width().max(self.height())
    }
}

/// Keep only the 8-connected components of `mask` for which `keep` holds.
pub fn filter_components(mask: &GrayImage, keep: impl Fn(&ComponentStats) -> bool) -> GrayImage {
    let labels = connected_components(mask, Connectivity::Eight, Luma([0u8]));
    let stats = collect_stats(&labels);
    let kept: Vec<bool> = stats.iter().map(|s| s.as_ref().is_some_and(&keep)).collect();

    let (w, h) = mask.dimensions();
    GrayImage::from_fn(w, h, |x, y| {
        let label = labels.get_pixel(x, y).0[0] as usize;
        Luma([if label > 0 && kept[label] { FG } else { 0 }])
    })
}

fn collect_stats(labels: &image::ImageBuffer<Luma<u32>, Vec<u32>>) -> Vec<Option<ComponentStats>> {
    let max_label = labels.pixels().map(|p| p.0[0]).max().unwrap_or(0) as usize;
    let mut stats: Vec<Option<ComponentStats>> = vec![None; max_label + 1];
    for (x, y, px) in labels.enumerate_pixels() {
        let label = px.0[0] as usize;
        if label == 0 {
            continue;
        }
        let entry = stats[label].get_or_insert(ComponentStats {
            area: 0,
            x_min: x,
            y_min: y,
            x_max: x,
            y_max: y,
        });
        entry.area += 1;
        entry.x_min = entry.x_min.min(x);
        entry.y_min = entry.y_min.min(y);
        entry.x_max = entry.x_max.max(x);
        entry.y_max = entry.y_max.max(y);
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::morphology::count_foreground;

    fn two_blobs() -> GrayImage {
        let mut m = GrayImage::new(40, 20);
        // 2x2 speck
        for (x, y) in [(1, 1), (2, 1), (1, 2), (2, 2)] {
            m.put_pixel(x, y, Luma([FG]));
        }
        // 20x1 stroke
        for x in 10..30 {
            m.put_pixel(x, 10, Luma([FG]));
        }
        m
    }

    #[test]
    fn stats_describe_each_component() {
        let mut seen = std::cell::RefCell::new(Vec::new());
        filter_components(&two_blobs(), |s| {
            seen.borrow_mut().push(*s);
            true
        });
        let stats = seen.get_mut();
        stats.sort_by_key(|s| s.area);
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].area, 4);
        assert_eq!(stats[1].area, 20);
        assert_eq!(stats[1].width(), 20);
        assert_eq!(stats[1].height(), 1);
        assert_eq!(stats[1].long_side(), 20);
        assert!((stats[1].aspect_ratio() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn filter_keeps_elongated_component() {
        let kept = filter_components(&two_blobs(), |s| s.aspect_ratio() > 3.0);
        assert_eq!(count_foreground(&kept), 20);
        assert_eq!(kept.get_pixel(1, 1).0[0], 0);
    }

    #[test]
    fn empty_mask_stays_empty() {
        let kept = filter_components(&GrayImage::new(5, 5), |_| true);
        assert_eq!(count_foreground(&kept), 0);
    }
}
