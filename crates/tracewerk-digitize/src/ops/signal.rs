// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// One-dimensional numeric helpers: Gaussian smoothing, prominence-based peak
// finding, order statistics, and linear interpolation.

use std::cmp::Ordering;

/// Smooth `data` with a Gaussian of standard deviation `sigma`.
///
/// The kernel is truncated at four sigma and the signal is mirrored at both
/// ends (`d c b a | a b c d | d c b a`).
pub fn gaussian_filter1d(data: &[f64], sigma: f64) -> Vec<f64> {
    if data.is_empty() || sigma <= 0.0 {
        return data.to_vec();
    }
    let radius = (4.0 * sigma + 0.5) as i64;
    let kernel: Vec<f64> = (-radius..=radius)
        .map(|i| (-0.5 * (i as f64 / sigma).powi(2)).exp())
        .collect();
    let norm: f64 = kernel.iter().sum();

    let n = data.len() as i64;
    let reflect = |mut i: i64| -> usize {
        // Period of the mirrored signal is 2n.
        let period = 2 * n;
        i = i.rem_euclid(period);
        if i >= n { (period - 1 - i) as usize } else { i as usize }
    };

    (0..n)
        .map(|i| {
            kernel
                .iter()
                .enumerate()
                .map(|(k, wgt)| wgt * data[reflect(i + k as i64 - radius)])
                .sum::<f64>()
                / norm
        })
        .collect()
}

/// Indices of local maxima at least `distance` samples apart whose
/// prominence is at least `min_prominence`.
///
/// Flat tops report their middle sample. When two maxima are closer than
/// `distance`, the higher one wins.
pub fn find_peaks(data: &[f64], distance: usize, min_prominence: f64) -> Vec<usize> {
    let candidates = local_maxima(data);

    // Distance filter, highest first.
    let mut by_height = candidates.clone();
    by_height.sort_by(|&a, &b| data[b].partial_cmp(&data[a]).unwrap_or(Ordering::Equal));
    let mut keep = vec![false; data.len()];
    let mut kept: Vec<usize> = Vec::new();
    for &peak in &by_height {
        if kept.iter().all(|&k| peak.abs_diff(k) >= distance.max(1)) {
            kept.push(peak);
            keep[peak] = true;
        }
    }

    candidates
        .into_iter()
        .filter(|&p| keep[p])
        .filter(|&p| prominence(data, p) >= min_prominence)
        .collect()
}

fn local_maxima(data: &[f64]) -> Vec<usize> {
    let mut peaks = Vec::new();
    let n = data.len();
    let mut i = 1;
    while i + 1 < n {
        if data[i - 1] < data[i] {
            let mut ahead = i + 1;
            while ahead + 1 < n && data[ahead] == data[i] {
                ahead += 1;
            }
            if data[ahead] < data[i] {
                peaks.push((i + ahead - 1) / 2);
                i = ahead;
                continue;
            }
        }
        i += 1;
    }
    peaks
}

/// Height of a peak above the higher of the two minima reached before the
/// signal climbs above the peak on either side.
pub fn prominence(data: &[f64], peak: usize) -> f64 {
    let height = data[peak];

    let mut left_min = height;
    for i in (0..peak).rev() {
        if data[i] > height {
            break;
        }
        left_min = left_min.min(data[i]);
    }
    let mut right_min = height;
    for &v in &data[peak + 1..] {
        if v > height {
            break;
        }
        right_min = right_min.min(v);
    }
    height - left_min.max(right_min)
}

// -- Order statistics ---------------------------------------------------------

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    (values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64).sqrt()
}

pub fn median(values: &[f64]) -> f64 {
    percentile(values, 50.0)
}

/// Percentile with linear interpolation between closest ranks. `0.0` for an
/// empty slice.
pub fn percentile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let rank = (q.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Evaluate the piecewise-linear function through `(xs, ys)` at `x`.
///
/// `xs` must be strictly increasing. Values outside the range clamp to the
/// end points.
pub fn interp(x: f64, xs: &[f64], ys: &[f64]) -> f64 {
    match xs.len() {
        0 => return 0.0,
        1 => return ys[0],
        _ => {}
    }
    if x <= xs[0] {
        return ys[0];
    }
    let last = xs.len() - 1;
    if x >= xs[last] {
        return ys[last];
    }
    let upper = xs.partition_point(|&v| v <= x);
    let (x0, x1) = (xs[upper - 1], xs[upper]);
    let (y0, y1) = (ys[upper - 1], ys[upper]);
    y0 + (y1 - y0) * (x - x0) / (x1 - x0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gaussian_preserves_constant_and_mass() {
        let flat = vec![3.0; 50];
        for v in gaussian_filter1d(&flat, 2.0) {
            assert!((v - 3.0).abs() < 1e-12);
        }
        let mut spike = vec![0.0; 101];
        spike[50] = 1.0;
        let smoothed = gaussian_filter1d(&spike, 2.0);
        let total: f64 = smoothed.iter().sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert!(smoothed[50] > smoothed[49] && smoothed[49] > smoothed[45]);
    }

    #[test]
    fn peaks_of_periodic_comb() {
        let data: Vec<f64> = (0..100).map(|i| if i % 10 == 5 { 10.0 } else { 0.0 }).collect();
        let peaks = find_peaks(&data, 5, 5.0);
        assert_eq!(peaks, vec![5, 15, 25, 35, 45, 55, 65, 75, 85, 95]);
    }

    #[test]
    fn distance_keeps_higher_peak() {
        let data = vec![0.0, 5.0, 0.0, 8.0, 0.0, 0.0, 0.0];
        assert_eq!(find_peaks(&data, 3, 0.0), vec![3]);
    }

    #[test]
    fn prominence_filters_ripples() {
        let data = vec![0.0, 10.0, 9.0, 9.5, 9.0, 10.0, 0.0];
        assert_eq!(find_peaks(&data, 1, 2.0), vec![1, 5]);
        assert!((prominence(&data, 3) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn plateau_reports_middle() {
        let data = vec![0.0, 2.0, 2.0, 2.0, 0.0];
        assert_eq!(find_peaks(&data, 1, 0.0), vec![2]);
    }

    #[test]
    fn percentile_interpolates() {
        let v = [1.0, 2.0, 3.0, 4.0];
        assert!((median(&v) - 2.5).abs() < 1e-12);
        assert!((percentile(&v, 75.0) - 3.25).abs() < 1e-12);
        assert_eq!(percentile(&[], 50.0), 0.0);
    }

    #[test]
    fn std_is_population() {
        let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((std_dev(&v) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn interp_is_piecewise_linear() {
        let xs = [0.0, 10.0, 20.0];
        let ys = [0.0, 10.0, 0.0];
        assert_eq!(interp(5.0, &xs, &ys), 5.0);
        assert_eq!(interp(15.0, &xs, &ys), 5.0);
        assert_eq!(interp(-3.0, &xs, &ys), 0.0);
        assert_eq!(interp(10.0, &xs, &ys), 10.0);
    }
}
