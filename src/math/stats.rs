//! Descriptive statistics over trial records.
//!
//! Conventions follow the usual numerical-Python defaults so summaries are
//! comparable with older analyses:
//! - the standard deviation is the population one (divides by `n`)
//! - histograms use `bins` equal-width bins over `[min, max]`, the last bin
//!   closed on the right; an all-equal sample is binned over `[v - 0.5, v + 0.5]`

use crate::domain::Histogram;

/// Arithmetic mean; `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation; `None` for an empty slice.
pub fn std_dev(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64;
    Some(var.sqrt())
}

/// `(min, max)` of finite input; `None` for an empty slice.
pub fn min_max(values: &[f64]) -> Option<(f64, f64)> {
    let mut iter = values.iter().copied();
    let first = iter.next()?;
    Some(iter.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v))))
}

/// Equal-width histogram spanning the observed range.
///
/// Returns `None` for empty input or `bins == 0`.
pub fn histogram(values: &[f64], bins: usize) -> Option<Histogram> {
    if bins == 0 {
        return None;
    }
    let (mut lo, mut hi) = min_max(values)?;
    if lo == hi {
        lo -= 0.5;
        hi += 0.5;
    }

    let width = (hi - lo) / bins as f64;
    let edges: Vec<f64> = (0..=bins)
        .map(|i| if i == bins { hi } else { lo + width * i as f64 })
        .collect();

    let mut counts = vec![0usize; bins];
    for &v in values {
        let idx = ((v - lo) / width).floor();
        // `v == hi` lands exactly on the right edge; it belongs to the last bin.
        let idx = if idx.is_finite() && idx >= 0.0 {
            (idx as usize).min(bins - 1)
        } else {
            0
        };
        counts[idx] += 1;
    }

    Some(Histogram { edges, counts })
}
