//! Nearest-value matching of a real-valued map against discrete grid values.

use ndarray::Array2;

/// Map every non-NaN pixel to the nearest candidate value.
///
/// Returns `(matched, deviation)` where `deviation = observed - matched`.
/// NaN pixels pass through unmatched in both outputs. Ties on exact
/// midpoints resolve to the first minimal index in `candidates`; this
/// first-occurrence behavior is deliberate and relied upon.
pub fn match_nearest(observed: &Array2<f64>, candidates: &[f64]) -> (Array2<f64>, Array2<f64>) {
    let mut matched = observed.clone();
    for v in matched.iter_mut() {
        if !v.is_nan() {
            *v = nearest_value(candidates, *v);
        }
    }
    let deviation = observed - &matched;
    (matched, deviation)
}

/// The candidate minimizing absolute difference to `value` (first minimal
/// index wins). NaN when `candidates` is empty.
pub fn nearest_value(candidates: &[f64], value: f64) -> f64 {
    let mut best = f64::NAN;
    let mut best_diff = f64::INFINITY;
    for &c in candidates {
        let diff = (c - value).abs();
        if diff < best_diff {
            best_diff = diff;
            best = c;
        }
    }
    best
}
