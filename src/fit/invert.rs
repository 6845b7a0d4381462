//! Per-pixel density inversion.
//!
//! Given a ratio-map slice masked to one grid cell and that cell's fitted
//! curve, solve `polynomial(n) - ratio = 0` for every usable pixel with a
//! bracketed root-find over `[n_begin, n_end]`. This dominates the system's
//! runtime: one root-find per pixel per cell, up to three when an
//! uncertainty grid is present.

use ndarray::Array2;

use crate::domain::{DensityMaps, FittedCurve, PixelSolve};
use crate::math::{brent_root, polyval};

/// Abscissa tolerance for the per-pixel root-find. Densities are log10
/// values of order unity, so this is far below any physical significance.
const ROOT_TOL: f64 = 1e-10;

/// Counts of per-pixel outcomes over one inversion pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InvertStats {
    pub solved: usize,
    pub out_of_range: usize,
    pub no_sign_change: usize,
}

/// Solve a single pixel's density.
///
/// Pixels strictly outside `[min_rat, max_rat]` have no solution on the
/// curve; in-range pixels can still fail when floating-point edge effects
/// leave no sign change across the bracket.
pub fn solve_pixel(curve: &FittedCurve, ratio: f64) -> PixelSolve {
    if ratio < curve.min_rat || ratio > curve.max_rat {
        return PixelSolve::OutOfRange;
    }
    match brent_root(
        |n| polyval(&curve.coeffs, n) - ratio,
        curve.n_begin,
        curve.n_end,
        ROOT_TOL,
    ) {
        Ok(n) => PixelSolve::Solved(n),
        Err(_) => PixelSolve::NoSignChange,
    }
}

/// Invert a (masked) ratio map through a fitted curve.
///
/// `unc` is the absolute uncertainty grid aligned with `ratio`. For each
/// solved pixel the same inversion is recomputed at `ratio ± unc` whenever
/// the perturbed value stays strictly inside `(min_rat, max_rat)`;
/// otherwise that side's bound stays NaN.
pub fn invert_map(
    ratio: &Array2<f64>,
    curve: &FittedCurve,
    unc: Option<&Array2<f64>>,
) -> (DensityMaps, InvertStats) {
    let mut maps = DensityMaps::nan_filled(ratio.dim());
    let mut stats = InvertStats::default();

    for ((y, x), &r) in ratio.indexed_iter() {
        if r.is_nan() {
            continue;
        }
        match solve_pixel(curve, r) {
            PixelSolve::Solved(n) => {
                maps.value[[y, x]] = n;
                stats.solved += 1;
            }
            PixelSolve::OutOfRange => {
                stats.out_of_range += 1;
                continue;
            }
            PixelSolve::NoSignChange => {
                stats.no_sign_change += 1;
                continue;
            }
        }

        let Some(unc) = unc else { continue };
        let u = unc[[y, x]];
        if u.is_nan() {
            continue;
        }

        let low = r - u;
        if low > curve.min_rat && low < curve.max_rat {
            if let PixelSolve::Solved(n) = solve_pixel(curve, low) {
                maps.low[[y, x]] = n;
            }
        }
        let high = r + u;
        if high > curve.min_rat && high < curve.max_rat {
            if let PixelSolve::Solved(n) = solve_pixel(curve, high) {
                maps.high[[y, x]] = n;
            }
        }
    }

    (maps, stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    /// ratio = 0.5 n + 1: min 1 at n=0, max 5 at n=8.
    fn linear_curve() -> FittedCurve {
        FittedCurve {
            coeffs: vec![1.0, 0.5],
            min_rat: 1.0,
            max_rat: 5.0,
            n_begin: 0.0,
            n_end: 8.0,
            residual: 0.0,
        }
    }

    #[test]
    fn known_linear_curve_inverts_exactly() {
        let curve = linear_curve();
        let ratio = array![[2.0, f64::NAN], [3.0, 4.0]];

        let (maps, stats) = invert_map(&ratio, &curve, None);
        assert!((maps.value[[0, 0]] - 2.0).abs() < 1e-8);
        assert!(maps.value[[0, 1]].is_nan());
        assert!((maps.value[[1, 0]] - 4.0).abs() < 1e-8);
        assert!((maps.value[[1, 1]] - 6.0).abs() < 1e-8);
        assert_eq!(stats.solved, 3);
        assert_eq!(stats.out_of_range, 0);
    }

    #[test]
    fn recovered_density_satisfies_the_curve() {
        let curve = FittedCurve {
            coeffs: vec![0.3, 0.1, 0.04],
            min_rat: polyval(&[0.3, 0.1, 0.04], 2.0),
            max_rat: polyval(&[0.3, 0.1, 0.04], 8.0),
            n_begin: 2.0,
            n_end: 8.0,
            residual: 0.0,
        };
        for r in [0.9, 1.5, 2.4] {
            let PixelSolve::Solved(n) = solve_pixel(&curve, r) else {
                panic!("expected a solution for ratio {r}");
            };
            assert!((polyval(&curve.coeffs, n) - r).abs() < 1e-8);
        }
    }

    #[test]
    fn out_of_range_pixels_stay_nan() {
        let curve = linear_curve();
        let ratio = array![[0.5, 6.0]];

        let (maps, stats) = invert_map(&ratio, &curve, None);
        assert!(maps.value.iter().all(|v| v.is_nan()));
        assert_eq!(stats.out_of_range, 2);
        assert_eq!(stats.solved, 0);
    }

    #[test]
    fn uncertainty_bounds_straddle_the_central_value() {
        let curve = linear_curve();
        let ratio = array![[3.0]];
        let unc = array![[0.5]];

        let (maps, _) = invert_map(&ratio, &curve, Some(&unc));
        let center = maps.value[[0, 0]];
        let low = maps.low[[0, 0]];
        let high = maps.high[[0, 0]];
        // Monotonically increasing curve: low <= center <= high.
        assert!(low <= center && center <= high);
        assert!((low - 3.0).abs() < 1e-8);
        assert!((high - 5.0).abs() < 1e-8);
    }

    #[test]
    fn perturbed_value_outside_the_open_range_yields_no_bound() {
        let curve = linear_curve();
        // 4.8 + 0.5 exceeds max_rat: no high bound. Low bound still solves.
        let ratio = array![[4.8]];
        let unc = array![[0.5]];

        let (maps, _) = invert_map(&ratio, &curve, Some(&unc));
        assert!(!maps.value[[0, 0]].is_nan());
        assert!(!maps.low[[0, 0]].is_nan());
        assert!(maps.high[[0, 0]].is_nan());
    }

    #[test]
    fn decreasing_curve_reverses_bound_ordering() {
        // ratio = 5 - 0.5 n: decreasing, bracket arrives reversed.
        let curve = FittedCurve {
            coeffs: vec![5.0, -0.5],
            min_rat: 1.0,
            max_rat: 5.0,
            n_begin: 8.0,
            n_end: 0.0,
            residual: 0.0,
        };
        let ratio = array![[3.0]];
        let unc = array![[0.5]];

        let (maps, _) = invert_map(&ratio, &curve, Some(&unc));
        let center = maps.value[[0, 0]];
        let low = maps.low[[0, 0]];
        let high = maps.high[[0, 0]];
        assert!((center - 4.0).abs() < 1e-8);
        // ratio - unc solves to a *larger* density on a decreasing curve.
        assert!(low >= center && center >= high);
    }
}
