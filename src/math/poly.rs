//! Polynomial least squares.
//!
//! The ratio-vs-density relation of each grid cell is fitted with a low-order
//! polynomial (default order 2), solved as an ordinary least-squares problem
//! in coefficient space:
//!
//! ```text
//! minimize Σ (y_i - Σ_j c_j x_i^j)^2
//! ```
//!
//! Implementation choices:
//! - We build a Vandermonde design matrix and solve with SVD, which stays
//!   robust when the matrix is tall (more samples than coefficients).
//!   (Nalgebra's `QR::solve` is intended for square systems and will panic
//!   for non-square matrices.)
//! - Coefficient counts are tiny (3–4 columns), so SVD performance is a
//!   non-issue even with one fit per grid cell.

use nalgebra::{DMatrix, DVector};

use crate::error::AppError;

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if the strict solve fails. Densely
    // sampled model grids can make the Vandermonde columns nearly collinear,
    // so we balance numerical stability against solution acceptance.
    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(coeffs) = svd.solve(y, tol) {
            if coeffs.iter().all(|v| v.is_finite()) {
                return Some(coeffs);
            }
        }
    }

    None
}

/// Fit `y = c0 + c1 x + ... + ck x^k` by least squares.
///
/// Coefficients are returned in ascending-power order.
pub fn fit_polynomial(xs: &[f64], ys: &[f64], order: usize) -> Result<Vec<f64>, AppError> {
    let n = xs.len();
    let p = order + 1;
    if n != ys.len() {
        return Err(AppError::new(
            4,
            format!("Polynomial fit input lengths differ: {n} vs {}.", ys.len()),
        ));
    }
    if n < p {
        return Err(AppError::new(
            4,
            format!("Polynomial fit needs at least {p} samples for order {order}, got {n}."),
        ));
    }
    if xs.iter().chain(ys.iter()).any(|v| !v.is_finite()) {
        return Err(AppError::new(4, "Polynomial fit input contains non-finite values."));
    }

    let mut design = DMatrix::<f64>::zeros(n, p);
    for (i, &x) in xs.iter().enumerate() {
        let mut pow = 1.0;
        for j in 0..p {
            design[(i, j)] = pow;
            pow *= x;
        }
    }
    let y = DVector::from_column_slice(ys);

    let coeffs = solve_least_squares(&design, &y)
        .ok_or_else(|| AppError::new(4, "Polynomial fit is too ill-conditioned to solve."))?;
    Ok(coeffs.iter().copied().collect())
}

/// Evaluate a polynomial (ascending-power coefficients) at `x` via Horner.
pub fn polyval(coeffs: &[f64], x: f64) -> f64 {
    coeffs.iter().rev().fold(0.0, |acc, &c| acc * x + c)
}

/// `steps` evenly spaced points from `start` to `end` (inclusive).
pub fn linspace(start: f64, end: f64, steps: usize) -> Vec<f64> {
    if steps < 2 {
        return vec![start];
    }
    let step = (end - start) / (steps as f64 - 1.0);
    (0..steps).map(|i| start + step * i as f64).collect()
}

/// NaN-aware percentile (linear interpolation between order statistics).
///
/// Returns `None` when no finite values remain.
pub fn nan_percentile(values: impl IntoIterator<Item = f64>, pct: f64) -> Option<f64> {
    let mut finite: Vec<f64> = values.into_iter().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return None;
    }
    finite.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let rank = (pct.clamp(0.0, 100.0) / 100.0) * (finite.len() as f64 - 1.0);
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        return Some(finite[lo]);
    }
    let frac = rank - lo as f64;
    Some(finite[lo] + (finite[hi] - finite[lo]) * frac)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn least_squares_solves_simple_system() {
        // Fit y = 2 + 3x on x = [0,1,2]
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let coeffs = solve_least_squares(&x, &y).unwrap();
        assert!((coeffs[0] - 2.0).abs() < 1e-10);
        assert!((coeffs[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn fit_polynomial_recovers_exact_quadratic() {
        let xs: Vec<f64> = (0..8).map(|i| 2.0 + 0.5 * i as f64).collect();
        let ys: Vec<f64> = xs.iter().map(|&x| 1.5 - 0.2 * x + 0.05 * x * x).collect();

        let coeffs = fit_polynomial(&xs, &ys, 2).unwrap();
        assert!((coeffs[0] - 1.5).abs() < 1e-8);
        assert!((coeffs[1] + 0.2).abs() < 1e-8);
        assert!((coeffs[2] - 0.05).abs() < 1e-8);
    }

    #[test]
    fn fit_polynomial_rejects_underdetermined_input() {
        let err = fit_polynomial(&[1.0, 2.0], &[1.0, 2.0], 2).unwrap_err();
        assert!(err.to_string().contains("samples"));
    }

    #[test]
    fn polyval_matches_direct_evaluation() {
        let coeffs = [1.0, -2.0, 0.5];
        let x = 3.0;
        let want = 1.0 - 2.0 * x + 0.5 * x * x;
        assert!((polyval(&coeffs, x) - want).abs() < 1e-12);
    }

    #[test]
    fn linspace_includes_endpoints() {
        let v = linspace(2.0, 8.0, 7);
        assert_eq!(v.len(), 7);
        assert!((v[0] - 2.0).abs() < 1e-12);
        assert!((v[6] - 8.0).abs() < 1e-12);
        assert!((v[1] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn nan_percentile_skips_nan_values() {
        let vals = vec![f64::NAN, 1.0, 2.0, 3.0, f64::NAN, 4.0];
        let p0 = nan_percentile(vals.clone(), 0.0).unwrap();
        let p100 = nan_percentile(vals.clone(), 100.0).unwrap();
        let p50 = nan_percentile(vals, 50.0).unwrap();
        assert!((p0 - 1.0).abs() < 1e-12);
        assert!((p100 - 4.0).abs() < 1e-12);
        assert!((p50 - 2.5).abs() < 1e-12);
    }

    #[test]
    fn nan_percentile_of_all_nan_is_none() {
        assert!(nan_percentile(vec![f64::NAN, f64::NAN], 10.0).is_none());
    }
}
