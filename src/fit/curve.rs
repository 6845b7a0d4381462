//! Fitting the ratio-vs-density relation of one grid cell.

use crate::domain::{FittedCurve, GridCell};
use crate::error::AppError;
use crate::math::{fit_polynomial, linspace, polyval};

/// The fitted curve evaluated over a resampled density axis, plus the
/// extrema that bound the invertible ratio range.
///
/// The axis has the same length and span as the cell's density samples,
/// evenly spaced from first to last. `n_begin`/`n_end` are the axis points
/// where the minimum/maximum ratio is attained; they bracket the root
/// search. The curve is assumed monotonic between its extrema over this
/// axis — a non-monotonic fit silently produces incorrect brackets.
#[derive(Debug, Clone)]
pub struct CurveRange {
    pub min_rat: f64,
    pub max_rat: f64,
    pub n_begin: f64,
    pub n_end: f64,
    pub axis: Vec<f64>,
    pub values: Vec<f64>,
}

/// Fit `ratio = polynomial(log_dens)` of the given order by least squares.
pub fn fit_curve(cell: &GridCell, order: usize) -> Result<Vec<f64>, AppError> {
    fit_polynomial(&cell.log_dens, &cell.ratio, order).map_err(|e| {
        AppError::new(
            4,
            format!(
                "Curve fit failed for cell (N={}, T={} K): {e}",
                cell.col_dens, cell.t_kin
            ),
        )
    })
}

/// Evaluate the fitted polynomial elementwise.
pub fn evaluate_curve(coeffs: &[f64], xs: &[f64]) -> Vec<f64> {
    xs.iter().map(|&x| polyval(coeffs, x)).collect()
}

/// Evaluate the curve over a resampled density axis and locate its extrema.
pub fn curve_range(coeffs: &[f64], log_dens: &[f64]) -> Result<CurveRange, AppError> {
    let (&first, &last) = match (log_dens.first(), log_dens.last()) {
        (Some(f), Some(l)) => (f, l),
        _ => return Err(AppError::new(4, "Cannot derive a curve range from an empty cell.")),
    };

    let axis = linspace(first, last, log_dens.len());
    let values = evaluate_curve(coeffs, &axis);

    // The extrema are attained values on the axis, first occurrence wins.
    let mut i_min = 0;
    let mut i_max = 0;
    for (i, &v) in values.iter().enumerate() {
        if v < values[i_min] {
            i_min = i;
        }
        if v > values[i_max] {
            i_max = i;
        }
    }

    Ok(CurveRange {
        min_rat: values[i_min],
        max_rat: values[i_max],
        n_begin: axis[i_min],
        n_end: axis[i_max],
        axis,
        values,
    })
}

/// Relative root-mean-square deviation of the tabulated ratios from the
/// fitted curve, normalized by the curve value and divided by the sample
/// count.
pub fn fit_residual(observed: &[f64], curve_values: &[f64]) -> f64 {
    let n = observed.len().min(curve_values.len());
    if n == 0 {
        return 0.0;
    }
    let sum: f64 = (0..n)
        .map(|i| {
            let d = observed[i] - curve_values[i];
            d * d / (curve_values[i] * curve_values[i])
        })
        .sum();
    sum.sqrt() / n as f64
}

/// Fit one cell end to end: coefficients, range, residual.
pub fn fit_cell(cell: &GridCell, order: usize) -> Result<(FittedCurve, CurveRange), AppError> {
    let coeffs = fit_curve(cell, order)?;
    let range = curve_range(&coeffs, &cell.log_dens)?;
    let residual = fit_residual(&cell.ratio, &range.values);

    let curve = FittedCurve {
        coeffs,
        min_rat: range.min_rat,
        max_rat: range.max_rat,
        n_begin: range.n_begin,
        n_end: range.n_end,
        residual,
    };
    Ok((curve, range))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_cell() -> GridCell {
        // ratio = 0.5 n + 1 over n in [0, 8].
        let log_dens: Vec<f64> = (0..9).map(|i| i as f64).collect();
        let ratio: Vec<f64> = log_dens.iter().map(|&n| 0.5 * n + 1.0).collect();
        GridCell {
            col_dens: 1.0,
            t_kin: 10.0,
            log_dens,
            ratio,
        }
    }

    #[test]
    fn curve_range_extrema_are_attained_values() {
        let cell = linear_cell();
        let coeffs = fit_curve(&cell, 1).unwrap();
        let range = curve_range(&coeffs, &cell.log_dens).unwrap();

        let lo = range.values.iter().cloned().fold(f64::INFINITY, f64::min);
        let hi = range.values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(range.min_rat, lo);
        assert_eq!(range.max_rat, hi);
        assert!((range.min_rat - 1.0).abs() < 1e-9);
        assert!((range.max_rat - 5.0).abs() < 1e-9);
        assert!((range.n_begin - 0.0).abs() < 1e-9);
        assert!((range.n_end - 8.0).abs() < 1e-9);
    }

    #[test]
    fn resampled_axis_keeps_length_and_span() {
        let cell = linear_cell();
        let coeffs = fit_curve(&cell, 2).unwrap();
        let range = curve_range(&coeffs, &cell.log_dens).unwrap();

        assert_eq!(range.axis.len(), cell.log_dens.len());
        assert_eq!(range.axis[0], cell.log_dens[0]);
        assert_eq!(range.axis[range.axis.len() - 1], *cell.log_dens.last().unwrap());
    }

    #[test]
    fn decreasing_curve_reverses_the_bracket() {
        let log_dens: Vec<f64> = (0..9).map(|i| i as f64).collect();
        let ratio: Vec<f64> = log_dens.iter().map(|&n| 5.0 - 0.5 * n).collect();
        let cell = GridCell {
            col_dens: 1.0,
            t_kin: 10.0,
            log_dens,
            ratio,
        };

        let (curve, _) = fit_cell(&cell, 1).unwrap();
        assert!(curve.n_begin > curve.n_end);
        assert!((curve.min_rat - 1.0).abs() < 1e-9);
        assert!((curve.max_rat - 5.0).abs() < 1e-9);
    }

    #[test]
    fn fit_residual_is_zero_for_perfect_fit() {
        let cell = linear_cell();
        let (curve, range) = fit_cell(&cell, 1).unwrap();
        assert!(curve.residual.abs() < 1e-12);
        assert!(fit_residual(&cell.ratio, &range.values).abs() < 1e-12);
    }

    #[test]
    fn fit_residual_grows_with_scatter() {
        let cell = linear_cell();
        let noisy: Vec<f64> = cell.ratio.iter().map(|&r| r * 1.05).collect();
        let (_, range) = fit_cell(&cell, 1).unwrap();
        assert!(fit_residual(&noisy, &range.values) > 0.0);
    }
}
