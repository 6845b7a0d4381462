//! Visual-QA collaborator seam.
//!
//! Plotting lives outside this crate. The engine hands QA material to a
//! `QaSink` as fire-and-forget side effects: a fitted curve every Nth grid
//! cell, deviation maps of real vs. matched inputs, and the final density
//! histogram. Implementations can forward to a plotting backend; the
//! default sinks either drop everything or print one-line summaries.

use crate::domain::GridCell;
use crate::image::AstroImage;

pub trait QaSink: Sync {
    /// A fitted ratio curve alongside the tabulated samples it was fit to.
    fn curve_fit(&self, _cell: &GridCell, _axis: &[f64], _curve: &[f64], _label: &str) {}

    /// Absolute and relative (percent) deviation maps of a real input vs.
    /// its nearest-grid-value match.
    fn deviation(&self, _name: &str, _abs_dev: &AstroImage, _rel_dev_pct: &AstroImage) {}

    /// Raveled values of a finalized density map.
    fn histogram(&self, _values: &[f64], _unit: &str, _xscale_log: bool) {}
}

/// Drops all QA material.
pub struct NullQa;

impl QaSink for NullQa {}

/// Prints one-line QA summaries to stdout.
pub struct TextQa;

impl QaSink for TextQa {
    fn curve_fit(&self, cell: &GridCell, axis: &[f64], curve: &[f64], label: &str) {
        let lo = curve.iter().cloned().fold(f64::INFINITY, f64::min);
        let hi = curve.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        println!(
            "qa: {label} cell (N={}, T={} K): {} samples, curve range [{lo:.3}, {hi:.3}] over n in [{:.2}, {:.2}]",
            cell.col_dens,
            cell.t_kin,
            cell.len(),
            axis.first().copied().unwrap_or(f64::NAN),
            axis.last().copied().unwrap_or(f64::NAN),
        );
    }

    fn deviation(&self, name: &str, _abs_dev: &AstroImage, rel_dev_pct: &AstroImage) {
        let worst = rel_dev_pct
            .data
            .iter()
            .filter(|v| v.is_finite())
            .cloned()
            .fold(0.0_f64, f64::max);
        println!("qa: {name} nearest-match deviation, worst {worst:.2}%");
    }

    fn histogram(&self, values: &[f64], unit: &str, xscale_log: bool) {
        let n = values.iter().filter(|v| v.is_finite()).count();
        println!(
            "qa: density histogram, {n} finite pixels [{unit}]{}",
            if xscale_log { " (log x-axis)" } else { "" }
        );
    }
}
