//! Shared domain types for the ratio-to-density engine.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Relative-uncertainty input for a ratio map.
///
/// The two entries are the relative uncertainties of the two brightness maps
/// the ratio was built from. They are combined in quadrature once, at
/// construction, into a single absolute uncertainty grid aligned with the
/// ratio grid.
#[derive(Debug, Clone)]
pub enum Uncertainty {
    /// One scalar relative uncertainty per input map.
    Uniform(f64, f64),
    /// One relative-uncertainty grid per input map; both must match the
    /// ratio map's shape.
    PerPixel(Array2<f64>, Array2<f64>),
}

/// The two spectral lines whose brightness ratio drives the inversion.
///
/// Line identifiers follow the grid-file naming, e.g. `"10-9"`. `line_1` is
/// the numerator of the ratio; paired model files are matched to the lines
/// by the identifier embedded in their names.
#[derive(Debug, Clone)]
pub struct LinePair {
    pub mol: String,
    pub line_1: String,
    pub line_2: String,
}

impl LinePair {
    pub fn new(mol: impl Into<String>, line_1: impl Into<String>, line_2: impl Into<String>) -> Self {
        Self {
            mol: mol.into(),
            line_1: line_1.into(),
            line_2: line_2.into(),
        }
    }

    /// Label used for QA output, e.g. `HCN(10-9)/HCN(9-8)`.
    pub fn ratio_label(&self) -> String {
        format!("{m}({a})/{m}({b})", m = self.mol, a = self.line_1, b = self.line_2)
    }
}

/// One model-grid cell: tabulated (log density, brightness ratio) samples for
/// a fixed column density and kinetic temperature, ordered by ascending
/// density.
#[derive(Debug, Clone)]
pub struct GridCell {
    pub col_dens: f64,
    pub t_kin: f64,
    /// log10 of H2 number density, as tabulated by the model grid.
    pub log_dens: Vec<f64>,
    /// Brightness-temperature ratio line_1/line_2 at each density sample.
    pub ratio: Vec<f64>,
}

impl GridCell {
    pub fn len(&self) -> usize {
        self.log_dens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log_dens.is_empty()
    }
}

/// Polynomial ratio-vs-density relation fitted to one grid cell, together
/// with the range over which inversion is well-defined.
///
/// `min_rat`/`max_rat` are the extreme values the curve attains over the
/// resampled density axis; `n_begin`/`n_end` are the densities at which those
/// extremes are attained and bracket the root search. The curve is assumed
/// monotonic between its extrema; this is not verified.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittedCurve {
    /// Coefficients in ascending-power order: `c0 + c1 n + c2 n^2 + ...`.
    pub coeffs: Vec<f64>,
    pub min_rat: f64,
    pub max_rat: f64,
    pub n_begin: f64,
    pub n_end: f64,
    /// Relative RMS deviation of the tabulated ratios from the curve.
    pub residual: f64,
}

/// Per-pixel outcome of one bracketed root-find.
///
/// Aggregated into the NaN-bearing output grid at the end of an inversion
/// pass; `OutOfRange` and `NoSignChange` both land as NaN but are counted
/// separately for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PixelSolve {
    Solved(f64),
    OutOfRange,
    NoSignChange,
}

/// Value plus asymmetric uncertainty bounds, all same-shaped, NaN where no
/// solution (or no bound) exists.
#[derive(Debug, Clone)]
pub struct DensityMaps {
    pub value: Array2<f64>,
    pub low: Array2<f64>,
    pub high: Array2<f64>,
}

impl DensityMaps {
    /// All-NaN maps of the given shape, the identity of the mosaic fold.
    pub fn nan_filled(shape: (usize, usize)) -> Self {
        Self {
            value: Array2::from_elem(shape, f64::NAN),
            low: Array2::from_elem(shape, f64::NAN),
            high: Array2::from_elem(shape, f64::NAN),
        }
    }
}

/// Tunables for a density-retrieval run.
#[derive(Debug, Clone)]
pub struct RetrieveOptions {
    /// Order of the polynomial fitted to each ratio-vs-density curve.
    pub poly_order: usize,
    /// Store log10 density (grid-native). When false, output is linear
    /// density `10^x` and the unit label changes accordingly.
    pub log_output: bool,
    /// Emit deviation maps of real vs. matched column density/temperature.
    pub report_deviation: bool,
    /// Hand every Nth cell's fitted curve to the QA sink.
    pub qa_every: usize,
    /// Percentile of the relative uncertainty used by the fit-residual
    /// warning check.
    pub warn_percentile: f64,
}

impl Default for RetrieveOptions {
    fn default() -> Self {
        Self {
            poly_order: 2,
            log_output: true,
            report_deviation: true,
            qa_every: 20,
            warn_percentile: 10.0,
        }
    }
}
