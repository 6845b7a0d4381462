//! Read/write fitted-curve JSON files.
//!
//! Curve JSON is the portable representation of one grid cell's fitted
//! ratio-vs-density relation:
//! - molecule and line pair
//! - the cell's column density and kinetic temperature
//! - polynomial coefficients plus the invertible ratio range
//!
//! Useful for comparing fits across grids or re-plotting without re-reading
//! the model files.

use std::fs::File;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::{FittedCurve, GridCell, LinePair};
use crate::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurveFile {
    pub tool: String,
    pub mol: String,
    pub line_1: String,
    pub line_2: String,
    pub col_dens: f64,
    pub t_kin: f64,
    pub curve: FittedCurve,
}

pub fn curve_file(pair: &LinePair, cell: &GridCell, curve: &FittedCurve) -> CurveFile {
    CurveFile {
        tool: "densmap".to_string(),
        mol: pair.mol.clone(),
        line_1: pair.line_1.clone(),
        line_2: pair.line_2.clone(),
        col_dens: cell.col_dens,
        t_kin: cell.t_kin,
        curve: curve.clone(),
    }
}

/// Write a curve JSON file.
pub fn write_curve_json(path: &Path, curve: &CurveFile) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create curve JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, curve)
        .map_err(|e| AppError::new(2, format!("Failed to write curve JSON: {e}")))?;
    Ok(())
}

/// Read a curve JSON file.
pub fn read_curve_json(path: &Path) -> Result<CurveFile, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open curve JSON '{}': {e}", path.display())))?;
    let curve: CurveFile =
        serde_json::from_reader(file).map_err(|e| AppError::new(2, format!("Invalid curve JSON: {e}")))?;
    Ok(curve)
}
