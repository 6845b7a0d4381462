//! Model-file parsing and ratio-table construction.
//!
//! A model-result file is whitespace-delimited text with three columns:
//! kinetic temperature, log10 density, brightness temperature. One row per
//! sampled density, densities ascending within each temperature block.

use std::fs;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::domain::GridCell;
use crate::error::{AppError, warn};

/// One parsed model-result file.
#[derive(Debug, Clone)]
pub struct ModelTable {
    pub t_kin: Vec<f64>,
    pub log_dens: Vec<f64>,
    pub t_mb: Vec<f64>,
}

impl ModelTable {
    pub fn len(&self) -> usize {
        self.t_kin.len()
    }

    pub fn is_empty(&self) -> bool {
        self.t_kin.is_empty()
    }
}

/// Brightness-temperature ratios of two parsed files, row-for-row.
///
/// Densities and temperatures are taken from the numerator file; rows beyond
/// the shorter file are dropped (best effort, after a consistency warning).
#[derive(Debug, Clone)]
pub struct RatioTable {
    pub t_kin: Vec<f64>,
    pub log_dens: Vec<f64>,
    pub ratio: Vec<f64>,
}

impl RatioTable {
    /// Restrict the table to one kinetic temperature, producing the
    /// (density, ratio) sample set of a single grid cell.
    pub fn cell(&self, col_dens: f64, t_kin: f64) -> GridCell {
        let mut log_dens = Vec::new();
        let mut ratio = Vec::new();
        for i in 0..self.t_kin.len() {
            if self.t_kin[i] == t_kin {
                log_dens.push(self.log_dens[i]);
                ratio.push(self.ratio[i]);
            }
        }
        GridCell {
            col_dens,
            t_kin,
            log_dens,
            ratio,
        }
    }
}

/// Read a three-column model file.
///
/// Empty lines are skipped; a malformed row is reported and skipped rather
/// than aborting the run.
pub fn read_model_table(path: &Path) -> Result<ModelTable, AppError> {
    let file = fs::File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open model file '{}': {e}", path.display())))?;

    let mut table = ModelTable {
        t_kin: Vec::new(),
        log_dens: Vec::new(),
        t_mb: Vec::new(),
    };

    for (lineno, line) in BufReader::new(file).lines().enumerate() {
        let line = line
            .map_err(|e| AppError::new(2, format!("Failed to read model file '{}': {e}", path.display())))?;
        if line.trim().is_empty() {
            continue;
        }
        let mut cols = line.split_whitespace();
        let parsed = (
            cols.next().and_then(|s| s.parse::<f64>().ok()),
            cols.next().and_then(|s| s.parse::<f64>().ok()),
            cols.next().and_then(|s| s.parse::<f64>().ok()),
        );
        let (Some(t_kin), Some(log_dens), Some(t_mb)) = parsed else {
            warn(format!(
                "Malformed row {} in '{}'; skipping it.",
                lineno + 1,
                path.display()
            ));
            continue;
        };
        table.t_kin.push(t_kin);
        table.log_dens.push(log_dens);
        table.t_mb.push(t_mb);
    }

    Ok(table)
}

/// Verify that a file pair is mutually consistent: same row count, same
/// density axis. Violations are reported, not fatal; downstream code works
/// with the overlapping rows.
pub fn verify_pair_consistent(table_1: &ModelTable, table_2: &ModelTable) {
    if table_1.len() != table_2.len() {
        warn(
            "The model files for the two lines do not have the same size; the density \
             cannot be derived reliably from them.",
        );
    }
    let n = table_1.len().min(table_2.len());
    if table_1.log_dens[..n] != table_2.log_dens[..n] {
        warn(
            "The model files for the two lines do not sample the same densities; the \
             density cannot be derived reliably from them.",
        );
    }
}

/// Elementwise `Tmb_1 / Tmb_2` over a (consistency-checked) file pair.
pub fn ratio_table(table_1: &ModelTable, table_2: &ModelTable) -> RatioTable {
    verify_pair_consistent(table_1, table_2);
    let n = table_1.len().min(table_2.len());

    let mut out = RatioTable {
        t_kin: Vec::with_capacity(n),
        log_dens: Vec::with_capacity(n),
        ratio: Vec::with_capacity(n),
    };
    for i in 0..n {
        out.t_kin.push(table_1.t_kin[i]);
        out.log_dens.push(table_1.log_dens[i]);
        out.ratio.push(table_1.t_mb[i] / table_2.t_mb[i]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &Path, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        let mut f = fs::File::create(&path).unwrap();
        write!(f, "{contents}").unwrap();
        path
    }

    #[test]
    fn reads_three_column_whitespace_file() {
        let tmp = TempDir::new().unwrap();
        let path = write_file(
            tmp.path(),
            "hcn_10-9_1p0.dat",
            "10.0  3.0  1.25\n10.0  3.5  1.75\n\n20.0  3.0  1.10\n",
        );

        let table = read_model_table(&path).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.t_kin, vec![10.0, 10.0, 20.0]);
        assert_eq!(table.log_dens, vec![3.0, 3.5, 3.0]);
        assert!((table.t_mb[1] - 1.75).abs() < 1e-12);
    }

    #[test]
    fn malformed_rows_are_skipped() {
        let tmp = TempDir::new().unwrap();
        let path = write_file(tmp.path(), "bad.dat", "10.0 3.0 1.0\nnot a row\n10.0 4.0 2.0\n");

        let table = read_model_table(&path).unwrap();
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn ratio_table_divides_row_for_row() {
        let t1 = ModelTable {
            t_kin: vec![10.0, 10.0],
            log_dens: vec![3.0, 4.0],
            t_mb: vec![2.0, 6.0],
        };
        let t2 = ModelTable {
            t_kin: vec![10.0, 10.0],
            log_dens: vec![3.0, 4.0],
            t_mb: vec![4.0, 3.0],
        };

        let rt = ratio_table(&t1, &t2);
        assert_eq!(rt.ratio, vec![0.5, 2.0]);
        assert_eq!(rt.log_dens, vec![3.0, 4.0]);
    }

    #[test]
    fn cell_selects_one_temperature() {
        let rt = RatioTable {
            t_kin: vec![10.0, 10.0, 20.0, 20.0],
            log_dens: vec![3.0, 4.0, 3.0, 4.0],
            ratio: vec![0.5, 1.0, 0.6, 1.2],
        };

        let cell = rt.cell(1.5, 20.0);
        assert_eq!(cell.t_kin, 20.0);
        assert_eq!(cell.log_dens, vec![3.0, 4.0]);
        assert_eq!(cell.ratio, vec![0.6, 1.2]);
    }
}
