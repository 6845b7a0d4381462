//! Grid catalog: scan a directory of model-result files and index them by
//! column density.
//!
//! File names encode molecule, line, and column density, with `p` standing in
//! for the decimal point: `hcn_10-9_1p5.dat` carries column density 1.5 (in
//! whatever log/exponent convention the grid was produced with). One file
//! exists per (line, column density); the kinetic temperatures live inside
//! the files as the first column.

use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::error::{AppError, warn};

/// Files grouped under one column-density value.
#[derive(Debug, Clone)]
pub struct ColDensBucket {
    pub col_dens: f64,
    pub files: Vec<PathBuf>,
}

/// Index of a grid directory: one bucket per distinct column density, in
/// first-seen order.
#[derive(Debug, Clone, Default)]
pub struct GridCatalog {
    buckets: Vec<ColDensBucket>,
}

impl GridCatalog {
    pub fn buckets(&self) -> &[ColDensBucket] {
        &self.buckets
    }

    /// Distinct column-density values, in first-seen (unordered) order.
    pub fn col_dens_values(&self) -> Vec<f64> {
        self.buckets.iter().map(|b| b.col_dens).collect()
    }

    pub fn files_for(&self, col_dens: f64) -> Option<&[PathBuf]> {
        self.buckets
            .iter()
            .find(|b| b.col_dens == col_dens)
            .map(|b| b.files.as_slice())
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

/// Parse the column-density value out of a grid file name.
///
/// The value is the last `_`-separated token of the stem, with `p` restored
/// to a decimal point.
pub fn col_dens_from_name(path: &Path) -> Option<f64> {
    let stem = path.file_stem()?.to_str()?;
    let token = stem.rsplit('_').next()?;
    token.replace('p', ".").parse().ok()
}

/// List eligible `.dat` files and group their paths by column density.
///
/// Unequal file counts across buckets mean some (line, column density)
/// combination is missing from the directory. That is reported, not fatal:
/// underrepresented buckets simply yield fewer matches downstream.
pub fn build_catalog(dir: &Path) -> Result<GridCatalog, AppError> {
    let entries = fs::read_dir(dir)
        .map_err(|e| AppError::new(2, format!("Failed to read grid directory '{}': {e}", dir.display())))?;

    let mut files: Vec<PathBuf> = Vec::new();
    for entry in entries {
        let entry =
            entry.map_err(|e| AppError::new(2, format!("Failed to list grid directory: {e}")))?;
        let path = entry.path();
        if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some("dat") {
            files.push(path);
        }
    }
    // Directory iteration order is platform-defined; sort for determinism.
    files.sort();

    let mut catalog = GridCatalog::default();
    for path in files {
        let Some(col_dens) = col_dens_from_name(&path) else {
            warn(format!(
                "Could not parse a column density from '{}'; skipping the file.",
                path.display()
            ));
            continue;
        };
        match catalog.buckets.iter_mut().find(|b| b.col_dens == col_dens) {
            Some(bucket) => bucket.files.push(path),
            None => catalog.buckets.push(ColDensBucket {
                col_dens,
                files: vec![path],
            }),
        }
    }

    let counts: Vec<usize> = catalog.buckets.iter().map(|b| b.files.len()).collect();
    if !all_equal(&counts) {
        warn(
            "There might be missing files for the analysis; please verify the directory \
             with your grid of model results.",
        );
    }

    Ok(catalog)
}

/// Collect the distinct kinetic temperatures of the grid.
///
/// Temperatures are taken from the first column of the *first* cataloged
/// file; every file is assumed to share the same temperature set and this is
/// not re-verified. Row counts, however, are checked across all files, and a
/// mismatch is reported (not fatal).
pub fn extract_temperatures(catalog: &GridCatalog) -> Result<Vec<f64>, AppError> {
    let mut t_kins: Vec<f64> = Vec::new();
    let mut row_counts: Vec<usize> = Vec::new();

    for (i, path) in catalog.buckets.iter().flat_map(|b| b.files.iter()).enumerate() {
        let file = fs::File::open(path)
            .map_err(|e| AppError::new(2, format!("Failed to open grid file '{}': {e}", path.display())))?;
        let mut rows = 0usize;
        for line in BufReader::new(file).lines() {
            let line = line
                .map_err(|e| AppError::new(2, format!("Failed to read grid file '{}': {e}", path.display())))?;
            if line.trim().is_empty() {
                continue;
            }
            rows += 1;
            if i == 0 {
                let Some(first) = line.split_whitespace().next() else {
                    continue;
                };
                let Ok(t_kin) = first.parse::<f64>() else {
                    warn(format!(
                        "Unparseable temperature '{first}' in '{}'; skipping the row.",
                        path.display()
                    ));
                    continue;
                };
                if !t_kins.contains(&t_kin) {
                    t_kins.push(t_kin);
                }
            }
        }
        row_counts.push(rows);
    }

    if !all_equal(&row_counts) {
        warn(
            "The model result files do not have the same length; please verify the \
             directory with your grid of model results.",
        );
    }

    Ok(t_kins)
}

/// Order a column-density bucket's file pair so that index 0 is the
/// numerator line of the ratio and index 1 the denominator.
///
/// Matching is by the line token embedded in the file name
/// (`<mol>_<line>_<coldens>.dat`), so the ratio is never silently inverted
/// by an unlucky name sort.
pub fn sorted_pair(line_1: &str, line_2: &str, files: &[PathBuf]) -> Result<Vec<PathBuf>, AppError> {
    let first = find_line_file(line_1, files)?;
    let second = find_line_file(line_2, files)?;
    Ok(vec![first, second])
}

fn find_line_file(line: &str, files: &[PathBuf]) -> Result<PathBuf, AppError> {
    let token = format!("_{line}_");
    files
        .iter()
        .find(|p| {
            p.file_stem()
                .and_then(|s| s.to_str())
                .is_some_and(|s| s.contains(&token))
        })
        .cloned()
        .ok_or_else(|| {
            AppError::new(
                2,
                format!("No grid file for line '{line}' among the cataloged files."),
            )
        })
}

fn all_equal<T: PartialEq>(values: &[T]) -> bool {
    values.windows(2).all(|w| w[0] == w[1])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str, contents: &str) {
        let mut f = fs::File::create(dir.join(name)).unwrap();
        write!(f, "{contents}").unwrap();
    }

    #[test]
    fn col_dens_parsing_restores_decimal_point() {
        let v = col_dens_from_name(Path::new("hcn_10-9_1p5.dat")).unwrap();
        assert!((v - 1.5).abs() < 1e-12);
        let v = col_dens_from_name(Path::new("/grid/hco+_4-3_14p2.dat")).unwrap();
        assert!((v - 14.2).abs() < 1e-12);
    }

    #[test]
    fn catalog_groups_four_files_into_two_buckets() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "hcn_10-9_1p0.dat", "10.0 4.0 1.0\n");
        touch(tmp.path(), "hcn_9-8_1p0.dat", "10.0 4.0 1.0\n");
        touch(tmp.path(), "hcn_10-9_2p5.dat", "10.0 4.0 1.0\n");
        touch(tmp.path(), "hcn_9-8_2p5.dat", "10.0 4.0 1.0\n");

        let catalog = build_catalog(tmp.path()).unwrap();
        let mut values = catalog.col_dens_values();
        values.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(values, vec![1.0, 2.5]);
        assert_eq!(catalog.files_for(1.0).unwrap().len(), 2);
        assert_eq!(catalog.files_for(2.5).unwrap().len(), 2);
    }

    #[test]
    fn catalog_ignores_non_dat_files() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "hcn_10-9_1p0.dat", "");
        touch(tmp.path(), "notes.txt", "");
        touch(tmp.path(), "readme.md", "");

        let catalog = build_catalog(tmp.path()).unwrap();
        assert_eq!(catalog.buckets().len(), 1);
        assert_eq!(catalog.files_for(1.0).unwrap().len(), 1);
    }

    #[test]
    fn extract_temperatures_reads_first_file_only() {
        let tmp = TempDir::new().unwrap();
        touch(
            tmp.path(),
            "hcn_10-9_1p0.dat",
            "10.0 3.0 1.0\n10.0 4.0 2.0\n20.0 3.0 1.5\n20.0 4.0 2.5\n",
        );
        touch(
            tmp.path(),
            "hcn_9-8_1p0.dat",
            "10.0 3.0 0.5\n10.0 4.0 1.0\n20.0 3.0 0.7\n20.0 4.0 1.2\n",
        );

        let catalog = build_catalog(tmp.path()).unwrap();
        let t_kins = extract_temperatures(&catalog).unwrap();
        assert_eq!(t_kins, vec![10.0, 20.0]);
    }

    #[test]
    fn sorted_pair_puts_numerator_line_first() {
        let files = vec![
            PathBuf::from("grid/hcn_10-9_1p0.dat"),
            PathBuf::from("grid/hcn_9-8_1p0.dat"),
        ];

        let pair = sorted_pair("10-9", "9-8", &files).unwrap();
        assert!(pair[0].to_str().unwrap().contains("_10-9_"));
        assert!(pair[1].to_str().unwrap().contains("_9-8_"));

        let pair = sorted_pair("9-8", "10-9", &files).unwrap();
        assert!(pair[0].to_str().unwrap().contains("_9-8_"));
    }

    #[test]
    fn sorted_pair_reports_a_missing_line() {
        let files = vec![PathBuf::from("grid/hcn_10-9_1p0.dat")];
        let err = sorted_pair("10-9", "9-8", &files).unwrap_err();
        assert!(err.to_string().contains("9-8"));
    }
}
