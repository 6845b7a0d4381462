//! Deterministic synthetic model grids and observation scenes.
//!
//! Used by the demo binary and the integration tests: writes a small grid of
//! model-result files to disk and generates a matching pair of brightness
//! maps whose ratio is exactly invertible against that grid. All randomness
//! goes through a seeded `StdRng`, so runs are reproducible.

use std::fs;
use std::io::Write;
use std::path::Path;

use ndarray::Array2;
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::LinePair;
use crate::error::AppError;
use crate::image::{AstroImage, Header};

/// Ground-truth brightness ratio of the synthetic grid.
///
/// Quadratic in log density so an order-2 polynomial fit reproduces it
/// exactly; mildly dependent on column density and temperature so distinct
/// grid cells fit distinct curves.
pub fn model_ratio(col_dens: f64, t_kin: f64, log_n: f64) -> f64 {
    0.2 + 0.01 * t_kin + 0.05 * col_dens + 0.45 * log_n + 0.004 * log_n * log_n
}

/// Write one model-result file pair per column-density label.
///
/// The numerator line's file carries the model ratio (optionally with
/// Gaussian scatter); the denominator line's file carries a unit brightness,
/// so `Tmb_1 / Tmb_2` reproduces `model_ratio`.
pub fn write_grid(
    dir: &Path,
    pair: &LinePair,
    col_dens_labels: &[&str],
    t_kins: &[f64],
    log_dens: &[f64],
    noise_sigma: f64,
    seed: u64,
) -> Result<(), AppError> {
    fs::create_dir_all(dir)
        .map_err(|e| AppError::new(2, format!("Failed to create grid directory '{}': {e}", dir.display())))?;

    let mut rng = StdRng::seed_from_u64(seed);
    let noise = Normal::new(0.0, noise_sigma.max(1e-12))
        .map_err(|e| AppError::new(4, format!("Noise distribution error: {e}")))?;

    for label in col_dens_labels {
        let col_dens: f64 = label
            .replace('p', ".")
            .parse()
            .map_err(|_| AppError::new(2, format!("Bad column-density label '{label}'.")))?;

        for (line, numerator) in [(&pair.line_1, true), (&pair.line_2, false)] {
            let path = dir.join(format!("{}_{line}_{label}.dat", pair.mol));
            let mut file = fs::File::create(&path)
                .map_err(|e| AppError::new(2, format!("Failed to create '{}': {e}", path.display())))?;

            for &t_kin in t_kins {
                for &log_n in log_dens {
                    let t_mb = if numerator {
                        let eps = if noise_sigma > 0.0 { noise.sample(&mut rng) } else { 0.0 };
                        model_ratio(col_dens, t_kin, log_n) + eps
                    } else {
                        1.0
                    };
                    writeln!(file, "{t_kin:.2} {log_n:.4} {t_mb:.6}")
                        .map_err(|e| AppError::new(2, format!("Failed to write '{}': {e}", path.display())))?;
                }
            }
        }
    }

    Ok(())
}

/// A synthetic observation: two brightness maps plus the column-density and
/// dust-temperature maps the per-pixel retrieval needs.
#[derive(Debug, Clone)]
pub struct SyntheticScene {
    pub data_1: AstroImage,
    pub data_2: AstroImage,
    pub col_dens: AstroImage,
    pub t_dust: AstroImage,
    /// Ground-truth log density per pixel (NaN where the scene is masked).
    pub truth_log_n: Array2<f64>,
}

/// Generate a scene whose every unmasked pixel sits exactly on one grid
/// cell's ratio curve.
///
/// Column-density and temperature maps carry a small jitter around the grid
/// values so nearest-value matching maps them back to the cell that
/// produced the pixel. The last pixel of the first row is masked (NaN) to
/// exercise NaN passthrough.
pub fn generate_scene(
    shape: (usize, usize),
    col_dens_vals: &[f64],
    t_kins: &[f64],
    log_dens_span: (f64, f64),
    seed: u64,
) -> SyntheticScene {
    let mut rng = StdRng::seed_from_u64(seed);
    let (rows, cols) = shape;

    let mut data_1 = Array2::zeros(shape);
    let data_2 = Array2::from_elem(shape, 1.0);
    let mut col_map = Array2::zeros(shape);
    let mut t_map = Array2::zeros(shape);
    let mut truth = Array2::from_elem(shape, f64::NAN);

    // Stay inside the sampled span so fitted-curve extrema never exclude a
    // pixel for being exactly on the boundary.
    let span = log_dens_span.1 - log_dens_span.0;
    let (n_lo, n_hi) = (log_dens_span.0 + 0.1 * span, log_dens_span.1 - 0.1 * span);

    for y in 0..rows {
        for x in 0..cols {
            let col_dens = *col_dens_vals.choose(&mut rng).unwrap_or(&1.0);
            let t_kin = *t_kins.choose(&mut rng).unwrap_or(&10.0);
            let log_n = rng.gen_range(n_lo..n_hi);

            data_1[[y, x]] = model_ratio(col_dens, t_kin, log_n);
            col_map[[y, x]] = col_dens * rng.gen_range(0.95..1.05);
            t_map[[y, x]] = t_kin + rng.gen_range(-0.5..0.5);
            truth[[y, x]] = log_n;
        }
    }

    // Masked pixel, passes through every stage as NaN.
    data_1[[0, cols - 1]] = f64::NAN;
    truth[[0, cols - 1]] = f64::NAN;

    let header = Header::new().with_bunit("K");
    SyntheticScene {
        data_1: AstroImage::new(data_1, header.clone()),
        data_2: AstroImage::new(data_2, header.clone()),
        col_dens: AstroImage::new(col_map, header.clone()),
        t_dust: AstroImage::new(t_map, header),
        truth_log_n: truth,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{build_catalog, extract_temperatures};
    use crate::math::linspace;
    use tempfile::TempDir;

    #[test]
    fn written_grid_catalogs_cleanly() {
        let tmp = TempDir::new().unwrap();
        let pair = LinePair::new("hcn", "10-9", "9-8");
        let log_dens = linspace(2.0, 8.0, 13);

        write_grid(tmp.path(), &pair, &["1p0", "2p5"], &[10.0, 20.0], &log_dens, 0.0, 1).unwrap();

        let catalog = build_catalog(tmp.path()).unwrap();
        assert_eq!(catalog.buckets().len(), 2);
        assert_eq!(catalog.files_for(1.0).unwrap().len(), 2);

        let t_kins = extract_temperatures(&catalog).unwrap();
        assert_eq!(t_kins, vec![10.0, 20.0]);
    }

    #[test]
    fn scene_pixels_sit_on_model_curves() {
        let scene = generate_scene((4, 4), &[1.0], &[10.0], (2.0, 8.0), 42);
        for y in 0..4 {
            for x in 0..4 {
                let r = scene.data_1.data[[y, x]];
                let n = scene.truth_log_n[[y, x]];
                if r.is_nan() {
                    assert!(n.is_nan());
                    continue;
                }
                assert!((r - model_ratio(1.0, 10.0, n)).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn scene_generation_is_deterministic() {
        let a = generate_scene((3, 3), &[1.0, 2.5], &[10.0, 20.0], (2.0, 8.0), 9);
        let b = generate_scene((3, 3), &[1.0, 2.5], &[10.0, 20.0], (2.0, 8.0), 9);
        for (va, vb) in a.truth_log_n.iter().zip(b.truth_log_n.iter()) {
            assert!((va.is_nan() && vb.is_nan()) || va == vb);
        }
    }
}
