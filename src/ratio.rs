//! The ratio-map orchestrator.
//!
//! A `RatioMap` owns the brightness-temperature ratio of two co-registered
//! line maps (plus an optional uncertainty grid) and drives the full
//! retrieval: grid cataloging, nearest-value matching, per-cell curve
//! fitting, per-pixel inversion, and mosaic assembly. Cells are independent
//! and run in parallel; their partial maps fold into the global mosaic.

use std::path::Path;

use ndarray::Array2;
use rayon::prelude::*;

use crate::domain::{DensityMaps, GridCell, LinePair, RetrieveOptions, Uncertainty};
use crate::error::{AppError, warn};
use crate::fit::{InvertStats, fit_cell, invert_map};
use crate::grid::{build_catalog, extract_temperatures, ratio_table, read_model_table, sorted_pair};
use crate::image::{AstroImage, Header};
use crate::map::{assemble, match_nearest};
use crate::math::nan_percentile;
use crate::qa::QaSink;

const LOG_BUNIT: &str = "log10(n_H2 [cm-3])";
const LIN_BUNIT: &str = "n_H2 [cm-3]";

/// Finalized density map with asymmetric uncertainty bounds.
#[derive(Debug, Clone)]
pub struct DensityRetrieval {
    pub value: AstroImage,
    pub low: AstroImage,
    pub high: AstroImage,
}

impl DensityRetrieval {
    /// Wrap raw log-density maps into images, optionally exponentiating to
    /// linear density, and stamp the matching unit label.
    pub fn from_maps(maps: DensityMaps, header: &Header, log_output: bool) -> Self {
        let (transform, bunit): (fn(f64) -> f64, &str) = if log_output {
            (|v| v, LOG_BUNIT)
        } else {
            (|v| 10f64.powf(v), LIN_BUNIT)
        };
        let header = header.with_bunit(bunit);
        let to_image = |grid: Array2<f64>| AstroImage::new(grid.mapv(transform), header.clone());
        Self {
            value: to_image(maps.value),
            low: to_image(maps.low),
            high: to_image(maps.high),
        }
    }
}

/// A map of brightness-temperature ratios with optional absolute
/// uncertainty, created once from two equal-shaped input maps.
///
/// Construction never fails hard: incompatible input shapes are reported
/// and leave the instance degraded (no ratio grid); retrieval calls on a
/// degraded instance return an error. Invalid uncertainty input likewise
/// only disables the uncertainty feature.
pub struct RatioMap {
    ratio: Option<AstroImage>,
    rat_unc: Option<Array2<f64>>,
}

impl RatioMap {
    pub fn new(data_1: &AstroImage, data_2: &AstroImage, rel_uncs: Option<Uncertainty>) -> Self {
        if data_1.shape() != data_2.shape() {
            warn(
                "Cannot create a ratio map; verify that both maps have the same size and \
                 can be used to calculate a ratio.",
            );
            return Self {
                ratio: None,
                rat_unc: None,
            };
        }

        let ratio = AstroImage::new(&data_1.data / &data_2.data, data_1.header.clone());
        let rat_unc = rel_uncs.and_then(|u| resolve_uncertainty(&ratio.data, u));
        Self {
            ratio: Some(ratio),
            rat_unc,
        }
    }

    /// The ratio grid, or `None` when construction failed.
    pub fn ratio(&self) -> Option<&AstroImage> {
        self.ratio.as_ref()
    }

    /// The absolute per-pixel uncertainty grid, if initialized.
    pub fn uncertainty(&self) -> Option<&Array2<f64>> {
        self.rat_unc.as_ref()
    }

    pub fn is_degraded(&self) -> bool {
        self.ratio.is_none()
    }

    /// Mode (a): one column density, one temperature, one FWHM select
    /// exactly one pair of model files; fit once and invert the whole map.
    ///
    /// The file pair is expected at
    /// `<grid_root>/T=<t_kin>K-FWHM=<fwhm>/<mol>_<line>_<col_dens>.dat`.
    pub fn density_single_cell(
        &self,
        pair: &LinePair,
        grid_root: &Path,
        col_dens: &str,
        t_kin: &str,
        fwhm: &str,
        opts: &RetrieveOptions,
        qa: &dyn QaSink,
    ) -> Result<(DensityRetrieval, InvertStats), AppError> {
        let ratio = self.ratio_or_err()?;
        let dir = grid_root.join(format!("T={t_kin}K-FWHM={fwhm}"));

        let table_1 = read_model_table(&dir.join(format!("{}_{}_{col_dens}.dat", pair.mol, pair.line_1)))?;
        let table_2 = read_model_table(&dir.join(format!("{}_{}_{col_dens}.dat", pair.mol, pair.line_2)))?;
        let rt = ratio_table(&table_1, &table_2);

        let cell = GridCell {
            col_dens: parse_encoded(col_dens),
            t_kin: parse_encoded(t_kin),
            log_dens: rt.log_dens,
            ratio: rt.ratio,
        };

        let threshold = self.residual_warn_threshold(opts.warn_percentile);
        let Some((maps, stats)) =
            self.run_cell(&cell, ratio.data.clone(), pair, 0, opts, threshold, qa)
        else {
            return Err(AppError::new(
                4,
                format!("Curve fit failed for the single cell (N={col_dens}, T={t_kin} K)."),
            ));
        };

        Ok(self.finalize(maps, stats, opts, qa))
    }

    /// Mode (b): per-pixel column-density and dust-temperature maps are
    /// matched to the nearest grid values; each realized (column density,
    /// temperature) combination fits its own curve, inverts its own pixel
    /// mask, and merges into the global mosaic.
    pub fn density_from_col_dens(
        &self,
        pair: &LinePair,
        grid_dir: &Path,
        im_col_dens: &AstroImage,
        im_t_dust: &AstroImage,
        t_dust_corr: f64,
        opts: &RetrieveOptions,
        qa: &dyn QaSink,
    ) -> Result<(DensityRetrieval, InvertStats), AppError> {
        let ratio = self.ratio_or_err()?;
        let shape = ratio.shape();
        if im_col_dens.shape() != shape || im_t_dust.shape() != shape {
            return Err(AppError::new(
                2,
                "Column-density and temperature maps must match the ratio map's shape.",
            ));
        }

        let catalog = build_catalog(grid_dir)?;
        if catalog.is_empty() {
            return Err(AppError::new(
                2,
                format!("No model grid files found in '{}'.", grid_dir.display()),
            ));
        }
        let t_kins = extract_temperatures(&catalog)?;
        if t_kins.is_empty() {
            return Err(AppError::new(2, "The model grid exposes no kinetic temperatures."));
        }

        let im_t_dust_corr = im_t_dust.offset_by(t_dust_corr);

        let (col_nearest, col_diff) = match_nearest(&im_col_dens.data, &catalog.col_dens_values());
        let (t_nearest, t_diff) = match_nearest(&im_t_dust_corr.data, &t_kins);

        if opts.report_deviation {
            report_deviation(qa, "column density", &col_diff, im_col_dens);
            report_deviation(qa, "temperature", &t_diff, &im_t_dust_corr);
        }

        // Collect every realized grid cell up front; temperature index is
        // the QA cadence counter, as every column-density bucket restarts
        // its own curve-QA rhythm.
        let mut jobs: Vec<(GridCell, usize)> = Vec::new();
        for bucket in catalog.buckets() {
            let files = sorted_pair(&pair.line_1, &pair.line_2, &bucket.files)?;
            let table_1 = read_model_table(&files[0])?;
            let table_2 = read_model_table(&files[1])?;
            let rt = ratio_table(&table_1, &table_2);

            for (j, &t_kin) in t_kins.iter().enumerate() {
                let cell = rt.cell(bucket.col_dens, t_kin);
                if cell.is_empty() {
                    continue;
                }
                jobs.push((cell, j));
            }
        }

        let threshold = self.residual_warn_threshold(opts.warn_percentile);

        // Cells write disjoint pixel masks, so they are independent: run
        // them in parallel and fold the partial maps into the mosaic.
        let parts: Vec<(DensityMaps, InvertStats)> = jobs
            .par_iter()
            .filter_map(|(cell, run_idx)| {
                let masked = mask_ratio(&ratio.data, &col_nearest, &t_nearest, cell);
                self.run_cell(cell, masked, pair, *run_idx, opts, threshold, qa)
            })
            .collect();

        let mut stats = InvertStats::default();
        for (_, s) in &parts {
            stats.solved += s.solved;
            stats.out_of_range += s.out_of_range;
            stats.no_sign_change += s.no_sign_change;
        }
        let global = assemble(shape, parts.into_iter().map(|(m, _)| m));

        Ok(self.finalize(global, stats, opts, qa))
    }

    /// Mode (c): derive the molecular column-density map from a total
    /// column-density map and a molecular abundance, then proceed as in
    /// mode (b).
    pub fn density_from_abundance(
        &self,
        pair: &LinePair,
        grid_dir: &Path,
        mol_abundance: f64,
        im_col_dens_total: &AstroImage,
        im_t_dust: &AstroImage,
        t_dust_corr: f64,
        opts: &RetrieveOptions,
        qa: &dyn QaSink,
    ) -> Result<(DensityRetrieval, InvertStats), AppError> {
        let im_mol_col_dens = im_col_dens_total.mol_col_dens(mol_abundance);
        self.density_from_col_dens(pair, grid_dir, &im_mol_col_dens, im_t_dust, t_dust_corr, opts, qa)
    }

    fn ratio_or_err(&self) -> Result<&AstroImage, AppError> {
        self.ratio.as_ref().ok_or_else(|| {
            AppError::new(2, "The ratio map is degraded (construction failed); cannot retrieve densities.")
        })
    }

    /// Percentile of the relative uncertainty against which each cell's fit
    /// residual is compared. `None` disables the check.
    fn residual_warn_threshold(&self, percentile: f64) -> Option<f64> {
        let unc = self.rat_unc.as_ref()?;
        let ratio = self.ratio.as_ref()?;
        nan_percentile(
            unc.iter().zip(ratio.data.iter()).map(|(&u, &r)| u / r),
            percentile,
        )
    }

    /// Fit one cell's curve and invert its masked ratio slice.
    ///
    /// A failed fit (e.g. too few samples for the polynomial order) is
    /// reported and the cell is skipped; its pixels stay NaN.
    fn run_cell(
        &self,
        cell: &GridCell,
        masked_ratio: Array2<f64>,
        pair: &LinePair,
        run_idx: usize,
        opts: &RetrieveOptions,
        residual_threshold: Option<f64>,
        qa: &dyn QaSink,
    ) -> Option<(DensityMaps, InvertStats)> {
        let (curve, range) = match fit_cell(cell, opts.poly_order) {
            Ok(fitted) => fitted,
            Err(e) => {
                warn(format!("{e} Skipping this cell."));
                return None;
            }
        };

        if opts.qa_every > 0 && run_idx % opts.qa_every == 0 {
            qa.curve_fit(cell, &range.axis, &range.values, &pair.ratio_label());
        }

        if let Some(threshold) = residual_threshold {
            if curve.residual > threshold {
                warn(
                    "The fit to the brightness ratio as a function of density will induce a \
                     larger uncertainty than the provided uncertainty. The produced \
                     uncertainty maps might thus be inaccurate.",
                );
            }
        }

        Some(invert_map(&masked_ratio, &curve, self.rat_unc.as_ref()))
    }

    fn finalize(
        &self,
        maps: DensityMaps,
        stats: InvertStats,
        opts: &RetrieveOptions,
        qa: &dyn QaSink,
    ) -> (DensityRetrieval, InvertStats) {
        let header = self
            .ratio
            .as_ref()
            .map(|im| im.header.clone())
            .unwrap_or_default();
        let retrieval = DensityRetrieval::from_maps(maps, &header, opts.log_output);

        let values: Vec<f64> = retrieval.value.data.iter().copied().collect();
        let unit = retrieval.value.header.bunit().unwrap_or("");
        qa.histogram(&values, unit, !opts.log_output);

        (retrieval, stats)
    }
}

/// Combine the two relative uncertainties in quadrature and scale by the
/// ratio into an absolute uncertainty grid. Bad per-pixel shapes disable
/// the feature with a warning.
fn resolve_uncertainty(ratio: &Array2<f64>, rel_uncs: Uncertainty) -> Option<Array2<f64>> {
    match rel_uncs {
        Uncertainty::Uniform(a, b) => {
            let rel = (a * a + b * b).sqrt();
            Some(ratio.mapv(|r| r * rel))
        }
        Uncertainty::PerPixel(a, b) => {
            if a.dim() != ratio.dim() || b.dim() != ratio.dim() {
                warn(
                    "The per-pixel relative uncertainties do not match the ratio map's \
                     size. No uncertainty is added to the ratio map.",
                );
                return None;
            }
            let rel = (&a * &a + &b * &b).mapv(f64::sqrt);
            Some(ratio * &rel)
        }
    }
}

/// Copy of the ratio map masked to the pixels whose nearest grid values
/// match this cell; everything else becomes NaN.
fn mask_ratio(
    ratio: &Array2<f64>,
    col_nearest: &Array2<f64>,
    t_nearest: &Array2<f64>,
    cell: &GridCell,
) -> Array2<f64> {
    let mut masked = ratio.clone();
    for ((y, x), v) in masked.indexed_iter_mut() {
        if col_nearest[[y, x]] != cell.col_dens || t_nearest[[y, x]] != cell.t_kin {
            *v = f64::NAN;
        }
    }
    masked
}

/// Hand absolute and relative (percent) deviation maps to the QA sink.
fn report_deviation(qa: &dyn QaSink, name: &str, diff: &Array2<f64>, original: &AstroImage) {
    let rel_pct = ndarray::Zip::from(diff)
        .and(&original.data)
        .map_collect(|&d, &o| (100.0 * d / o).abs());

    let abs_im = AstroImage::new(diff.clone(), original.header.clone());
    let rel_im = AstroImage::new(rel_pct, original.header.clone());
    qa.deviation(name, &abs_im, &rel_im);
}

/// Parse a filename-encoded numeric label (`p` for the decimal point).
fn parse_encoded(label: &str) -> f64 {
    label.replace('p', ".").parse().unwrap_or(f64::NAN)
}
