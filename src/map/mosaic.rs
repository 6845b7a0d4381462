//! Mosaic assembly: merging per-grid-cell partial maps into the global map.
//!
//! Each grid cell's inversion writes only the pixels matching that cell's
//! column-density/temperature bin, so cells touch disjoint pixel sets and
//! the merge is an associative, commutative fold. The merge itself does not
//! enforce exclusivity: should an upstream bug produce overlapping masks,
//! the last-processed cell wins silently.

use ndarray::Array2;

use crate::domain::DensityMaps;

/// Copy every non-NaN pixel of `local` into `global` at the same
/// coordinates, overwriting. NaN pixels of `local` never overwrite.
pub fn merge_into(global: &mut Array2<f64>, local: &Array2<f64>) {
    for (g, &l) in global.iter_mut().zip(local.iter()) {
        if !l.is_nan() {
            *g = l;
        }
    }
}

/// Merge a cell's value/low/high triple into the global triple.
pub fn merge_maps(global: &mut DensityMaps, local: &DensityMaps) {
    merge_into(&mut global.value, &local.value);
    merge_into(&mut global.low, &local.low);
    merge_into(&mut global.high, &local.high);
}

/// Fold per-cell partial results into one global map triple.
pub fn assemble(shape: (usize, usize), parts: impl IntoIterator<Item = DensityMaps>) -> DensityMaps {
    let mut global = DensityMaps::nan_filled(shape);
    for part in parts {
        merge_maps(&mut global, &part);
    }
    global
}
