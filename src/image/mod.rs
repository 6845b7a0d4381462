//! Astronomical image container.
//!
//! `AstroImage` pairs a 2D grid with positional/unit metadata. Reading and
//! writing real image files (FITS etc.) lives outside this crate; here we
//! only need the raw grid, a metadata record we can copy-and-update, and the
//! abundance-to-column-density conversion the orchestrator delegates to.

pub mod header;

pub use header::Header;

use ndarray::Array2;

/// A 2D real-valued grid with immutable header metadata.
///
/// NaN pixels mean undefined/masked. Derived images always get a fresh
/// header record; there is no aliasing between a source image's metadata and
/// the metadata of images computed from it.
#[derive(Debug, Clone)]
pub struct AstroImage {
    pub data: Array2<f64>,
    pub header: Header,
}

impl AstroImage {
    pub fn new(data: Array2<f64>, header: Header) -> Self {
        Self { data, header }
    }

    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Molecular column-density image from a total column-density image and
    /// a molecular abundance factor.
    pub fn mol_col_dens(&self, abundance: f64) -> AstroImage {
        AstroImage::new(self.data.mapv(|v| v * abundance), self.header.clone())
    }

    /// Same grid shifted by a scalar offset (e.g. a dust-temperature
    /// correction), with the header carried over.
    pub fn offset_by(&self, offset: f64) -> AstroImage {
        AstroImage::new(self.data.mapv(|v| v + offset), self.header.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn mol_col_dens_scales_every_pixel() {
        let im = AstroImage::new(array![[1.0, 2.0], [4.0, f64::NAN]], Header::default());
        let out = im.mol_col_dens(1e-8);
        assert!((out.data[[0, 0]] - 1e-8).abs() < 1e-20);
        assert!((out.data[[1, 0]] - 4e-8).abs() < 1e-20);
        assert!(out.data[[1, 1]].is_nan());
    }

    #[test]
    fn offset_by_shifts_values() {
        let im = AstroImage::new(array![[10.0, 20.0]], Header::default());
        let out = im.offset_by(2.5);
        assert!((out.data[[0, 0]] - 12.5).abs() < 1e-12);
        assert!((out.data[[0, 1]] - 22.5).abs() < 1e-12);
    }
}
