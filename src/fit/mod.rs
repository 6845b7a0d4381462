//! Ratio-curve fitting and per-pixel density inversion.
//!
//! Responsibilities:
//!
//! - fit a low-order polynomial to each grid cell's (density, ratio) samples
//! - derive the curve's invertible ratio range and its bracket densities
//! - solve density per pixel by bracketed root-finding, with uncertainty
//!   propagated through the same inversion

pub mod curve;
pub mod invert;

pub use curve::*;
pub use invert::*;
