//! Input/output helpers.
//!
//! Model-grid files are read by `grid`; this module covers the portable
//! JSON representation of a fitted curve (`export`).

pub mod export;

pub use export::*;
