//! Map-level operations: nearest-grid-value matching and mosaic assembly.

pub mod mosaic;
pub mod nearest;

pub use mosaic::*;
pub use nearest::*;
