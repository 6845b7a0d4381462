//! Model-grid access.
//!
//! - directory scanning and column-density bucketing (`catalog`)
//! - model-file parsing and ratio-table construction (`table`)

pub mod catalog;
pub mod table;

pub use catalog::*;
pub use table::*;
