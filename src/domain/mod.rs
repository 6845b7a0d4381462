//! Shared domain types.
//!
//! Types are kept lightweight so they can be used in-memory during retrieval
//! and exported to JSON for later inspection.

pub mod types;

pub use types::*;
