//! `ratio-density` library crate.
//!
//! The binary (`densmap`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - modules are reusable (e.g., future pipelines, notebooks, etc.)
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod domain;
pub mod error;
pub mod fit;
pub mod grid;
pub mod image;
pub mod io;
pub mod map;
pub mod math;
pub mod qa;
pub mod ratio;
pub mod report;
pub mod synthetic;
