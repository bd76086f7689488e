//! File I/O for the simulation.
//!
//! Parameter files are TOML; coordinate source files are plain two-column
//! text; results are written as a human-readable summary plus an optional
//! CSV matrix of the absorption grid.

pub mod coords;
pub mod params;
pub mod results;
