//! # Workflows Module
//!
//! High-level entry points that drive complete simulations.
//!
//! - **Simulation Workflow** ([`simulate`]) - The multi-run loop: per-run setup, photon
//!   source initialization, the photon lifecycle and ordered result reporting, with the
//!   simulation context carried from one run to the next.

pub mod simulate;
