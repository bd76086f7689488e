//! # Core Module
//!
//! Stateless building blocks of the photon transport simulation: the layered
//! medium and per-run parameters, the photon packet record, result tallies,
//! file I/O for parameters, coordinate sources and results, and the reference
//! hop/drop/spin transport kernel.
//!
//! Nothing in here decides *when* things happen. Ordering of runs, photons and
//! reporting is the job of [`crate::engine`].

pub mod io;
pub mod models;
pub mod transport;
