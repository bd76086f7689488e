//! Data models shared by the transport kernel and the orchestration engine.
//!
//! - [`layer`] - the layered medium and depth-to-layer resolution
//! - [`params`] - per-run input parameters and grid resolution
//! - [`photon`] - the state of one photon packet in flight
//! - [`output`] - run-scoped result tallies and their normalization
//! - [`source`] - source-geometry selection for a run

pub mod layer;
pub mod output;
pub mod params;
pub mod photon;
pub mod source;
