//! # Engine Module
//!
//! The orchestration engine that turns a validated parameter set into finished runs.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Engine-wide settings such as the counter policy and seed
//! - **Context** ([`context`]) - The simulation context that carries counters and timing across runs
//! - **Photon Sources** ([`source`]) - Builds the per-run batch of launch coordinates
//! - **Lifecycle** ([`lifecycle`]) - Launches every photon and steps it until it dies
//! - **Timing** ([`timing`]) - Elapsed-time labels and completion-time projection
//! - **Reporting** ([`report`]) - The fixed end-of-run scale/write sequence
//! - **Progress Monitoring** ([`progress`]) - Progress callbacks for front-ends
//! - **Error Handling** ([`error`]) - Engine-level error aggregation

pub mod config;
pub mod context;
pub mod error;
pub mod lifecycle;
pub mod progress;
pub mod report;
pub mod source;
pub mod timing;
