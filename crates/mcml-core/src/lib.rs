//! # MCML++ Core Library
//!
//! Monte Carlo simulation of photon transport in multi-layered turbid media,
//! built around the classic MCML hop/drop/spin model.
//!
//! ## Architectural Philosophy
//!
//! The library keeps the same three-layer split throughout:
//!
//! - **[`core`]: The Foundation.** Stateless data models (`LayerStack`, `InputParameters`,
//!   `PhotonState`, `OutputAccumulator`), file I/O for parameter, coordinate and result files,
//!   and the reference transport kernel.
//!
//! - **[`engine`]: The Logic Core.** The orchestration machinery for one run: photon source
//!   initialization, the photon lifecycle driver, timing and ETA projection, and the ordered
//!   end-of-run reporting.
//!
//! - **[`workflows`]: The Public API.** Ties `engine` and `core` together into the multi-run
//!   simulation loop. This is the entry point for end-users of the library.

pub mod core;
pub mod engine;
pub mod workflows;
