//! The photon transport step and its supporting optics.
//!
//! The orchestration engine only ever talks to a [`TransportKernel`]: it
//! launches a packet, then steps it until it is dead. [`standard::StandardKernel`]
//! is the multi-layer hop/drop/spin kernel used by the command-line tool;
//! tests substitute recording kernels.

pub mod fresnel;
pub mod standard;

use crate::core::models::output::OutputAccumulator;
use crate::core::models::params::InputParameters;
use crate::core::models::photon::{PhotonLaunch, PhotonState};
use rand::Rng;
use std::ops::AddAssign;

/// Event tallies the kernel maintains alongside the result grids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EventCounters {
    /// Scattering events tagged as secondary (Raman) events.
    pub secondary_events: u64,
}

impl AddAssign for EventCounters {
    fn add_assign(&mut self, rhs: Self) {
        self.secondary_events += rhs.secondary_events;
    }
}

pub trait TransportKernel {
    /// Creates the packet for one launch. `rsp` is the specular reflectance
    /// of the top surface for this run.
    fn launch(&self, params: &InputParameters, rsp: f64, launch: &PhotonLaunch) -> PhotonState;

    /// Advances the packet by one hop/drop/spin. Implementations must
    /// eventually kill every packet.
    fn step<R: Rng + ?Sized>(
        &self,
        params: &InputParameters,
        photon: &mut PhotonState,
        output: &mut OutputAccumulator,
        counters: &mut EventCounters,
        rng: &mut R,
    );
}
