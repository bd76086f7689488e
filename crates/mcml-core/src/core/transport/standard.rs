use super::fresnel::{COS_ZERO, fresnel};
use super::{EventCounters, TransportKernel};
use crate::core::models::layer::LayerSpec;
use crate::core::models::output::OutputAccumulator;
use crate::core::models::params::InputParameters;
use crate::core::models::photon::{PhotonLaunch, PhotonState};
use nalgebra::{Point3, Vector3};
use rand::Rng;
use std::f64::consts::PI;
use tracing::trace;

/// Multi-layer Monte Carlo transport kernel.
///
/// Each step samples a free path, stops at the next interface if it is
/// closer, and either crosses/reflects there (Fresnel) or deposits the
/// absorbed fraction of the weight and scatters with a Henyey-Greenstein
/// phase function. Low-weight packets go through roulette.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardKernel;

impl StandardKernel {
    pub fn new() -> Self {
        Self
    }

    fn hop_in_clear_layer<R: Rng + ?Sized>(
        &self,
        params: &InputParameters,
        layer: &LayerSpec,
        photon: &mut PhotonState,
        output: &mut OutputAccumulator,
        rng: &mut R,
    ) {
        if is_trapped_in_clear_layer(layer, photon.direction.z) {
            trace!(
                layer = photon.layer,
                uz = photon.direction.z,
                weight = photon.weight,
                "Packet is guided by a clear layer and can never leave it; terminating."
            );
            photon.kill();
            return;
        }
        photon.step = distance_to_boundary(layer, photon);
        photon.hop();
        self.cross_or_not(params, layer, photon, output, rng);
    }

    fn hop_drop_spin_in_tissue<R: Rng + ?Sized>(
        &self,
        params: &InputParameters,
        layer: &LayerSpec,
        photon: &mut PhotonState,
        output: &mut OutputAccumulator,
        counters: &mut EventCounters,
        rng: &mut R,
    ) {
        let mut_total = layer.interaction_coefficient();
        if photon.step_left == 0.0 {
            let rnd = 1.0 - rng.r#gen::<f64>();
            photon.step = -rnd.ln() / mut_total;
        } else {
            photon.step = photon.step_left / mut_total;
            photon.step_left = 0.0;
        }

        let hits_boundary = {
            let dl_b = distance_to_boundary(layer, photon);
            if photon.direction.z != 0.0 && photon.step > dl_b {
                photon.step_left = (photon.step - dl_b) * mut_total;
                photon.step = dl_b;
                true
            } else {
                false
            }
        };

        photon.hop();
        if hits_boundary {
            self.cross_or_not(params, layer, photon, output, rng);
        } else {
            self.drop(params, layer, photon, output);
            self.spin(layer, photon, counters, rng);
        }
    }

    fn drop(
        &self,
        params: &InputParameters,
        layer: &LayerSpec,
        photon: &mut PhotonState,
        output: &mut OutputAccumulator,
    ) {
        let grid = &params.grid;
        let iz = grid.depth_bin(photon.position.z);
        let ir = grid.radial_bin(photon.position.x, photon.position.y);
        let absorbed = photon.weight * layer.mua / layer.interaction_coefficient();
        photon.weight -= absorbed;
        output.a_rz.add(ir, iz, absorbed);
    }

    fn spin<R: Rng + ?Sized>(
        &self,
        layer: &LayerSpec,
        photon: &mut PhotonState,
        counters: &mut EventCounters,
        rng: &mut R,
    ) {
        if layer.raman_yield > 0.0 && rng.r#gen::<f64>() < layer.raman_yield {
            counters.secondary_events += 1;
        }

        let cost = sample_henyey_greenstein(layer.g, rng);
        let sint = (1.0 - cost * cost).sqrt();
        let psi = 2.0 * PI * rng.r#gen::<f64>();
        let (sinp, cosp) = psi.sin_cos();

        let (ux, uy, uz) = (photon.direction.x, photon.direction.y, photon.direction.z);
        photon.direction = if uz.abs() > COS_ZERO {
            Vector3::new(sint * cosp, sint * sinp, cost * uz.signum())
        } else {
            let temp = (1.0 - uz * uz).sqrt();
            Vector3::new(
                sint * (ux * uz * cosp - uy * sinp) / temp + ux * cost,
                sint * (uy * uz * cosp + ux * sinp) / temp + uy * cost,
                -sint * cosp * temp + uz * cost,
            )
        };
    }

    fn cross_or_not<R: Rng + ?Sized>(
        &self,
        params: &InputParameters,
        layer: &LayerSpec,
        photon: &mut PhotonState,
        output: &mut OutputAccumulator,
        rng: &mut R,
    ) {
        if photon.direction.z < 0.0 {
            self.cross_up_or_not(params, layer, photon, output, rng);
        } else {
            self.cross_down_or_not(params, layer, photon, output, rng);
        }
    }

    fn cross_up_or_not<R: Rng + ?Sized>(
        &self,
        params: &InputParameters,
        layer: &LayerSpec,
        photon: &mut PhotonState,
        output: &mut OutputAccumulator,
        rng: &mut R,
    ) {
        let uz = photon.direction.z;
        let ni = layer.n;
        let nt = params.layers.refractive_index(photon.layer - 1);

        let (reflectance, cos_transmitted) = if -uz <= layer.cos_crit0 {
            (1.0, 0.0)
        } else {
            let f = fresnel(ni, nt, -uz);
            (f.reflectance, f.cos_transmitted)
        };

        if rng.r#gen::<f64>() > reflectance {
            if photon.layer == 1 {
                photon.direction.z = -cos_transmitted;
                let grid = &params.grid;
                let ir = grid.radial_bin(photon.position.x, photon.position.y);
                let ia = grid.angle_bin(cos_transmitted);
                output.rd_ra.add(ir, ia, photon.weight);
                photon.weight = 0.0;
                photon.kill();
            } else {
                photon.layer -= 1;
                photon.direction.x *= ni / nt;
                photon.direction.y *= ni / nt;
                photon.direction.z = -cos_transmitted;
            }
        } else {
            photon.direction.z = -uz;
        }
    }

    fn cross_down_or_not<R: Rng + ?Sized>(
        &self,
        params: &InputParameters,
        layer: &LayerSpec,
        photon: &mut PhotonState,
        output: &mut OutputAccumulator,
        rng: &mut R,
    ) {
        let uz = photon.direction.z;
        let ni = layer.n;
        let nt = params.layers.refractive_index(photon.layer + 1);

        let (reflectance, cos_transmitted) = if uz <= layer.cos_crit1 {
            (1.0, 0.0)
        } else {
            let f = fresnel(ni, nt, uz);
            (f.reflectance, f.cos_transmitted)
        };

        if rng.r#gen::<f64>() > reflectance {
            if photon.layer == params.layers.len() {
                photon.direction.z = cos_transmitted;
                let grid = &params.grid;
                let ir = grid.radial_bin(photon.position.x, photon.position.y);
                let ia = grid.angle_bin(cos_transmitted);
                output.tt_ra.add(ir, ia, photon.weight);
                photon.weight = 0.0;
                photon.kill();
            } else {
                photon.layer += 1;
                photon.direction.x *= ni / nt;
                photon.direction.y *= ni / nt;
                photon.direction.z = cos_transmitted;
            }
        } else {
            photon.direction.z = -uz;
        }
    }

    fn roulette<R: Rng + ?Sized>(&self, params: &InputParameters, photon: &mut PhotonState, rng: &mut R) {
        if photon.weight == 0.0 {
            photon.kill();
        } else if rng.r#gen::<f64>() < params.roulette_chance {
            photon.weight /= params.roulette_chance;
        } else {
            photon.kill();
        }
    }
}

impl TransportKernel for StandardKernel {
    fn launch(&self, params: &InputParameters, rsp: f64, launch: &PhotonLaunch) -> PhotonState {
        let layers = &params.layers;
        match launch.depth {
            Some(depth) => {
                let uz = depth.direction_cosine;
                PhotonState::new(
                    Point3::new(launch.x, launch.y, depth.z),
                    Vector3::new((1.0 - uz * uz).max(0.0).sqrt(), 0.0, uz),
                    1.0,
                    depth.layer,
                )
            }
            None => {
                let mut photon = PhotonState::new(
                    Point3::new(launch.x, launch.y, 0.0),
                    Vector3::z(),
                    1.0 - rsp,
                    1,
                );
                let first_is_clear = layers.layer(1).is_some_and(LayerSpec::is_clear);
                if first_is_clear {
                    if let Some(second) = layers.layer(2) {
                        photon.layer = 2;
                        photon.position.z = second.z0;
                    }
                }
                photon
            }
        }
    }

    fn step<R: Rng + ?Sized>(
        &self,
        params: &InputParameters,
        photon: &mut PhotonState,
        output: &mut OutputAccumulator,
        counters: &mut EventCounters,
        rng: &mut R,
    ) {
        let Some(layer) = params.layers.layer(photon.layer).copied() else {
            photon.kill();
            return;
        };

        if layer.is_clear() {
            self.hop_in_clear_layer(params, &layer, photon, output, rng);
        } else {
            self.hop_drop_spin_in_tissue(params, &layer, photon, output, counters, rng);
        }

        if photon.weight < params.weight_threshold && !photon.is_dead() {
            self.roulette(params, photon, rng);
        }
    }
}

/// Distance along the current direction to the interface the packet is
/// heading for, infinite for horizontal travel.
fn distance_to_boundary(layer: &LayerSpec, photon: &PhotonState) -> f64 {
    let uz = photon.direction.z;
    if uz > 0.0 {
        (layer.z1 - photon.position.z) / uz
    } else if uz < 0.0 {
        (layer.z0 - photon.position.z) / uz
    } else {
        f64::INFINITY
    }
}

/// True when a packet travelling with depth cosine `uz` through a clear layer
/// is totally reflected at both faces. Its direction never changes there, so
/// it would bounce between the interfaces forever.
#[inline]
fn is_trapped_in_clear_layer(layer: &LayerSpec, uz: f64) -> bool {
    let cos = uz.abs();
    cos <= layer.cos_crit0 && cos <= layer.cos_crit1
}

/// Samples the cosine of the deflection angle from the Henyey-Greenstein
/// phase function with anisotropy `g`.
fn sample_henyey_greenstein<R: Rng + ?Sized>(g: f64, rng: &mut R) -> f64 {
    let xi = rng.r#gen::<f64>();
    if g != 0.0 {
        let temp = (1.0 - g * g) / (1.0 - g + 2.0 * g * xi);
        ((1.0 + g * g - temp * temp) / (2.0 * g)).clamp(-1.0, 1.0)
    } else {
        2.0 * xi - 1.0
    }
}
