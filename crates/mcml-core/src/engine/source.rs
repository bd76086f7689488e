use crate::core::io::coords::{CoordinateError, CoordinateFile, Coordinates};
use crate::core::models::layer::LayerStack;
use crate::core::models::photon::{LaunchDepth, PhotonLaunch};
use crate::core::models::source::SourceSelection;
use rand::Rng;
use std::f64::consts::PI;
use std::ops::Range;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// Source radii are entered in micrometres; the simulation works in cm.
pub const MICRONS_PER_CM: f64 = 10_000.0;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Invalid source radius {0} um: must be finite and non-negative")]
    InvalidRadius(f64),
    #[error("Invalid direction cosine {0}: must lie in [-1, 1]")]
    InvalidDirectionCosine(f64),
    #[error("Launch depth {depth} cm lies outside the layer stack [0, {stack_depth})")]
    DepthOutsideStack { depth: f64, stack_depth: f64 },
    #[error("Photon count {0} does not fit in memory on this platform")]
    TooManyPhotons(u64),
    #[error("Source batch exhausted after {len} launches")]
    BatchExhausted { len: usize },
    #[error(transparent)]
    Coordinates(#[from] CoordinateError),
}

/// Launch offsets for every photon of one run, consumed strictly in index
/// order.
#[derive(Debug, Clone, PartialEq)]
pub struct PhotonSourceBatch {
    x: Vec<f64>,
    y: Vec<f64>,
    given: usize,
    depth: Option<LaunchDepth>,
}

impl PhotonSourceBatch {
    fn zeros(n: usize) -> Self {
        Self::from_coordinates(
            Coordinates {
                x: vec![0.0; n],
                y: vec![0.0; n],
            },
            None,
        )
    }

    fn from_coordinates(coords: Coordinates, depth: Option<LaunchDepth>) -> Self {
        Self {
            x: coords.x,
            y: coords.y,
            given: 0,
            depth,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.x.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Number of entries handed out so far.
    #[inline]
    pub fn given(&self) -> usize {
        self.given
    }

    pub fn depth(&self) -> Option<LaunchDepth> {
        self.depth
    }

    pub fn x(&self) -> &[f64] {
        &self.x
    }

    pub fn y(&self) -> &[f64] {
        &self.y
    }

    /// Launch description for entry `index`, without consuming it.
    pub fn launch_at(&self, index: usize) -> Option<PhotonLaunch> {
        Some(PhotonLaunch {
            x: *self.x.get(index)?,
            y: *self.y.get(index)?,
            depth: self.depth,
        })
    }

    /// Hands out the next unused entry.
    pub fn next_launch(&mut self) -> Result<PhotonLaunch, SourceError> {
        let launch = self
            .launch_at(self.given)
            .ok_or(SourceError::BatchExhausted { len: self.len() })?;
        self.given += 1;
        Ok(launch)
    }

    /// Consumes every remaining entry at once and returns their indices.
    pub fn claim_remaining(&mut self) -> Range<usize> {
        let range = self.given..self.len();
        self.given = self.len();
        range
    }
}

/// Builds the launch batch for `n` photons under the given source policy.
#[instrument(skip_all, name = "photon_source", fields(kind = selection.kind(), photons = n))]
pub fn initialize<R: Rng + ?Sized>(
    selection: &SourceSelection,
    n: u64,
    layers: &LayerStack,
    rng: &mut R,
) -> Result<PhotonSourceBatch, SourceError> {
    let count = usize::try_from(n).map_err(|_| SourceError::TooManyPhotons(n))?;

    let batch = match selection {
        SourceSelection::UniformDisk { radius_um } => uniform_disk(*radius_um, count, rng)?,
        SourceSelection::DeferredGaussian => {
            warn!("The deferred Gaussian source is not implemented yet; launching every photon at the origin.");
            PhotonSourceBatch::zeros(count)
        }
        SourceSelection::FileLoadedPlanarGaussian { path } => {
            let coords = CoordinateFile::read_from_path(path, count)?;
            PhotonSourceBatch::from_coordinates(coords, None)
        }
        SourceSelection::RawOrigin => PhotonSourceBatch::zeros(count),
        SourceSelection::FixedLayer {
            path,
            depth,
            direction_cosine,
        } => {
            let launch_depth = resolve_launch_depth(*depth, *direction_cosine, layers)?;
            debug!(layer = launch_depth.layer, depth, "Resolved fixed launch layer.");
            let coords = CoordinateFile::read_from_path(path, count)?;
            PhotonSourceBatch::from_coordinates(coords, Some(launch_depth))
        }
    };

    info!(entries = batch.len(), "Photon source batch ready.");
    Ok(batch)
}

fn uniform_disk<R: Rng + ?Sized>(
    radius_um: f64,
    count: usize,
    rng: &mut R,
) -> Result<PhotonSourceBatch, SourceError> {
    if !radius_um.is_finite() || radius_um < 0.0 {
        return Err(SourceError::InvalidRadius(radius_um));
    }
    let radius = radius_um / MICRONS_PER_CM;
    let mut coords = Coordinates {
        x: Vec::with_capacity(count),
        y: Vec::with_capacity(count),
    };
    for _ in 0..count {
        let u = rng.r#gen::<f64>().sqrt() * radius;
        let theta = rng.r#gen::<f64>() * 2.0 * PI;
        coords.x.push(u * theta.cos());
        coords.y.push(u * theta.sin());
    }
    Ok(PhotonSourceBatch::from_coordinates(coords, None))
}

fn resolve_launch_depth(
    depth: f64,
    direction_cosine: f64,
    layers: &LayerStack,
) -> Result<LaunchDepth, SourceError> {
    if !(-1.0..=1.0).contains(&direction_cosine) {
        return Err(SourceError::InvalidDirectionCosine(direction_cosine));
    }
    let layer = layers
        .resolve_layer(depth)
        .ok_or(SourceError::DepthOutsideStack {
            depth,
            stack_depth: layers.depth(),
        })?;
    Ok(LaunchDepth {
        z: depth,
        layer,
        direction_cosine,
    })
}
