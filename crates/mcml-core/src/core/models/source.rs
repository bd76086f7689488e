use std::fmt;
use std::path::PathBuf;

/// Geometry policy used to seed the launch positions of one run.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceSelection {
    /// Uniform areal density over a disk centred on the origin. The radius is
    /// given in micrometres.
    UniformDisk { radius_um: f64 },
    /// Reserved for a volumetric Gaussian beam. Every photon launches at the
    /// origin until it is implemented.
    DeferredGaussian,
    /// Precomputed planar offsets read from a coordinate file.
    FileLoadedPlanarGaussian { path: PathBuf },
    /// Every photon launches at the origin.
    RawOrigin,
    /// Offsets from a coordinate file, launched from a fixed depth inside the
    /// stack with a fixed direction cosine.
    FixedLayer {
        path: PathBuf,
        depth: f64,
        direction_cosine: f64,
    },
}

impl SourceSelection {
    /// Short identifier, also used as the tag in parameter files.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UniformDisk { .. } => "uniform-disk",
            Self::DeferredGaussian => "deferred-gaussian",
            Self::FileLoadedPlanarGaussian { .. } => "planar-gaussian-file",
            Self::RawOrigin => "raw-origin",
            Self::FixedLayer { .. } => "fixed-layer",
        }
    }
}

impl fmt::Display for SourceSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UniformDisk { radius_um } => write!(f, "uniform disk (r = {} um)", radius_um),
            Self::DeferredGaussian => write!(f, "deferred gaussian (origin)"),
            Self::FileLoadedPlanarGaussian { path } => {
                write!(f, "planar gaussian from '{}'", path.display())
            }
            Self::RawOrigin => write!(f, "raw origin"),
            Self::FixedLayer {
                path,
                depth,
                direction_cosine,
            } => write!(
                f,
                "fixed layer from '{}' (z = {} cm, uz = {})",
                path.display(),
                depth,
                direction_cosine
            ),
        }
    }
}
