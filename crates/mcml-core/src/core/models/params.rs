use super::layer::LayerStack;
use std::f64::consts::FRAC_PI_2;
use std::path::PathBuf;

pub const DEFAULT_WEIGHT_THRESHOLD: f64 = 1e-4;
pub const DEFAULT_ROULETTE_CHANCE: f64 = 0.1;

/// Resolution of the detection grids.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridSpec {
    /// Depth bin size in cm.
    pub dz: f64,
    /// Radial bin size in cm.
    pub dr: f64,
    pub nz: usize,
    pub nr: usize,
    /// Number of exit-angle bins spanning `[0, π/2]`.
    pub na: usize,
}

impl GridSpec {
    /// Angular bin size in radians.
    #[inline]
    pub fn da(&self) -> f64 {
        FRAC_PI_2 / self.na as f64
    }

    /// Radial bin of a transverse position, clamped into the last bin.
    #[inline]
    pub fn radial_bin(&self, x: f64, y: f64) -> usize {
        let ir = ((x * x + y * y).sqrt() / self.dr) as usize;
        ir.min(self.nr - 1)
    }

    /// Depth bin of a depth, clamped into the last bin.
    #[inline]
    pub fn depth_bin(&self, z: f64) -> usize {
        let iz = (z.max(0.0) / self.dz) as usize;
        iz.min(self.nz - 1)
    }

    /// Exit-angle bin of the angle whose cosine against the surface normal is
    /// `cos_angle`, clamped into the last bin.
    #[inline]
    pub fn angle_bin(&self, cos_angle: f64) -> usize {
        let ia = (cos_angle.clamp(-1.0, 1.0).acos() / self.da()) as usize;
        ia.min(self.na - 1)
    }
}

/// Immutable configuration of one simulation run.
#[derive(Debug, Clone, PartialEq)]
pub struct InputParameters {
    /// Path of the summary file written at the end of the run.
    pub output_path: PathBuf,
    pub num_photons: u64,
    pub weight_threshold: f64,
    pub roulette_chance: f64,
    pub grid: GridSpec,
    pub layers: LayerStack,
}

impl InputParameters {
    /// Path of the full-grid matrix file, placed next to the summary file.
    pub fn matrix_path(&self) -> PathBuf {
        let stem = self
            .output_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "mcml".to_string());
        self.output_path
            .with_file_name(format!("{}-matrix.csv", stem))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> GridSpec {
        GridSpec {
            dz: 0.1,
            dr: 0.1,
            nz: 10,
            nr: 5,
            na: 9,
        }
    }

    #[test]
    fn radial_bin_clamps_to_last_bin() {
        let g = grid();
        assert_eq!(g.radial_bin(0.05, 0.0), 0);
        assert_eq!(g.radial_bin(0.0, 0.25), 2);
        assert_eq!(g.radial_bin(10.0, 10.0), 4);
    }

    #[test]
    fn depth_bin_clamps_both_ends() {
        let g = grid();
        assert_eq!(g.depth_bin(-0.5), 0);
        assert_eq!(g.depth_bin(0.35), 3);
        assert_eq!(g.depth_bin(50.0), 9);
    }

    #[test]
    fn angle_bin_maps_normal_exit_to_first_bin() {
        let g = grid();
        assert_eq!(g.angle_bin(1.0), 0);
        assert_eq!(g.angle_bin(0.0), 8);
        assert!((g.da() - FRAC_PI_2 / 9.0).abs() < 1e-15);
    }

    #[test]
    fn matrix_path_sits_next_to_output() {
        let params = InputParameters {
            output_path: PathBuf::from("results/slab.mco"),
            num_photons: 1,
            weight_threshold: DEFAULT_WEIGHT_THRESHOLD,
            roulette_chance: DEFAULT_ROULETTE_CHANCE,
            grid: grid(),
            layers: LayerStack::from_properties(1.0, 1.0, &[]),
        };
        assert_eq!(params.matrix_path(), PathBuf::from("results/slab-matrix.csv"));
    }
}
