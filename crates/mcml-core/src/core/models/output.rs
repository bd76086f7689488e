use super::params::{GridSpec, InputParameters};
use std::f64::consts::PI;
use std::ops::AddAssign;

/// Dense row-major 2D tally.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid2 {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Grid2 {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.cols + col]
    }

    #[inline]
    pub fn add(&mut self, row: usize, col: usize, value: f64) {
        self.data[row * self.cols + col] += value;
    }

    #[inline]
    pub fn scale(&mut self, row: usize, col: usize, factor: f64) {
        self.data[row * self.cols + col] *= factor;
    }

    pub fn row(&self, row: usize) -> &[f64] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    pub fn row_sums(&self) -> Vec<f64> {
        (0..self.rows).map(|r| self.row(r).iter().sum()).collect()
    }

    pub fn col_sums(&self) -> Vec<f64> {
        let mut sums = vec![0.0; self.cols];
        for r in 0..self.rows {
            for (sum, value) in sums.iter_mut().zip(self.row(r)) {
                *sum += value;
            }
        }
        sums
    }

    pub fn total(&self) -> f64 {
        self.data.iter().sum()
    }
}

impl AddAssign<&Grid2> for Grid2 {
    fn add_assign(&mut self, rhs: &Grid2) {
        debug_assert_eq!((self.rows, self.cols), (rhs.rows, rhs.cols));
        for (a, b) in self.data.iter_mut().zip(&rhs.data) {
            *a += b;
        }
    }
}

/// Quantities derived from the raw tallies by summing and normalizing.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScaledResults {
    /// Absorption per unit depth, 1/cm.
    pub a_z: Vec<f64>,
    /// Absorbed fraction per layer, indexed by 1-based layer (entry 0 unused).
    pub a_l: Vec<f64>,
    pub absorbed: f64,
    /// Diffuse reflectance per unit area, 1/cm².
    pub rd_r: Vec<f64>,
    /// Diffuse reflectance per solid angle, 1/sr.
    pub rd_a: Vec<f64>,
    pub diffuse_reflectance: f64,
    pub tt_r: Vec<f64>,
    pub tt_a: Vec<f64>,
    pub transmittance: f64,
}

/// Run-scoped result tallies.
///
/// The raw grids are filled by the transport kernel; `sum_and_scale` turns
/// them into physical quantities once the photon loop has finished.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputAccumulator {
    /// Specular reflectance at the top surface.
    pub rsp: f64,
    /// Absorbed weight, radial bins × depth bins.
    pub a_rz: Grid2,
    /// Diffusely reflected weight, radial bins × exit-angle bins.
    pub rd_ra: Grid2,
    /// Transmitted weight, radial bins × exit-angle bins.
    pub tt_ra: Grid2,
    scaled: Option<ScaledResults>,
}

impl OutputAccumulator {
    pub fn new(grid: &GridSpec) -> Self {
        Self {
            rsp: 0.0,
            a_rz: Grid2::zeros(grid.nr, grid.nz),
            rd_ra: Grid2::zeros(grid.nr, grid.na),
            tt_ra: Grid2::zeros(grid.nr, grid.na),
            scaled: None,
        }
    }

    #[inline]
    pub fn is_scaled(&self) -> bool {
        self.scaled.is_some()
    }

    pub fn scaled(&self) -> Option<&ScaledResults> {
        self.scaled.as_ref()
    }

    /// Total weight currently held in the raw tallies, specular part included.
    pub fn raw_weight_total(&self) -> f64 {
        self.a_rz.total() + self.rd_ra.total() + self.tt_ra.total()
    }

    /// Sums the raw grids into 1D profiles and totals, then normalizes every
    /// grid in place by bin area or solid angle and by the photon count.
    /// Calling it twice is a no-op.
    pub fn sum_and_scale(&mut self, params: &InputParameters) {
        if self.scaled.is_some() {
            return;
        }
        let grid = &params.grid;
        let n = params.num_photons as f64;
        let (dr, dz, da) = (grid.dr, grid.dz, grid.da());

        let mut a_z = self.a_rz.col_sums();
        let mut a_l = vec![0.0; params.layers.len() + 2];
        for (iz, value) in a_z.iter().enumerate() {
            a_l[params.layers.layer_of_depth_bin(iz, dz)] += value;
        }
        let mut absorbed: f64 = a_z.iter().sum();

        let mut rd_r = self.rd_ra.row_sums();
        let mut rd_a = self.rd_ra.col_sums();
        let mut diffuse_reflectance: f64 = rd_r.iter().sum();
        let mut tt_r = self.tt_ra.row_sums();
        let mut tt_a = self.tt_ra.col_sums();
        let mut transmittance: f64 = tt_r.iter().sum();

        let area_scale = 2.0 * PI * dr * dr * dz * n;
        for ir in 0..grid.nr {
            for iz in 0..grid.nz {
                self.a_rz
                    .scale(ir, iz, 1.0 / ((ir as f64 + 0.5) * area_scale));
            }
        }
        a_z.iter_mut().for_each(|v| *v /= dz * n);
        a_l.iter_mut().for_each(|v| *v /= n);
        absorbed /= n;

        let solid_scale = 4.0 * PI * PI * dr * (da / 2.0).sin() * dr * n;
        for ir in 0..grid.nr {
            for ia in 0..grid.na {
                let factor = 1.0
                    / ((ir as f64 + 0.5) * (2.0 * (ia as f64 + 0.5) * da).sin() * solid_scale);
                self.rd_ra.scale(ir, ia, factor);
                self.tt_ra.scale(ir, ia, factor);
            }
        }

        let ring_scale = 2.0 * PI * dr * dr * n;
        for ir in 0..grid.nr {
            let factor = 1.0 / ((ir as f64 + 0.5) * ring_scale);
            rd_r[ir] *= factor;
            tt_r[ir] *= factor;
        }

        let cone_scale = 2.0 * PI * da * n;
        for ia in 0..grid.na {
            let factor = 1.0 / (((ia as f64 + 0.5) * da).sin() * cone_scale);
            rd_a[ia] *= factor;
            tt_a[ia] *= factor;
        }

        diffuse_reflectance /= n;
        transmittance /= n;

        self.scaled = Some(ScaledResults {
            a_z,
            a_l,
            absorbed,
            rd_r,
            rd_a,
            diffuse_reflectance,
            tt_r,
            tt_a,
            transmittance,
        });
    }
}

impl AddAssign<&OutputAccumulator> for OutputAccumulator {
    /// Merges raw tallies. Only meaningful before scaling.
    fn add_assign(&mut self, rhs: &OutputAccumulator) {
        self.a_rz += &rhs.a_rz;
        self.rd_ra += &rhs.rd_ra;
        self.tt_ra += &rhs.tt_ra;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::layer::{LayerProperties, LayerStack};
    use crate::core::models::params::{DEFAULT_ROULETTE_CHANCE, DEFAULT_WEIGHT_THRESHOLD};
    use std::path::PathBuf;

    fn params(num_photons: u64) -> InputParameters {
        let layer = LayerProperties {
            n: 1.0,
            mua: 1.0,
            mus: 1.0,
            g: 0.0,
            thickness: 0.2,
            raman_yield: 0.0,
        };
        InputParameters {
            output_path: PathBuf::from("out.mco"),
            num_photons,
            weight_threshold: DEFAULT_WEIGHT_THRESHOLD,
            roulette_chance: DEFAULT_ROULETTE_CHANCE,
            grid: GridSpec {
                dz: 0.1,
                dr: 0.1,
                nz: 4,
                nr: 3,
                na: 2,
            },
            layers: LayerStack::from_properties(1.0, 1.0, &[layer, layer]),
        }
    }

    #[test]
    fn grid_sums_follow_rows_and_columns() {
        let mut g = Grid2::zeros(2, 3);
        g.add(0, 0, 1.0);
        g.add(0, 2, 2.0);
        g.add(1, 1, 4.0);
        assert_eq!(g.row_sums(), vec![3.0, 4.0]);
        assert_eq!(g.col_sums(), vec![1.0, 4.0, 2.0]);
        assert_eq!(g.total(), 7.0);
    }

    #[test]
    fn totals_are_normalized_by_photon_count() {
        let p = params(10);
        let mut out = OutputAccumulator::new(&p.grid);
        out.a_rz.add(0, 0, 2.0);
        out.a_rz.add(1, 3, 3.0);
        out.rd_ra.add(2, 1, 1.0);
        out.tt_ra.add(0, 0, 4.0);

        out.sum_and_scale(&p);
        let scaled = out.scaled().unwrap();
        assert!((scaled.absorbed - 0.5).abs() < 1e-12);
        assert!((scaled.diffuse_reflectance - 0.1).abs() < 1e-12);
        assert!((scaled.transmittance - 0.4).abs() < 1e-12);
    }

    #[test]
    fn absorption_is_attributed_to_layers_by_depth() {
        let p = params(1);
        let mut out = OutputAccumulator::new(&p.grid);
        out.a_rz.add(0, 0, 1.0);
        out.a_rz.add(0, 1, 1.0);
        out.a_rz.add(0, 2, 3.0);
        out.sum_and_scale(&p);
        let scaled = out.scaled().unwrap();
        assert_eq!(scaled.a_l.len(), 4);
        assert!((scaled.a_l[1] - 2.0).abs() < 1e-12);
        assert!((scaled.a_l[2] - 3.0).abs() < 1e-12);
        assert!((scaled.a_z[2] - 30.0).abs() < 1e-9);
    }

    #[test]
    fn radial_absorption_is_divided_by_ring_volume() {
        let p = params(1);
        let mut out = OutputAccumulator::new(&p.grid);
        out.a_rz.add(1, 0, 1.0);
        out.sum_and_scale(&p);
        let expected = 1.0 / (1.5 * 2.0 * PI * 0.1 * 0.1 * 0.1);
        assert!((out.a_rz.get(1, 0) - expected).abs() < 1e-9);
    }

    #[test]
    fn scaling_twice_is_a_no_op() {
        let p = params(2);
        let mut out = OutputAccumulator::new(&p.grid);
        out.a_rz.add(0, 0, 1.0);
        out.sum_and_scale(&p);
        let once = out.clone();
        out.sum_and_scale(&p);
        assert_eq!(out, once);
    }

    #[test]
    fn merging_accumulators_adds_raw_tallies() {
        let p = params(1);
        let mut a = OutputAccumulator::new(&p.grid);
        let mut b = OutputAccumulator::new(&p.grid);
        a.a_rz.add(0, 0, 1.0);
        b.a_rz.add(0, 0, 2.0);
        b.rd_ra.add(1, 1, 0.5);
        a += &b;
        assert_eq!(a.a_rz.get(0, 0), 3.0);
        assert_eq!(a.rd_ra.get(1, 1), 0.5);
        assert!((a.raw_weight_total() - 3.5).abs() < 1e-12);
    }
}
