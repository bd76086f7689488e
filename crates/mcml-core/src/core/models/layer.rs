/// Optical and geometric description of one tissue layer.
///
/// Depths are in centimetres, measured downward from the top surface of the
/// stack. Absorption and scattering coefficients are in 1/cm.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerSpec {
    /// Depth of the upper boundary.
    pub z0: f64,
    /// Depth of the lower boundary. Always strictly greater than `z0`.
    pub z1: f64,
    /// Refractive index.
    pub n: f64,
    /// Absorption coefficient.
    pub mua: f64,
    /// Scattering coefficient.
    pub mus: f64,
    /// Scattering anisotropy (mean cosine of the scattering angle).
    pub g: f64,
    /// Probability that a scattering event in this layer is tallied as a
    /// secondary (Raman) event.
    pub raman_yield: f64,
    /// Cosine of the critical angle at the upper boundary, 0 if none.
    pub cos_crit0: f64,
    /// Cosine of the critical angle at the lower boundary, 0 if none.
    pub cos_crit1: f64,
}

impl LayerSpec {
    /// A layer with zero absorption and zero scattering. Photons cross it in a
    /// single straight hop.
    #[inline]
    pub fn is_clear(&self) -> bool {
        self.mua == 0.0 && self.mus == 0.0
    }

    #[inline]
    pub fn interaction_coefficient(&self) -> f64 {
        self.mua + self.mus
    }

    #[inline]
    pub fn contains_depth(&self, depth: f64) -> bool {
        self.z0 <= depth && depth < self.z1
    }
}

/// Bulk optical properties of a layer as supplied by a parameter source,
/// before depth bounds and critical angles are derived.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerProperties {
    pub n: f64,
    pub mua: f64,
    pub mus: f64,
    pub g: f64,
    pub thickness: f64,
    pub raman_yield: f64,
}

/// The ordered stack of tissue layers between two ambient media.
///
/// Layer indices follow the convention used throughout the transport code:
/// tissue layers are numbered `1..=len()`, index `0` is the ambient medium
/// above the stack and `len() + 1` the ambient medium below it.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerStack {
    n_above: f64,
    n_below: f64,
    layers: Vec<LayerSpec>,
}

impl LayerStack {
    /// Builds the stack from top to bottom, accumulating depth bounds from the
    /// layer thicknesses and deriving the critical-angle cosines of every
    /// interface.
    pub fn from_properties(n_above: f64, n_below: f64, properties: &[LayerProperties]) -> Self {
        let mut layers = Vec::with_capacity(properties.len());
        let mut z = 0.0;
        for p in properties {
            layers.push(LayerSpec {
                z0: z,
                z1: z + p.thickness,
                n: p.n,
                mua: p.mua,
                mus: p.mus,
                g: p.g,
                raman_yield: p.raman_yield,
                cos_crit0: 0.0,
                cos_crit1: 0.0,
            });
            z += p.thickness;
        }

        let mut stack = Self {
            n_above,
            n_below,
            layers,
        };
        stack.derive_critical_angles();
        stack
    }

    fn derive_critical_angles(&mut self) {
        let count = self.layers.len();
        for i in 0..count {
            let n = self.layers[i].n;
            let n_up = if i == 0 {
                self.n_above
            } else {
                self.layers[i - 1].n
            };
            let n_down = if i + 1 == count {
                self.n_below
            } else {
                self.layers[i + 1].n
            };
            self.layers[i].cos_crit0 = critical_cosine(n, n_up);
            self.layers[i].cos_crit1 = critical_cosine(n, n_down);
        }
    }

    /// Number of tissue layers.
    #[inline]
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    #[inline]
    pub fn n_above(&self) -> f64 {
        self.n_above
    }

    #[inline]
    pub fn n_below(&self) -> f64 {
        self.n_below
    }

    /// Returns the tissue layer with 1-based index `index`.
    #[inline]
    pub fn layer(&self, index: usize) -> Option<&LayerSpec> {
        index.checked_sub(1).and_then(|i| self.layers.get(i))
    }

    /// Refractive index of the medium with the given index, ambient media
    /// included.
    pub fn refractive_index(&self, index: usize) -> f64 {
        if index == 0 {
            self.n_above
        } else if index > self.layers.len() {
            self.n_below
        } else {
            self.layers[index - 1].n
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &LayerSpec> {
        self.layers.iter()
    }

    /// Total depth of the stack.
    pub fn depth(&self) -> f64 {
        self.layers.last().map_or(0.0, |l| l.z1)
    }

    /// Finds the first tissue layer whose half-open interval `[z0, z1)`
    /// contains `depth`. A depth sitting exactly on an interface therefore
    /// belongs to the deeper layer.
    pub fn resolve_layer(&self, depth: f64) -> Option<usize> {
        self.layers
            .iter()
            .position(|layer| layer.contains_depth(depth))
            .map(|i| i + 1)
    }

    /// Maps a depth-bin index of a grid with step `dz` to the tissue layer its
    /// centre lies in, clamped to the deepest layer.
    pub fn layer_of_depth_bin(&self, iz: usize, dz: f64) -> usize {
        let centre = (iz as f64 + 0.5) * dz;
        let mut index = 1;
        while index < self.layers.len() && centre >= self.layers[index - 1].z1 {
            index += 1;
        }
        index
    }
}

fn critical_cosine(n_inside: f64, n_outside: f64) -> f64 {
    if n_inside > n_outside {
        (1.0 - n_outside * n_outside / (n_inside * n_inside)).sqrt()
    } else {
        0.0
    }
}
