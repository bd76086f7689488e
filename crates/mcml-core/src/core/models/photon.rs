use nalgebra::{Point3, Vector3};

/// Starting depth shared by every photon of a fixed-layer source batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LaunchDepth {
    pub z: f64,
    /// 1-based tissue layer containing `z`.
    pub layer: usize,
    /// Initial direction cosine along the depth axis.
    pub direction_cosine: f64,
}

/// Everything the kernel needs to launch one photon packet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhotonLaunch {
    pub x: f64,
    pub y: f64,
    pub depth: Option<LaunchDepth>,
}

/// Mutable state of one photon packet while it is being transported.
#[derive(Debug, Clone, PartialEq)]
pub struct PhotonState {
    pub position: Point3<f64>,
    /// Direction cosines, kept at unit length.
    pub direction: Vector3<f64>,
    pub weight: f64,
    /// Current medium, using the 1-based layer convention of `LayerStack`.
    pub layer: usize,
    /// Length of the current step in cm.
    pub step: f64,
    /// Dimensionless step remainder carried across a boundary.
    pub step_left: f64,
    dead: bool,
}

impl PhotonState {
    pub fn new(position: Point3<f64>, direction: Vector3<f64>, weight: f64, layer: usize) -> Self {
        Self {
            position,
            direction,
            weight,
            layer,
            step: 0.0,
            step_left: 0.0,
            dead: false,
        }
    }

    #[inline]
    pub fn is_dead(&self) -> bool {
        self.dead
    }

    /// Terminates the packet. There is no way back.
    #[inline]
    pub fn kill(&mut self) {
        self.dead = true;
    }

    /// Moves the packet `self.step` along its direction.
    #[inline]
    pub fn hop(&mut self) {
        self.position += self.direction * self.step;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_photon_is_alive_with_no_pending_step() {
        let p = PhotonState::new(Point3::origin(), Vector3::z(), 1.0, 1);
        assert!(!p.is_dead());
        assert_eq!(p.step, 0.0);
        assert_eq!(p.step_left, 0.0);
    }

    #[test]
    fn kill_is_permanent() {
        let mut p = PhotonState::new(Point3::origin(), Vector3::z(), 1.0, 1);
        p.kill();
        p.kill();
        assert!(p.is_dead());
    }

    #[test]
    fn hop_moves_along_direction() {
        let mut p = PhotonState::new(Point3::new(1.0, 0.0, 0.0), Vector3::new(0.0, 0.6, 0.8), 1.0, 1);
        p.step = 0.5;
        p.hop();
        assert!((p.position - Point3::new(1.0, 0.3, 0.4)).norm() < 1e-12);
    }
}
