use crate::core::models::layer::LayerStack;

/// Cosine above which an angle is treated as exactly 0 degrees.
pub const COS_ZERO: f64 = 1.0 - 1.0e-12;
/// Cosine below which an angle is treated as exactly 90 degrees.
pub const COS_90D: f64 = 1.0e-6;

/// Result of a Fresnel evaluation at a planar interface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fresnel {
    /// Reflectance for unpolarized light.
    pub reflectance: f64,
    /// Cosine of the transmission angle, 0 under total internal reflection.
    pub cos_transmitted: f64,
}

/// Fresnel reflectance for light travelling from index `n1` into index `n2`
/// with incidence-angle cosine `cos_incident` (non-negative).
pub fn fresnel(n1: f64, n2: f64, cos_incident: f64) -> Fresnel {
    if n1 == n2 {
        return Fresnel {
            reflectance: 0.0,
            cos_transmitted: cos_incident,
        };
    }
    if cos_incident > COS_ZERO {
        let r = (n2 - n1) / (n2 + n1);
        return Fresnel {
            reflectance: r * r,
            cos_transmitted: cos_incident,
        };
    }
    if cos_incident < COS_90D {
        return Fresnel {
            reflectance: 1.0,
            cos_transmitted: 0.0,
        };
    }

    let sin_incident = (1.0 - cos_incident * cos_incident).sqrt();
    let sin_transmitted = n1 * sin_incident / n2;
    if sin_transmitted >= 1.0 {
        return Fresnel {
            reflectance: 1.0,
            cos_transmitted: 0.0,
        };
    }
    let cos_transmitted = (1.0 - sin_transmitted * sin_transmitted).sqrt();

    let cap = cos_incident * cos_transmitted - sin_incident * sin_transmitted;
    let cam = cos_incident * cos_transmitted + sin_incident * sin_transmitted;
    let sap = sin_incident * cos_transmitted + cos_incident * sin_transmitted;
    let sam = sin_incident * cos_transmitted - cos_incident * sin_transmitted;
    let reflectance = 0.5 * sam * sam * (cam * cam + cap * cap) / (sap * sap * cam * cam);

    Fresnel {
        reflectance,
        cos_transmitted,
    }
}

/// Specular reflectance of a normally incident beam at the top of the stack.
///
/// When the first layer is clear, the multiple reflections between its two
/// interfaces are folded in.
pub fn specular_reflectance(layers: &LayerStack) -> f64 {
    let Some(first) = layers.layer(1) else {
        return 0.0;
    };
    let n0 = layers.n_above();
    let n1 = first.n;
    let r1 = ((n0 - n1) / (n0 + n1)).powi(2);

    if first.is_clear() {
        let n2 = layers.refractive_index(2);
        let r2 = ((n1 - n2) / (n1 + n2)).powi(2);
        r1 + (1.0 - r1) * (1.0 - r1) * r2 / (1.0 - r1 * r2)
    } else {
        r1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::layer::LayerProperties;

    fn layer(n: f64, mua: f64, mus: f64) -> LayerProperties {
        LayerProperties {
            n,
            mua,
            mus,
            g: 0.0,
            thickness: 0.1,
            raman_yield: 0.0,
        }
    }

    #[test]
    fn matched_indices_reflect_nothing() {
        let f = fresnel(1.4, 1.4, 0.3);
        assert_eq!(f.reflectance, 0.0);
        assert_eq!(f.cos_transmitted, 0.3);
    }

    #[test]
    fn normal_incidence_uses_closed_form() {
        let f = fresnel(1.0, 1.5, 1.0);
        assert!((f.reflectance - 0.04).abs() < 1e-12);
        assert_eq!(f.cos_transmitted, 1.0);
    }

    #[test]
    fn beyond_critical_angle_is_total_reflection() {
        let f = fresnel(1.5, 1.0, 0.5);
        assert_eq!(f.reflectance, 1.0);
        assert_eq!(f.cos_transmitted, 0.0);
    }

    #[test]
    fn oblique_incidence_matches_average_of_polarizations() {
        let (n1, n2, ci) = (1.0_f64, 1.5_f64, 0.6_f64);
        let f = fresnel(n1, n2, ci);
        let ct = f.cos_transmitted;
        let rs = ((n1 * ci - n2 * ct) / (n1 * ci + n2 * ct)).powi(2);
        let rp = ((n1 * ct - n2 * ci) / (n1 * ct + n2 * ci)).powi(2);
        assert!((f.reflectance - 0.5 * (rs + rp)).abs() < 1e-12);
        let st = (1.0 - ct * ct).sqrt();
        assert!((n1 * (1.0 - ci * ci).sqrt() - n2 * st).abs() < 1e-12);
    }

    #[test]
    fn specular_reflectance_of_turbid_top_layer() {
        let stack = LayerStack::from_properties(1.0, 1.0, &[layer(1.5, 1.0, 10.0)]);
        assert!((specular_reflectance(&stack) - 0.04).abs() < 1e-12);
    }

    #[test]
    fn specular_reflectance_folds_in_clear_top_layer() {
        let stack = LayerStack::from_properties(
            1.0,
            1.0,
            &[layer(1.5, 0.0, 0.0), layer(1.33, 1.0, 10.0)],
        );
        let r1: f64 = 0.04;
        let r2 = ((1.5f64 - 1.33) / (1.5 + 1.33)).powi(2);
        let expected = r1 + (1.0 - r1).powi(2) * r2 / (1.0 - r1 * r2);
        assert!((specular_reflectance(&stack) - expected).abs() < 1e-12);
    }
}
