use super::{ParamDrainage, ParamSoilLayer, ParamSolute};

/// Holds sample parameter sets for tests and demos
pub struct Samples {}

impl Samples {
    /// Returns a loam-like layer
    pub fn param_loam(dx: f64) -> ParamSoilLayer {
        ParamSoilLayer {
            dx,
            bulk_density: 1.3,
            ll15: 0.10,
            dul: 0.30,
            sat: 0.45,
            ks: 100.0,
        }
    }

    /// Returns a clay-like layer (slower, wetter)
    pub fn param_clay(dx: f64) -> ParamSoilLayer {
        ParamSoilLayer {
            dx,
            bulk_density: 1.2,
            ll15: 0.22,
            dul: 0.40,
            sat: 0.48,
            ks: 10.0,
        }
    }

    /// Returns a uniform loam profile with n layers of the given thickness
    pub fn profile_uniform_loam(n: usize, dx: f64) -> Vec<ParamSoilLayer> {
        (0..n).map(|_| Samples::param_loam(dx)).collect()
    }

    /// Returns a non-adsorbed (tracer) solute for a profile with n layers
    pub fn param_tracer(n: usize) -> ParamSolute {
        ParamSolute {
            name: "tracer".to_string(),
            exco: vec![0.0; n],
            fip: vec![1.0; n],
            dispersivity: 1.0,
            diffusion: 0.036,
            cslgw: 0.0,
            initial_amount: vec![0.0; n],
        }
    }

    /// Returns an adsorbed solute with a nonlinear isotherm
    pub fn param_adsorbed_solute(n: usize) -> ParamSolute {
        ParamSolute {
            name: "adsorbed".to_string(),
            exco: vec![2.0; n],
            fip: vec![0.5; n],
            dispersivity: 1.0,
            diffusion: 0.036,
            cslgw: 0.0,
            initial_amount: vec![10.0; n],
        }
    }

    /// Returns drainage parameters for a tiled paddock
    pub fn param_drainage() -> ParamDrainage {
        ParamDrainage {
            drain_depth: 100.0,
            drain_spacing: 2000.0,
            drain_radius: 5.0,
            imperm_depth: 300.0,
            klat: 100.0,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::Samples;

    #[test]
    fn samples_are_consistent() {
        let loam = Samples::param_loam(15.0);
        assert!(loam.ll15 < loam.dul && loam.dul < loam.sat);

        let clay = Samples::param_clay(15.0);
        assert!(clay.ll15 < clay.dul && clay.dul < clay.sat);
        assert!(clay.ks < loam.ks);

        let profile = Samples::profile_uniform_loam(4, 25.0);
        assert_eq!(profile.len(), 4);
        assert_eq!(profile[3].dx, 25.0);

        let tracer = Samples::param_tracer(4);
        assert_eq!(tracer.exco, &[0.0, 0.0, 0.0, 0.0]);
        assert_eq!(tracer.fip.len(), 4);

        let drainage = Samples::param_drainage();
        assert!(drainage.imperm_depth >= drainage.drain_depth);
    }
}
