use crate::base::{Config, ParamSoilLayer, ParamSolute, DUP_DISTANCE};
use crate::curve::{ConductivityCurve, RetentionCurve};
use crate::StrError;

/// Holds the (immutable) column discretization and per-layer characteristic curves
///
/// Each soil layer contributes one node at its center; a material boundary is
/// represented by a pair of zero-thickness layers whose nodes share a depth.
/// Such a pair is merged into a single unknown during the solves (the second
/// node's potential is a copy of the first).
///
/// The profile is created at model initialization and rebuilt only when the
/// number of layers changes (see [Profile::rebuild]).
pub struct Profile {
    /// Number of layers (and nodes)
    pub n_layers: usize,

    /// Node depth at the layer centers (cm, positive downward)
    pub x: Vec<f64>,

    /// Layer thickness (cm)
    pub dx: Vec<f64>,

    /// Dry bulk density per layer (g/cm³)
    pub bulk_density: Vec<f64>,

    /// Water-retention curve per layer
    pub retention: Vec<RetentionCurve>,

    /// Conductivity curve per layer
    pub conductivity: Vec<ConductivityCurve>,

    /// Solute parameters (validated against the layer count)
    pub solutes: Vec<ParamSolute>,

    /// Equation index per node; zero-distance pairs share an index
    pub eqn_of_node: Vec<usize>,

    /// Number of equations after merging duplicate nodes
    pub n_eqn: usize,

    /// Node nearest to the drain depth (when drainage is enabled)
    pub drain_node: Option<usize>,

    /// Total column depth (cm)
    pub depth: f64,
}

impl Profile {
    /// Allocates a new instance
    pub fn new(layers: &[ParamSoilLayer], solutes: &[ParamSolute], config: &Config) -> Result<Self, StrError> {
        if let Some(_) = config.validate() {
            return Err("cannot allocate profile because config.validate() failed");
        }
        let mut profile = Profile {
            n_layers: 0,
            x: Vec::new(),
            dx: Vec::new(),
            bulk_density: Vec::new(),
            retention: Vec::new(),
            conductivity: Vec::new(),
            solutes: Vec::new(),
            eqn_of_node: Vec::new(),
            n_eqn: 0,
            drain_node: None,
            depth: 0.0,
        };
        profile.rebuild(layers, solutes, config)?;
        Ok(profile)
    }

    /// Rebuilds the discretization and curves for a new set of layers
    ///
    /// The profile-sized arrays are resized in place; this is the only path
    /// that changes the layer count after initialization.
    pub fn rebuild(
        &mut self,
        layers: &[ParamSoilLayer],
        solutes: &[ParamSolute],
        config: &Config,
    ) -> Result<(), StrError> {
        let n = layers.len();
        if n < 1 {
            return Err("at least one soil layer is required");
        }

        // geometry
        self.n_layers = n;
        self.x.resize(n, 0.0);
        self.dx.resize(n, 0.0);
        self.bulk_density.resize(n, 0.0);
        let mut depth = 0.0;
        for (i, layer) in layers.iter().enumerate() {
            if layer.dx < 0.0 {
                return Err("layer thickness must be non-negative");
            }
            if layer.bulk_density <= 0.0 {
                return Err("layer bulk density must be positive");
            }
            self.dx[i] = layer.dx;
            self.x[i] = if i == 0 {
                layer.dx / 2.0
            } else {
                self.x[i - 1] + (layers[i - 1].dx + layer.dx) / 2.0
            };
            self.bulk_density[i] = layer.bulk_density;
            depth += layer.dx;
        }
        if depth <= 0.0 {
            return Err("the column depth must be positive");
        }
        self.depth = depth;

        // characteristic curves
        self.retention.clear();
        self.conductivity.clear();
        for layer in layers {
            self.retention.push(RetentionCurve::new(layer, config.psi_dul)?);
            self.conductivity
                .push(ConductivityCurve::new(layer, config.psi_dul, config.kdul)?);
        }

        // merged-unknown mapping for zero-distance node pairs
        self.eqn_of_node.resize(n, 0);
        let mut eqn = 0;
        self.eqn_of_node[0] = 0;
        for i in 1..n {
            if self.x[i] - self.x[i - 1] > DUP_DISTANCE {
                eqn += 1;
            }
            self.eqn_of_node[i] = eqn;
        }
        self.n_eqn = eqn + 1;

        // solutes
        for solute in solutes {
            if solute.exco.len() != n || solute.fip.len() != n || solute.initial_amount.len() != n {
                return Err("solute parameter arrays must have one entry per layer");
            }
            if solute.fip.iter().any(|&f| f < 0.0 || f > 1.0) {
                return Err("the Freundlich exponent must lie within [0, 1]");
            }
            if solute.exco.iter().any(|&e| e < 0.0) {
                return Err("the exchange coefficient must be non-negative");
            }
            if solute.dispersivity < 0.0 || solute.diffusion < 0.0 {
                return Err("dispersivity and diffusion must be non-negative");
            }
        }
        self.solutes = solutes.to_vec();

        // initial-condition profiles must match the layer count
        if let Some(theta) = config.theta_initial.as_ref() {
            if theta.len() != n {
                return Err("theta_initial must have one entry per layer");
            }
        }
        if let Some(psi) = config.psi_initial.as_ref() {
            if psi.len() != n {
                return Err("psi_initial must have one entry per layer");
            }
        }

        // drainage geometry
        self.drain_node = match config.drainage.as_ref() {
            Some(drainage) => {
                if drainage.drain_depth > depth {
                    return Err("the drain depth must lie within the column");
                }
                let mut best = 0;
                for i in 1..n {
                    if f64::abs(self.x[i] - drainage.drain_depth) < f64::abs(self.x[best] - drainage.drain_depth) {
                        best = i;
                    }
                }
                Some(best)
            }
            None => None,
        };
        Ok(())
    }

    /// Returns the distance between the centers of two adjacent nodes
    pub fn dist(&self, i: usize) -> f64 {
        self.x[i + 1] - self.x[i]
    }

    /// Returns the effective exchange coefficient of a solute at a node
    /// (Freundlich coefficient scaled by the bulk density)
    pub fn exco_eff(&self, solute: usize, node: usize) -> f64 {
        self.solutes[solute].exco[node] * self.bulk_density[node]
    }

    /// Indicates that nodes i and i+1 form a merged (zero-distance) pair
    pub fn is_merged_interface(&self, i: usize) -> bool {
        self.eqn_of_node[i] == self.eqn_of_node[i + 1]
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::Profile;
    use crate::base::{Config, Samples};
    use russell_lab::approx_eq;

    #[test]
    fn new_captures_errors() {
        let config = Config::new();
        assert_eq!(
            Profile::new(&[], &[], &config).err(),
            Some("at least one soil layer is required")
        );
        let mut layer = Samples::param_loam(15.0);
        layer.dx = -1.0;
        assert_eq!(
            Profile::new(&[layer], &[], &config).err(),
            Some("layer thickness must be non-negative")
        );
        let mut solute = Samples::param_tracer(3);
        solute.fip[1] = 1.5;
        let layers = Samples::profile_uniform_loam(3, 10.0);
        assert_eq!(
            Profile::new(&layers, &[solute], &config).err(),
            Some("the Freundlich exponent must lie within [0, 1]")
        );
    }

    #[test]
    fn geometry_works() {
        let config = Config::new();
        let layers = Samples::profile_uniform_loam(4, 10.0);
        let profile = Profile::new(&layers, &[], &config).unwrap();
        assert_eq!(profile.n_layers, 4);
        approx_eq(profile.x[0], 5.0, 1e-14);
        approx_eq(profile.x[1], 15.0, 1e-14);
        approx_eq(profile.x[3], 35.0, 1e-14);
        approx_eq(profile.depth, 40.0, 1e-14);
        assert_eq!(profile.n_eqn, 4);
        assert_eq!(profile.eqn_of_node, &[0, 1, 2, 3]);
        assert!(!profile.is_merged_interface(0));
    }

    #[test]
    fn zero_thickness_pair_is_merged() {
        let config = Config::new();
        let layers = vec![
            Samples::param_loam(10.0),
            Samples::param_loam(0.0),
            Samples::param_clay(0.0),
            Samples::param_clay(10.0),
        ];
        let profile = Profile::new(&layers, &[], &config).unwrap();
        assert_eq!(profile.n_layers, 4);
        approx_eq(profile.x[1], 10.0, 1e-14);
        approx_eq(profile.x[2], 10.0, 1e-14);
        assert_eq!(profile.eqn_of_node, &[0, 1, 1, 2]);
        assert_eq!(profile.n_eqn, 3);
        assert!(profile.is_merged_interface(1));
    }

    #[test]
    fn drain_node_is_located() {
        let mut config = Config::new();
        config.set_drainage(Samples::param_drainage());
        let layers = Samples::profile_uniform_loam(8, 25.0); // 200 cm deep
        let profile = Profile::new(&layers, &[], &config).unwrap();
        // drain at 100 cm; node centers at 12.5, 37.5, ..., 187.5
        assert_eq!(profile.drain_node, Some(3)); // 87.5 cm is nearest
    }
}
