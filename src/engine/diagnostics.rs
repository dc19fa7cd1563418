use super::{ColumnState, Profile};
use crate::StrError;
use serde::{Deserialize, Serialize};

/// Holds a per-node snapshot written when a simulation fails fatally
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeDump {
    /// Simulation time (h)
    pub t: f64,

    /// Last attempted timestep (h)
    pub dt: f64,

    /// Surface store (cm)
    pub pond: f64,

    /// Node depths (cm)
    pub x: Vec<f64>,

    /// Matric potential per node (cm)
    pub psi: Vec<f64>,

    /// Water content per node
    pub theta: Vec<f64>,

    /// Conductivity per node (cm/h)
    pub hk: Vec<f64>,
}

impl NodeDump {
    /// Captures a snapshot of the column
    pub fn new(profile: &Profile, state: &ColumnState) -> Self {
        let hk = (0..profile.n_layers)
            .map(|i| profile.conductivity[i].k_theta(state.theta[i]))
            .collect();
        NodeDump {
            t: state.t,
            dt: state.dt,
            pond: state.pond,
            x: profile.x.clone(),
            psi: state.psi.clone(),
            theta: state.theta.clone(),
            hk,
        }
    }

    /// Serializes the snapshot to a JSON string
    pub fn to_json(&self) -> Result<String, StrError> {
        serde_json::to_string_pretty(&self).map_err(|_| "cannot serialize the node dump")
    }
}

/// Collects non-fatal warnings and reports fatal-failure snapshots
pub struct Diagnostics {
    /// Recorded warning messages
    pub warnings: Vec<String>,

    /// Prints warnings as they are recorded
    pub verbose: bool,
}

impl Diagnostics {
    /// Allocates a new instance
    pub fn new(verbose: bool) -> Self {
        Diagnostics {
            warnings: Vec::new(),
            verbose,
        }
    }

    /// Records a non-fatal warning
    pub fn warn(&mut self, message: String) {
        if self.verbose {
            println!("WARNING: {}", message);
        }
        self.warnings.push(message);
    }

    /// Returns the collected warnings, leaving the collector empty
    pub fn take_warnings(&mut self) -> Vec<String> {
        std::mem::take(&mut self.warnings)
    }

    /// Prints the per-node state supporting the diagnosis of a fatal failure
    pub fn report_failure(&self, profile: &Profile, state: &ColumnState) {
        let dump = NodeDump::new(profile, state);
        println!("FAILURE at t = {:.6e} h (Δt = {:.6e} h, pond = {:.4} cm)", dump.t, dump.dt, dump.pond);
        println!("{:>5} {:>10} {:>13} {:>10} {:>13}", "node", "x", "psi", "theta", "hk");
        for i in 0..profile.n_layers {
            println!(
                "{:>5} {:>10.3} {:>13.5e} {:>10.5} {:>13.5e}",
                i, dump.x[i], dump.psi[i], dump.theta[i], dump.hk[i]
            );
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::{Diagnostics, NodeDump};
    use crate::base::{Config, Samples};
    use crate::engine::{ColumnState, Profile};

    #[test]
    fn warnings_are_collected() {
        let mut diag = Diagnostics::new(false);
        diag.warn("clamped a slightly negative concentration".to_string());
        assert_eq!(diag.warnings.len(), 1);
        let taken = diag.take_warnings();
        assert_eq!(taken.len(), 1);
        assert!(diag.warnings.is_empty());
    }

    #[test]
    fn node_dump_round_trips_through_json() {
        let config = Config::new();
        let layers = Samples::profile_uniform_loam(2, 10.0);
        let profile = Profile::new(&layers, &[], &config).unwrap();
        let state = ColumnState::new(&profile, &config).unwrap();
        let dump = NodeDump::new(&profile, &state);
        let json = dump.to_json().unwrap();
        let back: NodeDump = serde_json::from_str(&json).unwrap();
        assert_eq!(back.psi, dump.psi);
        assert_eq!(back.theta, dump.theta);
    }
}
