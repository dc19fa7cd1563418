use super::{solve_freundlich, trans_inv, DailyTotals, Profile};
use crate::base::{Config, EventLog, KG_PER_HA_TO_MG_PER_CM2};
use crate::StrError;
use serde::{Deserialize, Serialize};

/// Holds the mutable state of one soil column
///
/// All per-timestep state (`p`, `theta`, pond, solute concentrations, event
/// logs) lives here and is mutated in place by the solver. A failed timestep
/// attempt restores the whole state from a [ColumnBackup] before retrying.
/// One instance per column; nothing is shared between columns.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ColumnState {
    /// Current simulation time (h)
    pub t: f64,

    /// Last accepted (or attempted) timestep (h)
    pub dt: f64,

    /// Indicates that the very first timestep has been accepted; the Newton
    /// iteration cap is more lenient before then to allow stabilization
    pub first_step_done: bool,

    /// Largest flux magnitude of the previous accepted step (cm/h)
    pub qmax_prev: f64,

    /// Transformed potential per node
    pub p: Vec<f64>,

    /// Matric potential per node (cm)
    pub psi: Vec<f64>,

    /// Volumetric water content per node
    pub theta: Vec<f64>,

    /// Surface (pond) store (cm)
    pub pond: f64,

    /// Solute concentration in solution per solute per node (mg/cm³)
    pub csl: Vec<Vec<f64>>,

    /// Solute mass held in the surface store per solute (mg/cm²)
    pub pond_solute: Vec<f64>,

    /// Cumulative rainfall history (cm)
    pub rain: EventLog,

    /// Cumulative potential-evaporation history (cm)
    pub evap: EventLog,

    /// Cumulative solute-application history per solute (mg/cm²)
    pub solute_events: Vec<EventLog>,

    /// Daily cumulative totals
    pub totals: DailyTotals,
}

/// Holds a wholesale copy of the mutable arrays for rollback on failure
#[derive(Clone, Debug)]
pub struct ColumnBackup {
    p: Vec<f64>,
    psi: Vec<f64>,
    theta: Vec<f64>,
    pond: f64,
    csl: Vec<Vec<f64>>,
    pond_solute: Vec<f64>,
}

impl ColumnState {
    /// Allocates a new instance with the configured initial conditions
    ///
    /// Providing both a water-content and a potential profile is an error;
    /// providing neither defaults the profile to the drained upper limit.
    pub fn new(profile: &Profile, config: &Config) -> Result<Self, StrError> {
        if config.theta_initial.is_some() && config.psi_initial.is_some() {
            return Err("cannot specify both theta_initial and psi_initial");
        }
        let n = profile.n_layers;

        // initial potential per node
        let mut psi = vec![0.0; n];
        if let Some(theta_ini) = config.theta_initial.as_ref() {
            if theta_ini.len() != n {
                return Err("theta_initial must have one entry per layer");
            }
            for i in 0..n {
                psi[i] = profile.retention[i].suction(theta_ini[i]);
            }
        } else if let Some(psi_ini) = config.psi_initial.as_ref() {
            if psi_ini.len() != n {
                return Err("psi_initial must have one entry per layer");
            }
            psi.copy_from_slice(psi_ini);
        } else {
            // default from the soil parameters
            psi.iter_mut().for_each(|v| *v = config.psi_dul);
        }

        // derived variables
        let mut p = vec![0.0; n];
        let mut theta = vec![0.0; n];
        for i in 0..n {
            p[i] = trans_inv(psi[i]);
            theta[i] = profile.retention[i].theta(psi[i]);
        }

        // solute concentrations from the initial pools
        let n_solutes = profile.solutes.len();
        let mut csl = vec![vec![0.0; n]; n_solutes];
        for (s, solute) in profile.solutes.iter().enumerate() {
            for i in 0..n {
                if profile.dx[i] <= 0.0 {
                    if solute.initial_amount[i] != 0.0 {
                        return Err("a zero-thickness layer cannot hold solute");
                    }
                    continue;
                }
                let ctot = solute.initial_amount[i] * KG_PER_HA_TO_MG_PER_CM2 / profile.dx[i];
                csl[s][i] = solve_freundlich(ctot, theta[i], profile.exco_eff(s, i), solute.fip[i])?;
            }
        }

        Ok(ColumnState {
            t: 0.0,
            dt: 0.0,
            first_step_done: false,
            qmax_prev: 0.0,
            p,
            psi,
            theta,
            pond: 0.0,
            csl,
            pond_solute: vec![0.0; n_solutes],
            rain: EventLog::new(),
            evap: EventLog::new(),
            solute_events: (0..n_solutes).map(|_| EventLog::new()).collect(),
            totals: DailyTotals::new(n, n_solutes),
        })
    }

    /// Copies the mutable arrays for a later rollback
    pub fn backup(&self) -> ColumnBackup {
        ColumnBackup {
            p: self.p.clone(),
            psi: self.psi.clone(),
            theta: self.theta.clone(),
            pond: self.pond,
            csl: self.csl.clone(),
            pond_solute: self.pond_solute.clone(),
        }
    }

    /// Restores the mutable arrays from a backup (failed timestep attempt)
    pub fn restore(&mut self, backup: &ColumnBackup) {
        self.p.copy_from_slice(&backup.p);
        self.psi.copy_from_slice(&backup.psi);
        self.theta.copy_from_slice(&backup.theta);
        self.pond = backup.pond;
        for (dst, src) in self.csl.iter_mut().zip(backup.csl.iter()) {
            dst.copy_from_slice(src);
        }
        self.pond_solute.copy_from_slice(&backup.pond_solute);
    }

    /// Returns the water stored in the profile (cm)
    pub fn water_storage(&self, profile: &Profile) -> f64 {
        (0..profile.n_layers).map(|i| profile.dx[i] * self.theta[i]).sum()
    }

    /// Returns the per-layer pool of one solute (kg/ha)
    pub fn solute_pool(&self, profile: &Profile, s: usize) -> Vec<f64> {
        let solute = &profile.solutes[s];
        (0..profile.n_layers)
            .map(|i| {
                let cw = self.csl[s][i];
                let ctot = self.theta[i] * cw + profile.exco_eff(s, i) * f64::powf(cw, solute.fip[i]);
                ctot * profile.dx[i] / KG_PER_HA_TO_MG_PER_CM2
            })
            .collect()
    }

    /// Sets the per-layer pool of one solute (kg/ha), e.g. after an external
    /// pool update between timesteps
    pub fn set_solute_pool(&mut self, profile: &Profile, s: usize, amounts: &[f64]) -> Result<(), StrError> {
        if amounts.len() != profile.n_layers {
            return Err("the pool must have one entry per layer");
        }
        let solute = &profile.solutes[s];
        for i in 0..profile.n_layers {
            if profile.dx[i] <= 0.0 {
                if amounts[i] != 0.0 {
                    return Err("a zero-thickness layer cannot hold solute");
                }
                continue;
            }
            let ctot = amounts[i] * KG_PER_HA_TO_MG_PER_CM2 / profile.dx[i];
            self.csl[s][i] = solve_freundlich(ctot, self.theta[i], profile.exco_eff(s, i), solute.fip[i])?;
        }
        Ok(())
    }

    /// Adds a rainfall event (mm over the given duration in hours)
    ///
    /// Interception is withheld before the event enters the log; an
    /// interception amount exceeding the rainfall is a fatal input error.
    pub fn add_rainfall(&mut self, start: f64, amount_mm: f64, duration_h: f64, interception_mm: f64) -> Result<(), StrError> {
        if interception_mm < 0.0 {
            return Err("interception must be non-negative");
        }
        if interception_mm > amount_mm {
            return Err("interception cannot exceed the rainfall amount");
        }
        self.rain.add(start, start + duration_h, (amount_mm - interception_mm) / 10.0)?;
        self.totals.interception += interception_mm / 10.0;
        Ok(())
    }

    /// Adds a potential-evaporation event (mm over the given duration in hours)
    pub fn add_evaporation(&mut self, start: f64, amount_mm: f64, duration_h: f64) -> Result<(), StrError> {
        self.evap.add(start, start + duration_h, amount_mm / 10.0)
    }

    /// Adds a surface solute application (kg/ha over the given duration in hours)
    pub fn add_solute(&mut self, s: usize, start: f64, amount_kg_ha: f64, duration_h: f64) -> Result<(), StrError> {
        if s >= self.solute_events.len() {
            return Err("unknown solute index");
        }
        self.solute_events[s].add(start, start + duration_h, amount_kg_ha * KG_PER_HA_TO_MG_PER_CM2)
    }

    /// Handles the day-advance signal: purges stale forcing entries and
    /// resets the daily totals
    pub fn on_new_day(&mut self) {
        self.rain.purge_before(self.t);
        self.evap.purge_before(self.t);
        for log in self.solute_events.iter_mut() {
            log.purge_before(self.t);
        }
        self.totals.reset();
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::ColumnState;
    use crate::base::{Config, Samples};
    use crate::engine::Profile;
    use russell_lab::approx_eq;

    #[test]
    fn default_initial_condition_is_dul() {
        let config = Config::new();
        let layers = Samples::profile_uniform_loam(3, 10.0);
        let profile = Profile::new(&layers, &[], &config).unwrap();
        let state = ColumnState::new(&profile, &config).unwrap();
        for i in 0..3 {
            assert_eq!(state.psi[i], -100.0);
            approx_eq(state.theta[i], 0.30, 1e-12);
        }
        approx_eq(state.water_storage(&profile), 9.0, 1e-12);
        assert!(!state.first_step_done);
    }

    #[test]
    fn both_initial_conditions_are_rejected() {
        let mut config = Config::new();
        let layers = Samples::profile_uniform_loam(2, 10.0);
        let profile = Profile::new(&layers, &[], &config).unwrap();
        config.theta_initial = Some(vec![0.3, 0.3]);
        config.psi_initial = Some(vec![-100.0, -100.0]);
        assert_eq!(
            ColumnState::new(&profile, &config).err(),
            Some("cannot specify both theta_initial and psi_initial")
        );
    }

    #[test]
    fn theta_initial_condition_works() {
        let mut config = Config::new();
        config.set_theta_initial(&[0.2, 0.35]);
        let layers = Samples::profile_uniform_loam(2, 10.0);
        let profile = Profile::new(&layers, &[], &config).unwrap();
        let state = ColumnState::new(&profile, &config).unwrap();
        approx_eq(state.theta[0], 0.2, 1e-6);
        approx_eq(state.theta[1], 0.35, 1e-6);
        assert!(state.psi[0] < state.psi[1]); // drier layer holds more suction
    }

    #[test]
    fn solute_pool_round_trip_works() {
        let config = Config::new();
        let layers = Samples::profile_uniform_loam(2, 10.0);
        let solute = Samples::param_adsorbed_solute(2);
        let profile = Profile::new(&layers, &[solute], &config).unwrap();
        let mut state = ColumnState::new(&profile, &config).unwrap();
        let pool = state.solute_pool(&profile, 0);
        approx_eq(pool[0], 10.0, 1e-8);
        approx_eq(pool[1], 10.0, 1e-8);

        state.set_solute_pool(&profile, 0, &[4.0, 2.0]).unwrap();
        let pool = state.solute_pool(&profile, 0);
        approx_eq(pool[0], 4.0, 1e-8);
        approx_eq(pool[1], 2.0, 1e-8);
    }

    #[test]
    fn backup_and_restore_work() {
        let config = Config::new();
        let layers = Samples::profile_uniform_loam(2, 10.0);
        let solute = Samples::param_tracer(2);
        let profile = Profile::new(&layers, &[solute], &config).unwrap();
        let mut state = ColumnState::new(&profile, &config).unwrap();
        let backup = state.backup();
        state.p[0] += 1.0;
        state.theta[1] = 0.4;
        state.pond = 0.5;
        state.csl[0][0] = 9.0;
        state.restore(&backup);
        assert_eq!(state.p[0], backup.p[0]);
        assert_eq!(state.theta[1], backup.theta[1]);
        assert_eq!(state.pond, 0.0);
        assert_eq!(state.csl[0][0], 0.0);
    }

    #[test]
    fn interception_in_excess_is_fatal() {
        let config = Config::new();
        let layers = Samples::profile_uniform_loam(2, 10.0);
        let profile = Profile::new(&layers, &[], &config).unwrap();
        let mut state = ColumnState::new(&profile, &config).unwrap();
        assert_eq!(
            state.add_rainfall(0.0, 5.0, 1.0, 6.0).err(),
            Some("interception cannot exceed the rainfall amount")
        );
        state.add_rainfall(0.0, 5.0, 1.0, 1.0).unwrap();
        approx_eq(state.rain.cumulative(1.0), 0.4, 1e-14);
    }
}
