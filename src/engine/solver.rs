use super::{
    solve_solute_step, solve_water_step, ColumnState, CropWaterConsumer, Diagnostics, Drainage, Profile, SoluteOutcome,
    WaterOutcome,
};
use crate::base::{Config, SolveError, StepFailure, KG_PER_HA_TO_MG_PER_CM2};
use crate::StrError;

/// Drives the column through time with adaptive sub-steps
///
/// Each outer call advances the state to a target time, choosing timesteps
/// bounded by the previous flux magnitude and by rainfall-intensity changes.
/// A failing attempt (Newton cap, solute cap, zero pivot) rolls the whole
/// state back, halves the timestep, and retries; only exhaustion of the
/// minimum timestep escalates to a fatal error, reported with a per-node
/// state dump.
pub struct ColumnSolver<'a> {
    /// Holds configuration parameters
    pub config: &'a Config,

    /// Holds the column discretization and characteristic curves
    pub profile: &'a Profile,

    /// Subsurface drainage term (when enabled)
    drainage: Option<Drainage>,

    /// Warning collector and failure reporting
    pub diagnostics: Diagnostics,

    /// Lifetime count of timestep attempts (drives the forced-failure hook)
    n_attempts: usize,
}

impl<'a> ColumnSolver<'a> {
    /// Allocates a new instance
    pub fn new(profile: &'a Profile, config: &'a Config) -> Result<Self, StrError> {
        if let Some(_) = config.validate() {
            return Err("cannot allocate solver because config.validate() failed");
        }
        let drainage = match config.drainage.as_ref() {
            Some(param) => Some(Drainage::new(param)?),
            None => None,
        };
        Ok(ColumnSolver {
            config,
            profile,
            drainage,
            diagnostics: Diagnostics::new(config.verbose_timesteps || config.verbose_iterations),
            n_attempts: 0,
        })
    }

    /// Advances the column state to the target time (h)
    pub fn solve(
        &mut self,
        state: &mut ColumnState,
        crops: &[&dyn CropWaterConsumer],
        t_end: f64,
    ) -> Result<(), StrError> {
        if t_end < state.t {
            return Err("the target time must not precede the current time");
        }
        self.config.print_header();
        let mut step = 0;
        while state.t < t_end - 1e-12 {
            // candidate dt: configured maximum, remaining time, and the
            // largest previous flux scaled to the allowed water increment
            let mut dt = f64::min(self.config.dt_max, t_end - state.t);
            if state.qmax_prev > 0.0 {
                dt = f64::min(dt, self.config.dw_max / state.qmax_prev);
            }

            // do not straddle a rainfall-intensity change
            if let Some(t_change) = state.rain.next_change(state.t + self.config.dt_event_tol) {
                if state.t + dt > t_change + self.config.dt_event_tol {
                    dt = t_change - state.t;
                }
            }
            dt = f64::max(dt, self.config.dt_min);
            self.config.print_timestep(step, state.t, dt);

            // attempt with rollback-and-halving on failure
            loop {
                let backup = state.backup();
                state.dt = dt;
                match self.attempt(state, crops, dt) {
                    Ok(()) => break,
                    Err(SolveError::Fatal(message)) => {
                        self.diagnostics.report_failure(self.profile, state);
                        return Err(message);
                    }
                    Err(SolveError::Retryable(_)) => {
                        state.restore(&backup);
                        dt /= 2.0;
                        self.config.print_retry(state.t, dt);
                        if dt < self.config.dt_min {
                            self.diagnostics.report_failure(self.profile, state);
                            return Err("simulation failed: the timestep fell below the allowed minimum");
                        }
                    }
                }
            }
            step += 1;
        }
        Ok(())
    }

    /// Runs one timestep attempt: the water solve, then every solute
    fn attempt(&mut self, state: &mut ColumnState, crops: &[&dyn CropWaterConsumer], dt: f64) -> Result<(), SolveError> {
        self.n_attempts += 1;
        if self.n_attempts <= self.config.debug_n_forced_failures {
            // behaves exactly as if the elimination had hit a zero pivot
            return Err(SolveError::Retryable(StepFailure::ZeroPivot));
        }

        let t0 = state.t;
        let rain_rate = state.rain.amount_between(t0, t0 + dt) / dt;
        let evap_rate = state.evap.amount_between(t0, t0 + dt) / dt;
        let theta_old = state.theta.clone();
        let storage_old = state.water_storage(self.profile);

        let outcome = solve_water_step(
            self.profile,
            self.config,
            self.drainage.as_ref(),
            state,
            crops,
            rain_rate,
            evap_rate,
            dt,
        )
        .map_err(SolveError::from)?;

        let mut solute_outcomes = Vec::with_capacity(self.profile.solutes.len());
        for s in 0..self.profile.solutes.len() {
            solute_outcomes.push(solve_solute_step(
                self.profile,
                self.config,
                s,
                state,
                &theta_old,
                &outcome.q_interface,
                &outcome.uptake,
                outcome.drain_flux,
                outcome.runoff,
                t0,
                dt,
                &mut self.diagnostics,
            )?);
        }

        // accept
        self.accumulate(state, crops.len(), &outcome, &solute_outcomes, storage_old, rain_rate, evap_rate, dt);
        state.t = t0 + dt;
        state.first_step_done = true;
        state.qmax_prev = outcome.max_flux;
        Ok(())
    }

    /// Accumulates the daily totals of one accepted step
    fn accumulate(
        &self,
        state: &mut ColumnState,
        n_crops: usize,
        outcome: &WaterOutcome,
        solute_outcomes: &[SoluteOutcome],
        storage_old: f64,
        rain_rate: f64,
        evap_rate: f64,
        dt: f64,
    ) {
        let n = self.profile.n_layers;
        let n_solutes = self.profile.solutes.len();
        let storage_new = state.water_storage(self.profile);

        let totals = &mut state.totals;
        totals.rainfall += rain_rate * dt;
        totals.evap_potential += evap_rate * dt;
        totals.evap_actual += outcome.evap_actual;
        totals.runoff += outcome.runoff;
        totals.infiltration += outcome.infiltration;
        totals.drain_bottom += outcome.q_interface[n] * dt;
        totals.subsurface_drain += outcome.drain_flux * dt;
        totals.delta_pond += outcome.delta_pond;
        totals.delta_storage += storage_new - storage_old;
        for k in 0..=n {
            totals.water_flux[k] += outcome.q_interface[k] * dt;
        }

        totals.ensure_crops(n_crops, n, n_solutes);
        for (c, uptake) in outcome.uptake.iter().enumerate() {
            totals.uptake_water += uptake.total_actual * dt;
            for i in 0..n {
                totals.crop_uptake[c].water[i] += uptake.actual[i] * dt;
                totals.crop_uptake[c].water_potential[i] += uptake.potential[i] * dt;
            }
        }

        for (s, solute) in solute_outcomes.iter().enumerate() {
            totals.solute_leached[s] += solute.leached / KG_PER_HA_TO_MG_PER_CM2;
            totals.solute_drained[s] += solute.drained / KG_PER_HA_TO_MG_PER_CM2;
            totals.solute_runoff[s] += solute.runoff_mass / KG_PER_HA_TO_MG_PER_CM2;
            for (c, per_node) in solute.uptake.iter().enumerate() {
                for i in 0..n {
                    let mass = per_node[i] / KG_PER_HA_TO_MG_PER_CM2;
                    totals.crop_uptake[c].solute[s][i] += mass;
                    totals.solute_uptake[s] += mass;
                }
            }
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
