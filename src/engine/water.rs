use super::{
    bottom_flux, initial_top_regime, runoff_rate, solve_uptake, surface_infiltration, trans_inv, watvar, ColumnState,
    CropUptake, CropWaterConsumer, Drainage, Profile, SurfaceEquation, TopRegime, Tridiag, Watvar,
};
use crate::base::{Config, StepFailure, TopBoundary};
use russell_lab::Vector;

/// Defines the maximum number of top-regime switches within one attempt
const MAX_REGIME_SWITCHES: usize = 6;

/// Defines the relative sink change below which the extraction is frozen
const SINK_FREEZE_TOL: f64 = 0.01;

/// Holds an internodal flux and its derivatives
#[derive(Clone, Copy, Debug)]
pub struct InternodalFlux {
    /// Flux (cm/h, positive downward)
    pub q: f64,

    /// dq/dp of the upper node
    pub dq_dp_upper: f64,

    /// dq/dp of the lower node
    pub dq_dp_lower: f64,
}

/// Computes the flux between two adjacent nodes with space weighting
///
/// The dispersive (potential-gradient) and gravity components are weighted
/// separately between central (w = 0.5) and upstream (w = 1) differencing.
/// With automatic weighting the smallest upstream bias that avoids
/// oscillation is selected from the ratio of the conductivity nonlinearity
/// to the dispersive conductance.
pub fn internodal_flux(upper: &Watvar, lower: &Watvar, dist: f64, space_weight: f64, auto: bool) -> InternodalFlux {
    let grad = (upper.psi - lower.psi) / dist + 1.0;
    let k_central = 0.5 * (upper.hk + lower.hk);

    // upstream bias
    let w = if auto {
        let dk_dpsi = 0.5 * (upper.hkp / upper.psip + lower.hkp / lower.psip);
        let pe = dist * f64::abs(dk_dpsi) / k_central;
        if pe <= 2.0 {
            0.5
        } else {
            1.0 - 1.0 / pe
        }
    } else {
        space_weight
    };

    // the dispersive weight follows the flow direction; gravity always
    // advects downward
    let q_central = k_central * grad;
    let wd = if q_central >= 0.0 { w } else { 1.0 - w };
    let wg = w;

    let grad_psi = (upper.psi - lower.psi) / dist;
    let kd = wd * upper.hk + (1.0 - wd) * lower.hk;
    let kg = wg * upper.hk + (1.0 - wg) * lower.hk;
    InternodalFlux {
        q: kd * grad_psi + kg,
        dq_dp_upper: wd * upper.hkp * grad_psi + kd * upper.psip / dist + wg * upper.hkp,
        dq_dp_lower: (1.0 - wd) * lower.hkp * grad_psi - kd * lower.psip / dist + (1.0 - wg) * lower.hkp,
    }
}

/// Holds the outcome of one accepted water timestep
#[derive(Clone, Debug)]
pub struct WaterOutcome {
    /// Number of Newton iterations used
    pub iterations: usize,

    /// Water flux per node interface (cm/h); entry 0 is the surface and the
    /// last entry the column bottom (mass-consistent with the storage change)
    pub q_interface: Vec<f64>,

    /// Water entering the profile across the surface (cm, negative = out)
    pub infiltration: f64,

    /// Surface runoff (cm)
    pub runoff: f64,

    /// Actual evaporation (cm)
    pub evap_actual: f64,

    /// Change of the surface (pond) store (cm)
    pub delta_pond: f64,

    /// Subsurface drain flux at the end of the step (cm/h)
    pub drain_flux: f64,

    /// Per-crop uptake of the step
    pub uptake: Vec<CropUptake>,

    /// Largest interface flux magnitude (cm/h), bounding the next timestep
    pub max_flux: f64,
}

/// Advances the water state over one timestep attempt (Newton-Raphson)
///
/// On success the column state (`p`, `psi`, `theta`, pond) holds the
/// end-of-step values. On failure the state is partially modified and the
/// caller must roll back from its backup before retrying.
pub fn solve_water_step(
    profile: &Profile,
    config: &Config,
    drainage: Option<&Drainage>,
    state: &mut ColumnState,
    crops: &[&dyn CropWaterConsumer],
    rain_rate: f64,
    evap_rate: f64,
    dt: f64,
) -> Result<WaterOutcome, StepFailure> {
    let n = profile.n_layers;
    let neq = profile.n_eqn;
    let theta_old = state.theta.clone();
    let pond_old = state.pond;
    let mut pond = state.pond;
    let net_rate = rain_rate - evap_rate;
    let mut regime = initial_top_regime(&config.top_boundary, pond, net_rate);

    // workspace
    let mut sys = Tridiag::new(neq);
    let mut increment = Vector::new(neq);
    let mut residual = vec![0.0; neq];
    let mut wv: Vec<Watvar> = (0..n).map(|i| watvar(profile, i, state.p[i])).collect();
    let mut psi_now = vec![0.0; n];
    let mut hk_now = vec![0.0; n];
    let mut sink_q = vec![0.0; n];
    let mut sink_g = vec![0.0; n];
    let mut drain_q = 0.0;
    let mut uptake: Vec<CropUptake> = Vec::new();
    let mut uptake_frozen = crops.is_empty();
    let mut n_switches = 0;
    let mut iterations = 0;
    let mut converged = false;

    let it_max = if state.first_step_done {
        config.n_max_iterations
    } else {
        config.n_max_iterations_initial
    };

    for it in 0..=it_max {
        // node hydraulics
        for i in 0..n {
            wv[i] = watvar(profile, i, state.p[i]);
            psi_now[i] = wv[i].psi;
            hk_now[i] = wv[i].hk;
        }

        // root extraction (invoked once per iteration until the sink error
        // becomes small relative to the extraction, then frozen)
        if !uptake_frozen {
            let fresh = solve_uptake(crops, profile, &psi_now, &hk_now);
            let total: f64 = fresh.iter().map(|u| u.total_actual).sum();
            if it > 0 {
                let prev: f64 = uptake.iter().map(|u| u.total_actual).sum();
                if f64::abs(total - prev) <= SINK_FREEZE_TOL * f64::max(f64::abs(total), 1e-12) {
                    uptake_frozen = true;
                }
            }
            uptake = fresh;
            for i in 0..n {
                sink_q[i] = uptake.iter().map(|u| u.actual[i]).sum();
                sink_g[i] = uptake.iter().map(|u| u.conductance[i]).sum();
            }
        }

        // assembly
        sys.reset();
        residual.iter_mut().for_each(|v| *v = 0.0);

        // storage and sink terms
        for i in 0..n {
            let r = profile.eqn_of_node[i];
            residual[r] += profile.dx[i] * (wv[i].theta - theta_old[i]) / dt;
            sys.b[r] += profile.dx[i] * wv[i].thp / dt;
            residual[r] += sink_q[i];
            sys.b[r] += sink_g[i] * wv[i].psip;
        }

        // subsurface drainage
        if let (Some(dr), Some(d)) = (drainage, profile.drain_node) {
            let r = profile.eqn_of_node[d];
            drain_q = dr.flux(psi_now[d]);
            residual[r] += drain_q;
            sys.b[r] += dr.d_flux_d_psi(psi_now[d]) * wv[d].psip;
        }

        // internodal fluxes (merged pairs carry no flux term; their balance
        // folds into the shared equation)
        for i in 0..n - 1 {
            if profile.is_merged_interface(i) {
                continue;
            }
            let flux = internodal_flux(
                &wv[i],
                &wv[i + 1],
                profile.dist(i),
                config.space_weight,
                config.auto_space_weight,
            );
            let r_up = profile.eqn_of_node[i];
            let r_lo = profile.eqn_of_node[i + 1];
            residual[r_up] += flux.q;
            sys.b[r_up] += flux.dq_dp_upper;
            sys.c[r_up] += flux.dq_dp_lower;
            residual[r_lo] -= flux.q;
            sys.a[r_lo] -= flux.dq_dp_upper;
            sys.b[r_lo] -= flux.dq_dp_lower;
        }

        // bottom boundary
        let bf = bottom_flux(&config.bottom_boundary, &wv[n - 1], profile.dx[n - 1] / 2.0, profile.depth);
        residual[neq - 1] += bf.q;
        sys.b[neq - 1] += bf.dq_dp;

        // top boundary
        let mut dirichlet_target = None;
        match regime {
            TopRegime::Flux => {
                let (q_top, dq_dp0) = match config.top_boundary {
                    TopBoundary::Conductance {
                        conductance,
                        psi_external,
                    } => (
                        conductance * (psi_external - wv[0].psi) + net_rate,
                        -conductance * wv[0].psip,
                    ),
                    _ => (net_rate, 0.0),
                };
                residual[0] -= q_top;
                sys.b[0] -= dq_dp0;
            }
            TopRegime::Dirichlet(psi_target) => {
                dirichlet_target = Some(trans_inv(psi_target));
            }
            TopRegime::Pond => {
                let (q0, dq_dp0, dq_dh) = surface_infiltration(&wv[0], pond, profile.dx[0] / 2.0);
                residual[0] -= q0;
                sys.b[0] -= dq_dp0;
                let (ro_rate, ro_slope) = runoff_rate(&config.top_boundary, pond);
                let fs = (pond - pond_old) / dt + q0 + ro_rate + evap_rate - rain_rate;
                sys.surface = Some(SurfaceEquation {
                    b: 1.0 / dt + dq_dh + ro_slope,
                    c: dq_dp0,
                    rhs: -fs,
                    a0: -dq_dh,
                });
            }
        }

        // convergence on both the column balance and the per-node residual
        let skip0 = dirichlet_target.is_some();
        let mut balance = 0.0;
        let mut res_max: f64 = 0.0;
        for r in 0..neq {
            if r == 0 && skip0 {
                continue;
            }
            balance += residual[r];
            res_max = f64::max(res_max, f64::abs(residual[r]));
        }
        if let Some(surface) = sys.surface {
            balance += -surface.rhs;
            res_max = f64::max(res_max, f64::abs(surface.rhs));
        }
        let balance = f64::abs(balance) * dt;
        let res_max = res_max * dt;
        config.print_iteration(it, balance, res_max);

        // a Dirichlet row converges once the surface potential sits on its
        // target; the physical residuals alone cannot see it
        let dirichlet_ok = match dirichlet_target {
            Some(p_target) => f64::abs(p_target - state.p[0]) < 1e-9,
            None => true,
        };
        if balance < config.tol_balance && res_max < config.tol_residual && dirichlet_ok {
            // verify the assumed top regime before accepting
            match check_regime_switch(config, regime, &wv[0], residual[0], net_rate, rain_rate) {
                Some(next) if n_switches < MAX_REGIME_SWITCHES => {
                    regime = next;
                    n_switches += 1;
                    continue;
                }
                _ => {
                    iterations = it;
                    converged = true;
                    break;
                }
            }
        }
        if it == it_max {
            return Err(StepFailure::WaterNotConverged);
        }

        // install the right-hand side and the Dirichlet row, then solve
        for r in 0..neq {
            sys.rhs[r] = -residual[r];
        }
        if let Some(p_target) = dirichlet_target {
            sys.b[0] = 1.0;
            sys.c[0] = 0.0;
            sys.rhs[0] = p_target - state.p[0];
        }
        let mut dh = 0.0;
        sys.solve(&mut dh, &mut increment)?;

        // clipped update; merged nodes copy their twin's increment through
        // the shared equation index
        for i in 0..n {
            let delta = increment[profile.eqn_of_node[i]].clamp(-config.max_dp, config.max_dp);
            state.p[i] += delta;
        }
        if regime == TopRegime::Pond {
            pond += dh.clamp(-config.max_dp, config.max_dp);
            if pond < 0.0 {
                // the pond dried out during the step
                pond = 0.0;
                regime = TopRegime::Flux;
                n_switches += 1;
            }
        }
    }

    if !converged {
        return Err(StepFailure::WaterNotConverged);
    }

    // commit the converged state
    for i in 0..n {
        state.psi[i] = wv[i].psi;
        state.theta[i] = wv[i].theta;
    }
    state.pond = pond;

    // interface fluxes by recursion from the surface, mass-consistent with
    // the committed storage change
    let q_surface = match regime {
        TopRegime::Flux => match config.top_boundary {
            TopBoundary::Conductance {
                conductance,
                psi_external,
            } => conductance * (psi_external - wv[0].psi) + net_rate,
            _ => net_rate,
        },
        TopRegime::Dirichlet(_) => residual[0],
        TopRegime::Pond => surface_infiltration(&wv[0], pond, profile.dx[0] / 2.0).0,
    };
    let mut q_interface = vec![0.0; n + 1];
    q_interface[0] = q_surface;
    for i in 0..n {
        let drain_here = match profile.drain_node {
            Some(d) if d == i => drain_q,
            _ => 0.0,
        };
        q_interface[i + 1] =
            q_interface[i] - profile.dx[i] * (state.theta[i] - theta_old[i]) / dt - sink_q[i] - drain_here;
    }
    let max_flux = q_interface.iter().fold(0.0, |acc: f64, q| acc.max(f64::abs(*q)));

    // surface bookkeeping per regime
    let rain_step = rain_rate * dt;
    let evap_step = evap_rate * dt;
    let infiltration = q_surface * dt;
    let delta_pond = pond - pond_old;
    let (runoff, evap_actual) = match (regime, &config.top_boundary) {
        (TopRegime::Dirichlet(_), TopBoundary::ConstantPotential(_)) => (0.0, 0.0),
        (TopRegime::Dirichlet(psi), _) if psi >= 0.0 => {
            (f64::max(rain_step - evap_step - infiltration, 0.0), evap_step)
        }
        (TopRegime::Dirichlet(_), _) => (0.0, f64::max(rain_step - infiltration, 0.0)),
        (TopRegime::Pond, _) => (
            f64::max(rain_step - evap_step - infiltration - delta_pond, 0.0),
            evap_step,
        ),
        (TopRegime::Flux, _) => (0.0, evap_step),
    };

    Ok(WaterOutcome {
        iterations,
        q_interface,
        infiltration,
        runoff,
        evap_actual,
        delta_pond,
        drain_flux: drain_q,
        uptake,
        max_flux,
    })
}

/// Decides whether the converged solution contradicts the assumed top regime
fn check_regime_switch(
    config: &Config,
    regime: TopRegime,
    wv0: &Watvar,
    residual0: f64,
    net_rate: f64,
    rain_rate: f64,
) -> Option<TopRegime> {
    match config.top_boundary {
        TopBoundary::ConstantPotential(_) => None,
        TopBoundary::Ponding { .. } => match regime {
            // the surface saturated without a pond: re-activate the store
            TopRegime::Flux if wv0.psi > 0.0 && rain_rate > 0.0 => Some(TopRegime::Pond),
            _ => None,
        },
        _ => match regime {
            TopRegime::Flux => {
                if wv0.psi > 0.0 && net_rate > 0.0 {
                    // the profile cannot absorb the supply: cap at saturation
                    Some(TopRegime::Dirichlet(0.0))
                } else if wv0.psi < config.psi_air_dry && net_rate < 0.0 {
                    // the profile cannot meet the evaporative demand
                    Some(TopRegime::Dirichlet(config.psi_air_dry))
                } else {
                    None
                }
            }
            TopRegime::Dirichlet(psi) if psi >= 0.0 => {
                // under Dirichlet the first residual closes the implied inflow
                if residual0 > net_rate {
                    Some(TopRegime::Flux)
                } else {
                    None
                }
            }
            TopRegime::Dirichlet(_) => {
                if residual0 < net_rate {
                    Some(TopRegime::Flux)
                } else {
                    None
                }
            }
            TopRegime::Pond => None,
        },
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
