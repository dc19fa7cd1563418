use russell_lab::approx_eq;
use swsim::prelude::*;

// Scenario: a single loam layer receives 10 mm of rainfall uniformly over
// 60 minutes with free drainage below. Every millimetre must be accounted
// for: runoff + bottom drainage + evaporation + storage change = rainfall.

const SAT: f64 = 0.45;
const DUL: f64 = 0.30;
const LL15: f64 = 0.10;
const RAIN_MM: f64 = 10.0;

#[test]
fn test_infiltration_event() -> Result<(), StrError> {
    let layers = vec![ParamSoilLayer {
        dx: 15.0,
        bulk_density: 1.3,
        ll15: LL15,
        dul: DUL,
        sat: SAT,
        ks: 100.0,
    }];
    let mut config = Config::new();
    config.set_boundaries(TopBoundary::InfiniteConductance, BottomBoundary::ZeroGradient);

    let profile = Profile::new(&layers, &[], &config)?;
    let mut state = ColumnState::new(&profile, &config)?;
    let mut solver = ColumnSolver::new(&profile, &config)?;

    let storage_before = state.water_storage(&profile);
    state.add_rainfall(0.0, RAIN_MM, 1.0, 0.0)?;
    solver.solve(&mut state, &[], 4.0)?;

    // all water is accounted for
    let totals = &state.totals;
    approx_eq(totals.rainfall, RAIN_MM / 10.0, 1e-12);
    let accounted = totals.runoff + totals.drain_bottom + totals.evap_actual + totals.delta_storage + totals.delta_pond;
    approx_eq(accounted, RAIN_MM / 10.0, 1e-4);
    approx_eq(totals.balance_error(), 0.0, 1e-6);

    // the bookkeeping matches the actual profile storage
    let storage_after = state.water_storage(&profile);
    approx_eq(storage_after - storage_before, totals.delta_storage, 1e-12);

    // the soil wetted up and some water reached the free-draining bottom
    assert!(state.theta[0] > DUL);
    assert!(totals.infiltration > 0.0);
    assert!(totals.drain_bottom >= 0.0);
    Ok(())
}

#[test]
fn test_evaporation_is_demand_or_supply_limited() -> Result<(), StrError> {
    let layers = vec![Samples::param_loam(15.0)];
    let mut config = Config::new();
    config.set_boundaries(TopBoundary::InfiniteConductance, BottomBoundary::ZeroFlux);

    let profile = Profile::new(&layers, &[], &config)?;
    let mut state = ColumnState::new(&profile, &config)?;
    let mut solver = ColumnSolver::new(&profile, &config)?;

    // 4 mm potential evaporation over one day, no rain
    state.add_evaporation(0.0, 4.0, 24.0)?;
    solver.solve(&mut state, &[], 24.0)?;

    let totals = &state.totals;
    approx_eq(totals.evap_potential, 0.4, 1e-12);
    assert!(totals.evap_actual <= totals.evap_potential + 1e-12);
    assert!(totals.evap_actual > 0.0);
    // the column dried by exactly what evaporated
    approx_eq(totals.balance_error(), 0.0, 1e-6);
    assert!(state.theta[0] < 0.30);
    Ok(())
}
