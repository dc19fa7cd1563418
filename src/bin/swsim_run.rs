use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use structopt::StructOpt;
use swsim::prelude::*;

/// Command line options
#[derive(StructOpt, Debug)]
#[structopt(
    name = "swsim_run",
    about = "Runs a soil column scenario from a JSON file and prints the daily balance"
)]
struct Options {
    /// Path to the scenario file
    scenario: String,

    /// Prints timestep and iteration tracing
    #[structopt(long)]
    verbose: bool,
}

/// Holds one simulated day of forcing
#[derive(Deserialize, Debug)]
struct DayForcing {
    rain_mm: f64,
    rain_duration_h: f64,
    evap_mm: f64,
}

/// Holds the scenario loaded from JSON
#[derive(Deserialize, Debug)]
struct Scenario {
    layers: Vec<ParamSoilLayer>,
    #[serde(default)]
    solutes: Vec<ParamSolute>,
    days: Vec<DayForcing>,
}

fn main() -> Result<(), StrError> {
    // parse options
    let options = Options::from_args();

    // load scenario
    let file = File::open(&options.scenario).map_err(|_| "cannot open the scenario file")?;
    let scenario: Scenario = serde_json::from_reader(BufReader::new(file)).map_err(|_| "cannot parse the scenario file")?;

    // configuration
    let mut config = Config::new();
    config.set_verbose(options.verbose, options.verbose);

    // allocate profile, state, and solver
    let profile = Profile::new(&scenario.layers, &scenario.solutes, &config)?;
    let mut state = ColumnState::new(&profile, &config)?;
    let mut solver = ColumnSolver::new(&profile, &config)?;

    // daily loop
    println!(
        "{:>4} {:>9} {:>9} {:>9} {:>9} {:>9} {:>9} {:>9}",
        "day", "rain", "runoff", "infil", "evap", "drain", "Δstore", "error"
    );
    for (day, forcing) in scenario.days.iter().enumerate() {
        state.on_new_day();
        let t0 = state.t;
        if forcing.rain_mm > 0.0 {
            state.add_rainfall(t0, forcing.rain_mm, forcing.rain_duration_h, 0.0)?;
        }
        if forcing.evap_mm > 0.0 {
            state.add_evaporation(t0, forcing.evap_mm, 24.0)?;
        }
        solver.solve(&mut state, &[], t0 + 24.0)?;
        let totals = &state.totals;
        println!(
            "{:>4} {:>9.3} {:>9.3} {:>9.3} {:>9.3} {:>9.3} {:>9.3} {:>9.2e}",
            day + 1,
            totals.rainfall * 10.0,
            totals.runoff * 10.0,
            totals.infiltration * 10.0,
            totals.evap_actual * 10.0,
            totals.drain_bottom * 10.0,
            totals.delta_storage * 10.0,
            totals.balance_error() * 10.0
        );
    }

    // final profile
    println!("\n{:>5} {:>10} {:>13} {:>10}", "node", "x", "psi", "theta");
    for i in 0..profile.n_layers {
        println!("{:>5} {:>10.2} {:>13.4e} {:>10.4}", i, profile.x[i], state.psi[i], state.theta[i]);
    }
    for message in solver.diagnostics.take_warnings() {
        println!("WARNING: {}", message);
    }
    Ok(())
}
