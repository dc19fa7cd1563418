use super::{BottomBoundary, ParamDrainage, TopBoundary, MIN_DT_MIN, PSI_LL15, PSI_WET};

/// Holds the parameters controlling the column solver
///
/// # Notes
///
/// * `dt_max`/`dt_min` -- bounds for the adaptive timestep (h)
/// * `dw_max` -- maximum water-content increment per step used to bound dt
/// * `space_weight` -- blend between central (0.5) and upstream (1.0)
///   differencing; ignored when `auto_space_weight` is enabled
/// * `n_max_iterations_initial` -- more lenient Newton cap used until the
///   very first timestep has been accepted
pub struct Config {
    /// Reference potential at the drained upper limit (cm); the second
    /// breakpoint of the retention spline
    pub psi_dul: f64,

    /// Hydraulic conductivity at the drained upper limit (mm/day)
    pub kdul: f64,

    /// Maximum timestep (h)
    pub dt_max: f64,

    /// Minimum timestep before a failing step becomes fatal (h)
    pub dt_min: f64,

    /// Maximum allowed water-content increment per step (cm)
    pub dw_max: f64,

    /// Tolerance for aligning steps with rainfall-intensity changes (h)
    pub dt_event_tol: f64,

    /// Space weighting factor; 0.5 = central, 1.0 = fully upstream
    pub space_weight: f64,

    /// Selects the smallest upstream bias that avoids oscillation instead of
    /// the fixed `space_weight`
    pub auto_space_weight: bool,

    /// Maximum change of the transformed potential per Newton iteration
    pub max_dp: f64,

    /// Maximum number of Newton iterations after the first accepted step
    pub n_max_iterations: usize,

    /// Maximum number of Newton iterations before the first accepted step
    pub n_max_iterations_initial: usize,

    /// Tolerance for the column water-balance residual (cm)
    pub tol_balance: f64,

    /// Tolerance for the per-node residual (cm)
    pub tol_residual: f64,

    /// Maximum number of solute adsorption re-linearization passes
    pub n_max_solute_iterations: usize,

    /// Tolerance for the adsorbed-phase concentration change (mg/cm³)
    pub tol_adsorbed: f64,

    /// Matric potential of air-dry soil limiting surface evaporation (cm)
    pub psi_air_dry: f64,

    /// Fraction of infiltrating solute bypassing the matrix
    pub bypass_fraction: f64,

    /// Delivery depth of the bypass fraction (cm)
    pub bypass_depth: f64,

    /// Top boundary condition
    pub top_boundary: TopBoundary,

    /// Bottom boundary condition
    pub bottom_boundary: BottomBoundary,

    /// Subsurface drainage parameters (None disables drainage)
    pub drainage: Option<ParamDrainage>,

    /// Initial volumetric water content per layer
    pub theta_initial: Option<Vec<f64>>,

    /// Initial matric potential per layer (cm)
    pub psi_initial: Option<Vec<f64>>,

    /// Verbose mode during timesteps
    pub verbose_timesteps: bool,

    /// Verbose mode during iterations
    pub verbose_iterations: bool,

    /// Makes the first n timestep attempts fail as if the tridiagonal
    /// elimination had hit a zero pivot (testing hook for the retry path)
    pub debug_n_forced_failures: usize,
}

impl Config {
    /// Allocates a new instance with default values
    pub fn new() -> Self {
        Config {
            psi_dul: -100.0,
            kdul: 0.1,
            dt_max: 1.0,
            dt_min: 1e-4,
            dw_max: 0.05,
            dt_event_tol: 1e-3,
            space_weight: 0.5,
            auto_space_weight: true,
            max_dp: 5.0,
            n_max_iterations: 15,
            n_max_iterations_initial: 40,
            tol_balance: 1e-6,
            tol_residual: 1e-6,
            n_max_solute_iterations: 50,
            tol_adsorbed: 1e-9,
            psi_air_dry: -1e6,
            bypass_fraction: 0.0,
            bypass_depth: 0.0,
            top_boundary: TopBoundary::InfiniteConductance,
            bottom_boundary: BottomBoundary::ZeroGradient,
            drainage: None,
            theta_initial: None,
            psi_initial: None,
            verbose_timesteps: false,
            verbose_iterations: false,
            debug_n_forced_failures: 0,
        }
    }

    /// Sets the timestep bounds (h)
    pub fn set_dt_limits(&mut self, dt_max: f64, dt_min: f64) -> &mut Self {
        self.dt_max = dt_max;
        self.dt_min = dt_min;
        self
    }

    /// Sets the top and bottom boundary conditions
    pub fn set_boundaries(&mut self, top: TopBoundary, bottom: BottomBoundary) -> &mut Self {
        self.top_boundary = top;
        self.bottom_boundary = bottom;
        self
    }

    /// Sets the initial water content profile
    pub fn set_theta_initial(&mut self, theta: &[f64]) -> &mut Self {
        self.theta_initial = Some(theta.to_vec());
        self
    }

    /// Sets the initial matric potential profile (cm)
    pub fn set_psi_initial(&mut self, psi: &[f64]) -> &mut Self {
        self.psi_initial = Some(psi.to_vec());
        self
    }

    /// Enables subsurface drainage
    pub fn set_drainage(&mut self, drainage: ParamDrainage) -> &mut Self {
        self.drainage = Some(drainage);
        self
    }

    /// Sets the verbose flags
    pub fn set_verbose(&mut self, timesteps: bool, iterations: bool) -> &mut Self {
        self.verbose_timesteps = timesteps;
        self.verbose_iterations = iterations;
        self
    }

    /// Validates all data
    ///
    /// Returns a message with the inconsistent data, or returns None if everything is all right.
    pub fn validate(&self) -> Option<String> {
        if self.psi_dul >= PSI_WET || self.psi_dul <= PSI_LL15 {
            return Some(format!(
                "psi_dul = {:?} is incorrect; it must be {:?} < psi_dul < {:?}",
                self.psi_dul, PSI_LL15, PSI_WET
            ));
        }
        if self.kdul <= 0.0 {
            return Some(format!("kdul = {:?} is incorrect; it must be > 0.0", self.kdul));
        }
        if self.dt_min < MIN_DT_MIN {
            return Some(format!(
                "dt_min = {:?} is incorrect; it must be ≥ {:e}",
                self.dt_min, MIN_DT_MIN
            ));
        }
        if self.dt_max < self.dt_min {
            return Some(format!(
                "dt_max = {:?} is incorrect; it must be ≥ dt_min = {:?}",
                self.dt_max, self.dt_min
            ));
        }
        if self.dw_max <= 0.0 {
            return Some(format!("dw_max = {:?} is incorrect; it must be > 0.0", self.dw_max));
        }
        if self.space_weight < 0.5 || self.space_weight > 1.0 {
            return Some(format!(
                "space_weight = {:?} is incorrect; it must be 0.5 ≤ w ≤ 1.0",
                self.space_weight
            ));
        }
        if self.max_dp <= 0.0 {
            return Some(format!("max_dp = {:?} is incorrect; it must be > 0.0", self.max_dp));
        }
        if self.n_max_iterations < 1 || self.n_max_iterations_initial < self.n_max_iterations {
            return Some(format!(
                "n_max_iterations = {:?} and n_max_iterations_initial = {:?} are incorrect; the initial cap must be ≥ the subsequent cap ≥ 1",
                self.n_max_iterations, self.n_max_iterations_initial
            ));
        }
        if self.tol_balance <= 0.0 || self.tol_residual <= 0.0 {
            return Some(format!(
                "tol_balance = {:?} and tol_residual = {:?} are incorrect; they must be > 0.0",
                self.tol_balance, self.tol_residual
            ));
        }
        if self.psi_air_dry >= 0.0 {
            return Some(format!(
                "psi_air_dry = {:?} is incorrect; it must be < 0.0",
                self.psi_air_dry
            ));
        }
        if self.bypass_fraction < 0.0 || self.bypass_fraction >= 1.0 {
            return Some(format!(
                "bypass_fraction = {:?} is incorrect; it must be 0.0 ≤ f < 1.0",
                self.bypass_fraction
            ));
        }
        if self.bypass_depth < 0.0 {
            return Some(format!(
                "bypass_depth = {:?} is incorrect; it must be ≥ 0.0",
                self.bypass_depth
            ));
        }
        if self.theta_initial.is_some() && self.psi_initial.is_some() {
            return Some(
                "cannot specify both theta_initial and psi_initial; provide at most one of them".to_string(),
            );
        }
        if let Some(drainage) = self.drainage.as_ref() {
            if drainage.drain_spacing <= 0.0 {
                return Some(format!(
                    "drain_spacing = {:?} is incorrect; it must be > 0.0",
                    drainage.drain_spacing
                ));
            }
            if drainage.drain_radius <= 0.0 {
                return Some(format!(
                    "drain_radius = {:?} is incorrect; it must be > 0.0",
                    drainage.drain_radius
                ));
            }
            if drainage.imperm_depth < drainage.drain_depth {
                return Some(format!(
                    "imperm_depth = {:?} is incorrect; it must be ≥ drain_depth = {:?}",
                    drainage.imperm_depth, drainage.drain_depth
                ));
            }
            if drainage.klat <= 0.0 {
                return Some(format!("klat = {:?} is incorrect; it must be > 0.0", drainage.klat));
            }
        }
        None // all good
    }

    /// Prints the header of the table with timestep and iteration data
    #[inline]
    pub fn print_header(&self) {
        if self.verbose_timesteps || self.verbose_iterations {
            println!("Legend:");
            println!("✅ : converged");
            println!("👍 : converging");
            println!("🥵 : diverging");
            println!("🔁 : attempt failed; halving Δt\n");
            println!(
                "{:>8} {:>13} {:>13} {:>5} {:>9} {:>9}",
                "step", "t", "Δt", "iter", "balance", "residual"
            );
        }
    }

    /// Prints timestep data
    #[inline]
    #[rustfmt::skip]
    pub fn print_timestep(&self, step: usize, t: f64, dt: f64) {
        if !self.verbose_timesteps {
            return;
        }
        println!(
            "{:>8} {:>13.6e} {:>13.6e} {:>5} {:>9} {:>9}",
            step + 1, t, dt, ".", ".", "."
        );
    }

    /// Prints iteration data
    #[inline]
    pub fn print_iteration(&self, it: usize, balance: f64, residual: f64) {
        if !self.verbose_iterations {
            return;
        }
        let flag = if balance < self.tol_balance && residual < self.tol_residual {
            "✅"
        } else if !balance.is_finite() || !residual.is_finite() {
            "🥵"
        } else {
            "👍"
        };
        println!(
            "{:>8} {:>13} {:>13} {:>5} {:>9.2e} {:>9.2e} {}",
            ".", ".", ".", it + 1, balance, residual, flag
        );
    }

    /// Prints a retry message after a failed attempt
    #[inline]
    pub fn print_retry(&self, t: f64, dt: f64) {
        if self.verbose_timesteps {
            println!("{:>8} {:>13.6e} {:>13.6e} 🔁", "retry", t, dt);
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
