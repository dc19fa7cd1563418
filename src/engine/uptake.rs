use super::Profile;
use crate::base::MM_PER_DAY_TO_CM_PER_H;

/// Defines the crop-side interface of the root water uptake solve
///
/// Implemented by the external crop/canopy collaborators; the engine invokes
/// these methods once per Newton iteration. All quantities are in cm and
/// hours at this interface.
pub trait CropWaterConsumer {
    /// Returns the potential transpiration demand (cm/h)
    fn potential_transpiration(&self) -> f64;

    /// Returns the minimum (most negative) xylem potential (cm)
    fn min_xylem_potential(&self) -> f64;

    /// Returns the root length density in one layer (cm of root per cm³ of soil)
    fn root_length_density(&self, node: usize) -> f64;

    /// Returns the root radius (cm)
    fn root_radius(&self) -> f64;

    /// Returns the radial root conductance (1/h per cm of root)
    fn root_conductance(&self) -> f64;
}

/// Holds a plain crop description implementing [CropWaterConsumer]
#[derive(Clone, Debug)]
pub struct CropSpec {
    /// Potential transpiration demand (cm/h)
    pub transpiration: f64,

    /// Minimum xylem potential (cm)
    pub psi_min: f64,

    /// Root length density per layer (cm/cm³)
    pub rld: Vec<f64>,

    /// Root radius (cm)
    pub radius: f64,

    /// Radial root conductance (1/h per cm of root)
    pub conductance: f64,
}

impl CropSpec {
    /// Allocates a new instance from a daily demand in mm/day
    pub fn new(transpiration_mm_day: f64, psi_min: f64, rld: Vec<f64>) -> Self {
        CropSpec {
            transpiration: transpiration_mm_day / MM_PER_DAY_TO_CM_PER_H,
            psi_min,
            rld,
            radius: 0.02,
            conductance: 1.4e-4,
        }
    }
}

impl CropWaterConsumer for CropSpec {
    fn potential_transpiration(&self) -> f64 {
        self.transpiration
    }
    fn min_xylem_potential(&self) -> f64 {
        self.psi_min
    }
    fn root_length_density(&self, node: usize) -> f64 {
        if node < self.rld.len() {
            self.rld[node]
        } else {
            0.0
        }
    }
    fn root_radius(&self) -> f64 {
        self.radius
    }
    fn root_conductance(&self) -> f64 {
        self.conductance
    }
}

/// Holds the per-crop result of one uptake solve (transient, per timestep)
#[derive(Clone, Debug)]
pub struct CropUptake {
    /// Potential transpiration demand (cm/h)
    pub demand: f64,

    /// Limiting xylem potential satisfying the demand or its floor (cm)
    pub psix: f64,

    /// Indicates that supply could not meet the demand above the minimum
    /// xylem potential
    pub stressed: bool,

    /// Actual extraction per node (cm/h)
    pub actual: Vec<f64>,

    /// Potential (unconstrained) extraction per node (cm/h)
    pub potential: Vec<f64>,

    /// Series soil-root conductance per node for active layers, zero for
    /// dropped layers (used for the Jacobian)
    pub conductance: Vec<f64>,

    /// Total actual extraction (cm/h)
    pub total_actual: f64,
}

/// Solves the root uptake of every crop for the current potential profile
///
/// Per crop, a single limiting xylem potential `psix` satisfies
/// `Σ g (psi - psix) = ttr`; when the unconstrained solution falls below the
/// crop minimum the demand cannot be met: `psix` is fixed at the minimum and
/// layers drier than `psix` are dropped from the conductance sum, re-solving
/// after each drop.
pub fn solve_uptake(
    crops: &[&dyn CropWaterConsumer],
    profile: &Profile,
    psi: &[f64],
    hk: &[f64],
) -> Vec<CropUptake> {
    crops
        .iter()
        .map(|crop| solve_crop(*crop, profile, psi, hk))
        .collect()
}

/// Solves the uptake of one crop
fn solve_crop(crop: &dyn CropWaterConsumer, profile: &Profile, psi: &[f64], hk: &[f64]) -> CropUptake {
    let n = profile.n_layers;
    let demand = crop.potential_transpiration();
    let psi_min = crop.min_xylem_potential();

    // series soil-to-root and root-to-xylem conductances per layer
    let mut g = vec![0.0; n];
    for i in 0..n {
        let rld = crop.root_length_density(i);
        if rld <= 0.0 || profile.dx[i] <= 0.0 || demand <= 0.0 {
            continue;
        }
        // radial flow towards a single root over half the root spacing
        let half_spacing = f64::sqrt(1.0 / (std::f64::consts::PI * rld));
        let geometry = f64::max(f64::ln(half_spacing / crop.root_radius()), 0.1);
        let g_soil = 2.0 * std::f64::consts::PI * rld * profile.dx[i] * hk[i] / geometry;
        let g_root = crop.root_conductance() * rld * profile.dx[i];
        if g_soil > 0.0 && g_root > 0.0 {
            g[i] = g_soil * g_root / (g_soil + g_root);
        }
    }

    // unconstrained solution, dropping layers that would release water
    let (psix_pot, active_pot) = solve_psix(&g, psi, demand, None);
    let mut potential = vec![0.0; n];
    for i in 0..n {
        if active_pot[i] {
            potential[i] = g[i] * (psi[i] - psix_pot);
        }
    }

    // constrained solution with the xylem floor
    let (psix, active) = solve_psix(&g, psi, demand, Some(psi_min));
    let stressed = psix <= psi_min;
    let mut actual = vec![0.0; n];
    let mut conductance = vec![0.0; n];
    let mut total_actual = 0.0;
    for i in 0..n {
        if active[i] {
            actual[i] = g[i] * (psi[i] - psix);
            conductance[i] = g[i];
            total_actual += actual[i];
        }
    }

    CropUptake {
        demand,
        psix,
        stressed,
        actual,
        potential,
        conductance,
        total_actual,
    }
}

/// Finds the xylem potential and the active layer set
///
/// Each dropped layer requires a re-solve because the conductance sum changes.
fn solve_psix(g: &[f64], psi: &[f64], demand: f64, floor: Option<f64>) -> (f64, Vec<bool>) {
    let n = g.len();
    let mut active: Vec<bool> = (0..n).map(|i| g[i] > 0.0).collect();
    loop {
        let sg: f64 = (0..n).filter(|&i| active[i]).map(|i| g[i]).sum();
        if sg <= 0.0 {
            return (floor.unwrap_or(0.0), vec![false; n]);
        }
        let spsi: f64 = (0..n).filter(|&i| active[i]).map(|i| g[i] * psi[i]).sum();
        let mut psix = (spsi - demand) / sg;
        if let Some(psi_min) = floor {
            if psix < psi_min {
                psix = psi_min;
            }
        }
        // layers drier than the xylem cannot supply; drop and re-solve
        let mut dropped = false;
        for i in 0..n {
            if active[i] && psi[i] < psix {
                active[i] = false;
                dropped = true;
            }
        }
        if !dropped {
            return (psix, active);
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
