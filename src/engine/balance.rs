use serde::{Deserialize, Serialize};

/// Holds the cumulative uptake of one crop since the start of the day
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CropUptakeTotal {
    /// Actual water uptake per node (cm)
    pub water: Vec<f64>,

    /// Potential (unstressed) water uptake per node (cm)
    pub water_potential: Vec<f64>,

    /// Passive solute uptake per solute per node (kg/ha)
    pub solute: Vec<Vec<f64>>,
}

/// Holds the daily cumulative totals for reporting and balance checks
///
/// All water amounts are in cm; solute amounts in kg/ha. The totals are
/// accumulated once per accepted timestep (scaled by dt) and reset by the
/// day-advance signal.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DailyTotals {
    /// Rainfall reaching the surface, net of interception (cm)
    pub rainfall: f64,

    /// Canopy interception withheld from rainfall (cm)
    pub interception: f64,

    /// Surface runoff (cm)
    pub runoff: f64,

    /// Water entering the profile across the surface (cm)
    pub infiltration: f64,

    /// Actual evaporation (cm)
    pub evap_actual: f64,

    /// Potential evaporation demand (cm)
    pub evap_potential: f64,

    /// Drainage across the bottom of the column (cm)
    pub drain_bottom: f64,

    /// Flow into the subsurface drains (cm)
    pub subsurface_drain: f64,

    /// Total root water extraction (cm)
    pub uptake_water: f64,

    /// Change of water stored in the profile (cm)
    pub delta_storage: f64,

    /// Change of the surface (pond) store (cm)
    pub delta_pond: f64,

    /// Cumulative water flux per node interface (cm); entry 0 is the surface
    /// and the last entry the column bottom
    pub water_flux: Vec<f64>,

    /// Solute leached across the bottom, per solute (kg/ha)
    pub solute_leached: Vec<f64>,

    /// Solute removed by the subsurface drains, per solute (kg/ha)
    pub solute_drained: Vec<f64>,

    /// Solute exported with surface runoff, per solute (kg/ha)
    pub solute_runoff: Vec<f64>,

    /// Total passive solute uptake, per solute (kg/ha)
    pub solute_uptake: Vec<f64>,

    /// Per-crop uptake totals (sized on first use each day)
    pub crop_uptake: Vec<CropUptakeTotal>,
}

impl DailyTotals {
    /// Allocates a new instance for the given profile and solute counts
    pub fn new(n_layers: usize, n_solutes: usize) -> Self {
        DailyTotals {
            rainfall: 0.0,
            interception: 0.0,
            runoff: 0.0,
            infiltration: 0.0,
            evap_actual: 0.0,
            evap_potential: 0.0,
            drain_bottom: 0.0,
            subsurface_drain: 0.0,
            uptake_water: 0.0,
            delta_storage: 0.0,
            delta_pond: 0.0,
            water_flux: vec![0.0; n_layers + 1],
            solute_leached: vec![0.0; n_solutes],
            solute_drained: vec![0.0; n_solutes],
            solute_runoff: vec![0.0; n_solutes],
            solute_uptake: vec![0.0; n_solutes],
            crop_uptake: Vec::new(),
        }
    }

    /// Zeroes all totals, keeping the array sizes
    pub fn reset(&mut self) {
        self.rainfall = 0.0;
        self.interception = 0.0;
        self.runoff = 0.0;
        self.infiltration = 0.0;
        self.evap_actual = 0.0;
        self.evap_potential = 0.0;
        self.drain_bottom = 0.0;
        self.subsurface_drain = 0.0;
        self.uptake_water = 0.0;
        self.delta_storage = 0.0;
        self.delta_pond = 0.0;
        self.water_flux.iter_mut().for_each(|v| *v = 0.0);
        self.solute_leached.iter_mut().for_each(|v| *v = 0.0);
        self.solute_drained.iter_mut().for_each(|v| *v = 0.0);
        self.solute_runoff.iter_mut().for_each(|v| *v = 0.0);
        self.solute_uptake.iter_mut().for_each(|v| *v = 0.0);
        self.crop_uptake.clear();
    }

    /// Makes sure per-crop totals exist for the given number of crops
    pub fn ensure_crops(&mut self, n_crops: usize, n_layers: usize, n_solutes: usize) {
        while self.crop_uptake.len() < n_crops {
            self.crop_uptake.push(CropUptakeTotal {
                water: vec![0.0; n_layers],
                water_potential: vec![0.0; n_layers],
                solute: vec![vec![0.0; n_layers]; n_solutes],
            });
        }
    }

    /// Returns the water-balance closure error (cm)
    ///
    /// A consistent accounting yields a value near zero: everything that
    /// entered must have left, been extracted, or changed a store.
    pub fn balance_error(&self) -> f64 {
        self.rainfall
            - self.runoff
            - self.evap_actual
            - self.drain_bottom
            - self.subsurface_drain
            - self.uptake_water
            - self.delta_storage
            - self.delta_pond
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
