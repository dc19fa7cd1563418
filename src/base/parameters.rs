use serde::{Deserialize, Serialize};

/// Holds parameters for one soil layer
///
/// Water contents are volumetric fractions; conductivities are in mm/day as
/// commonly reported, and are converted internally to cm/h.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ParamSoilLayer {
    /// Layer thickness (cm); zero is allowed and marks a material boundary
    /// (the node pair sharing a depth is merged during the solve)
    pub dx: f64,

    /// Dry bulk density (g/cm³)
    pub bulk_density: f64,

    /// Volumetric water content at the 15-bar lower limit
    pub ll15: f64,

    /// Volumetric water content at the drained upper limit
    pub dul: f64,

    /// Volumetric water content at saturation
    pub sat: f64,

    /// Saturated hydraulic conductivity (mm/day)
    pub ks: f64,
}

/// Holds parameters for one solute species
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParamSolute {
    /// Solute name (reporting only)
    pub name: String,

    /// Freundlich exchange coefficient per layer (cm³/g)
    pub exco: Vec<f64>,

    /// Freundlich exponent per layer
    pub fip: Vec<f64>,

    /// Dispersivity (cm)
    pub dispersivity: f64,

    /// Molecular diffusion coefficient in water (cm²/h)
    pub diffusion: f64,

    /// Concentration in groundwater below the column (mg/cm³); used by the
    /// water-table bottom boundary closure
    pub cslgw: f64,

    /// Initial amount per layer (kg/ha)
    pub initial_amount: Vec<f64>,
}

/// Holds parameters for subsurface (tile) drainage
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ParamDrainage {
    /// Depth of the drains below the surface (cm)
    pub drain_depth: f64,

    /// Horizontal spacing between drains (cm)
    pub drain_spacing: f64,

    /// Effective drain radius (cm)
    pub drain_radius: f64,

    /// Depth of the impermeable layer below the surface (cm)
    pub imperm_depth: f64,

    /// Lateral saturated conductivity (mm/day)
    pub klat: f64,
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
