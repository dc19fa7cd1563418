/// Defines the matric potential at the drained upper limit breakpoint origin (cm)
///
/// The first retention spline segment spans psi = -1 to the reference potential.
pub const PSI_WET: f64 = -1.0;

/// Defines the matric potential at the 15-bar lower limit (cm)
pub const PSI_LL15: f64 = -15000.0;

/// Defines the matric potential at oven dryness (cm)
pub const PSI_ZERO: f64 = -1e7;

/// Defines the conductivity floor returned for non-positive saturation
pub const K_FLOOR: f64 = 1e-100;

/// Defines the factor converting mm/day to cm/h
pub const MM_PER_DAY_TO_CM_PER_H: f64 = 240.0;

/// Defines the factor converting kg/ha to mg/cm²
pub const KG_PER_HA_TO_MG_PER_CM2: f64 = 0.01;

/// Defines the scale (cm) of the sinh branch of the potential transform
pub const PSI_SCALE: f64 = 100.0;

/// Defines the smallest allowed dt_min (h)
pub const MIN_DT_MIN: f64 = 1e-8;

/// Defines the node distance below which an adjacent pair is merged (cm)
pub const DUP_DISTANCE: f64 = 1e-9;

/// Defines the maximum number of iterations for the retention-curve inversion
pub const SUCTION_MAX_IT: usize = 1000;

/// Defines the tolerance for the retention-curve inversion
pub const SUCTION_TOL: f64 = 1e-9;

/// Defines the finite-difference step (in log10(-psi)) for the curve inversion
pub const SUCTION_D_PF: f64 = 0.01;

/// Defines the maximum number of iterations for the Freundlich root solve
pub const FREUNDLICH_MAX_IT: usize = 1000;

/// Defines the tolerance for the Freundlich root solve
pub const FREUNDLICH_TOL: f64 = 1e-10;

/// Defines the finite-difference step (cm) for the drainage flux derivative
pub const DRAIN_D_PSI: f64 = 0.01;

/// Defines the concentration below which a negative value is a fatal fault (mg/cm³)
pub const NEGATIVE_CONC_FATAL: f64 = 1e-3;

/// Defines the concentration above which a negative value is clamped with a warning (mg/cm³)
pub const NEGATIVE_CONC_WARN: f64 = 1e-8;
