use serde::{Deserialize, Serialize};

/// Defines the top (soil surface) boundary condition variant
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum TopBoundary {
    /// Infinite surface conductance: rainfall minus evaporation enters as a
    /// prescribed flux; excess water above saturation leaves as instant runoff
    InfiniteConductance,

    /// Surface ponding with a power-law runoff relation
    ///
    /// Water in excess of infiltration accumulates in a surface store `h` and
    /// leaves as runoff at `coeff · (h - detention)^power` once the store
    /// exceeds the detention depth. The store adds one extra (surface)
    /// equation to the water solve.
    Ponding {
        /// Detention storage that must fill before runoff starts (cm)
        detention: f64,

        /// Runoff rate coefficient (cm^(1-power)/h)
        coeff: f64,

        /// Runoff rate exponent
        power: f64,
    },

    /// Given surface conductance towards an external potential
    Conductance {
        /// Surface conductance (1/h)
        conductance: f64,

        /// External potential (cm)
        psi_external: f64,
    },

    /// Constant matric potential at the surface node (cm)
    ConstantPotential(f64),
}

/// Defines the bottom boundary condition variant
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum BottomBoundary {
    /// Zero potential gradient: purely gravitational outflow (free drainage)
    ZeroGradient,

    /// Constant matric potential below the column (cm)
    ConstantPotential(f64),

    /// No flow across the bottom of the column
    ZeroFlux,

    /// Seepage face: no flow while the bottom node is drier than the given
    /// potential; otherwise drains towards it
    Seepage(f64),

    /// Flux coupled to a water table at the given depth below the surface (cm)
    WaterTable(f64),
}

/// Defines a recoverable failure of one timestep attempt
///
/// These values are absorbed by the timestep controller, which rolls the
/// column state back and retries with a halved timestep. Only exhaustion of
/// the dt floor escalates to a fatal [crate::StrError].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepFailure {
    /// The Newton water-balance iteration exceeded its cap
    WaterNotConverged,

    /// The solute adsorption re-linearization exceeded its cap
    SoluteNotConverged,

    /// The tridiagonal elimination hit a zero pivot
    ZeroPivot,
}

/// Defines the error channel of one timestep attempt
///
/// Retryable faults are ordinary numeric difficulties handled by halving the
/// timestep; fatal faults indicate a modeling or parameter error and abort
/// the run immediately.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SolveError {
    /// Roll back, halve the timestep, and retry
    Retryable(StepFailure),

    /// Abort the whole run for this column
    Fatal(crate::StrError),
}

impl From<StepFailure> for SolveError {
    fn from(failure: StepFailure) -> Self {
        SolveError::Retryable(failure)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
