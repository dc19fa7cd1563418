//! Makes the most frequently used structures available

pub use crate::base::{
    BottomBoundary, Config, EventLog, ParamDrainage, ParamSoilLayer, ParamSolute, Samples, SolveError, StepFailure,
    TopBoundary,
};
pub use crate::curve::{ConductivityCurve, RetentionCurve};
pub use crate::engine::{
    solve_freundlich, solve_uptake, ColumnSolver, ColumnState, CropSpec, CropUptake, CropWaterConsumer, DailyTotals,
    Diagnostics, Drainage, NodeDump, Profile,
};
pub use crate::StrError;
