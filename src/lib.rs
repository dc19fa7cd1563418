//! swsim — one-dimensional soil water and solute transport simulator
//!
//! This crate implements a numerical integrator for Richards' equation in a
//! vertical soil column, coupled with convection-dispersion solute transport,
//! root-water extraction, surface ponding/runoff, and subsurface (tile)
//! drainage. The main components are:
//!
//! * [base] -- parameters, configuration, boundary-condition variants, and
//!   piecewise-linear forcing event logs
//! * [curve] -- per-layer water-retention and hydraulic-conductivity
//!   characteristic curves built from a few calibration points
//! * [engine] -- the column state, the Newton-Raphson water-balance solver,
//!   the solute transport solver, root uptake, drainage, and the adaptive
//!   timestep controller with rollback-and-retry

/// Defines a type alias for the error type as a static string
pub type StrError = &'static str;

pub mod base;
pub mod curve;
pub mod engine;
pub mod prelude;
