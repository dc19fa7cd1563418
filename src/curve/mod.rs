//! Implements the per-layer water-retention and conductivity characteristic curves

mod conductivity;
mod retention;
pub use crate::curve::conductivity::*;
pub use crate::curve::retention::*;
