//! Implements the base structures for a soil column simulation

mod config;
mod constants;
mod enums;
mod events;
mod parameters;
mod samples;
pub use crate::base::config::*;
pub use crate::base::constants::*;
pub use crate::base::enums::*;
pub use crate::base::events::*;
pub use crate::base::parameters::*;
pub use crate::base::samples::*;
