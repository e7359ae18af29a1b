//! Math helpers and tunables shared between the simulation and its front-ends.

pub mod config;
pub mod math;
