//! # MPC library.
//!
//! This library allows other crates in the workspace, the executable and the
//! benchmarks to access items defined inside the MPC crate.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Model predictive control module - plans steering and acceleration commands over a short horizon
pub mod mpc;

/// Nonlinear programming - the constrained solver the MPC problem is handed to
pub mod nlp;

/// Simulation - kinematic plant and reference path used to close the loop
pub mod sim;
