//! # Model predictive control module
//!
//! Every cycle the controller plans a short horizon of steering and
//! acceleration commands for a vehicle following a reference path, and
//! outputs the first pair of commands along with the predicted trajectory.
//!
//! The plan is found by solving a nonlinear program whose decision vector
//! holds the predicted state trajectory `(x, y, psi, v, cte, epsi)` for `N`
//! timesteps followed by `N - 1` steering and acceleration commands. The
//! kinematic bicycle model is imposed as equality constraints between
//! consecutive states, and the first state is pinned to the measured one.
//! The reference path is a cubic polynomial `y = f(x)` in the same frame as
//! the state, normally the vehicle's own frame.
//!
//! Nothing is carried over between cycles: the problem, its initial guess,
//! and its evaluator are built afresh each time. A cycle which does not
//! converge still returns its commands, tagged with a [`SolveOutcome`] so
//! that the caller can decide whether to trust them.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod builder;
mod fg_eval;
mod layout;
mod params;
mod state;
mod types;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use builder::*;
pub use fg_eval::*;
pub use layout::*;
pub use params::*;
pub use state::*;
pub use types::*;

use crate::nlp::NlpError;
use util::{archive::ArchiveError, params::LoadError};

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur during MpcCtrl operation.
#[derive(Debug, thiserror::Error)]
pub enum MpcError {
    #[error("Invalid input shape for {what}: expected {expected} values, found {found}")]
    InvalidInputShape {
        what: &'static str,
        expected: usize,
        found: usize
    },

    #[error("Solver returned a solution of length {found}, expected {expected}")]
    InvalidSolutionShape {
        expected: usize,
        found: usize
    },

    #[error("Could not load the MPC parameters: {0}")]
    ParamsLoad(#[from] LoadError),

    #[error("Invalid MPC parameters: {0}")]
    InvalidParams(#[from] ParamsError),

    #[error("Could not set up the MPC archives: {0}")]
    Archive(#[from] ArchiveError),

    #[error("Could not solve the MPC problem: {0}")]
    Nlp(#[from] NlpError)
}

/// Reasons a set of parameters is rejected.
#[derive(Debug, thiserror::Error)]
pub enum ParamsError {
    #[error("The horizon must have at least 2 timesteps, found {0}")]
    HorizonTooShort(usize),

    #[error("Parameter {0} must be positive and finite, found {1}")]
    NotPositive(&'static str, f64),

    #[error("Parameter {0} must be finite, found {1}")]
    NotFinite(&'static str, f64),

    #[error("Cost weight {0} must be non-negative and finite, found {1}")]
    NegativeWeight(&'static str, f64),

    #[error("Invalid solver options: {0}")]
    Solver(NlpError)
}
