//! # Nonlinear programming
//!
//! A dense, general purpose constrained NLP solver of the form
//!
//! ```text
//! minimise    f(x)
//! subject to  x_lower <= x    <= x_upper
//!             g_lower <= g(x) <= g_upper
//! ```
//!
//! The cost and constraints are supplied together by an [`FgEval`], which
//! writes `f(x)` into `fg[0]` and `g(x)` into `fg[1..]`. The evaluator is
//! generic over a dual number type so that exact first and second
//! derivatives are computed by forward mode automatic differentiation.
//!
//! Constraint bounds are handled by an augmented Lagrangian method (ALM).
//! Each subproblem is minimised over the variable bounds by a projected
//! Newton method.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod derivatives;
mod options;
mod problem;
mod solver;

// ---------------------------------------------------------------------------
// EXPORTS
// ---------------------------------------------------------------------------

pub use derivatives::{eval_f64, FgHessian, FgJacobian};
pub use options::SolverOptions;
pub use problem::{FeasibilityReport, NlpProblem, Violation, ViolationKind};
pub use solver::solve;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_dual::DualNum;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// Cost and constraint evaluation of an NLP.
///
/// Implementors must be pure: the same `vars` always produce the same `fg`,
/// and only arithmetic and trigonometric operations on `T` may be used so
/// that derivatives propagate through the dual part.
pub trait FgEval {
    /// Evaluate the cost into `fg[0]` and the constraints into `fg[1..]`.
    ///
    /// `fg` has length `1 + n_constraints` and `vars` length `n_vars`.
    fn eval<T: DualNum<f64> + Copy>(&self, fg: &mut [T], vars: &[T]);
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The result of a solve.
///
/// The solution vector is always returned, whatever the status.
#[derive(Debug, Clone)]
pub struct Solution {
    /// Status the solver terminated with.
    pub status: SolveStatus,

    /// Final iterate.
    pub x: Vec<f64>,

    /// Unscaled objective value at `x`.
    pub obj_value: f64,

    /// Largest bound violation of `x` over all variables and constraints.
    pub constraint_violation: f64,

    /// Iteration counts.
    pub iterations: Iterations,

    /// Wall clock time spent in the solver.
    pub solve_time: Duration
}

/// Number of iterations performed by the solver.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Iterations {
    /// Augmented Lagrangian (outer) iterations.
    pub outer: usize,

    /// Total Newton (inner) iterations over all outer iterations.
    pub inner: usize
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Status the solver terminated with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SolveStatus {
    /// Converged to a point satisfying the optimality and feasibility
    /// tolerances.
    Success,

    /// The outer or inner iteration limit was reached.
    MaxIterExceeded,

    /// The time budget was exhausted.
    MaxCpuTimeExceeded,

    /// A non-finite value was produced during the solve.
    NumericalError
}

/// Errors which prevent a solve from being attempted.
#[derive(Debug, Error)]
pub enum NlpError {
    #[error("Dimension mismatch for {what}: expected {expected}, found {found}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        found: usize
    },

    #[error("Lower bound {lower} is above upper bound {upper} for {what} {index}")]
    InvertedBounds {
        what: &'static str,
        index: usize,
        lower: f64,
        upper: f64
    },

    #[error("Expected at least one variable and one constraint, found {n_vars} and {n_constraints}")]
    EmptyProblem {
        n_vars: usize,
        n_constraints: usize
    },

    #[error("Invalid solver options: {0}")]
    InvalidOptions(String)
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SolveStatus {
    /// Returns true if the solve converged.
    pub fn is_success(&self) -> bool {
        matches!(self, SolveStatus::Success)
    }
}
