//! Problem building and result extraction

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::trace;
use nalgebra::Point2;

use crate::nlp::{NlpProblem, Solution};
use super::{
    Layout, MpcError, MpcFgEval, MpcOutput, Params, RefCoeffs, SolveOutcome,
    VehicleState
};

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Build the NLP for one cycle.
///
/// The initial guess is zero apart from the first timestep of each state
/// block, which holds the measured state. State variables are unbounded,
/// steering and acceleration are limited symmetrically. Every constraint is
/// bound to zero apart from the initial conditions, which are bound to the
/// measured state.
pub fn build_problem(
    params: &Params,
    state: &VehicleState,
    coeffs: &RefCoeffs
) -> Result<(NlpProblem, MpcFgEval), MpcError> {
    let l = Layout::new(params.horizon);
    let n_vars = l.n_vars();
    let n_constraints = l.n_constraints();

    trace!(
        "Building MPC problem: N = {}, {} variables, {} constraints",
        l.n, n_vars, n_constraints
    );

    let measured = state.to_array();

    // Initial guess
    let mut x0 = vec![0.0; n_vars];
    for (&start, &value) in l.state_starts().iter().zip(measured.iter()) {
        x0[start] = value;
    }

    // Variable bounds
    let mut x_lower = vec![-params.unbounded; n_vars];
    let mut x_upper = vec![params.unbounded; n_vars];
    for i in l.delta_start..l.a_start {
        x_lower[i] = -params.max_steer_rad;
        x_upper[i] = params.max_steer_rad;
    }
    for i in l.a_start..n_vars {
        x_lower[i] = -params.max_accel;
        x_upper[i] = params.max_accel;
    }

    // Constraint bounds
    let mut g_lower = vec![0.0; n_constraints];
    let mut g_upper = vec![0.0; n_constraints];
    for (&start, &value) in l.state_starts().iter().zip(measured.iter()) {
        g_lower[start] = value;
        g_upper[start] = value;
    }

    let problem = NlpProblem::new(x0, x_lower, x_upper, g_lower, g_upper)?;

    Ok((problem, MpcFgEval::new(params, coeffs)))
}

/// Extract the first actuator pair and the predicted trajectory from a
/// solution.
///
/// The values are taken from the solution vector whatever the solver status.
pub fn extract_output(
    layout: &Layout,
    solution: &Solution,
    outcome: SolveOutcome
) -> Result<MpcOutput, MpcError> {
    let x = &solution.x;

    if x.len() != layout.n_vars() {
        return Err(MpcError::InvalidSolutionShape {
            expected: layout.n_vars(),
            found: x.len()
        })
    }

    let predicted = (1..layout.n)
        .map(|t| Point2::new(x[layout.x_start + t], x[layout.y_start + t]))
        .collect();

    Ok(MpcOutput {
        steer_rad: x[layout.delta_start],
        accel: x[layout.a_start],
        predicted,
        outcome,
        status: solution.status,
        cost: solution.obj_value
    })
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
