//! Simulation parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Deserialize;

// Internal
use super::PlantState;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters of the closed-loop simulation.
#[derive(Deserialize, Debug, Clone)]
pub struct Params {
    /// Number of control cycles to run.
    pub num_cycles: usize,

    /// Period of one control cycle. The plant is integrated over this
    /// duration with the first commands of each plan.
    pub cycle_period_s: f64,

    /// If true each cycle is padded with a sleep to hold the cycle period.
    pub realtime: bool,

    /// Euler integration step of the plant.
    pub plant_step_s: f64,

    /// State of the plant at the start of the run.
    pub initial_state: PlantState,

    /// Coefficients of the global reference path `y = f(x)`, lowest power
    /// first.
    pub path_coeffs: [f64; 4],

    /// Number of path points sampled ahead of the vehicle for the local fit.
    pub fit_num_points: usize,

    /// Spacing of the sampled path points along the global x axis.
    pub fit_spacing_m: f64
}
