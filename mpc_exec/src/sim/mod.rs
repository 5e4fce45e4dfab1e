//! # Closed-loop simulation
//!
//! A kinematic bicycle plant and a global reference path, used to run the
//! controller in closed loop. Each cycle the path ahead of the vehicle is
//! sampled, transformed into the vehicle's frame and fitted with a cubic,
//! giving the reference coefficients and tracking errors the controller
//! expects.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;
mod path;
mod plant;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

pub use params::*;
pub use path::*;
pub use plant::*;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur during simulation.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error("At least {min} points are needed to fit the reference, found {found}")]
    NotEnoughPoints {
        min: usize,
        found: usize
    },

    #[error("Could not fit the reference polynomial: {0}")]
    FitFailed(&'static str),

    #[error("The plant state is not finite: {0:?}")]
    NonFiniteState(PlantState)
}
