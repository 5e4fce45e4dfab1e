//! Kinematic bicycle plant

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::{Isometry2, Point2, Vector2};
use serde::{Deserialize, Serialize};

use super::SimError;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Pose and speed of the simulated vehicle in the global frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PlantState {
    pub x_m: f64,
    pub y_m: f64,
    pub psi_rad: f64,
    pub v: f64
}

/// A vehicle following the kinematic bicycle model.
#[derive(Debug, Clone)]
pub struct KinematicPlant {
    pub state: PlantState,
    lf_m: f64
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PlantState {
    /// Transform from the vehicle frame to the global frame.
    pub fn to_global(&self) -> Isometry2<f64> {
        Isometry2::new(Vector2::new(self.x_m, self.y_m), self.psi_rad)
    }

    /// Express a global point in the vehicle frame.
    pub fn global_to_local(&self, point: &Point2<f64>) -> Point2<f64> {
        self.to_global().inverse_transform_point(point)
    }

    /// Express a vehicle frame point in the global frame.
    pub fn local_to_global(&self, point: &Point2<f64>) -> Point2<f64> {
        self.to_global().transform_point(point)
    }

    fn is_finite(&self) -> bool {
        self.x_m.is_finite()
            && self.y_m.is_finite()
            && self.psi_rad.is_finite()
            && self.v.is_finite()
    }
}

impl KinematicPlant {
    pub fn new(state: PlantState, lf_m: f64) -> Self {
        Self { state, lf_m }
    }

    /// Hold the given commands for `duration_s`, integrating with Euler steps
    /// of at most `step_s`.
    pub fn step(
        &mut self,
        steer_rad: f64,
        accel: f64,
        duration_s: f64,
        step_s: f64
    ) -> Result<(), SimError> {
        let mut remaining = duration_s;

        // A non-positive step integrates the whole duration at once
        let step_s = if step_s > 0.0 { step_s } else { duration_s };

        while remaining > 0.0 {
            let dt = remaining.min(step_s);
            let s = self.state;

            self.state = PlantState {
                x_m: s.x_m + s.v * s.psi_rad.cos() * dt,
                y_m: s.y_m + s.v * s.psi_rad.sin() * dt,
                psi_rad: s.psi_rad + s.v * steer_rad / self.lf_m * dt,
                v: s.v + accel * dt
            };

            remaining -= dt;
        }

        if self.state.is_finite() {
            Ok(())
        }
        else {
            Err(SimError::NonFiniteState(self.state))
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
