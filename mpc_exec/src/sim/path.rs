//! Global reference path and local polynomial fitting

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::{DMatrix, DVector, Point2};
use util::maths::{poly_deriv_eval, poly_eval, wrap_to_pi};

use crate::mpc::{RefCoeffs, VehicleState};
use super::{PlantState, SimError};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Number of coefficients of the fitted reference.
const NUM_COEFFS: usize = 4;

/// Singular values below this are treated as zero when fitting.
const FIT_SVD_EPS: f64 = 1e-12;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A reference path `y = f(x)` in the global frame.
#[derive(Debug, Clone)]
pub struct RefPath {
    coeffs: Vec<f64>
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl RefPath {
    /// Create a path from its polynomial coefficients, lowest power first.
    pub fn new(coeffs: &[f64]) -> Self {
        Self {
            coeffs: coeffs.to_vec()
        }
    }

    /// Height of the path at `x`.
    pub fn height(&self, x: f64) -> f64 {
        poly_eval(&self.coeffs, x)
    }

    /// Heading of the path tangent at `x`.
    pub fn heading(&self, x: f64) -> f64 {
        poly_deriv_eval(&self.coeffs, x).atan()
    }

    /// Cross-track and heading error of the vehicle, measured in the global
    /// frame.
    pub fn tracking_errors(&self, state: &PlantState) -> (f64, f64) {
        (
            self.height(state.x_m) - state.y_m,
            wrap_to_pi(state.psi_rad - self.heading(state.x_m))
        )
    }

    /// Points on the path ahead of the vehicle, in the vehicle frame.
    ///
    /// Starting level with the vehicle, `num_points` points are taken
    /// `spacing_m` apart along the path, walking in whichever direction along
    /// x the vehicle faces.
    pub fn sample_ahead(
        &self,
        state: &PlantState,
        num_points: usize,
        spacing_m: f64
    ) -> Vec<Point2<f64>> {
        let dir = if (state.psi_rad - self.heading(state.x_m)).cos() >= 0.0 {
            1.0
        }
        else {
            -1.0
        };

        let mut x = state.x_m;
        let mut points = Vec::with_capacity(num_points);

        for _ in 0..num_points {
            points.push(state.global_to_local(&Point2::new(x, self.height(x))));

            // Arc length step
            let slope = poly_deriv_eval(&self.coeffs, x);
            x += dir * spacing_m / (1.0 + slope * slope).sqrt();
        }

        points
    }

    /// Fit the path ahead of the vehicle in the vehicle's frame.
    ///
    /// The points from [`RefPath::sample_ahead`] are fitted with a cubic. In
    /// the vehicle frame the vehicle is at the origin facing along x, so the
    /// returned state has zero position and heading, a cross-track error
    /// equal to the fit's value at zero, and a heading error of minus the
    /// fit's tangent angle at zero.
    pub fn local_reference(
        &self,
        state: &PlantState,
        num_points: usize,
        spacing_m: f64
    ) -> Result<(VehicleState, RefCoeffs), SimError> {
        let local = self.sample_ahead(state, num_points, spacing_m);

        let coeffs = polyfit(&local)?;

        let vehicle_state = VehicleState::new(
            0.0,
            0.0,
            0.0,
            state.v,
            poly_eval(&coeffs, 0.0),
            -poly_deriv_eval(&coeffs, 0.0).atan()
        );

        Ok((vehicle_state, RefCoeffs(coeffs)))
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Least squares cubic fit through the given points, lowest power first.
pub fn polyfit(points: &[Point2<f64>]) -> Result<[f64; NUM_COEFFS], SimError> {
    if points.len() < NUM_COEFFS {
        return Err(SimError::NotEnoughPoints {
            min: NUM_COEFFS,
            found: points.len()
        })
    }

    // Vandermonde matrix
    let a = DMatrix::from_fn(points.len(), NUM_COEFFS, |r, c| {
        points[r].x.powi(c as i32)
    });
    let b = DVector::from_iterator(points.len(), points.iter().map(|p| p.y));

    let sol = a.svd(true, true)
        .solve(&b, FIT_SVD_EPS)
        .map_err(SimError::FitFailed)?;

    let mut coeffs = [0.0; NUM_COEFFS];
    for (c, s) in coeffs.iter_mut().zip(sol.iter()) {
        *c = *s;
    }

    Ok(coeffs)
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
