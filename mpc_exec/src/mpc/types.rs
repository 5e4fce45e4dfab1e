//! MPC input and output types

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::nlp::{Solution, SolveStatus};
use super::MpcError;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// State of the vehicle at the start of a cycle.
///
/// Positions and heading are in the frame the reference coefficients are
/// expressed in, usually the vehicle's own frame so that `x`, `y` and `psi`
/// are zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct VehicleState {
    pub x_m: f64,
    pub y_m: f64,
    pub psi_rad: f64,
    pub v: f64,

    /// Cross-track error, reference path height minus vehicle position.
    pub cte_m: f64,

    /// Heading error, vehicle heading minus reference path heading.
    pub epsi_rad: f64
}

/// Coefficients of the cubic reference path `c0 + c1*x + c2*x^2 + c3*x^3`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RefCoeffs(pub [f64; 4]);

/// Input to one MPC cycle.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputData {
    pub state: VehicleState,
    pub coeffs: RefCoeffs
}

/// Output of one MPC cycle.
#[derive(Debug, Clone)]
pub struct MpcOutput {
    /// First planned steering command.
    pub steer_rad: f64,

    /// First planned acceleration command.
    pub accel: f64,

    /// Predicted positions for timesteps `1..N`.
    pub predicted: Vec<Point2<f64>>,

    /// Whether the solution can be trusted.
    pub outcome: SolveOutcome,

    /// Raw status of the solver.
    pub status: SolveStatus,

    /// Objective value of the solution.
    pub cost: f64
}

/// Status of one MPC cycle, suitable for archiving.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct StatusReport {
    pub outcome: SolveOutcome,
    pub status: SolveStatus,
    pub cost: f64,
    pub constraint_violation: f64,
    pub outer_iterations: usize,
    pub inner_iterations: usize,
    pub solve_time_s: f64
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// How far the result of a solve can be trusted.
///
/// The actuator commands are returned whatever the outcome, it is up to the
/// caller to decide on a fallback when the solve fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SolveOutcome {
    /// The solver converged.
    Converged,

    /// The solver stopped early but the solution is finite and within the
    /// acceptable constraint violation.
    ConvergedWithWarning,

    /// The solution is unusable.
    Failed
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl VehicleState {
    pub fn new(
        x_m: f64,
        y_m: f64,
        psi_rad: f64,
        v: f64,
        cte_m: f64,
        epsi_rad: f64
    ) -> Self {
        Self { x_m, y_m, psi_rad, v, cte_m, epsi_rad }
    }

    /// Build the state from `[x, y, psi, v, cte, epsi]`.
    pub fn from_slice(state: &[f64]) -> Result<Self, MpcError> {
        match *state {
            [x_m, y_m, psi_rad, v, cte_m, epsi_rad] => Ok(Self {
                x_m, y_m, psi_rad, v, cte_m, epsi_rad
            }),
            _ => Err(MpcError::InvalidInputShape {
                what: "vehicle state",
                expected: 6,
                found: state.len()
            })
        }
    }

    /// The state as `[x, y, psi, v, cte, epsi]`.
    pub fn to_array(&self) -> [f64; 6] {
        [self.x_m, self.y_m, self.psi_rad, self.v, self.cte_m, self.epsi_rad]
    }
}

impl RefCoeffs {
    /// Build the coefficients from `[c0, c1, c2, c3]`.
    pub fn from_slice(coeffs: &[f64]) -> Result<Self, MpcError> {
        match *coeffs {
            [c0, c1, c2, c3] => Ok(Self([c0, c1, c2, c3])),
            _ => Err(MpcError::InvalidInputShape {
                what: "reference coefficients",
                expected: 4,
                found: coeffs.len()
            })
        }
    }
}

impl MpcOutput {
    /// Flatten into `[steer, accel, x1, y1, ..., x_{N-1}, y_{N-1}]`.
    pub fn to_vec(&self) -> Vec<f64> {
        let mut v = Vec::with_capacity(2 + 2 * self.predicted.len());
        v.push(self.steer_rad);
        v.push(self.accel);
        for p in self.predicted.iter() {
            v.push(p.x);
            v.push(p.y);
        }
        v
    }
}

impl SolveOutcome {
    /// Classify a solution.
    ///
    /// A successful solve is always `Converged`. Any other status is
    /// `ConvergedWithWarning` if every value is finite and the constraint
    /// violation is within `acceptable_constr_viol_tol`, and `Failed`
    /// otherwise.
    pub fn classify(solution: &Solution, acceptable_constr_viol_tol: f64) -> Self {
        let finite = solution.obj_value.is_finite()
            && solution.x.iter().all(|v| v.is_finite());

        if solution.status.is_success() && finite {
            SolveOutcome::Converged
        }
        else if finite
            && solution.constraint_violation <= acceptable_constr_viol_tol
        {
            SolveOutcome::ConvergedWithWarning
        }
        else {
            SolveOutcome::Failed
        }
    }

    /// Returns true unless the outcome is `Failed`.
    pub fn is_usable(&self) -> bool {
        !matches!(self, SolveOutcome::Failed)
    }
}

impl StatusReport {
    pub(crate) fn from_solution(solution: &Solution, outcome: SolveOutcome) -> Self {
        Self {
            outcome,
            status: solution.status,
            cost: solution.obj_value,
            constraint_violation: solution.constraint_violation,
            outer_iterations: solution.iterations.outer,
            inner_iterations: solution.iterations.inner,
            solve_time_s: solution.solve_time.as_secs_f64()
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::nlp::Iterations;
    use std::time::Duration;

    fn solution(status: SolveStatus, viol: f64, x: Vec<f64>) -> Solution {
        Solution {
            status,
            x,
            obj_value: 1.0,
            constraint_violation: viol,
            iterations: Iterations::default(),
            solve_time: Duration::from_millis(1)
        }
    }

    #[test]
    fn test_from_slice() {
        let s = VehicleState::from_slice(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        assert_eq!(s.to_array(), [1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);

        assert!(matches!(
            VehicleState::from_slice(&[1.0, 2.0]),
            Err(MpcError::InvalidInputShape { expected: 6, found: 2, .. })
        ));

        let c = RefCoeffs::from_slice(&[1.0, 0.0, 0.0, 0.0]).unwrap();
        assert_eq!(c, RefCoeffs([1.0, 0.0, 0.0, 0.0]));

        assert!(matches!(
            RefCoeffs::from_slice(&[1.0, 0.0, 0.0]),
            Err(MpcError::InvalidInputShape { expected: 4, found: 3, .. })
        ));
        assert!(RefCoeffs::from_slice(&[0.0; 5]).is_err());
    }

    #[test]
    fn test_to_vec() {
        let out = MpcOutput {
            steer_rad: 0.1,
            accel: -0.5,
            predicted: vec![Point2::new(1.0, 2.0), Point2::new(3.0, 4.0)],
            outcome: SolveOutcome::Converged,
            status: SolveStatus::Success,
            cost: 0.0
        };

        assert_eq!(out.to_vec(), vec![0.1, -0.5, 1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_classify() {
        let s = solution(SolveStatus::Success, 0.0, vec![0.0]);
        assert_eq!(SolveOutcome::classify(&s, 1e-2), SolveOutcome::Converged);

        let s = solution(SolveStatus::MaxCpuTimeExceeded, 1e-3, vec![0.0]);
        assert_eq!(
            SolveOutcome::classify(&s, 1e-2),
            SolveOutcome::ConvergedWithWarning
        );

        let s = solution(SolveStatus::MaxIterExceeded, 0.5, vec![0.0]);
        assert_eq!(SolveOutcome::classify(&s, 1e-2), SolveOutcome::Failed);

        let s = solution(SolveStatus::NumericalError, 0.0, vec![std::f64::NAN]);
        let outcome = SolveOutcome::classify(&s, 1e-2);
        assert_eq!(outcome, SolveOutcome::Failed);
        assert!(!outcome.is_usable());
    }
}
