//! Solver options

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

use super::NlpError;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Options controlling the NLP solver.
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct SolverOptions {
    /// Verbosity of the per-solve statistics.
    ///
    /// 0 is silent, 1 logs a summary at DEBUG, 2 and above add the solver
    /// details at TRACE.
    pub print_level: u8,

    /// Wall clock budget for a single solve.
    pub max_cpu_time_s: f64,

    /// Final optimality tolerance of the inner solver, on the projected
    /// gradient of the augmented Lagrangian.
    pub tol: f64,

    /// Inner optimality tolerance of the first outer iteration.
    pub initial_inner_tol: f64,

    /// Factor the inner tolerance is multiplied by after each outer
    /// iteration, down to `tol`.
    pub inner_tol_update_factor: f64,

    /// Constraint violation tolerance for a converged solve.
    pub constr_viol_tol: f64,

    /// Constraint violation below which a non-converged solution is still
    /// considered usable.
    pub acceptable_constr_viol_tol: f64,

    /// Maximum number of augmented Lagrangian iterations.
    pub max_outer_iterations: usize,

    /// Maximum number of inner iterations per outer iteration.
    pub max_inner_iterations: usize,

    /// Initial penalty parameter of the augmented Lagrangian.
    pub initial_penalty: f64,

    /// Factor the penalty is multiplied by when the infeasibility does not
    /// decrease fast enough.
    pub penalty_update_factor: f64,

    /// The objective is scaled down so that the largest entry of its gradient
    /// at the initial guess is at most this value.
    pub nlp_scaling_max_gradient: f64
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            print_level: 0,
            max_cpu_time_s: 0.5,
            tol: 1e-4,
            initial_inner_tol: 1e-1,
            inner_tol_update_factor: 1e-1,
            constr_viol_tol: 1e-4,
            acceptable_constr_viol_tol: 1e-2,
            max_outer_iterations: 50,
            max_inner_iterations: 100,
            initial_penalty: 10.0,
            penalty_update_factor: 5.0,
            nlp_scaling_max_gradient: 100.0
        }
    }
}

impl SolverOptions {
    /// Check the options are usable by the solver.
    pub fn validate(&self) -> Result<(), NlpError> {
        let positive = [
            ("max_cpu_time_s", self.max_cpu_time_s),
            ("tol", self.tol),
            ("initial_inner_tol", self.initial_inner_tol),
            ("constr_viol_tol", self.constr_viol_tol),
            ("acceptable_constr_viol_tol", self.acceptable_constr_viol_tol),
            ("initial_penalty", self.initial_penalty),
            ("nlp_scaling_max_gradient", self.nlp_scaling_max_gradient)
        ];

        for (name, value) in positive.iter() {
            if !(value.is_finite() && *value > 0.0) {
                return Err(NlpError::InvalidOptions(format!(
                    "{} must be positive and finite, found {}", name, value
                )))
            }
        }

        if !(self.penalty_update_factor > 1.0) {
            return Err(NlpError::InvalidOptions(format!(
                "penalty_update_factor must be greater than 1, found {}",
                self.penalty_update_factor
            )))
        }

        if !(self.inner_tol_update_factor > 0.0 && self.inner_tol_update_factor <= 1.0) {
            return Err(NlpError::InvalidOptions(format!(
                "inner_tol_update_factor must be in (0, 1], found {}",
                self.inner_tol_update_factor
            )))
        }

        if self.max_outer_iterations == 0 || self.max_inner_iterations == 0 {
            return Err(NlpError::InvalidOptions(String::from(
                "iteration limits must be non-zero"
            )))
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_validate() {
        assert!(SolverOptions::default().validate().is_ok());

        let opts = SolverOptions {
            max_cpu_time_s: 0.0,
            ..Default::default()
        };
        assert!(opts.validate().is_err());

        let opts = SolverOptions {
            penalty_update_factor: 1.0,
            ..Default::default()
        };
        assert!(opts.validate().is_err());

        let opts = SolverOptions {
            max_inner_iterations: 0,
            ..Default::default()
        };
        assert!(opts.validate().is_err());

        let opts = SolverOptions {
            inner_tol_update_factor: 1.5,
            ..Default::default()
        };
        assert!(opts.validate().is_err());
    }
}
