//! Augmented Lagrangian solver
//!
//! The constraints `g_lower <= g(x) <= g_upper` are moved into the cost with
//! an augmented Lagrangian
//!
//! ```text
//! psi(x; c, y) = s*f(x) + c/2 * dist^2(g(x) + y/c, [g_lower, g_upper])
//! ```
//!
//! which is minimised over the variable bounds by a projected Newton method,
//! updating the multipliers `y` and penalty `c` between outer iterations.
//! `s` is a constant objective scale chosen at the initial guess.
//!
//! The Newton step uses the exact Hessian of `psi`. Far from feasibility the
//! constraint curvature weighted by the shifted residuals can make it
//! indefinite, the step then falls back to the Gauss-Newton part of the
//! Hessian, regularised until it is positive definite.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::{debug, trace};
use nalgebra::{linalg::Cholesky, DMatrix, DVector};
use optimization_engine::constraints::{Constraint, Rectangle};
use std::iter;
use std::time::Instant;
use util::maths::clamp;

use super::{
    eval_f64, FgEval, FgHessian, FgJacobian, Iterations, NlpError, NlpProblem,
    Solution, SolveStatus, SolverOptions
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Radius of the box the Lagrange multipliers are kept in.
const MULTIPLIER_BOUND: f64 = 1e12;

/// Largest penalty parameter.
const MAX_PENALTY: f64 = 1e12;

/// The penalty is increased unless the constraint violation drops by at
/// least this factor over an outer iteration.
const SUFFICIENT_DECREASE: f64 = 0.1;

/// Armijo coefficient of the projected line search.
const ARMIJO_COEFF: f64 = 1e-4;

/// Number of step halvings before the line search gives up.
const MAX_LINE_SEARCH_STEPS: usize = 40;

/// Largest distance from a bound at which a variable is held on it.
const ACTIVE_SET_EPS: f64 = 1e-3;

/// First regularisation added to an indefinite Hessian, relative to its
/// largest diagonal entry.
const INITIAL_REGULARISATION: f64 = 1e-8;

/// Number of tenfold regularisation increases before falling back to
/// steepest descent.
const MAX_REGULARISATION_STEPS: usize = 30;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The augmented Lagrangian of a problem, for the current multipliers and
/// penalty.
struct AugLagrangian<'a, E> {
    eval: &'a E,
    problem: &'a NlpProblem,

    x_box: Rectangle<'a>,
    set_c: Rectangle<'a>,

    /// Objective scale.
    scale: f64,

    /// Lagrange multipliers of the constraints.
    y: Vec<f64>,

    /// Penalty parameter.
    c: f64,

    jac: FgJacobian,
    hess: FgHessian,
    fg: Vec<f64>
}

/// Wall clock budget of a solve.
#[derive(Debug, Clone, Copy)]
struct Budget {
    start: Instant,
    limit_s: f64
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// How a minimisation of the augmented Lagrangian ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InnerExit {
    Converged,
    MaxIterations,
    LineSearchFailed,
    OutOfTime,
    NonFinite
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Solve the problem starting from its initial guess.
///
/// A solve which does not converge is not an error, the final iterate is
/// returned with the matching [`SolveStatus`]. Errors are only returned if the
/// problem or options are unusable.
pub fn solve<E: FgEval>(
    options: &SolverOptions,
    problem: &NlpProblem,
    eval: &E
) -> Result<Solution, NlpError> {
    options.validate()?;

    let n = problem.n_vars();
    let n1 = problem.n_constraints();

    if n == 0 || n1 == 0 {
        return Err(NlpError::EmptyProblem {
            n_vars: n,
            n_constraints: n1
        })
    }

    let budget = Budget {
        start: Instant::now(),
        limit_s: options.max_cpu_time_s
    };

    let x_box = Rectangle::new(Some(problem.x_lower()), Some(problem.x_upper()));
    let mut x = problem.x0().to_vec();
    x_box.project(&mut x);

    // ---- OBJECTIVE SCALING ----

    let mut jac = FgJacobian::new(n, n1);
    jac.update(eval, &x);
    let scale = objective_scale(
        jac.cost_gradient_inf_norm(),
        options.nlp_scaling_max_gradient
    );

    let hess = FgHessian::new(eval, n, n1);

    if options.print_level >= 2 {
        trace!(
            "NLP with {} variables, {} constraints and {} Hessian entries, \
             objective scale {:e}",
            n, n1, hess.num_pairs(), scale
        );
    }

    let mut alm = AugLagrangian {
        eval,
        problem,
        x_box,
        set_c: Rectangle::new(Some(problem.g_lower()), Some(problem.g_upper())),
        scale,
        y: vec![0.0; n1],
        c: options.initial_penalty,
        jac,
        hess,
        fg: vec![0.0; 1 + n1]
    };

    // ---- OUTER ITERATIONS ----

    let mut status = SolveStatus::MaxIterExceeded;
    let mut iterations = Iterations::default();
    let mut inner_tol = options.initial_inner_tol;
    let mut prev_violation = std::f64::INFINITY;
    let mut fg = vec![0.0; 1 + n1];

    while iterations.outer < options.max_outer_iterations {
        iterations.outer += 1;

        let tol = inner_tol.max(options.tol);
        let (exit, num_inner) = alm.minimise(
            &mut x,
            tol,
            options.max_inner_iterations,
            &budget
        );
        iterations.inner += num_inner;

        eval_f64(eval, &x, &mut fg);
        let violation = problem.max_violation(&x, &fg[1..]);

        if options.print_level >= 2 {
            trace!(
                "    outer {}: {:?} after {} inner at tol {:e}, penalty {:e}, \
                 violation {:e}",
                iterations.outer, exit, num_inner, tol, alm.c, violation
            );
        }

        match exit {
            InnerExit::OutOfTime => {
                status = SolveStatus::MaxCpuTimeExceeded;
                break
            },
            InnerExit::NonFinite => {
                status = SolveStatus::NumericalError;
                break
            },
            _ => ()
        }

        if exit == InnerExit::Converged
            && inner_tol <= options.tol
            && violation <= options.constr_viol_tol
        {
            status = SolveStatus::Success;
            break
        }

        alm.update_multipliers(&fg[1..]);

        if !(violation <= SUFFICIENT_DECREASE * prev_violation) {
            alm.c = (alm.c * options.penalty_update_factor).min(MAX_PENALTY);
        }
        prev_violation = violation;
        inner_tol *= options.inner_tol_update_factor;
    }

    // ---- BUILD SOLUTION ----

    eval_f64(eval, &x, &mut fg);
    let constraint_violation = problem.max_violation(&x, &fg[1..]);

    if !x.iter().chain(fg.iter()).all(|v| v.is_finite()) {
        status = SolveStatus::NumericalError;
    }

    let solution = Solution {
        status,
        x,
        obj_value: fg[0],
        constraint_violation,
        iterations,
        solve_time: budget.start.elapsed()
    };

    if options.print_level >= 1 {
        debug!(
            "NLP solve: {:?} in {:.3} ms, cost {:.6e}, max violation {:.3e}, \
             {} outer / {} inner iterations",
            solution.status,
            solution.solve_time.as_secs_f64() * 1e3,
            solution.obj_value,
            solution.constraint_violation,
            solution.iterations.outer,
            solution.iterations.inner
        );
    }

    Ok(solution)
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Budget {
    fn is_exhausted(&self) -> bool {
        self.start.elapsed().as_secs_f64() >= self.limit_s
    }
}

impl<'a, E: FgEval> AugLagrangian<'a, E> {
    /// Minimise over the variable bounds, starting from and updating `x`.
    ///
    /// Returns how the minimisation ended and the number of Newton steps
    /// taken.
    fn minimise(
        &mut self,
        x: &mut Vec<f64>,
        tol: f64,
        max_iterations: usize,
        budget: &Budget
    ) -> (InnerExit, usize) {
        let n = x.len();
        let mut h_cost = DMatrix::zeros(n, n);
        let mut h_cons = DMatrix::zeros(n, n);
        let mut num_iters = 0;

        loop {
            if budget.is_exhausted() {
                return (InnerExit::OutOfTime, num_iters)
            }

            self.jac.update(self.eval, x);
            if !self.jac.is_finite() {
                return (InnerExit::NonFinite, num_iters)
            }

            let (shifted, dist) = self.shifted_distance(self.jac.constraints());
            let grad = self.gradient(&dist);
            let pg_norm = self.projected_gradient_norm(x, &grad);

            if !pg_norm.is_finite() {
                return (InnerExit::NonFinite, num_iters)
            }
            if pg_norm <= tol {
                return (InnerExit::Converged, num_iters)
            }
            if num_iters >= max_iterations {
                return (InnerExit::MaxIterations, num_iters)
            }
            num_iters += 1;

            // ---- HESSIAN ----

            let weights: Vec<f64> = iter::once(self.scale)
                .chain(dist.iter().map(|d| self.c * d))
                .collect();
            self.hess.update(self.eval, x, &weights, &mut h_cost, &mut h_cons);

            // Gauss-Newton part of the penalty, from the constraints whose
            // shifted value is on or outside of its bounds
            let mut jac_active = self.jac.constraint_jacobian();
            let (g_lower, g_upper) = (self.problem.g_lower(), self.problem.g_upper());
            for (k, z) in shifted.iter().enumerate() {
                if *z > g_lower[k] && *z < g_upper[k] {
                    jac_active.row_mut(k).fill(0.0);
                }
            }
            h_cost += jac_active.tr_mul(&jac_active) * self.c;

            if !(h_cost.iter().chain(h_cons.iter()).all(|v| v.is_finite())) {
                return (InnerExit::NonFinite, num_iters)
            }

            // ---- STEP ----

            let dir = self.newton_direction(x, &grad, pg_norm, &h_cost, &h_cons);

            match self.line_search(x, &grad, &dir) {
                Some(x_new) => *x = x_new,
                None => return (InnerExit::LineSearchFailed, num_iters)
            }
        }
    }

    /// Update the multipliers from the constraint values at the end of a
    /// minimisation.
    fn update_multipliers(&mut self, g: &[f64]) {
        let (_, dist) = self.shifted_distance(g);
        let c = self.c;

        for (y, d) in self.y.iter_mut().zip(dist.iter()) {
            *y = clamp(c * d, -MULTIPLIER_BOUND, MULTIPLIER_BOUND);
        }
    }

    /// Value of the augmented Lagrangian at `x`.
    fn value(&mut self, x: &[f64]) -> f64 {
        eval_f64(self.eval, x, &mut self.fg);

        let (_, dist) = self.shifted_distance(&self.fg[1..]);

        self.scale * self.fg[0]
            + 0.5 * self.c * dist.iter().map(|d| d * d).sum::<f64>()
    }

    /// Shifted constraint values `g + y/c`, and their signed distances to the
    /// constraint bounds.
    fn shifted_distance(&self, g: &[f64]) -> (Vec<f64>, Vec<f64>) {
        let shifted: Vec<f64> = g.iter()
            .zip(self.y.iter())
            .map(|(g, y)| g + y / self.c)
            .collect();

        let mut proj = shifted.clone();
        self.set_c.project(&mut proj);

        let dist = shifted.iter()
            .zip(proj.iter())
            .map(|(z, p)| z - p)
            .collect();

        (shifted, dist)
    }

    /// Gradient of the augmented Lagrangian from the current Jacobian.
    fn gradient(&self, dist: &[f64]) -> Vec<f64> {
        (0..self.problem.n_vars())
            .map(|i| {
                let col = self.jac.column(i);
                self.scale * col[0]
                    + self.c * dist.iter()
                        .zip(col[1..].iter())
                        .map(|(d, dg)| d * dg)
                        .sum::<f64>()
            })
            .collect()
    }

    /// Largest entry of `x - P(x - grad)`, zero at a stationary point.
    fn projected_gradient_norm(&self, x: &[f64], grad: &[f64]) -> f64 {
        let mut step: Vec<f64> = x.iter()
            .zip(grad.iter())
            .map(|(x, g)| x - g)
            .collect();
        self.x_box.project(&mut step);

        x.iter()
            .zip(step.iter())
            .map(|(x, s)| (x - s).abs())
            .fold(0.0, f64::max)
    }

    /// Projected Newton direction.
    ///
    /// Variables on a bound with the gradient pushing them out of the box are
    /// held, taking a diagonally scaled gradient step which the projection
    /// cancels. The Newton system is solved over the remaining free
    /// variables.
    fn newton_direction(
        &self,
        x: &[f64],
        grad: &[f64],
        pg_norm: f64,
        h_cost: &DMatrix<f64>,
        h_cons: &DMatrix<f64>
    ) -> Vec<f64> {
        let (lower, upper) = (self.problem.x_lower(), self.problem.x_upper());
        let eps = pg_norm.min(ACTIVE_SET_EPS);

        let mut dir = vec![0.0; x.len()];
        let mut free = Vec::with_capacity(x.len());

        for i in 0..x.len() {
            let held = (x[i] <= lower[i] + eps && grad[i] > 0.0)
                || (x[i] >= upper[i] - eps && grad[i] < 0.0);

            if held {
                let h = h_cost[(i, i)] + h_cons[(i, i)];
                dir[i] = -grad[i] / if h > 0.0 { h } else { 1.0 };
            }
            else {
                free.push(i);
            }
        }

        if free.is_empty() {
            return dir
        }

        let rhs = DVector::from_iterator(free.len(), free.iter().map(|&i| -grad[i]));

        let h_full = (h_cost + h_cons)
            .select_rows(free.iter())
            .select_columns(free.iter());

        let step = match Cholesky::new(h_full) {
            Some(chol) => chol.solve(&rhs),
            None => regularised_step(
                h_cost.select_rows(free.iter()).select_columns(free.iter()),
                &rhs
            )
        };

        for (k, &i) in free.iter().enumerate() {
            dir[i] = step[k];
        }

        dir
    }

    /// Backtracking line search along the projected path `P(x + alpha*dir)`.
    fn line_search(
        &mut self,
        x: &[f64],
        grad: &[f64],
        dir: &[f64]
    ) -> Option<Vec<f64>> {
        let psi_0 = self.value(x);
        let mut alpha = 1.0;

        for _ in 0..MAX_LINE_SEARCH_STEPS {
            let mut x_new: Vec<f64> = x.iter()
                .zip(dir.iter())
                .map(|(x, d)| x + alpha * d)
                .collect();
            self.x_box.project(&mut x_new);

            let decrease: f64 = grad.iter()
                .zip(x_new.iter().zip(x.iter()))
                .map(|(g, (xn, x))| g * (xn - x))
                .sum();

            let psi = self.value(&x_new);
            if psi.is_finite() && psi <= psi_0 + ARMIJO_COEFF * decrease {
                return Some(x_new)
            }

            alpha *= 0.5;
        }

        None
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Scale applied to the objective so its largest gradient entry is at most
/// `max_gradient`.
fn objective_scale(gradient_inf_norm: f64, max_gradient: f64) -> f64 {
    if gradient_inf_norm.is_finite() && gradient_inf_norm > max_gradient {
        max_gradient / gradient_inf_norm
    }
    else {
        1.0
    }
}

/// Solve `h * step = rhs`, adding the smallest tenfold-increasing multiple of
/// the identity to `h` which makes it positive definite.
fn regularised_step(h: DMatrix<f64>, rhs: &DVector<f64>) -> DVector<f64> {
    let h_max = h.diagonal().iter().fold(1.0f64, |m, v| m.max(v.abs()));
    let mut mu = 0.0;

    for _ in 0..MAX_REGULARISATION_STEPS {
        let mut h_reg = h.clone();
        for k in 0..h_reg.nrows() {
            h_reg[(k, k)] += mu;
        }

        if let Some(chol) = Cholesky::new(h_reg) {
            return chol.solve(rhs)
        }

        mu = if mu == 0.0 { INITIAL_REGULARISATION * h_max } else { mu * 10.0 };
    }

    // Steepest descent
    rhs.clone()
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use num_dual::DualNum;

    /// Minimise (x0 - 2)^2 + (x1 - 2)^2 with the constraint x0 + x1.
    struct LineEval;

    impl FgEval for LineEval {
        fn eval<T: DualNum<f64> + Copy>(&self, fg: &mut [T], vars: &[T]) {
            fg[0] = (vars[0] - 2.0).powi(2) + (vars[1] - 2.0).powi(2);
            fg[1] = vars[0] + vars[1];
        }
    }

    /// Cost with a square root, not finite below -offset.
    struct SqrtEval {
        offset: f64
    }

    impl FgEval for SqrtEval {
        fn eval<T: DualNum<f64> + Copy>(&self, fg: &mut [T], vars: &[T]) {
            fg[0] = (vars[0] + self.offset).sqrt();
            fg[1] = vars[0];
        }
    }

    fn options() -> SolverOptions {
        SolverOptions {
            max_cpu_time_s: 5.0,
            tol: 1e-6,
            constr_viol_tol: 1e-6,
            ..Default::default()
        }
    }

    fn line_problem(x1_max: f64, g_lower: f64, g_upper: f64) -> NlpProblem {
        NlpProblem::new(
            vec![0.0, 0.0],
            vec![-10.0, -10.0],
            vec![10.0, x1_max],
            vec![g_lower],
            vec![g_upper]
        ).unwrap()
    }

    #[test]
    fn test_helpers() {
        assert_eq!(objective_scale(10.0, 100.0), 1.0);
        assert_eq!(objective_scale(1000.0, 100.0), 0.1);
        assert_eq!(objective_scale(std::f64::INFINITY, 100.0), 1.0);

        // Positive definite systems are solved exactly
        let h = DMatrix::from_row_slice(2, 2, &[2.0, 0.0, 0.0, 4.0]);
        let rhs = DVector::from_row_slice(&[2.0, 2.0]);
        let step = regularised_step(h, &rhs);
        assert!((step[0] - 1.0).abs() < 1e-12);
        assert!((step[1] - 0.5).abs() < 1e-12);

        // Indefinite systems still give a descent direction
        let h = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, -3.0]);
        let step = regularised_step(h, &rhs);
        assert!(step.dot(&rhs) > 0.0);
        assert!(step.iter().all(|s| s.is_finite()));
    }

    #[test]
    fn test_solve_equality_converges() {
        let sol = solve(&options(), &line_problem(10.0, 1.0, 1.0), &LineEval).unwrap();

        assert_eq!(sol.status, SolveStatus::Success);
        assert!((sol.x[0] - 0.5).abs() < 1e-4);
        assert!((sol.x[1] - 0.5).abs() < 1e-4);
        assert!((sol.obj_value - 4.5).abs() < 1e-3);
        assert!(sol.constraint_violation < 1e-6);
        assert!(sol.iterations.outer >= 1);
        assert!(sol.iterations.inner >= 1);
    }

    #[test]
    fn test_solve_active_variable_bound() {
        let sol = solve(&options(), &line_problem(0.2, 1.0, 1.0), &LineEval).unwrap();

        assert_eq!(sol.status, SolveStatus::Success);
        assert!(sol.x[1] <= 0.2);
        assert!((sol.x[0] - 0.8).abs() < 1e-4);
        assert!((sol.x[1] - 0.2).abs() < 1e-4);
    }

    #[test]
    fn test_solve_inequality() {
        // Active upper bound
        let sol = solve(&options(), &line_problem(10.0, -5.0, 1.0), &LineEval).unwrap();
        assert_eq!(sol.status, SolveStatus::Success);
        assert!((sol.x[0] - 0.5).abs() < 1e-4);
        assert!((sol.x[1] - 0.5).abs() < 1e-4);

        // Inactive constraint, unconstrained minimum
        let sol = solve(&options(), &line_problem(10.0, -5.0, 10.0), &LineEval).unwrap();
        assert_eq!(sol.status, SolveStatus::Success);
        assert!((sol.x[0] - 2.0).abs() < 1e-6);
        assert!((sol.x[1] - 2.0).abs() < 1e-6);
        assert_eq!(sol.constraint_violation, 0.0);
    }

    #[test]
    fn test_non_finite_is_numerical_error() {
        let problem = NlpProblem::new(
            vec![0.0],
            vec![-1.0],
            vec![1.0],
            vec![0.0],
            vec![1.0]
        ).unwrap();

        // sqrt(x - 5) is not finite anywhere in the box
        let sol = solve(&options(), &problem, &SqrtEval { offset: -5.0 }).unwrap();
        assert_eq!(sol.status, SolveStatus::NumericalError);
        assert_eq!(sol.x.len(), 1);

        // sqrt(x + 5) is, and is smallest on the constraint's lower bound
        let sol = solve(&options(), &problem, &SqrtEval { offset: 5.0 }).unwrap();
        assert_eq!(sol.status, SolveStatus::Success);
        assert!(sol.x[0].abs() < 1e-6);
        assert!((sol.obj_value - 5.0f64.sqrt()).abs() < 1e-6);
    }

    #[test]
    fn test_invalid() {
        let problem = NlpProblem::new(
            vec![0.0], vec![-1.0], vec![1.0], vec![], vec![]
        ).unwrap();
        assert!(matches!(
            solve(&options(), &problem, &SqrtEval { offset: 5.0 }),
            Err(NlpError::EmptyProblem { n_vars: 1, n_constraints: 0 })
        ));

        let problem = NlpProblem::new(
            vec![0.0], vec![-1.0], vec![1.0], vec![0.0], vec![1.0]
        ).unwrap();
        let opts = SolverOptions {
            tol: -1.0,
            ..Default::default()
        };
        assert!(matches!(
            solve(&opts, &problem, &SqrtEval { offset: 5.0 }),
            Err(NlpError::InvalidOptions(_))
        ));
    }
}
