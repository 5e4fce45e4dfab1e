//! Forward mode automatic differentiation of an [`FgEval`]
//!
//! First derivatives use one [`Dual64`] evaluation per variable. Second
//! derivatives use one [`HyperDual64`] evaluation per pair of interacting
//! variables, the interacting pairs being found once per problem.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::DMatrix;
use num_dual::{Dual64, HyperDual64};

use super::FgEval;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Values and dense Jacobian of `fg` at a point.
///
/// The Jacobian is stored one variable at a time: the derivatives of all of
/// `fg` with respect to variable `i` are contiguous.
#[derive(Debug, Clone)]
pub struct FgJacobian {
    n_vars: usize,
    n_fg: usize,
    fg: Vec<f64>,
    jac: Vec<f64>,
    vars: Vec<Dual64>,
    fg_dual: Vec<Dual64>
}

/// Weighted second derivatives of `fg`.
///
/// Only the pairs of variables with a non-zero second derivative in some
/// element of `fg` are evaluated. The pairs are found at construction by
/// evaluating every pair at a fixed, generic point.
#[derive(Debug, Clone)]
pub struct FgHessian {
    n_vars: usize,
    n_fg: usize,

    /// Lower triangle pairs `(i, j)`, `i >= j`.
    pairs: Vec<(usize, usize)>,

    vars: Vec<HyperDual64>,
    fg_dual: Vec<HyperDual64>
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl FgJacobian {
    /// Create an empty Jacobian for `n_vars` variables and `n_constraints`
    /// constraints.
    pub fn new(n_vars: usize, n_constraints: usize) -> Self {
        let n_fg = 1 + n_constraints;

        Self {
            n_vars,
            n_fg,
            fg: vec![0.0; n_fg],
            jac: vec![0.0; n_fg * n_vars],
            vars: vec![Dual64::from(0.0); n_vars],
            fg_dual: vec![Dual64::from(0.0); n_fg]
        }
    }

    /// Evaluate `fg` and its Jacobian at `x`.
    ///
    /// One dual evaluation is made per variable, seeding the dual part of
    /// that variable only.
    pub fn update<E: FgEval>(&mut self, eval: &E, x: &[f64]) {
        for (v, &xi) in self.vars.iter_mut().zip(x.iter()) {
            *v = Dual64::from(xi);
        }

        for i in 0..self.n_vars {
            self.vars[i].eps = 1.0;

            for f in self.fg_dual.iter_mut() {
                *f = Dual64::from(0.0);
            }
            eval.eval(&mut self.fg_dual, &self.vars);

            let col = &mut self.jac[i * self.n_fg..(i + 1) * self.n_fg];
            for (c, f) in col.iter_mut().zip(self.fg_dual.iter()) {
                *c = f.eps;
            }

            self.vars[i].eps = 0.0;
        }

        // The real part is the same for every seed
        for (v, f) in self.fg.iter_mut().zip(self.fg_dual.iter()) {
            *v = f.re;
        }

        // With no variables the loop above never evaluates
        if self.n_vars == 0 {
            eval_f64(eval, x, &mut self.fg);
        }
    }

    /// Cost value `f(x)`.
    pub fn cost(&self) -> f64 {
        self.fg[0]
    }

    /// Constraint values `g(x)`.
    pub fn constraints(&self) -> &[f64] {
        &self.fg[1..]
    }

    /// Derivatives of `fg` with respect to variable `i`.
    ///
    /// Element 0 is the cost gradient entry, elements `1..` the constraint
    /// Jacobian column.
    pub fn column(&self, i: usize) -> &[f64] {
        &self.jac[i * self.n_fg..(i + 1) * self.n_fg]
    }

    /// Jacobian of the constraints, one row per constraint.
    pub fn constraint_jacobian(&self) -> DMatrix<f64> {
        DMatrix::from_fn(self.n_fg - 1, self.n_vars, |k, i| {
            self.jac[i * self.n_fg + 1 + k]
        })
    }

    /// True if every value and derivative is finite.
    pub fn is_finite(&self) -> bool {
        self.fg.iter().chain(self.jac.iter()).all(|v| v.is_finite())
    }

    /// Largest absolute entry of the cost gradient.
    pub fn cost_gradient_inf_norm(&self) -> f64 {
        (0..self.n_vars)
            .map(|i| self.jac[i * self.n_fg].abs())
            .fold(0.0, f64::max)
    }
}

impl FgHessian {
    /// Find the interacting pairs of variables of `eval`.
    pub fn new<E: FgEval>(eval: &E, n_vars: usize, n_constraints: usize) -> Self {
        let n_fg = 1 + n_constraints;

        let mut hess = Self {
            n_vars,
            n_fg,
            pairs: Vec::new(),
            vars: vec![HyperDual64::from(0.0); n_vars],
            fg_dual: vec![HyperDual64::from(0.0); n_fg]
        };

        // Generic point, away from zero so products of variables do not
        // vanish
        let point: Vec<f64> = (0..n_vars)
            .map(|i| 0.5 + 0.4 * (1.7 * i as f64 + 0.3).sin())
            .collect();
        hess.set_point(&point);

        for i in 0..n_vars {
            for j in 0..=i {
                hess.eval_pair(eval, i, j);

                // A non-finite value is kept, it may be finite elsewhere
                if hess.fg_dual.iter().any(|f| f.eps1eps2 != 0.0) {
                    hess.pairs.push((i, j));
                }
            }
        }

        hess
    }

    /// Number of interacting pairs, including the diagonal.
    pub fn num_pairs(&self) -> usize {
        self.pairs.len()
    }

    /// Evaluate the weighted second derivatives of `fg` at `x`.
    ///
    /// `cost_hess` is set to `weights[0]` times the cost Hessian, and
    /// `constraint_hess` to the sum of `weights[1 + k]` times the Hessian of
    /// constraint `k`.
    pub fn update<E: FgEval>(
        &mut self,
        eval: &E,
        x: &[f64],
        weights: &[f64],
        cost_hess: &mut DMatrix<f64>,
        constraint_hess: &mut DMatrix<f64>
    ) {
        cost_hess.fill(0.0);
        constraint_hess.fill(0.0);
        self.set_point(x);

        for p in 0..self.pairs.len() {
            let (i, j) = self.pairs[p];
            self.eval_pair(eval, i, j);

            let h_cost = weights[0] * self.fg_dual[0].eps1eps2;
            let h_cons: f64 = weights[1..].iter()
                .zip(self.fg_dual[1..].iter())
                .map(|(w, f)| w * f.eps1eps2)
                .sum();

            cost_hess[(i, j)] = h_cost;
            cost_hess[(j, i)] = h_cost;
            constraint_hess[(i, j)] = h_cons;
            constraint_hess[(j, i)] = h_cons;
        }
    }

    fn set_point(&mut self, x: &[f64]) {
        for (v, &xi) in self.vars.iter_mut().zip(x.iter()) {
            *v = HyperDual64::from(xi);
        }
    }

    /// Evaluate `fg` with variable `i` seeded in the first direction and `j`
    /// in the second.
    fn eval_pair<E: FgEval>(&mut self, eval: &E, i: usize, j: usize) {
        self.vars[i].eps1 = 1.0;
        self.vars[j].eps2 = 1.0;

        for f in self.fg_dual.iter_mut() {
            *f = HyperDual64::from(0.0);
        }
        eval.eval(&mut self.fg_dual, &self.vars);

        self.vars[i].eps1 = 0.0;
        self.vars[j].eps2 = 0.0;
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Evaluate `fg` at `x` on plain floats.
pub fn eval_f64<E: FgEval>(eval: &E, x: &[f64], fg: &mut [f64]) {
    for f in fg.iter_mut() {
        *f = 0.0;
    }
    eval.eval(fg, x);
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use num_dual::DualNum;

    /// Cost x0 * sin(x1), constraints x0^2 and atan(x1).
    struct TrigEval;

    impl FgEval for TrigEval {
        fn eval<T: DualNum<f64> + Copy>(&self, fg: &mut [T], vars: &[T]) {
            fg[0] = vars[0] * vars[1].sin();
            fg[1] = vars[0].powi(2);
            fg[2] = vars[1].atan();
        }
    }

    #[test]
    fn test_jacobian() {
        let (x0, x1) = (1.5, 0.3);
        let mut jac = FgJacobian::new(2, 2);
        jac.update(&TrigEval, &[x0, x1]);

        assert!((jac.cost() - x0 * x1.sin()).abs() < 1e-12);
        assert!((jac.constraints()[0] - x0 * x0).abs() < 1e-12);
        assert!((jac.constraints()[1] - x1.atan()).abs() < 1e-12);

        let d0 = jac.column(0);
        assert!((d0[0] - x1.sin()).abs() < 1e-12);
        assert!((d0[1] - 2.0 * x0).abs() < 1e-12);
        assert_eq!(d0[2], 0.0);

        let d1 = jac.column(1);
        assert!((d1[0] - x0 * x1.cos()).abs() < 1e-12);
        assert_eq!(d1[1], 0.0);
        assert!((d1[2] - 1.0 / (1.0 + x1 * x1)).abs() < 1e-12);

        assert!((jac.cost_gradient_inf_norm() - x0 * x1.cos()).abs() < 1e-12);
    }

    /// Cost linear in both variables, constraint linear.
    struct LinearEval;

    impl FgEval for LinearEval {
        fn eval<T: DualNum<f64> + Copy>(&self, fg: &mut [T], vars: &[T]) {
            fg[0] = vars[0] * 2.0 - vars[1];
            fg[1] = vars[0] + vars[1];
        }
    }

    #[test]
    fn test_constraint_jacobian() {
        let mut jac = FgJacobian::new(2, 2);
        jac.update(&TrigEval, &[1.5, 0.3]);
        assert!(jac.is_finite());

        let j = jac.constraint_jacobian();
        assert_eq!(j.shape(), (2, 2));
        assert!((j[(0, 0)] - 3.0).abs() < 1e-12);
        assert_eq!(j[(0, 1)], 0.0);
        assert_eq!(j[(1, 0)], 0.0);
        assert!((j[(1, 1)] - 1.0 / 1.09).abs() < 1e-12);
    }

    #[test]
    fn test_hessian() {
        let (x0, x1) = (1.5, 0.3);
        let mut hess = FgHessian::new(&TrigEval, 2, 2);
        assert_eq!(hess.num_pairs(), 3);

        let mut h_cost = DMatrix::zeros(2, 2);
        let mut h_cons = DMatrix::zeros(2, 2);
        hess.update(&TrigEval, &[x0, x1], &[2.0, 3.0, 5.0], &mut h_cost, &mut h_cons);

        // Cost x0 * sin(x1), weighted by 2
        assert_eq!(h_cost[(0, 0)], 0.0);
        assert!((h_cost[(0, 1)] - 2.0 * x1.cos()).abs() < 1e-12);
        assert!((h_cost[(1, 0)] - 2.0 * x1.cos()).abs() < 1e-12);
        assert!((h_cost[(1, 1)] + 2.0 * x0 * x1.sin()).abs() < 1e-12);

        // 3 * x0^2 + 5 * atan(x1)
        let d2_atan = -2.0 * x1 / (1.0 + x1 * x1).powi(2);
        assert!((h_cons[(0, 0)] - 6.0).abs() < 1e-12);
        assert_eq!(h_cons[(0, 1)], 0.0);
        assert!((h_cons[(1, 1)] - 5.0 * d2_atan).abs() < 1e-12);

        // Nothing to evaluate for a linear problem
        assert_eq!(FgHessian::new(&LinearEval, 2, 1).num_pairs(), 0);
    }

    #[test]
    fn test_eval_f64() {
        let mut fg = [1.0; 3];
        eval_f64(&TrigEval, &[2.0, 0.0], &mut fg);
        assert_eq!(fg, [0.0, 4.0, 0.0]);
    }
}
