//! Cost and dynamics evaluation
//!
//! The cost penalises tracking error, deviation from the reference speed,
//! actuation, and changes in actuation. The constraints encode a discrete
//! kinematic bicycle model: each residual is the decision vector's state at
//! `t + 1` minus the state predicted by Euler integration from `t`. The
//! first timestep's residuals are the raw state values, which the problem
//! bounds pin to the measured state.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_dual::DualNum;
use std::ops::Add;

use crate::nlp::FgEval;
use super::{CostWeights, Layout, Params, RefCoeffs};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Cost and dynamics evaluator for one control cycle.
///
/// Holds the cycle's reference coefficients by value, so a fresh evaluator is
/// built every cycle.
#[derive(Debug, Clone)]
pub struct MpcFgEval {
    layout: Layout,
    coeffs: [f64; 4],
    weights: CostWeights,
    ref_speed: f64,
    dt_s: f64,
    lf_m: f64
}

/// The cost split into its groups of terms.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CostTerms<T = f64> {
    /// Cross-track and heading error terms.
    pub tracking: T,

    /// Reference speed terms.
    pub speed: T,

    /// Steering and acceleration magnitude terms.
    pub actuation: T,

    /// Steering and acceleration change terms.
    pub smoothness: T
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl MpcFgEval {
    /// Build the evaluator for the given parameters and reference.
    pub fn new(params: &Params, coeffs: &RefCoeffs) -> Self {
        Self {
            layout: Layout::new(params.horizon),
            coeffs: coeffs.0,
            weights: params.weights,
            ref_speed: params.ref_speed,
            dt_s: params.dt_s,
            lf_m: params.lf_m
        }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// The cost of a decision vector, split into its groups of terms.
    pub fn cost_terms(&self, vars: &[f64]) -> CostTerms {
        self.terms(vars)
    }

    fn terms<T: DualNum<f64> + Copy>(&self, vars: &[T]) -> CostTerms<T> {
        let l = &self.layout;
        let w = &self.weights;
        let zero: T = From::from(0.0f64);

        let mut terms = CostTerms {
            tracking: zero,
            speed: zero,
            actuation: zero,
            smoothness: zero
        };

        for t in 0..l.n {
            terms.tracking = terms.tracking
                + sq(vars[l.cte_start + t]) * w.cte
                + sq(vars[l.epsi_start + t]) * w.epsi;
            terms.speed = terms.speed
                + sq(vars[l.v_start + t] - self.ref_speed) * w.speed;
        }

        for t in 0..l.n.saturating_sub(1) {
            terms.actuation = terms.actuation
                + sq(vars[l.delta_start + t]) * w.steer
                + sq(vars[l.a_start + t]) * w.accel;
        }

        for t in 0..l.n.saturating_sub(2) {
            terms.smoothness = terms.smoothness
                + sq(vars[l.delta_start + t + 1] - vars[l.delta_start + t])
                    * w.steer_rate
                + sq(vars[l.a_start + t + 1] - vars[l.a_start + t])
                    * w.accel_rate;
        }

        terms
    }
}

impl FgEval for MpcFgEval {
    fn eval<T: DualNum<f64> + Copy>(&self, fg: &mut [T], vars: &[T]) {
        let l = &self.layout;
        let [c0, c1, c2, c3] = self.coeffs;
        let (dt, lf) = (self.dt_s, self.lf_m);

        fg[0] = self.terms(vars).total();

        // Initial conditions
        for &start in l.state_starts().iter() {
            fg[1 + start] = vars[start];
        }

        // Dynamics
        for t in 0..l.n.saturating_sub(1) {
            let x0 = vars[l.x_start + t];
            let y0 = vars[l.y_start + t];
            let psi0 = vars[l.psi_start + t];
            let v0 = vars[l.v_start + t];
            let epsi0 = vars[l.epsi_start + t];

            let x1 = vars[l.x_start + t + 1];
            let y1 = vars[l.y_start + t + 1];
            let psi1 = vars[l.psi_start + t + 1];
            let v1 = vars[l.v_start + t + 1];
            let cte1 = vars[l.cte_start + t + 1];
            let epsi1 = vars[l.epsi_start + t + 1];

            let delta0 = vars[l.delta_start + t];
            let a0 = vars[l.a_start + t];

            // Reference path height and heading at x0
            let f0 = x0 * x0 * x0 * c3 + x0 * x0 * c2 + x0 * c1 + c0;
            let psides0 = (x0 * x0 * (3.0 * c3) + x0 * (2.0 * c2) + c1).atan();

            let yaw_step = v0 * delta0 / lf * dt;

            fg[2 + l.x_start + t] = x1 - (x0 + v0 * psi0.cos() * dt);
            fg[2 + l.y_start + t] = y1 - (y0 + v0 * psi0.sin() * dt);
            fg[2 + l.psi_start + t] = psi1 - (psi0 + yaw_step);
            fg[2 + l.v_start + t] = v1 - (v0 + a0 * dt);
            fg[2 + l.cte_start + t] = cte1 - ((f0 - y0) + v0 * epsi0.sin() * dt);
            fg[2 + l.epsi_start + t] = epsi1 - ((psi0 - psides0) + yaw_step);
        }
    }
}

impl<T: Add<Output = T> + Copy> CostTerms<T> {
    /// Sum of all terms.
    pub fn total(&self) -> T {
        self.tracking + self.speed + self.actuation + self.smoothness
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn sq<T: DualNum<f64> + Copy>(value: T) -> T {
    value * value
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::mpc::VehicleState;
    use crate::nlp::eval_f64;

    /// Build a decision vector by integrating the model from `state` with
    /// the given actuator sequences.
    fn rollout(
        params: &Params,
        coeffs: &RefCoeffs,
        state: &VehicleState,
        steer: &[f64],
        accel: &[f64]
    ) -> Vec<f64> {
        let l = Layout::new(params.horizon);
        let [c0, c1, c2, c3] = coeffs.0;
        let (dt, lf) = (params.dt_s, params.lf_m);
        let mut vars = vec![0.0; l.n_vars()];

        let mut s = state.to_array();
        for t in 0..l.n {
            for (k, &start) in l.state_starts().iter().enumerate() {
                vars[start + t] = s[k];
            }

            if t == l.n - 1 {
                break;
            }

            vars[l.delta_start + t] = steer[t];
            vars[l.a_start + t] = accel[t];

            let [x, y, psi, v, _, epsi] = s;
            let f = c0 + c1 * x + c2 * x * x + c3 * x * x * x;
            let psides = (c1 + 2.0 * c2 * x + 3.0 * c3 * x * x).atan();
            s = [
                x + v * psi.cos() * dt,
                y + v * psi.sin() * dt,
                psi + v * steer[t] / lf * dt,
                v + accel[t] * dt,
                (f - y) + v * epsi.sin() * dt,
                (psi - psides) + v * steer[t] / lf * dt
            ];
        }

        vars
    }

    fn state() -> VehicleState {
        VehicleState::new(0.3, -0.2, 0.1, 12.0, 0.5, -0.05)
    }

    #[test]
    fn test_rollout_has_zero_residuals() {
        let coeffs = RefCoeffs([0.5, 0.1, -0.02, 0.003]);

        for &horizon in [2usize, 5, 10].iter() {
            let params = Params { horizon, ..Default::default() };
            let steer: Vec<f64> = (0..horizon - 1)
                .map(|t| 0.4 * ((t as f64) * 0.7).sin())
                .collect();
            let accel: Vec<f64> = (0..horizon - 1)
                .map(|t| -1.0 + 2.0 * (t as f64) / (horizon as f64))
                .collect();

            let s = state();
            let vars = rollout(&params, &coeffs, &s, &steer, &accel);
            let eval = MpcFgEval::new(&params, &coeffs);
            let l = eval.layout();

            let mut fg = vec![0.0; 1 + l.n_constraints()];
            eval_f64(&eval, &vars, &mut fg);

            // Initial conditions are the raw state
            let expected = s.to_array();
            for (k, &start) in l.state_starts().iter().enumerate() {
                assert_eq!(fg[1 + start], expected[k]);
            }

            // Every dynamics residual is zero
            for (k, &start) in l.state_starts().iter().enumerate() {
                for t in 1..l.n {
                    let r = fg[1 + start + t];
                    assert!(
                        r.abs() < 1e-12,
                        "residual of state {} at t = {} is {}", k, t, r
                    );
                }
            }
        }
    }

    #[test]
    fn test_residual_detects_inconsistency() {
        let params = Params::default();
        let coeffs = RefCoeffs([1.0, 0.0, 0.0, 0.0]);
        let s = state();
        let l = Layout::new(params.horizon);

        let zeros = vec![0.0; l.n - 1];
        let mut vars = rollout(&params, &coeffs, &s, &zeros, &zeros);
        vars[l.y_start + 3] += 0.25;

        let eval = MpcFgEval::new(&params, &coeffs);
        let mut fg = vec![0.0; 1 + l.n_constraints()];
        eval_f64(&eval, &vars, &mut fg);

        assert!((fg[1 + l.y_start + 3] - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_cost_terms() {
        let params = Params::default();
        let coeffs = RefCoeffs([0.0; 4]);
        let eval = MpcFgEval::new(&params, &coeffs);
        let l = Layout::new(params.horizon);

        // On the reference at the reference speed with no actuation
        let mut vars = vec![0.0; l.n_vars()];
        for t in 0..l.n {
            vars[l.v_start + t] = params.ref_speed;
        }

        let base = eval.cost_terms(&vars);
        assert_eq!(base, CostTerms::default());

        let mut fg = vec![0.0; 1 + l.n_constraints()];
        eval_f64(&eval, &vars, &mut fg);
        assert_eq!(fg[0], 0.0);

        // Perturbing any tracking or speed variable strictly increases cost
        for &start in [l.cte_start, l.epsi_start, l.v_start].iter() {
            for t in 0..l.n {
                for &d in [-0.1, 0.1].iter() {
                    let mut p = vars.clone();
                    p[start + t] += d;
                    let terms = eval.cost_terms(&p);
                    assert!(terms.total() > base.total());
                    assert_eq!(terms.actuation, 0.0);
                    assert_eq!(terms.smoothness, 0.0);
                }
            }
        }

        // Weights are applied per group
        let mut p = vars.clone();
        p[l.cte_start + 2] = 1.0;
        p[l.epsi_start + 4] = 0.1;
        p[l.v_start] = 60.0;
        p[l.delta_start + 1] = 0.2;
        p[l.a_start + 1] = 0.5;
        let terms = eval.cost_terms(&p);
        assert!((terms.tracking - (5000.0 + 2500.0 * 0.01)).abs() < 1e-9);
        assert!((terms.speed - 100.0).abs() < 1e-9);
        assert!((terms.actuation - (5.0 * 0.04 + 5.0 * 0.25)).abs() < 1e-9);
        // delta and a each change twice by their value
        assert!(
            (terms.smoothness - (2.0 * 200.0 * 0.04 + 2.0 * 10.0 * 0.25)).abs()
                < 1e-9
        );

        eval_f64(&eval, &p, &mut fg);
        assert!((fg[0] - terms.total()).abs() < 1e-9);
    }

    #[test]
    fn test_short_horizon_has_no_smoothness() {
        let params = Params { horizon: 2, ..Default::default() };
        let eval = MpcFgEval::new(&params, &RefCoeffs([0.0; 4]));
        let l = Layout::new(2);

        let mut vars = vec![0.0; l.n_vars()];
        vars[l.delta_start] = 0.3;
        vars[l.a_start] = -0.5;

        let terms = eval.cost_terms(&vars);
        assert_eq!(terms.smoothness, 0.0);
        assert!(terms.actuation > 0.0);
    }
}
