//! MPC parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Deserialize;

// Internal
use crate::nlp::SolverOptions;
use super::ParamsError;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the MPC controller.
///
/// These fix the shape and tuning of the optimisation problem, they are
/// loaded once and never change during execution.
#[derive(Deserialize, Debug, Clone)]
pub struct Params {
    /// Number of timesteps in the prediction horizon (N).
    pub horizon: usize,

    /// Duration of one prediction timestep.
    pub dt_s: f64,

    /// Speed the controller tries to hold.
    pub ref_speed: f64,

    /// Distance between the front axle and the centre of gravity, tuned so
    /// the kinematic model matches the vehicle's turning radius.
    pub lf_m: f64,

    /// Maximum steering angle magnitude.
    pub max_steer_rad: f64,

    /// Maximum acceleration magnitude, as a normalised throttle/brake
    /// command.
    pub max_accel: f64,

    /// Bound magnitude used for the state variables, large enough to
    /// be effectively unbounded.
    pub unbounded: f64,

    /// Cost function weights.
    pub weights: CostWeights,

    /// Options passed through to the NLP solver.
    #[serde(default)]
    pub solver: SolverOptions
}

/// Weights of the terms of the cost function.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct CostWeights {
    /// Squared cross-track error, every timestep.
    pub cte: f64,

    /// Squared heading error, every timestep.
    pub epsi: f64,

    /// Squared deviation from the reference speed, every timestep.
    pub speed: f64,

    /// Squared steering command, every actuation.
    pub steer: f64,

    /// Squared acceleration command, every actuation.
    pub accel: f64,

    /// Squared change between consecutive steering commands.
    pub steer_rate: f64,

    /// Squared change between consecutive acceleration commands.
    pub accel_rate: f64
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for Params {
    fn default() -> Self {
        Self {
            horizon: 10,
            dt_s: 0.2,
            ref_speed: 70.0,
            lf_m: 2.67,
            // 25 degrees
            max_steer_rad: 0.436332,
            max_accel: 1.0,
            unbounded: 1.0e19,
            weights: CostWeights::default(),
            solver: SolverOptions::default()
        }
    }
}

impl Default for CostWeights {
    fn default() -> Self {
        Self {
            cte: 5000.0,
            epsi: 2500.0,
            speed: 1.0,
            steer: 5.0,
            accel: 5.0,
            steer_rate: 200.0,
            accel_rate: 10.0
        }
    }
}

impl Params {
    /// Check the parameters describe a solvable problem.
    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.horizon < 2 {
            return Err(ParamsError::HorizonTooShort(self.horizon))
        }

        let positive = [
            ("dt_s", self.dt_s),
            ("lf_m", self.lf_m),
            ("max_steer_rad", self.max_steer_rad),
            ("max_accel", self.max_accel),
            ("unbounded", self.unbounded)
        ];
        for &(name, value) in positive.iter() {
            if !(value.is_finite() && value > 0.0) {
                return Err(ParamsError::NotPositive(name, value))
            }
        }

        if !self.ref_speed.is_finite() {
            return Err(ParamsError::NotFinite("ref_speed", self.ref_speed))
        }

        let w = &self.weights;
        let weights = [
            ("cte", w.cte),
            ("epsi", w.epsi),
            ("speed", w.speed),
            ("steer", w.steer),
            ("accel", w.accel),
            ("steer_rate", w.steer_rate),
            ("accel_rate", w.accel_rate)
        ];
        for &(name, value) in weights.iter() {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ParamsError::NegativeWeight(name, value))
            }
        }

        self.solver.validate().map_err(ParamsError::Solver)
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let p = Params::default();
        assert!(p.validate().is_ok());
        assert_eq!(p.horizon, 10);
        assert_eq!(p.solver.max_cpu_time_s, 0.5);
    }

    #[test]
    fn test_validate() {
        let p = Params { horizon: 1, ..Default::default() };
        assert!(matches!(p.validate(), Err(ParamsError::HorizonTooShort(1))));

        let p = Params { horizon: 2, ..Default::default() };
        assert!(p.validate().is_ok());

        let p = Params { dt_s: 0.0, ..Default::default() };
        assert!(matches!(p.validate(), Err(ParamsError::NotPositive("dt_s", _))));

        let p = Params { lf_m: -2.67, ..Default::default() };
        assert!(matches!(p.validate(), Err(ParamsError::NotPositive("lf_m", _))));

        let mut p = Params::default();
        p.weights.steer_rate = -1.0;
        assert!(matches!(
            p.validate(),
            Err(ParamsError::NegativeWeight("steer_rate", _))
        ));

        let mut p = Params::default();
        p.solver.max_cpu_time_s = 0.0;
        assert!(matches!(p.validate(), Err(ParamsError::Solver(_))));
    }

    #[test]
    fn test_params_file() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../params/mpc_ctrl.toml");
        let p: Params = util::params::load_from_path(path).unwrap();

        let d = Params::default();
        assert_eq!(p.horizon, d.horizon);
        assert_eq!(p.dt_s, d.dt_s);
        assert_eq!(p.ref_speed, d.ref_speed);
        assert_eq!(p.lf_m, d.lf_m);
        assert_eq!(p.max_steer_rad, d.max_steer_rad);
        assert_eq!(p.max_accel, d.max_accel);
        assert_eq!(p.weights, d.weights);
        assert_eq!(p.solver.max_cpu_time_s, d.solver.max_cpu_time_s);
        assert!(p.validate().is_ok());
    }
}
