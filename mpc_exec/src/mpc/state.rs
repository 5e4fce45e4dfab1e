//! Implementations for the MpcCtrl state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, warn};
use serde::Serialize;

// Internal
use crate::nlp::{self, SolveStatus};
use super::{
    build_problem, extract_output, InputData, MpcError, MpcOutput, Params,
    RefCoeffs, SolveOutcome, StatusReport, VehicleState
};
use util::{
    params,
    module::State,
    archive::{Archived, ArchiveError, Archiver},
    session::Session
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// MPC control module state
#[derive(Default)]
pub struct MpcCtrl {
    pub(crate) params: Params,

    pub(crate) report: Option<StatusReport>,
    arch_report: Archiver,

    pub(crate) output: Option<MpcOutput>,
    arch_output: Archiver
}

/// Flattened output, one row per cycle in the archive.
#[derive(Serialize)]
struct OutputRecord {
    steer_rad: f64,
    accel: f64,
    outcome: SolveOutcome,
    status: SolveStatus,
    cost: f64
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl State for MpcCtrl {
    type InitData = &'static str;
    type InitError = MpcError;

    type InputData = InputData;
    type OutputData = MpcOutput;
    type StatusReport = StatusReport;
    type ProcError = MpcError;

    /// Initialise the MpcCtrl module.
    ///
    /// Expected init data is the path to the parameter file
    fn init(&mut self, init_data: Self::InitData, session: &Session)
        -> Result<(), Self::InitError>
    {
        // Load the parameters
        let params: Params = params::load(init_data)?;
        params.validate()?;
        self.params = params;

        // Create the arch folder for mpc_ctrl
        std::fs::create_dir_all(session.arch_root.join("mpc_ctrl"))
            .map_err(ArchiveError::FileError)?;

        // Initialise the archivers
        self.arch_report = Archiver::from_path(
            session, "mpc_ctrl/status_report.csv"
        )?;
        self.arch_output = Archiver::from_path(
            session, "mpc_ctrl/output.csv"
        )?;

        Ok(())
    }

    /// Perform cyclic processing of MPC control.
    fn proc(&mut self, input_data: &Self::InputData)
        -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError>
    {
        let (output, report) = self.solve(&input_data.state, &input_data.coeffs)?;

        debug!(
            "MpcCtrl: steer {:.4} rad, accel {:.4}, {:?} ({:?}), cost {:.4e}, \
             {:.1} ms",
            output.steer_rad,
            output.accel,
            report.outcome,
            report.status,
            report.cost,
            report.solve_time_s * 1e3
        );

        match report.outcome {
            SolveOutcome::Converged => (),
            SolveOutcome::ConvergedWithWarning => warn!(
                "MPC solve did not converge ({:?}) but the solution is usable, \
                 max constraint violation {:.3e}",
                report.status,
                report.constraint_violation
            ),
            SolveOutcome::Failed => warn!(
                "MPC solve failed ({:?}), max constraint violation {:.3e}",
                report.status,
                report.constraint_violation
            )
        }

        self.report = Some(report);
        self.output = Some(output.clone());

        Ok((output, report))
    }
}

impl Archived for MpcCtrl {
    fn write(&mut self) -> Result<(), ArchiveError> {
        if let Some(report) = self.report {
            self.arch_report.serialise(report)?;
        }

        if let Some(ref output) = self.output {
            self.arch_output.serialise(OutputRecord {
                steer_rad: output.steer_rad,
                accel: output.accel,
                outcome: output.outcome,
                status: output.status,
                cost: output.cost
            })?;
        }

        Ok(())
    }
}

impl MpcCtrl {
    /// Create a controller from already loaded parameters.
    ///
    /// Controllers built this way do not archive.
    pub fn new(params: Params) -> Result<Self, MpcError> {
        params.validate()?;

        Ok(Self {
            params,
            ..Default::default()
        })
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Solve one cycle.
    ///
    /// The problem is built from scratch from the measured state and
    /// reference, solved, and the first actuator pair and predicted
    /// trajectory extracted. A solve which fails to converge is not an
    /// error: its outcome is reported alongside the best-effort commands.
    pub fn solve(
        &self,
        state: &VehicleState,
        coeffs: &RefCoeffs
    ) -> Result<(MpcOutput, StatusReport), MpcError> {
        let (problem, eval) = build_problem(&self.params, state, coeffs)?;

        let solution = nlp::solve(&self.params.solver, &problem, &eval)?;

        let outcome = SolveOutcome::classify(
            &solution,
            self.params.solver.acceptable_constr_viol_tol
        );
        let report = StatusReport::from_solution(&solution, outcome);
        let output = extract_output(eval.layout(), &solution, outcome)?;

        Ok((output, report))
    }

    /// Solve one cycle from untyped slices.
    ///
    /// `state` is `[x, y, psi, v, cte, epsi]` and `coeffs` is
    /// `[c0, c1, c2, c3]`. The result is
    /// `[steer, accel, x1, y1, ..., x_{N-1}, y_{N-1}]`.
    pub fn solve_slices(&self, state: &[f64], coeffs: &[f64]) -> Result<Vec<f64>, MpcError> {
        let state = VehicleState::from_slice(state)?;
        let coeffs = RefCoeffs::from_slice(coeffs)?;

        self.solve(&state, &coeffs).map(|(output, _)| output.to_vec())
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
