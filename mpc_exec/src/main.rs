//! Main MPC executable entry point.
//!
//! # Architecture
//!
//! The executable runs the MPC controller in closed loop against a simulated
//! kinematic vehicle:
//!
//!     - Initialise the session, logging, parameters and modules
//!     - Main loop:
//!         - Fit the reference path ahead of the vehicle in its own frame
//!         - MPC processing
//!         - Apply the first planned commands to the plant for one cycle
//!         - Write archives
//!
//! Commands are applied whatever the outcome of the solve, a bad cycle is
//! corrected by re-planning from the new state on the next one.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{eyre::WrapErr, Report};
use log::{debug, info, warn};
use serde::Serialize;
use std::thread;
use std::time::{Duration, Instant};

// Internal
use mpc_lib::{
    mpc::{InputData, MpcCtrl, SolveOutcome},
    sim::{self, KinematicPlant, RefPath}
};
use util::{
    archive::{Archived, Archiver},
    logger::{logger_init, LevelFilter},
    module::State,
    session::{self, Session}
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Plant state and global tracking errors, one row per cycle.
#[derive(Serialize)]
struct PlantRecord {
    cycle: usize,
    time_s: f64,
    x_m: f64,
    y_m: f64,
    psi_rad: f64,
    v: f64,
    cte_m: f64,
    epsi_rad: f64
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {

    color_eyre::install()?;

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new(
        "mpc_exec",
        "sessions"
    ).wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Trace, &session)
        .wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("MPC Executable\n");
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let sim_params: sim::Params = util::params::load("mpc_exec.toml")
        .wrap_err("Could not load exec params")?;

    info!("Exec parameters loaded");

    // ---- INITIALISE MODULES ----

    info!("Initialising modules...");

    let mut mpc_ctrl = MpcCtrl::default();
    mpc_ctrl.init("mpc_ctrl.toml", &session)
        .wrap_err("Failed to initialise MpcCtrl")?;
    info!("MpcCtrl init complete");

    let path = RefPath::new(&sim_params.path_coeffs);
    let mut plant = KinematicPlant::new(
        sim_params.initial_state,
        mpc_ctrl.params().lf_m
    );
    let mut arch_plant = Archiver::from_path(&session, "plant.csv")
        .wrap_err("Failed to create the plant archive")?;
    info!("Simulation init complete");

    info!("Module initialisation complete\n");

    // ---- MAIN LOOP ----

    info!("Begining main loop\n");

    let cycle_period = Duration::from_secs_f64(sim_params.cycle_period_s);
    let mut num_warnings = 0usize;
    let mut num_failures = 0usize;

    for cycle in 0..sim_params.num_cycles {

        // Get cycle start time
        let cycle_start_instant = Instant::now();

        // ---- REFERENCE ----

        let (state, coeffs) = path.local_reference(
            &plant.state,
            sim_params.fit_num_points,
            sim_params.fit_spacing_m
        ).wrap_err("Failed to fit the local reference")?;

        // ---- CONTROL ALGORITHM PROCESSING ----

        let (output, report) = mpc_ctrl.proc(&InputData { state, coeffs })
            .wrap_err("Error during MpcCtrl processing")?;

        match report.outcome {
            SolveOutcome::Converged => (),
            SolveOutcome::ConvergedWithWarning => num_warnings += 1,
            SolveOutcome::Failed => num_failures += 1
        }

        // ---- PLANT ----

        plant.step(
            output.steer_rad,
            output.accel,
            sim_params.cycle_period_s,
            sim_params.plant_step_s
        ).wrap_err("Plant integration failed")?;

        let (cte_m, epsi_rad) = path.tracking_errors(&plant.state);

        debug!(
            "Cycle {}: plant at ({:.3}, {:.3}) heading {:.4} rad at {:.3}, \
             cte {:.4} m, epsi {:.4} rad",
            cycle,
            plant.state.x_m,
            plant.state.y_m,
            plant.state.psi_rad,
            plant.state.v,
            cte_m,
            epsi_rad
        );

        // ---- WRITE ARCHIVES ----

        if let Err(e) = mpc_ctrl.write() {
            warn!("Could not write MpcCtrl archives: {}", e);
        }
        if let Err(e) = arch_plant.serialise(PlantRecord {
            cycle,
            time_s: session::get_elapsed_seconds(),
            x_m: plant.state.x_m,
            y_m: plant.state.y_m,
            psi_rad: plant.state.psi_rad,
            v: plant.state.v,
            cte_m,
            epsi_rad
        }) {
            warn!("Could not write plant archive: {}", e);
        }

        // ---- CYCLE MANAGEMENT ----

        if !sim_params.realtime {
            continue;
        }

        let cycle_dur = Instant::now() - cycle_start_instant;

        // Get sleep duration
        match cycle_period.checked_sub(cycle_dur) {
            Some(d) => thread::sleep(d),
            None => warn!(
                "Cycle overran by {:.06} s",
                cycle_dur.as_secs_f64() - cycle_period.as_secs_f64()
            )
        }
    }

    // ---- SHUTDOWN ----

    let (cte_m, epsi_rad) = path.tracking_errors(&plant.state);
    info!(
        "Ran {} cycles: {} non-converged but usable, {} failed",
        sim_params.num_cycles, num_warnings, num_failures
    );
    info!(
        "Final plant state: {:?}, cte {:.4} m, epsi {:.4} rad",
        plant.state, cte_m, epsi_rad
    );
    info!("End of execution");

    Ok(())
}
