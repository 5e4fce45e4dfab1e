//! Terminal and session file logging.
//!
//! Every record goes to stdout and to the session's `.log` file. Lines carry
//! the seconds since the session epoch and a coloured level tag. Debug and
//! trace lines also name the emitting module so solver diagnostics can be
//! told apart from the controller's own output.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use log::{self, info};
use fern;
use colored::{ColoredString, Colorize};
use thiserror::Error;

// Internal imports
use crate::session;

// Re-exports
pub use log::LevelFilter;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Reasons the logger could not be installed.
#[derive(Debug, Error)]
pub enum LoggerInitError {
    #[error("The minimum log level must admit `INFO` records, found `{0}`")]
    InvalidMinLogLevel(log::LevelFilter),

    #[error("Could not open the session log file: {0}")]
    LogFileInitError(std::io::Error),

    #[error("Could not install the logger: {0}")]
    FernInitError(log::SetLoggerError)
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Install the global logger for `session`.
///
/// `min_level` has to be `Info` or more verbose, the controller reports its
/// per-cycle summary at `Info`. Installing a second logger in the same
/// process fails with [`LoggerInitError::FernInitError`].
pub fn logger_init(
    min_level: self::LevelFilter,
    session: &session::Session
) -> Result<(), LoggerInitError> {

    if min_level < log::Level::Info {
        return Err(LoggerInitError::InvalidMinLogLevel(min_level))
    }

    let log_file = fern::log_file(session.log_file_path.clone())
        .map_err(LoggerInitError::LogFileInitError)?;

    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}",
                format_line(
                    session::get_elapsed_seconds(),
                    record.level(),
                    record.target(),
                    message
                )
            ))
        })
        .level(min_level)
        .chain(std::io::stdout())
        .chain(log_file)
        .apply()
        .map_err(LoggerInitError::FernInitError)?;

    info!("Logging to {:?} at {:?}", session.log_file_path, min_level);
    info!("    Session epoch: {:?}", session::get_epoch());

    Ok(())
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Render one log line.
fn format_line(
    elapsed_s: f64,
    level: log::Level,
    target: &str,
    message: &std::fmt::Arguments
) -> String {
    if level > log::Level::Info {
        format!("[{:10.6} {}] {}: {}", elapsed_s, level_tag(level), target, message)
    }
    else {
        format!("[{:10.6} {}] {}", elapsed_s, level_tag(level), message)
    }
}

fn level_tag(level: log::Level) -> ColoredString {
    match level {
        log::Level::Trace => "TRC".dimmed().italic(),
        log::Level::Debug => "DBG".dimmed(),
        log::Level::Info  => "INF".normal(),
        log::Level::Warn  => "WRN".yellow(),
        log::Level::Error => "ERR".red().bold()
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_format_line() {
        colored::control::set_override(false);

        let info = format_line(1.5, log::Level::Info, "mpc_lib::mpc", &format_args!("cycle {}", 3));
        assert_eq!(info, "[  1.500000 INF] cycle 3");

        // Verbose levels name the emitting module
        let debug = format_line(0.25, log::Level::Debug, "mpc_lib::nlp", &format_args!("outer"));
        assert_eq!(debug, "[  0.250000 DBG] mpc_lib::nlp: outer");
    }
}
