//! Provides logging functionality.
//!
//! Messages below warning level go to stdout and warnings and errors go to stderr. If an output
//! folder is supplied, the messages are also written to log files there (without colour codes).
use anyhow::{Context, Result};
use chrono::Local;
use fern::colors::{Color, ColoredLevelConfig};
use fern::{Dispatch, FormatCallback};
use log::{Level, LevelFilter, Record};
use std::env;
use std::fmt::{Arguments, Display};
use std::io::IsTerminal;
use std::path::Path;
use std::sync::OnceLock;

/// The default log level for the program.
///
/// Used when neither the case file nor the settings file specify a level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// The environment variable which, if set, overrides the configured log level
const LOG_LEVEL_ENV_VAR: &str = "GRIDCASE_LOG_LEVEL";

/// The file name for the log file containing messages about the ordinary operation of the program
const LOG_INFO_FILE_NAME: &str = "gridcase_info.log";

/// The file name for the log file containing debug messages
const LOG_DEBUG_FILE_NAME: &str = "gridcase_debug.log";

/// Set once the logger has been initialised
static LOGGER_INIT: OnceLock<()> = OnceLock::new();

/// Whether the program logger has been initialised
pub fn is_logger_initialised() -> bool {
    LOGGER_INIT.get().is_some()
}

/// Parse a log level name (case-insensitive)
pub fn parse_log_level(level: &str) -> Result<LevelFilter> {
    level
        .trim()
        .parse()
        .with_context(|| format!("Unknown log level: {level}"))
}

/// Initialise the program logger using the `fern` logging library.
///
/// The log level is taken from the `GRIDCASE_LOG_LEVEL` environment variable if set, otherwise
/// from `log_level`.
///
/// # Arguments
///
/// * `log_level` - The log level requested by the case file or program settings
/// * `log_file_path` - Folder in which to save log files, if any
pub fn init(log_level: &str, log_file_path: Option<&Path>) -> Result<()> {
    if is_logger_initialised() {
        return Ok(());
    }

    let log_level = env::var(LOG_LEVEL_ENV_VAR).unwrap_or_else(|_| log_level.to_string());
    let log_level = parse_log_level(&log_level)?;

    let colours = ColoredLevelConfig::new()
        .error(Color::Red)
        .warn(Color::Yellow)
        .info(Color::Green)
        .debug(Color::Blue)
        .trace(Color::Magenta);
    let use_colour_stdout = std::io::stdout().is_terminal();
    let use_colour_stderr = std::io::stderr().is_terminal();

    let mut dispatch = Dispatch::new()
        // Anything below warning goes to stdout
        .chain(
            Dispatch::new()
                .level(log_level)
                .filter(|metadata| metadata.level() > Level::Warn)
                .format(move |out, message, record| {
                    write_log(out, message, record, use_colour_stdout.then_some(&colours));
                })
                .chain(std::io::stdout()),
        )
        // Warnings and errors go to stderr
        .chain(
            Dispatch::new()
                .level(log_level.min(LevelFilter::Warn))
                .format(move |out, message, record| {
                    write_log(out, message, record, use_colour_stderr.then_some(&colours));
                })
                .chain(std::io::stderr()),
        );

    if let Some(log_file_path) = log_file_path {
        dispatch = dispatch
            .chain(
                Dispatch::new()
                    .level(log_level.min(LevelFilter::Info))
                    .format(|out, message, record| write_log(out, message, record, None))
                    .chain(fern::log_file(log_file_path.join(LOG_INFO_FILE_NAME))?),
            )
            .chain(
                Dispatch::new()
                    .level(log_level.max(LevelFilter::Debug))
                    .filter(|metadata| metadata.level() >= Level::Debug)
                    .format(|out, message, record| write_log(out, message, record, None))
                    .chain(fern::log_file(log_file_path.join(LOG_DEBUG_FILE_NAME))?),
            );
    }

    dispatch.apply()?;
    let _ = LOGGER_INIT.set(());

    Ok(())
}

/// Write a single log line, optionally with coloured level labels
fn write_log(
    out: FormatCallback,
    message: &Arguments,
    record: &Record,
    colours: Option<&ColoredLevelConfig>,
) {
    let timestamp = Local::now().format("%H:%M:%S");
    let level: Box<dyn Display> = match colours {
        Some(colours) => Box::new(colours.color(record.level())),
        None => Box::new(record.level()),
    };

    out.finish(format_args!(
        "[{timestamp} {level} {}] {message}",
        record.target()
    ));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::assert_error;
    use rstest::rstest;

    #[rstest]
    #[case("off", LevelFilter::Off)]
    #[case("ERROR", LevelFilter::Error)]
    #[case("warn", LevelFilter::Warn)]
    #[case(" info ", LevelFilter::Info)]
    #[case("debug", LevelFilter::Debug)]
    #[case("trace", LevelFilter::Trace)]
    fn parse_log_level_valid(#[case] level: &str, #[case] expected: LevelFilter) {
        assert_eq!(parse_log_level(level).unwrap(), expected);
    }

    #[test]
    fn parse_log_level_invalid() {
        assert_error!(parse_log_level("verbose"), "Unknown log level: verbose");
    }
}
