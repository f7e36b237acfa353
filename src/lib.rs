//! Translate spreadsheet case descriptions into energy-system models, solve them with a linear
//! optimisation backend and report the results as tables.
//!
//! The pipeline is: read the case file ([`sheet`]), split it into sections and resolve every
//! component attribute ([`input`]) using the technology cost database ([`costs`]) and the
//! component attribute schema ([`schema`]), assemble the network ([`network`]), solve it
//! ([`solver`]), then reshape the solution into report tables ([`postprocess`]) and write them to
//! disk ([`output`]).
use std::path::PathBuf;

pub mod cli;
pub mod component;
pub mod costs;
pub mod example;
pub mod input;
pub mod log;
pub mod network;
pub mod output;
pub mod postprocess;
pub mod schema;
pub mod settings;
pub mod sheet;
pub mod solver;

#[cfg(test)]
mod fixture;

/// The URL of the project's issue tracker
pub const ISSUES_URL: &str = concat!(env!("CARGO_PKG_REPOSITORY"), "/issues");

/// Get the config folder for the program.
///
/// Falls back to the current directory if the platform has no config directory.
pub fn get_gridcase_config_dir() -> PathBuf {
    let Some(mut dir) = dirs::config_dir() else {
        return PathBuf::default();
    };

    dir.push("gridcase");
    dir
}
