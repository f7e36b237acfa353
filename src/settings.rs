//! Code for loading program settings.
use crate::get_gridcase_config_dir;
use crate::input::read_toml;
use crate::log::DEFAULT_LOG_LEVEL;
use anyhow::Result;
use documented::DocumentedFields;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt::Write;
use std::path::{Path, PathBuf};

const SETTINGS_FILE_NAME: &str = "settings.toml";

/// If this environment variable is set, the settings file is ignored
const USE_DEFAULT_SETTINGS_ENV_VAR: &str = "GRIDCASE_USE_DEFAULT_SETTINGS";

const DEFAULT_SETTINGS_FILE_HEADER: &str = concat!(
    "# This file contains the program settings for gridcase.
#
# The default options for gridcase v",
    env!("CARGO_PKG_VERSION"),
    " are shown below, commented out. To change an option, uncomment it and set the value
# appropriately.
#
# To show the default options for the current version of gridcase, run:
# \tgridcase settings show-default
"
);

/// Get the path to where the settings file will be read from
pub fn get_settings_file_path() -> PathBuf {
    let mut path = get_gridcase_config_dir();
    path.push(SETTINGS_FILE_NAME);

    path
}

/// Program settings from config file
#[derive(Debug, DocumentedFields, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// The log level used when a case file does not set one (e.g. for validation)
    pub log_level: String,
    /// Whether to overwrite output files by default
    pub overwrite: bool,
    /// Whether a time series which cannot be loaded aborts the run (otherwise the affected
    /// component is skipped with a warning)
    pub strict_time_series: bool,
    /// Path to a cost configuration file to use instead of the one next to the cost database
    pub cost_config_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            overwrite: false,
            strict_time_series: false,
            cost_config_path: None,
        }
    }
}

impl Settings {
    /// Read the contents of the settings file.
    ///
    /// If the file is not present, or `GRIDCASE_USE_DEFAULT_SETTINGS` is set, default settings
    /// will be used.
    ///
    /// # Returns
    ///
    /// The program settings as a `Settings` struct or an error if loading fails.
    pub fn load() -> Result<Settings> {
        if env::var_os(USE_DEFAULT_SETTINGS_ENV_VAR).is_some() {
            return Ok(Settings::default());
        }

        Self::load_from_path(&get_settings_file_path())
    }

    /// Read from the specified path, returning defaults if the file is absent
    fn load_from_path(file_path: &Path) -> Result<Settings> {
        if !file_path.is_file() {
            return Ok(Settings::default());
        }

        read_toml(file_path)
    }

    /// The contents of the default settings file.
    pub fn default_file_contents() -> String {
        let settings = Settings::default();

        // Convert to TOML
        let settings_raw = toml::to_string(&settings).expect("Could not convert settings to TOML");

        // Iterate through the generated TOML, commenting out parameter lines and inserting
        // their documentation comments
        let mut out = DEFAULT_SETTINGS_FILE_HEADER.to_string();
        for line in settings_raw.split('\n') {
            if let Some((field, _)) = line.split_once('=') {
                let field = field.trim();

                // All fields should have doc comments
                let docs = Settings::get_field_docs(field).expect("Missing doc comment for field");
                for line in docs.split('\n') {
                    write!(&mut out, "\n# # {}\n", line.trim()).unwrap();
                }

                writeln!(&mut out, "# {}", line.trim()).unwrap();
            }
        }

        out
    }
}
