//! The CLI commands for working with the settings file.
use crate::settings::{Settings, get_settings_file_path};
use anyhow::Result;
use clap::Subcommand;

/// The subcommands for managing the settings file.
#[derive(Subcommand)]
pub enum SettingsSubcommands {
    /// Show the default settings file, with documentation for each option.
    ShowDefault,
    /// Show the path to the settings file.
    Path,
}

impl SettingsSubcommands {
    /// Execute the supplied settings subcommand
    pub fn execute(self) -> Result<()> {
        match self {
            Self::ShowDefault => handle_show_default_command(),
            Self::Path => handle_path_command(),
        }

        Ok(())
    }
}

/// Handle the `settings show-default` command.
fn handle_show_default_command() {
    print!("{}", Settings::default_file_contents());
}

/// Handle the `settings path` command.
fn handle_path_command() {
    let path = get_settings_file_path();
    println!("{}", path.display());
    if !path.is_file() {
        eprintln!("(file does not exist; default settings are in use)");
    }
}
