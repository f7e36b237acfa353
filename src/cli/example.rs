//! Code related to the example cases and the CLI commands for interacting with them.
use super::{RunOpts, handle_run_command};
use crate::example::{Example, get_example_names};
use crate::settings::Settings;
use anyhow::{Context, Result};
use clap::Subcommand;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Folder which example results are written to, if no output folder is given
const EXAMPLE_RESULTS_DIR: &str = "gridcase_results";

/// The available subcommands for managing example cases.
#[derive(Subcommand)]
pub enum ExampleSubcommands {
    /// List available examples.
    List,
    /// Provide information about the specified example.
    Info {
        /// The name of the example.
        name: String,
    },
    /// Extract an example case to a new directory.
    Extract {
        /// The name of the example to extract.
        name: String,
        /// The destination folder for the example.
        new_path: Option<PathBuf>,
    },
    /// Run an example.
    Run {
        /// The name of the example to run.
        name: String,
        /// Other run options
        #[command(flatten)]
        opts: RunOpts,
    },
}

impl ExampleSubcommands {
    /// Execute the supplied example subcommand
    pub fn execute(self) -> Result<()> {
        match self {
            Self::List => handle_example_list_command(),
            Self::Info { name } => handle_example_info_command(&name)?,
            Self::Extract { name, new_path } => {
                handle_example_extract_command(&name, new_path.as_deref())?;
            }
            Self::Run { name, opts } => handle_example_run_command(&name, opts, None)?,
        }

        Ok(())
    }
}

/// Handle the `example list` command.
fn handle_example_list_command() {
    for name in get_example_names() {
        println!("{name}");
    }
}

/// Handle the `example info` command.
fn handle_example_info_command(name: &str) -> Result<()> {
    let info = Example::from_name(name)?
        .get_readme()
        .with_context(|| format!("Could not load README.txt for '{name}' example"))?;
    print!("{info}");

    Ok(())
}

/// Handle the `example extract` command
fn handle_example_extract_command(name: &str, dest: Option<&Path>) -> Result<()> {
    let example = Example::from_name(name)?;
    example.extract(dest.unwrap_or(Path::new(name)))?;

    Ok(())
}

/// Handle the `example run` command.
///
/// The example is extracted to a temporary folder. Unless an output folder is given, results are
/// written to `gridcase_results/<name>` in the current directory.
pub fn handle_example_run_command(
    name: &str,
    mut opts: RunOpts,
    settings: Option<Settings>,
) -> Result<()> {
    let example = Example::from_name(name)?;
    let temp_dir = TempDir::new().context("Failed to create temporary directory")?;
    let case_path = example.extract(&temp_dir.path().join(name))?;

    if opts.output_dir.is_none() {
        opts.output_dir = Some(Path::new(EXAMPLE_RESULTS_DIR).join(name));
    }
    handle_run_command(&case_path, &opts, settings)
}
