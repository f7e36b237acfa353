//! The command line interface for gridcase.
use crate::input::{load_case, read_case_file};
use crate::log;
use crate::network::{TimeSeriesPolicy, assemble_network};
use crate::output::{create_output_directory, get_output_dir, write_results};
use crate::postprocess::postprocess;
use crate::settings::Settings;
use crate::solver::create_solver;
use ::log::{info, warn};
use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use std::path::{Path, PathBuf};

pub mod example;
use example::ExampleSubcommands;

pub mod settings;
use settings::SettingsSubcommands;

/// The command line interface for gridcase.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// The available commands.
    #[command(subcommand)]
    command: Option<Commands>,
    /// Flag to provide the CLI docs as markdown
    #[arg(long, hide = true)]
    markdown_help: bool,
}

/// Options for the `run` command
#[derive(Args, Default)]
pub struct RunOpts {
    /// Directory for output files (defaults to `<output_path>/<case_name>` from the case file)
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
    /// Whether to overwrite the output directory if it already exists
    #[arg(long)]
    pub overwrite: bool,
    /// Abort if a time series cannot be loaded, instead of skipping the component
    #[arg(long)]
    pub strict: bool,
}

/// The available commands.
#[derive(Subcommand)]
enum Commands {
    /// Solve a case and write the results.
    Run {
        /// Path to the case file (CSV or spreadsheet).
        case_file: PathBuf,
        /// Other run options
        #[command(flatten)]
        opts: RunOpts,
    },
    /// Manage example cases.
    Example {
        /// The available subcommands for managing example cases.
        #[command(subcommand)]
        subcommand: ExampleSubcommands,
    },
    /// Check that a case can be read and assembled, without solving it.
    Validate {
        /// Path to the case file (CSV or spreadsheet).
        case_file: PathBuf,
    },
    /// Manage settings file.
    Settings {
        /// The subcommands for managing the settings file.
        #[command(subcommand)]
        subcommand: SettingsSubcommands,
    },
}

impl Commands {
    /// Execute the supplied CLI command
    fn execute(self) -> Result<()> {
        match self {
            Self::Run { case_file, opts } => handle_run_command(&case_file, &opts, None),
            Self::Example { subcommand } => subcommand.execute(),
            Self::Validate { case_file } => handle_validate_command(&case_file, None),
            Self::Settings { subcommand } => subcommand.execute(),
        }
    }
}

/// Parse CLI arguments and start gridcase
pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();

    // Invoked as: `$ gridcase --markdown-help`
    if cli.markdown_help {
        clap_markdown::print_help_markdown::<Cli>();
        return Ok(());
    }

    if let Some(command) = cli.command {
        command.execute()?;
    } else {
        // No command provided. Show help.
        Cli::command().print_long_help()?;
    }

    Ok(())
}

/// Load program settings, if not provided
fn settings_or_load(settings: Option<Settings>) -> Result<Settings> {
    if let Some(settings) = settings {
        Ok(settings)
    } else {
        Settings::load().context("Failed to load settings.")
    }
}

fn time_series_policy(settings: &Settings) -> TimeSeriesPolicy {
    if settings.strict_time_series {
        TimeSeriesPolicy::Strict
    } else {
        TimeSeriesPolicy::Skip
    }
}

/// Handle the `run` command.
pub fn handle_run_command(
    case_path: &Path,
    opts: &RunOpts,
    settings: Option<Settings>,
) -> Result<()> {
    let mut settings = settings_or_load(settings)?;

    // These settings can be overridden by command-line arguments
    if opts.overwrite {
        settings.overwrite = true;
    }
    if opts.strict {
        settings.strict_time_series = true;
    }

    let case_file = read_case_file(case_path).context("Failed to read case file.")?;

    // Get path to output folder
    let output_dir = opts
        .output_dir
        .clone()
        .unwrap_or_else(|| get_output_dir(&case_file.config));
    let overwrite =
        create_output_directory(&output_dir, settings.overwrite).with_context(|| {
            format!(
                "Failed to create output directory: {}",
                output_dir.display()
            )
        })?;

    // Initialise program logger, at the level requested by the case file
    log::init(&case_file.config.logging_level, Some(&output_dir))
        .context("Failed to initialise logging.")?;

    info!("Starting gridcase v{}", env!("CARGO_PKG_VERSION"));
    info!("Case: {}", case_path.display());
    info!("Output folder: {}", output_dir.display());

    // NB: We have to wait until the logger is initialised to display this warning
    if overwrite {
        warn!("Output folder will be overwritten");
    }

    let case = load_case(&case_file, settings.cost_config_path.as_deref())
        .context("Failed to load case.")?;
    let network = assemble_network(&case, time_series_policy(&settings))
        .context("Failed to assemble network.")?;

    let solver = create_solver(&case.config.solver)?;
    info!("Solving with {}", solver.name());
    let solved = solver.solve(&network).context("Failed to solve case.")?;
    info!("Objective value: {}", solved.objective / network.numerics_scaling);

    let tables = postprocess(&network, &solved, &case.config);
    write_results(&output_dir, &case_file, &tables)?;
    info!("Run complete!");

    Ok(())
}

/// Handle the `validate` command.
pub fn handle_validate_command(case_path: &Path, settings: Option<Settings>) -> Result<()> {
    let settings = settings_or_load(settings)?;

    // Initialise program logger (we won't save log files when running the validate command)
    log::init(&settings.log_level, None).context("Failed to initialise logging.")?;

    let case_file = read_case_file(case_path).context("Failed to read case file.")?;
    let case = load_case(&case_file, settings.cost_config_path.as_deref())
        .context("Failed to validate case.")?;
    assemble_network(&case, time_series_policy(&settings))
        .context("Failed to validate case.")?;
    create_solver(&case.config.solver)?;
    info!("Case validation successful!");

    Ok(())
}
