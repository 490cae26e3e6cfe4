use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    version,
    about = "xdose - voxel-resolved absorbed X-ray dose estimation for macromolecular crystals of arbitrary shape.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Set the number of threads for parallel computation.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a dose calculation for every exposure in an experiment description.
    Run(RunArgs),
    /// Print the composition and absorption coefficients of an experiment without running it.
    Coefficients(CoefficientsArgs),
}

/// Arguments for the `run` subcommand.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to the experiment description in TOML format.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub config: PathBuf,

    /// Override the voxel resolution (voxels per µm).
    #[arg(short, long, value_name = "FLOAT")]
    pub resolution: Option<f64>,

    /// Override the photon energy (keV) of every beam.
    #[arg(short, long, value_name = "KEV")]
    pub energy: Option<f64>,

    /// Override the flux (photons/s) of every beam.
    #[arg(short, long, value_name = "FLOAT")]
    pub flux: Option<f64>,

    /// Use a cross-section table instead of the bundled one.
    #[arg(long, value_name = "PATH")]
    pub cross_sections: Option<PathBuf>,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S crystal.angle-p=45
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `coefficients` subcommand.
#[derive(Args, Debug)]
pub struct CoefficientsArgs {
    /// Path to the experiment description in TOML format.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub config: PathBuf,

    /// Override the photon energy (keV) of every beam.
    #[arg(short, long, value_name = "KEV")]
    pub energy: Option<f64>,

    /// Use a cross-section table instead of the bundled one.
    #[arg(long, value_name = "PATH")]
    pub cross_sections: Option<PathBuf>,

    /// Set a specific configuration value, overriding the config file.
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}
