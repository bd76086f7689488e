use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "MCML++ contributors",
    version,
    about = "MCML++ CLI - Monte Carlo simulation of photon transport in multi-layered turbid media.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Set the number of threads used to trace photons in parallel.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run every simulation declared in a parameter file.
    Run(RunArgs),
    /// Parse and validate a parameter file without simulating anything.
    Validate(ValidateArgs),
}

/// Photon source geometries selectable from the command line.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Uniform areal density over a disk (needs --radius-um).
    UniformDisk,
    /// Placeholder Gaussian beam; every photon starts at the origin.
    DeferredGaussian,
    /// Planar offsets read from a coordinate file (needs --coords).
    PlanarGaussianFile,
    /// Every photon starts at the origin.
    RawOrigin,
    /// Offsets from a coordinate file launched at a fixed depth
    /// (needs --coords, --depth and --direction-cosine).
    FixedLayer,
}

/// Arguments for the `run` subcommand.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to the TOML parameter file. Prompted for when omitted.
    #[arg(value_name = "INPUT")]
    pub input: Option<PathBuf>,

    /// Engine settings in TOML format (counter policy, seed, matrix output, ...).
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Label every run with this name instead of the parameter file's labels.
    #[arg(short, long, value_name = "TEXT")]
    pub label: Option<String>,

    // --- Source Overrides ---
    /// Photon source used for every run, overriding the parameter file.
    #[arg(short, long, value_enum, value_name = "KIND")]
    pub source: Option<SourceKind>,

    /// Disk radius in micrometres for the uniform-disk source.
    #[arg(long, value_name = "FLOAT")]
    pub radius_um: Option<f64>,

    /// Coordinate file for the file-based sources.
    #[arg(long, value_name = "PATH")]
    pub coords: Option<PathBuf>,

    /// Launch depth in cm for the fixed-layer source.
    #[arg(long, value_name = "FLOAT", allow_negative_numbers = true)]
    pub depth: Option<f64>,

    /// Initial direction cosine along the depth axis for the fixed-layer source.
    #[arg(long, value_name = "FLOAT", allow_negative_numbers = true)]
    pub direction_cosine: Option<f64>,

    // --- Engine Overrides ---
    /// Seed for the random number stream, overriding the config file.
    #[arg(long, value_name = "INT")]
    pub seed: Option<u64>,

    /// Do not write the absorption matrix next to each summary file.
    #[arg(long)]
    pub no_matrix: bool,

    /// Reset the secondary-event counter at the start of every run.
    #[arg(long)]
    pub reset_counters: bool,

    /// Execute the whole parameter file this many times, then exit.
    #[arg(long, value_name = "INT", default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub repeat: u32,

    /// Never prompt; fail instead when a value is missing.
    #[arg(long)]
    pub non_interactive: bool,
}

/// Arguments for the `validate` subcommand.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Path to the TOML parameter file.
    #[arg(value_name = "INPUT", required = true)]
    pub input: PathBuf,
}
