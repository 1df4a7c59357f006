//! Command-line parsing for the bootstrap fitter.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the modeling/math code.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::{FailurePolicy, NoiseModel};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "tmd",
    version,
    about = "Joint exponential fit of the Dpp/Dpm/Ppp/Ppm tables with bootstrap uncertainties"
)]
pub struct Cli {
    /// Verbose (debug) logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit the original tables once and print parameters and chi².
    Fit(FitArgs),
    /// Refit many synthetic replicas and summarize the parameter distributions.
    Bootstrap(BootstrapArgs),
}

/// Options shared by every command that fits.
#[derive(Debug, Args, Clone)]
pub struct FitArgs {
    /// Directory holding `Dpp_unpol_Data.csv`, `Dpm_unpol_Data.csv`, ...
    ///
    /// Falls back to `TMD_DATA_DIR` (environment or `.env`), then `data`.
    #[arg(short = 'd', long)]
    pub data_dir: Option<PathBuf>,

    /// Start parameters `a1,a2,a3,a4,b`.
    #[arg(long, value_delimiter = ',', default_values_t = vec![1.0, 1.0, 1.0, 1.0, 1.0])]
    pub start: Vec<f64>,

    /// Minimizer evaluation budget multiplier.
    #[arg(long, default_value_t = 100)]
    pub patience: usize,

    /// Export the fit (parameters + fitted curves) to JSON.
    #[arg(long = "export-fit")]
    pub export_fit: Option<PathBuf>,
}

/// Options for a bootstrap run.
#[derive(Debug, Args, Clone)]
pub struct BootstrapArgs {
    #[command(flatten)]
    pub fit: FitArgs,

    /// Number of synthetic replicas to fit.
    #[arg(short = 'n', long, default_value_t = 200)]
    pub trials: usize,

    /// Histogram bins per parameter.
    #[arg(long, default_value_t = 14)]
    pub bins: usize,

    /// Run seed; every trial derives its own random stream from it.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// How replicas are drawn.
    #[arg(long, value_enum, default_value_t = NoiseModel::Gaussian)]
    pub noise: NoiseModel,

    /// What to do with trials whose fit fails.
    #[arg(long, value_enum, default_value_t = FailurePolicy::Retry)]
    pub failure_policy: FailurePolicy,

    /// Run trials one after another instead of on the thread pool.
    #[arg(long)]
    pub serial: bool,

    /// Export the run summary to JSON.
    #[arg(long = "export-summary")]
    pub export_summary: Option<PathBuf>,

    /// Export every recorded trial to CSV.
    #[arg(long = "export-trials")]
    pub export_trials: Option<PathBuf>,
}
