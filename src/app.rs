//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and parses CLI arguments
//! - installs the log subscriber
//! - runs the reference fit or the bootstrap
//! - prints reports
//! - writes optional exports

use std::path::PathBuf;

use clap::Parser;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use crate::cli::{BootstrapArgs, Command, FitArgs};
use crate::domain::{BootstrapConfig, ParamVector, SolverSettings};
use crate::error::AppError;

pub mod pipeline;

/// Environment variable naming the default data directory.
pub const DATA_DIR_ENV: &str = "TMD_DATA_DIR";

/// Entry point for the `tmd` binary.
pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    let cli = crate::cli::Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        Command::Fit(args) => handle_fit(args),
        Command::Bootstrap(args) => handle_bootstrap(args),
    }
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();
    // Only fails if a subscriber is already installed, in which case it keeps logging.
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let data_dir = resolve_data_dir(&args);
    let start = start_from_args(&args)?;
    let solver = solver_from_args(&args);

    let out = pipeline::run_reference_fit(&data_dir, &start, &solver)?;
    println!("{}", crate::report::format_fit(&out.fit, &out.parts));

    if let Some(path) = &args.export_fit {
        crate::io::export::write_fit_json(path, &out.fit, &out.datasets)?;
    }
    Ok(())
}

fn handle_bootstrap(args: BootstrapArgs) -> Result<(), AppError> {
    let data_dir = resolve_data_dir(&args.fit);
    let config = bootstrap_config_from_args(&args)?;

    let out = pipeline::run_bootstrap(&data_dir, &config)?;

    if let Some(reference) = &out.reference {
        println!("{}", crate::report::format_fit(reference, &out.reference_parts));
    }
    println!("{}", crate::report::format_summary(&out.summary, &config));

    if let Some(path) = &args.export_summary {
        crate::io::export::write_summary_json(path, &config, out.reference.as_ref(), &out.summary)?;
    }
    if let Some(path) = &args.export_trials {
        crate::io::export::write_trials_csv(path, &out.records)?;
    }
    if let (Some(path), Some(reference)) = (&args.fit.export_fit, &out.reference) {
        crate::io::export::write_fit_json(path, reference, &out.datasets)?;
    }

    if out.summary.succeeded == 0 {
        return Err(crate::error::FitError::NoSuccessfulTrials {
            requested: out.summary.requested,
        }
        .into());
    }
    Ok(())
}

pub fn bootstrap_config_from_args(args: &BootstrapArgs) -> Result<BootstrapConfig, AppError> {
    if args.trials == 0 {
        return Err(AppError::new(2, "Trial count must be > 0."));
    }
    if args.bins == 0 {
        return Err(AppError::new(2, "Bin count must be > 0."));
    }
    Ok(BootstrapConfig {
        trials: args.trials,
        bins: args.bins,
        seed: args.seed,
        noise: args.noise,
        failure_policy: args.failure_policy,
        parallel: !args.serial,
        start: start_from_args(&args.fit)?,
        solver: solver_from_args(&args.fit),
    })
}

fn start_from_args(args: &FitArgs) -> Result<ParamVector, AppError> {
    let start = ParamVector::from_slice(&args.start).ok_or_else(|| {
        AppError::new(
            2,
            format!("--start needs exactly 5 values (a1,a2,a3,a4,b), got {}.", args.start.len()),
        )
    })?;
    if !start.is_finite() || start.falloff() == 0.0 {
        return Err(AppError::new(2, "--start must be finite with a non-zero b."));
    }
    Ok(start)
}

fn solver_from_args(args: &FitArgs) -> SolverSettings {
    SolverSettings {
        patience: args.patience.max(1),
        ..SolverSettings::default()
    }
}

/// `--data-dir`, else `TMD_DATA_DIR`, else `data`.
fn resolve_data_dir(args: &FitArgs) -> PathBuf {
    args.data_dir
        .clone()
        .or_else(|| std::env::var_os(DATA_DIR_ENV).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("data"))
}
