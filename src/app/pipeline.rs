//! Shared fit pipeline used by the `fit` and `bootstrap` commands.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! CSV ingest -> reference fit -> Monte-Carlo bootstrap -> summary
//!
//! The commands can then focus on presentation (printing vs exports).

use std::path::Path;

use tracing::{info, warn};

use crate::domain::{BootstrapConfig, DatasetGroup, FitResult, ParamVector, RunSummary, SolverSettings, TrialRecord};
use crate::error::AppError;
use crate::fit::{MonteCarlo, TrialFailure, fit_group};
use crate::report::{DatasetChi2, chi2_by_dataset};

/// Outputs of a single reference fit.
#[derive(Debug, Clone)]
pub struct FitOutput {
    pub datasets: DatasetGroup,
    pub fit: FitResult,
    pub parts: Vec<DatasetChi2>,
}

/// Outputs of a bootstrap run.
#[derive(Debug, Clone)]
pub struct BootstrapOutput {
    pub datasets: DatasetGroup,
    /// Fit of the unresampled data; `None` if it did not converge.
    pub reference: Option<FitResult>,
    pub reference_parts: Vec<DatasetChi2>,
    pub summary: RunSummary,
    pub records: Vec<TrialRecord>,
    pub failures: Vec<TrialFailure>,
}

/// Load the tables from `data_dir` and fit them once.
pub fn run_reference_fit(data_dir: &Path, start: &ParamVector, solver: &SolverSettings) -> Result<FitOutput, AppError> {
    let datasets = crate::io::ingest::load_all(data_dir)?;
    run_reference_fit_with_data(datasets, start, solver)
}

/// Fit already loaded tables once.
pub fn run_reference_fit_with_data(
    datasets: DatasetGroup,
    start: &ParamVector,
    solver: &SolverSettings,
) -> Result<FitOutput, AppError> {
    let fit = fit_group(&datasets, start, solver)?;
    info!(params = ?fit.params.0, chi2 = fit.chi2, "reference fit converged");
    let parts = chi2_by_dataset(&datasets, &fit)?;
    Ok(FitOutput { datasets, fit, parts })
}

/// Load the tables from `data_dir` and bootstrap them.
pub fn run_bootstrap(data_dir: &Path, config: &BootstrapConfig) -> Result<BootstrapOutput, AppError> {
    let datasets = crate::io::ingest::load_all(data_dir)?;
    run_bootstrap_with_data(datasets, config)
}

/// Bootstrap already loaded tables.
///
/// The reference fit is computed first; it is reported alongside the summary
/// and used as the retry start point. A non-converging reference fit is not
/// fatal, but schema errors are.
pub fn run_bootstrap_with_data(datasets: DatasetGroup, config: &BootstrapConfig) -> Result<BootstrapOutput, AppError> {
    let reference = match fit_group(&datasets, &config.start, &config.solver) {
        Ok(fit) => Some(fit),
        Err(e) if e.is_per_trial() => {
            warn!(error = %e, "reference fit failed");
            None
        }
        Err(e) => return Err(e.into()),
    };
    let reference_parts = match &reference {
        Some(fit) => chi2_by_dataset(&datasets, fit)?,
        None => Vec::new(),
    };

    let mut mc = MonteCarlo::new(datasets.clone(), config.clone())?;
    if let Some(fit) = reference {
        mc = mc.with_reference(fit);
    }
    let summary = mc.run()?.clone();

    Ok(BootstrapOutput {
        datasets,
        reference: mc.reference().cloned(),
        reference_parts,
        summary,
        records: mc.records().to_vec(),
        failures: mc.failures().to_vec(),
    })
}
