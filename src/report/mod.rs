//! Reporting utilities: per-dataset fit diagnostics and formatted terminal output.

pub mod format;

pub use format::*;

use crate::domain::{DatasetGroup, FitResult, Process};
use crate::error::FitError;
use crate::fit::residuals::{chi_squared, residual_for_dataset};
use crate::models::model_for;

/// χ² contribution of one dataset at the fitted parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetChi2 {
    pub process: Process,
    pub n_points: usize,
    pub chi2: f64,
}

/// Split the total χ² of a fit into per-dataset contributions.
pub fn chi2_by_dataset(group: &DatasetGroup, fit: &FitResult) -> Result<Vec<DatasetChi2>, FitError> {
    group
        .iter()
        .map(|ds| {
            let r = residual_for_dataset(ds, model_for(ds.process()), &fit.params)?;
            Ok(DatasetChi2 {
                process: ds.process(),
                n_points: r.len(),
                chi2: chi_squared(&r),
            })
        })
        .collect()
}
