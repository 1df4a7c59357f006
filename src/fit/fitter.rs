//! Fit driver: joint Levenberg-Marquardt fit of the five shared parameters.
//!
//! Given:
//! - a fixed list of `(dataset, process)` pairs
//! - a start parameter vector
//!
//! we minimize `Σ r_i²` over the concatenated normalized residuals using the
//! `levenberg-marquardt` crate with the analytic Jacobian, and return an explicit
//! `FitResult`. A result is only returned when the minimizer reports success and
//! everything it produced is finite; otherwise the caller gets a typed
//! `FitError` it can apply its failure policy to.

use levenberg_marquardt::{LeastSquaresProblem, LevenbergMarquardt, TerminationReason};
use nalgebra::storage::Owned;
use nalgebra::{DMatrix, DVector, Dyn};

use crate::domain::{DatasetGroup, FitResult, ParamVector, SolverSettings};
use crate::error::FitError;
use crate::fit::residuals::{DatasetModelPair, canonical_pairs, chi_squared, jacobian_for_all, residual_for_all};

/// Adapter exposing the residual engine to the minimizer.
struct JointProblem<'a> {
    pairs: &'a [DatasetModelPair<'a>],
    params: ParamVector,
}

impl LeastSquaresProblem<f64, Dyn, Dyn> for JointProblem<'_> {
    type ResidualStorage = Owned<f64, Dyn>;
    type JacobianStorage = Owned<f64, Dyn, Dyn>;
    type ParameterStorage = Owned<f64, Dyn>;

    fn set_params(&mut self, x: &DVector<f64>) {
        for (dst, src) in self.params.0.iter_mut().zip(x.iter()) {
            *dst = *src;
        }
    }

    fn params(&self) -> DVector<f64> {
        DVector::from_column_slice(self.params.as_slice())
    }

    // Returning `None` makes the minimizer stop with `TerminationReason::User`,
    // which `fit_pairs` reports as a degenerate fit.
    fn residuals(&self) -> Option<DVector<f64>> {
        let r = residual_for_all(self.pairs, &self.params).ok()?;
        if r.iter().all(|v| v.is_finite()) {
            Some(DVector::from_vec(r))
        } else {
            None
        }
    }

    fn jacobian(&self) -> Option<DMatrix<f64>> {
        let jac = jacobian_for_all(self.pairs, &self.params);
        if jac.iter().all(|v| v.is_finite()) {
            Some(jac)
        } else {
            None
        }
    }
}

/// Fit the given pairs, starting from `start`.
pub fn fit_pairs(
    pairs: &[DatasetModelPair<'_>],
    start: &ParamVector,
    settings: &SolverSettings,
) -> Result<FitResult, FitError> {
    // Validate the objective up front: schema problems are not fit failures.
    let initial = residual_for_all(pairs, start)?;
    if initial.is_empty() {
        return Err(FitError::schema("fit", "no data points to fit"));
    }
    if !start.is_finite() || initial.iter().any(|v| !v.is_finite()) {
        return Err(FitError::Degenerate {
            reason: format!("non-finite residuals at start point {:?}", start.0),
        });
    }

    let problem = JointProblem {
        pairs,
        params: *start,
    };
    let solver = LevenbergMarquardt::new()
        .with_ftol(settings.ftol)
        .with_xtol(settings.xtol)
        .with_gtol(settings.gtol)
        .with_patience(settings.patience);

    let (solved, report) = solver.minimize(problem);
    check_termination(report.termination, report.number_of_evaluations)?;
    let evaluations = report.number_of_evaluations;

    let params = solved.params;
    if !params.is_finite() {
        return Err(FitError::Degenerate {
            reason: format!("non-finite optimum {:?}", params.0),
        });
    }
    let residuals = residual_for_all(pairs, &params)?;
    let chi2 = chi_squared(&residuals);
    if !chi2.is_finite() {
        return Err(FitError::Degenerate {
            reason: "non-finite chi² at optimum".to_string(),
        });
    }

    Ok(FitResult {
        params,
        chi2,
        n_points: residuals.len(),
        evaluations,
    })
}

/// Map the minimizer's stop reason onto the fit error contract.
///
/// `User` is only raised by `JointProblem` refusing non-finite values, so it
/// means the parameters went degenerate. Every other unsuccessful stop,
/// numerical breakdown of the solver included, is a convergence failure.
fn check_termination(termination: TerminationReason, evaluations: usize) -> Result<(), FitError> {
    match termination {
        TerminationReason::User(what) => Err(FitError::Degenerate {
            reason: format!("non-finite {what} during minimization"),
        }),
        reason if !reason.was_successful() => Err(FitError::NotConverged {
            reason: format!("{reason:?}"),
            evaluations,
        }),
        _ => Ok(()),
    }
}

/// Fit all four datasets of a group in canonical order.
pub fn fit_group(group: &DatasetGroup, start: &ParamVector, settings: &SolverSettings) -> Result<FitResult, FitError> {
    let pairs = canonical_pairs(group);
    fit_pairs(&pairs, start, settings)
}
