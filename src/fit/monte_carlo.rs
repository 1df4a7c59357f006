//! Monte-Carlo bootstrap of the joint fit.
//!
//! The driver is a small state machine:
//!
//! ```text
//! Idle -> Running { trial: 0, of: N } -> ... -> Running { trial: N-1, of: N } -> Summarizing -> Done
//! ```
//!
//! Each trial draws one replica of every dataset from its own random stream
//! (`trial_rng(seed, trial)`), refits, and yields exactly one outcome: a
//! `TrialRecord` or a dropped `TrialFailure`. Trials only read the original
//! datasets, so `run` can evaluate them on the rayon pool; outcomes are appended
//! in trial order either way, which makes serial and parallel runs identical.
//!
//! Failed fits are never recorded as parameters. `FailurePolicy::Retry` refits
//! the same replica once from the reference fit (the fit to the unresampled
//! data); whatever still fails is dropped and counted in the summary.

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::data::{replicate_group, trial_rng};
use crate::domain::{
    BootstrapConfig, DatasetGroup, FailurePolicy, FitResult, N_PARAMS, ParamVector, ParameterSummary, RunSummary,
    TrialRecord,
};
use crate::error::FitError;
use crate::fit::fitter::fit_group;
use crate::math::{histogram, mean, min_max, std_dev};

/// Where the driver is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    /// `trial` is the next trial to run.
    Running { trial: usize, of: usize },
    Summarizing,
    Done,
}

/// A trial excluded from aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialFailure {
    pub trial: usize,
    pub error: FitError,
}

#[derive(Debug, Clone)]
enum TrialOutcome {
    Recorded(TrialRecord),
    Dropped(TrialFailure),
}

#[derive(Debug, Clone)]
pub struct MonteCarlo {
    originals: DatasetGroup,
    config: BootstrapConfig,
    reference: Option<FitResult>,
    phase: Phase,
    records: Vec<TrialRecord>,
    failures: Vec<TrialFailure>,
    summary: Option<RunSummary>,
}

impl MonteCarlo {
    pub fn new(originals: DatasetGroup, config: BootstrapConfig) -> Result<Self, FitError> {
        if config.trials == 0 {
            return Err(FitError::schema("config", "trial count must be > 0"));
        }
        if config.bins == 0 {
            return Err(FitError::schema("config", "histogram bin count must be > 0"));
        }
        Ok(Self {
            originals,
            records: Vec::with_capacity(config.trials),
            config,
            reference: None,
            phase: Phase::Idle,
            failures: Vec::new(),
            summary: None,
        })
    }

    /// Use an already computed fit of the original data as the retry start.
    pub fn with_reference(mut self, reference: FitResult) -> Self {
        self.reference = Some(reference);
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn reference(&self) -> Option<&FitResult> {
        self.reference.as_ref()
    }

    /// Successful trials, in trial order.
    pub fn records(&self) -> &[TrialRecord] {
        &self.records
    }

    pub fn failures(&self) -> &[TrialFailure] {
        &self.failures
    }

    /// Available once the run reached `Phase::Done`.
    pub fn summary(&self) -> Option<&RunSummary> {
        self.summary.as_ref()
    }

    /// Advance by one unit of work (prepare, one trial, or summarize).
    ///
    /// Schema errors abort the run and leave the phase unchanged.
    pub fn step(&mut self) -> Result<Phase, FitError> {
        self.phase = match self.phase {
            Phase::Idle => {
                self.prepare()?;
                Phase::Running {
                    trial: 0,
                    of: self.config.trials,
                }
            }
            Phase::Running { trial, of } => {
                let outcome = self.run_trial(trial)?;
                self.push(outcome);
                if trial + 1 == of {
                    Phase::Summarizing
                } else {
                    Phase::Running { trial: trial + 1, of }
                }
            }
            Phase::Summarizing => {
                self.summary = Some(self.summarize()?);
                Phase::Done
            }
            Phase::Done => Phase::Done,
        };
        Ok(self.phase)
    }

    /// Drive the run to `Phase::Done` and return the summary.
    pub fn run(&mut self) -> Result<&RunSummary, FitError> {
        if self.phase == Phase::Idle {
            self.step()?;
        }

        if let Phase::Running { trial, of } = self.phase {
            info!(
                trials = of,
                seed = self.config.seed,
                noise = ?self.config.noise,
                parallel = self.config.parallel,
                "running bootstrap trials"
            );
            if self.config.parallel {
                let outcomes = (trial..of)
                    .into_par_iter()
                    .map(|i| self.run_trial(i))
                    .collect::<Result<Vec<_>, _>>()?;
                for outcome in outcomes {
                    self.push(outcome);
                }
                self.phase = Phase::Summarizing;
            }
        }

        while self.phase != Phase::Done {
            self.step()?;
        }

        let summary = self
            .summary
            .as_ref()
            .ok_or(FitError::NoSuccessfulTrials {
                requested: self.config.trials,
            })?;
        info!(
            succeeded = summary.succeeded,
            retried = summary.retried,
            dropped = summary.dropped,
            "bootstrap finished"
        );
        Ok(summary)
    }

    fn prepare(&mut self) -> Result<(), FitError> {
        if self.reference.is_some() || self.config.failure_policy != FailurePolicy::Retry {
            return Ok(());
        }
        match fit_group(&self.originals, &self.config.start, &self.config.solver) {
            Ok(fit) => {
                debug!(params = ?fit.params.0, chi2 = fit.chi2, "reference fit for retries");
                self.reference = Some(fit);
            }
            Err(e) if e.is_per_trial() => {
                warn!(error = %e, "reference fit failed; failed trials will be dropped without retry");
            }
            Err(e) => return Err(e),
        }
        Ok(())
    }

    fn run_trial(&self, trial: usize) -> Result<TrialOutcome, FitError> {
        let mut rng = trial_rng(self.config.seed, trial);
        let replica = replicate_group(&self.originals, self.config.noise, &mut rng)?;

        let first_error = match fit_group(&replica, &self.config.start, &self.config.solver) {
            Ok(fit) => {
                debug!(trial, of = self.config.trials, "trial fitted");
                return Ok(TrialOutcome::Recorded(TrialRecord {
                    trial,
                    params: fit.params,
                    retried: false,
                }));
            }
            Err(e) if e.is_per_trial() => e,
            Err(e) => return Err(e),
        };

        let retry_start = match (self.config.failure_policy, &self.reference) {
            (FailurePolicy::Retry, Some(reference)) => reference.params,
            _ => {
                warn!(trial, error = %first_error, "dropping trial");
                return Ok(TrialOutcome::Dropped(TrialFailure {
                    trial,
                    error: first_error,
                }));
            }
        };

        debug!(trial, error = %first_error, "retrying trial from reference fit");
        match fit_group(&replica, &retry_start, &self.config.solver) {
            Ok(fit) => Ok(TrialOutcome::Recorded(TrialRecord {
                trial,
                params: fit.params,
                retried: true,
            })),
            Err(e) if e.is_per_trial() => {
                warn!(trial, error = %e, "dropping trial after retry");
                Ok(TrialOutcome::Dropped(TrialFailure { trial, error: e }))
            }
            Err(e) => Err(e),
        }
    }

    fn push(&mut self, outcome: TrialOutcome) {
        match outcome {
            TrialOutcome::Recorded(record) => self.records.push(record),
            TrialOutcome::Dropped(failure) => self.failures.push(failure),
        }
    }

    fn summarize(&self) -> Result<RunSummary, FitError> {
        Ok(RunSummary {
            requested: self.config.trials,
            succeeded: self.records.len(),
            retried: self.records.iter().filter(|r| r.retried).count(),
            dropped: self.failures.len(),
            parameters: summarize_parameters(&self.records, self.config.bins)?,
        })
    }
}

/// Per-parameter statistics over the records; empty when there are none.
///
/// `bins` must be positive.
pub fn summarize_parameters(records: &[TrialRecord], bins: usize) -> Result<Vec<ParameterSummary>, FitError> {
    if bins == 0 {
        return Err(FitError::schema("config", "histogram bin count must be > 0"));
    }
    if records.is_empty() {
        return Ok(Vec::new());
    }

    Ok((0..N_PARAMS)
        .filter_map(|j| {
            let values: Vec<f64> = records.iter().map(|r| r.params[j]).collect();
            let (min, max) = min_max(&values)?;
            Some(ParameterSummary {
                name: ParamVector::NAMES[j].to_string(),
                mean: mean(&values)?,
                std_dev: std_dev(&values)?,
                min,
                max,
                histogram: histogram(&values, bins)?,
            })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DataRow, Dataset, NoiseModel, Process, SolverSettings};
    use crate::models::predict;
    use approx::assert_abs_diff_eq;

    const TRUTH: ParamVector = ParamVector([2.0, 3.0, 4.0, 5.0, 1.0]);

    fn group_at(p: &ParamVector, xs: &[f64], err: f64) -> DatasetGroup {
        let datasets = Process::ALL.map(|process| {
            let rows = xs.iter().map(|&x| DataRow {
                x,
                exp_y: predict(process, x, p),
                err,
            });
            Dataset::new(process, rows).unwrap()
        });
        DatasetGroup::new(datasets).unwrap()
    }

    /// Data with realistic relative errors so Gaussian replicas stay fittable.
    fn noisy_setup() -> DatasetGroup {
        let truth = ParamVector([0.8, 1.2, 0.5, 0.9, 0.35]);
        let xs: Vec<f64> = (1..=10).map(|i| 0.07 * i as f64).collect();
        let datasets = Process::ALL.map(|process| {
            let rows = xs.iter().map(|&x| {
                let y = predict(process, x, &truth);
                DataRow { x, exp_y: y, err: 0.05 * y }
            });
            Dataset::new(process, rows).unwrap()
        });
        DatasetGroup::new(datasets).unwrap()
    }

    fn config(trials: usize) -> BootstrapConfig {
        BootstrapConfig {
            trials,
            bins: 5,
            seed: 11,
            noise: NoiseModel::Gaussian,
            failure_policy: FailurePolicy::Retry,
            parallel: false,
            start: ParamVector([1.0, 1.0, 1.0, 1.0, 0.5]),
            solver: SolverSettings::default(),
        }
    }

    #[test]
    fn exact_single_trial_recovers_true_parameters() {
        let group = group_at(&TRUTH, &[1.0, 2.0, 3.0], 0.1);
        let cfg = BootstrapConfig {
            trials: 1,
            noise: NoiseModel::Exact,
            start: ParamVector::UNIT,
            ..config(1)
        };

        let mut mc = MonteCarlo::new(group, cfg).unwrap();
        let summary = mc.run().unwrap().clone();

        assert_eq!(summary.succeeded, 1);
        assert_eq!(mc.records().len(), 1);
        let params = mc.records()[0].params;
        for j in 0..N_PARAMS {
            assert_abs_diff_eq!(params[j], TRUTH[j], epsilon = 1e-3);
            assert_abs_diff_eq!(summary.parameters[j].mean, TRUTH[j], epsilon = 1e-3);
        }
    }

    #[test]
    fn steps_through_every_phase() {
        let mut mc = MonteCarlo::new(noisy_setup(), config(3)).unwrap();
        assert_eq!(mc.phase(), Phase::Idle);
        assert_eq!(mc.step().unwrap(), Phase::Running { trial: 0, of: 3 });
        assert_eq!(mc.step().unwrap(), Phase::Running { trial: 1, of: 3 });
        assert_eq!(mc.step().unwrap(), Phase::Running { trial: 2, of: 3 });
        assert_eq!(mc.step().unwrap(), Phase::Summarizing);
        assert!(mc.summary().is_none());
        assert_eq!(mc.step().unwrap(), Phase::Done);
        assert_eq!(mc.step().unwrap(), Phase::Done);
        assert!(mc.summary().is_some());
    }

    #[test]
    fn summary_mean_is_mean_of_records() {
        let n = 25;
        let mut mc = MonteCarlo::new(noisy_setup(), config(n)).unwrap();
        let summary = mc.run().unwrap().clone();

        assert_eq!(summary.succeeded + summary.dropped, n);
        assert_eq!(summary.dropped, 0);
        assert_eq!(mc.records().len(), n);
        assert_eq!(summary.parameters.len(), N_PARAMS);

        for (j, p) in summary.parameters.iter().enumerate() {
            let values: Vec<f64> = mc.records().iter().map(|r| r.params[j]).collect();
            let expected = values.iter().sum::<f64>() / n as f64;
            assert_abs_diff_eq!(p.mean, expected, epsilon = 1e-12);
            assert_eq!(p.histogram.counts.iter().sum::<usize>(), n);
            assert_eq!(p.name, ParamVector::NAMES[j]);
        }

        // Replicas are genuinely different, so the parameters scatter.
        assert!(summary.parameters.iter().all(|p| p.std_dev > 0.0));
    }

    #[test]
    fn parallel_and_serial_runs_agree() {
        let mut serial = MonteCarlo::new(noisy_setup(), config(12)).unwrap();
        serial.run().unwrap();

        let cfg = BootstrapConfig {
            parallel: true,
            ..config(12)
        };
        let mut parallel = MonteCarlo::new(noisy_setup(), cfg).unwrap();
        parallel.run().unwrap();

        assert_eq!(serial.records(), parallel.records());
        assert_eq!(serial.summary(), parallel.summary());
    }

    #[test]
    fn failed_trials_are_dropped_and_counted() {
        let group = group_at(&TRUTH, &[1.0, 2.0, 3.0], 0.1);
        let cfg = BootstrapConfig {
            start: ParamVector([1.0, 1.0, 1.0, 1.0, 0.0]),
            noise: NoiseModel::Exact,
            ..config(4)
        };

        // Reference fit from the same degenerate start also fails: nothing to retry from.
        let mut mc = MonteCarlo::new(group, cfg).unwrap();
        let summary = mc.run().unwrap().clone();

        assert_eq!(summary.requested, 4);
        assert_eq!(summary.succeeded, 0);
        assert_eq!(summary.dropped, 4);
        assert!(summary.parameters.is_empty());
        assert!(mc.records().is_empty());
        assert!(
            mc.failures()
                .iter()
                .all(|f| matches!(f.error, FitError::Degenerate { .. }))
        );
    }

    #[test]
    fn retry_from_reference_recovers_failed_trials() {
        let group = group_at(&TRUTH, &[1.0, 2.0, 3.0], 0.1);
        let reference = fit_group(&group, &ParamVector::UNIT, &SolverSettings::default()).unwrap();
        let cfg = BootstrapConfig {
            start: ParamVector([1.0, 1.0, 1.0, 1.0, 0.0]),
            noise: NoiseModel::Exact,
            ..config(3)
        };

        let mut mc = MonteCarlo::new(group.clone(), cfg.clone()).unwrap().with_reference(reference);
        let summary = mc.run().unwrap().clone();
        assert_eq!(summary.succeeded, 3);
        assert_eq!(summary.retried, 3);
        assert_eq!(summary.dropped, 0);
        assert!(mc.records().iter().all(|r| r.retried));

        let drop_cfg = BootstrapConfig {
            failure_policy: FailurePolicy::Drop,
            ..cfg
        };
        let reference = fit_group(&group, &ParamVector::UNIT, &SolverSettings::default()).unwrap();
        let mut mc = MonteCarlo::new(group, drop_cfg).unwrap().with_reference(reference);
        let summary = mc.run().unwrap().clone();
        assert_eq!(summary.succeeded, 0);
        assert_eq!(summary.dropped, 3);
    }

    #[test]
    fn rejects_empty_runs() {
        assert!(MonteCarlo::new(noisy_setup(), config(0)).is_err());
        let cfg = BootstrapConfig { bins: 0, ..config(2) };
        assert!(MonteCarlo::new(noisy_setup(), cfg).is_err());
    }

    #[test]
    fn summary_without_bins_is_an_error_not_an_empty_summary() {
        let records = vec![TrialRecord {
            trial: 0,
            params: TRUTH,
            retried: false,
        }];
        let err = summarize_parameters(&records, 0).unwrap_err();
        assert!(matches!(err, FitError::Schema { .. }), "got {err:?}");
        assert!(summarize_parameters(&[], 0).is_err());

        assert!(summarize_parameters(&[], 14).unwrap().is_empty());
        let summary = summarize_parameters(&records, 14).unwrap();
        assert_eq!(summary.len(), N_PARAMS);
        assert_eq!(summary[4].mean, TRUTH[4]);
        assert_eq!(summary[4].std_dev, 0.0);
    }
}
