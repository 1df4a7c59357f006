//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during fitting and resampling
//! - exported to JSON/CSV for external plotting
//! - passed explicitly between pipeline stages (no global fit state)

use std::fmt;
use std::ops::Index;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::FitError;

/// Number of model parameters: four amplitudes plus the shared falloff.
pub const N_PARAMS: usize = 5;

/// Index of the shared falloff parameter `b`.
pub const FALLOFF_INDEX: usize = 4;

/// Physical process a dataset was measured for.
///
/// `D`/`P` is the target (deuteron / proton), `pp`/`pm` the produced pion
/// charge (π⁺ / π⁻).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Process {
    Dpp,
    Dpm,
    Ppp,
    Ppm,
}

impl Process {
    /// Canonical dataset order. Residual vectors are always concatenated in this order.
    pub const ALL: [Process; 4] = [Process::Dpp, Process::Dpm, Process::Ppp, Process::Ppm];

    pub fn label(self) -> &'static str {
        match self {
            Process::Dpp => "Dpp",
            Process::Dpm => "Dpm",
            Process::Ppp => "Ppp",
            Process::Ppm => "Ppm",
        }
    }

    /// Human-readable reaction for report headings.
    pub fn reaction(self) -> &'static str {
        match self {
            Process::Dpp => "γ* + D → π⁺ + X",
            Process::Dpm => "γ* + D → π⁻ + X",
            Process::Ppp => "γ* + P → π⁺ + X",
            Process::Ppm => "γ* + P → π⁻ + X",
        }
    }

    /// Which amplitude of the parameter vector scales this process.
    pub fn amplitude_index(self) -> usize {
        match self {
            Process::Dpp => 0,
            Process::Dpm => 1,
            Process::Ppp => 2,
            Process::Ppm => 3,
        }
    }

    /// Default CSV file name inside the data directory.
    pub fn file_name(self) -> String {
        format!("{}_unpol_Data.csv", self.label())
    }
}

impl fmt::Display for Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One measured point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DataRow {
    /// Independent variable (P_hT², GeV²).
    pub x: f64,
    /// Observed cross section.
    pub exp_y: f64,
    /// One-sigma uncertainty on `exp_y`. Always `> 0`.
    pub err: f64,
}

/// A validated, immutable table of measurements for one process.
///
/// The only way to build one is `Dataset::new`, which checks every row, so any
/// `Dataset` in hand satisfies the schema contract.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    process: Process,
    x: Vec<f64>,
    exp_y: Vec<f64>,
    err: Vec<f64>,
}

impl Dataset {
    pub fn new(process: Process, rows: impl IntoIterator<Item = DataRow>) -> Result<Self, FitError> {
        let rows = rows.into_iter();
        let (lower, _) = rows.size_hint();
        let mut x = Vec::with_capacity(lower);
        let mut exp_y = Vec::with_capacity(lower);
        let mut err = Vec::with_capacity(lower);

        for (i, row) in rows.enumerate() {
            if !(row.x.is_finite() && row.exp_y.is_finite()) {
                return Err(FitError::schema(
                    process.label(),
                    format!("row {i}: non-finite x or exp_y"),
                ));
            }
            if !(row.err.is_finite() && row.err > 0.0) {
                return Err(FitError::schema(
                    process.label(),
                    format!("row {i}: uncertainty must be positive, got {}", row.err),
                ));
            }
            x.push(row.x);
            exp_y.push(row.exp_y);
            err.push(row.err);
        }

        if x.is_empty() {
            return Err(FitError::schema(process.label(), "dataset has no rows"));
        }

        Ok(Self {
            process,
            x,
            exp_y,
            err,
        })
    }

    pub fn process(&self) -> Process {
        self.process
    }

    pub fn x(&self) -> &[f64] {
        &self.x
    }

    pub fn exp_y(&self) -> &[f64] {
        &self.exp_y
    }

    pub fn err(&self) -> &[f64] {
        &self.err
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Same rows with `exp_y` replaced, used by the resampler.
    ///
    /// `exp_y` must have one value per row; the uncertainty column is reused,
    /// so the positivity invariant still holds.
    pub(crate) fn with_exp_y(&self, exp_y: Vec<f64>) -> Self {
        debug_assert_eq!(exp_y.len(), self.x.len());
        Self {
            process: self.process,
            x: self.x.clone(),
            exp_y,
            err: self.err.clone(),
        }
    }
}

/// The four datasets of one run, held in canonical `Process::ALL` order.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetGroup {
    datasets: Vec<Dataset>,
}

impl DatasetGroup {
    /// Build a group from exactly one dataset per process (any input order).
    pub fn new(datasets: impl IntoIterator<Item = Dataset>) -> Result<Self, FitError> {
        let mut slots: [Option<Dataset>; 4] = [None, None, None, None];
        for ds in datasets {
            let idx = ds.process().amplitude_index();
            if slots[idx].is_some() {
                return Err(FitError::schema(
                    ds.process().label(),
                    "duplicate dataset for process",
                ));
            }
            slots[idx] = Some(ds);
        }

        let mut ordered = Vec::with_capacity(4);
        for (slot, process) in slots.into_iter().zip(Process::ALL) {
            let ds = slot.ok_or_else(|| FitError::schema(process.label(), "dataset missing"))?;
            ordered.push(ds);
        }
        Ok(Self { datasets: ordered })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Dataset> {
        self.datasets.iter()
    }

    pub fn get(&self, process: Process) -> &Dataset {
        &self.datasets[process.amplitude_index()]
    }

    /// Total number of rows, i.e. the length of every residual vector.
    pub fn total_rows(&self) -> usize {
        self.datasets.iter().map(Dataset::len).sum()
    }

    pub(crate) fn from_ordered(datasets: Vec<Dataset>) -> Self {
        debug_assert!(
            datasets
                .iter()
                .zip(Process::ALL)
                .all(|(d, p)| d.process() == p)
        );
        Self { datasets }
    }
}

/// Model parameters `(a1, a2, a3, a4, b)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParamVector(pub [f64; N_PARAMS]);

impl ParamVector {
    pub const NAMES: [&'static str; N_PARAMS] = ["a1", "a2", "a3", "a4", "b"];

    /// Default start point: every parameter at 1.
    pub const UNIT: ParamVector = ParamVector([1.0; N_PARAMS]);

    pub fn from_slice(values: &[f64]) -> Option<Self> {
        let arr: [f64; N_PARAMS] = values.try_into().ok()?;
        Some(Self(arr))
    }

    pub fn amplitude(&self, process: Process) -> f64 {
        self.0[process.amplitude_index()]
    }

    pub fn falloff(&self) -> f64 {
        self.0[FALLOFF_INDEX]
    }

    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|v| v.is_finite())
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

impl Index<usize> for ParamVector {
    type Output = f64;

    fn index(&self, index: usize) -> &f64 {
        &self.0[index]
    }
}

impl Default for ParamVector {
    fn default() -> Self {
        Self::UNIT
    }
}

/// Output of one successful fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitResult {
    pub params: ParamVector,
    /// Sum of squared normalized residuals at `params`.
    pub chi2: f64,
    /// Number of residuals (data points) in the objective.
    pub n_points: usize,
    /// Objective evaluations spent by the minimizer.
    pub evaluations: usize,
}

impl FitResult {
    /// χ² per degree of freedom; `None` when there are no spare points.
    pub fn reduced_chi2(&self) -> Option<f64> {
        let dof = self.n_points.checked_sub(N_PARAMS).filter(|&d| d > 0)?;
        Some(self.chi2 / dof as f64)
    }
}

/// How each synthetic replica is drawn from the observed data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum NoiseModel {
    /// Redraw each `exp_y` from `Normal(exp_y, err)`.
    Gaussian,
    /// Replicas are exact copies (zero-noise validation runs).
    Exact,
}

/// What the Monte-Carlo driver does when a trial's fit fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Refit the same replica once, starting from the reference fit; drop on a
    /// second failure.
    Retry,
    /// Drop the trial immediately.
    Drop,
}

/// Minimizer tolerances and budget.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolverSettings {
    pub ftol: f64,
    pub xtol: f64,
    pub gtol: f64,
    /// Evaluation budget is `patience * (N_PARAMS + 1)`.
    pub patience: usize,
}

impl Default for SolverSettings {
    fn default() -> Self {
        let tol = f64::EPSILON.sqrt();
        Self {
            ftol: tol,
            xtol: tol,
            gtol: 0.0,
            patience: 100,
        }
    }
}

/// A full Monte-Carlo run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BootstrapConfig {
    /// Number of trials `N`.
    pub trials: usize,
    /// Histogram bin count per parameter.
    pub bins: usize,
    /// Run seed; trial `i` uses a stream derived from `(seed, i)`.
    pub seed: u64,
    pub noise: NoiseModel,
    pub failure_policy: FailurePolicy,
    /// Run trials on the rayon pool.
    pub parallel: bool,
    /// Start point handed to every trial's fit.
    pub start: ParamVector,
    pub solver: SolverSettings,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            trials: 200,
            bins: 14,
            seed: 42,
            noise: NoiseModel::Gaussian,
            failure_policy: FailurePolicy::Retry,
            parallel: true,
            start: ParamVector::UNIT,
            solver: SolverSettings::default(),
        }
    }
}

/// Parameters recovered by one Monte-Carlo trial.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    pub trial: usize,
    pub params: ParamVector,
    /// The first fit failed and this record came from the retry.
    pub retried: bool,
}

/// Equal-width histogram over `[edges[0], edges[bins]]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    /// `bins + 1` ascending bin edges.
    pub edges: Vec<f64>,
    pub counts: Vec<usize>,
}

/// Empirical distribution of one parameter across trials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSummary {
    pub name: String,
    pub mean: f64,
    /// Population standard deviation (divides by `n`).
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub histogram: Histogram,
}

/// Result of a finished Monte-Carlo run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub requested: usize,
    pub succeeded: usize,
    /// Successful trials that needed the retry.
    pub retried: usize,
    /// Trials excluded after failing under the failure policy.
    pub dropped: usize,
    /// One entry per parameter; empty when `succeeded == 0`.
    pub parameters: Vec<ParameterSummary>,
}

/// A saved bootstrap run (JSON), the hand-off format for external plotting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryFile {
    pub tool: String,
    pub config: BootstrapConfig,
    /// Fit to the unresampled data, when one was computed.
    pub reference: Option<FitResult>,
    pub summary: RunSummary,
}

/// Fitted curve of one process sampled on a grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveGrid {
    pub process: Process,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

/// A saved reference fit (JSON): parameters plus plottable curves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitFile {
    pub tool: String,
    pub fit: FitResult,
    pub reduced_chi2: Option<f64>,
    pub curves: Vec<CurveGrid>,
}
