//! Error types.
//!
//! - `FitError` is the typed error of the fitting core (schema, degenerate
//!   parameters, convergence).
//! - `AppError` is what the binary reports: a message plus a process exit code.

use thiserror::Error;

/// Errors raised by datasets, the residual engine, and the fit driver.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitError {
    /// Input data violates the dataset contract (missing column, bad row,
    /// non-positive uncertainty, mismatched lengths).
    ///
    /// Not retryable: the whole run is invalid until the input is fixed.
    #[error("schema error in {source_name}: {message}")]
    Schema { source_name: String, message: String },

    /// Residuals, Jacobian, or parameters became non-finite (typically the
    /// falloff parameter was driven to zero).
    #[error("degenerate parameters: {reason}")]
    Degenerate { reason: String },

    /// The minimizer stopped without reporting success.
    #[error("fit did not converge after {evaluations} evaluations: {reason}")]
    NotConverged { reason: String, evaluations: usize },

    /// Summary statistics were requested but every trial was dropped.
    #[error("none of the {requested} requested trials produced a fit")]
    NoSuccessfulTrials { requested: usize },
}

impl FitError {
    pub fn schema(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Schema {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// Whether the failure is local to one fit and may be recovered by the
    /// Monte-Carlo failure policy.
    pub fn is_per_trial(&self) -> bool {
        matches!(self, FitError::Degenerate { .. } | FitError::NotConverged { .. })
    }
}

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl From<FitError> for AppError {
    fn from(err: FitError) -> Self {
        let exit_code = match err {
            FitError::Schema { .. } => 2,
            FitError::NoSuccessfulTrials { .. } => 3,
            FitError::Degenerate { .. } | FitError::NotConverged { .. } => 4,
        };
        AppError::new(exit_code, err.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}
