//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - process labels and validated datasets (`Process`, `Dataset`, `DatasetGroup`)
//! - the parameter vector and fit outputs (`ParamVector`, `FitResult`)
//! - Monte-Carlo configuration and results (`BootstrapConfig`, `RunSummary`, etc.)

pub mod types;

pub use types::*;
