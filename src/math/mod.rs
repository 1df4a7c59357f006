//! Mathematical utilities: descriptive statistics and histograms.

pub mod stats;

pub use stats::*;
