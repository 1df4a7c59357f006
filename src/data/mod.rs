//! Synthetic data generation.
//!
//! - bootstrap replicas of measured datasets (`resample`)

pub mod resample;

pub use resample::*;
