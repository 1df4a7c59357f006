//! Exponential-falloff model shared by the four processes.
//!
//! Models are implemented as small, pure functions so that the residual engine
//! and the minimizer can stay generic.

pub mod model;

pub use model::*;
