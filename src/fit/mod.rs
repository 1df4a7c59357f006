//! Fitting orchestration.
//!
//! Responsibilities:
//!
//! - normalized residuals across the four datasets (`residuals`)
//! - the joint Levenberg-Marquardt fit (`fitter`)
//! - the Monte-Carlo bootstrap over synthetic replicas (`monte_carlo`)

pub mod fitter;
pub mod monte_carlo;
pub mod residuals;

pub use fitter::*;
pub use monte_carlo::*;
pub use residuals::*;
