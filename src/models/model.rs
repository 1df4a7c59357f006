//! Model evaluation for the four processes.
//!
//! Every process uses the same functional form
//!
//! ```text
//! f_k(x, p) = p[k] / (π · b) · exp(-x / b),   b = p[4]
//! ```
//!
//! and differs only in which amplitude `p[k]` scales it. The fitter relies on
//! two primitive operations:
//! - predict `f_k(x)` for residuals and fitted curves
//! - the gradient `∂f_k/∂p` for the minimizer's Jacobian
//!
//! `b == 0` yields non-finite values rather than a panic; the fit driver is
//! responsible for detecting them.

use std::f64::consts::PI;

use crate::domain::{FALLOFF_INDEX, N_PARAMS, ParamVector, Process};

/// Signature shared by the per-process model functions.
pub type ModelFn = fn(&[f64], &ParamVector) -> Vec<f64>;

/// Predict `f_k(x)` at a single point.
pub fn predict(process: Process, x: f64, p: &ParamVector) -> f64 {
    let b = p.falloff();
    p.amplitude(process) / (PI * b) * (-x / b).exp()
}

/// Vectorized prediction over `xs`.
pub fn predict_all(process: Process, xs: &[f64], p: &ParamVector) -> Vec<f64> {
    xs.iter().map(|&x| predict(process, x, p)).collect()
}

pub fn theor_dpp(xs: &[f64], p: &ParamVector) -> Vec<f64> {
    predict_all(Process::Dpp, xs, p)
}

pub fn theor_dpm(xs: &[f64], p: &ParamVector) -> Vec<f64> {
    predict_all(Process::Dpm, xs, p)
}

pub fn theor_ppp(xs: &[f64], p: &ParamVector) -> Vec<f64> {
    predict_all(Process::Ppp, xs, p)
}

pub fn theor_ppm(xs: &[f64], p: &ParamVector) -> Vec<f64> {
    predict_all(Process::Ppm, xs, p)
}

/// Model function assigned to a process.
pub fn model_for(process: Process) -> ModelFn {
    match process {
        Process::Dpp => theor_dpp,
        Process::Dpm => theor_dpm,
        Process::Ppp => theor_ppp,
        Process::Ppm => theor_ppm,
    }
}

/// Partial derivatives of `f_k(x)` with respect to all five parameters.
///
/// Only the process's own amplitude and `b` have non-zero entries.
pub fn gradient(process: Process, x: f64, p: &ParamVector) -> [f64; N_PARAMS] {
    let b = p.falloff();
    let shape = (-x / b).exp() / (PI * b);
    let amp = p.amplitude(process);

    let mut out = [0.0; N_PARAMS];
    out[process.amplitude_index()] = shape;
    // d/db [a e^{-x/b} / (π b)] = a e^{-x/b} / (π b²) · (x/b - 1)
    out[FALLOFF_INDEX] = amp * shape / b * (x / b - 1.0);
    out
}
