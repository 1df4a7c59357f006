//! `tmd-bootstrap` library crate.
//!
//! Joint fit of four measured tables (Dpp, Dpm, Ppp, Ppm) to an exponential
//! falloff model with five shared parameters, plus a Monte-Carlo bootstrap that
//! refits synthetic replicas of the data to estimate parameter uncertainties.
//!
//! The binary (`tmd`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - the fitting core can be reused without the CLI

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod report;
