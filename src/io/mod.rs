//! Input/output helpers.
//!
//! - CSV ingest + validation (`ingest`)
//! - run exports for external plotting (JSON/CSV) (`export`)

pub mod export;
pub mod ingest;

pub use export::*;
pub use ingest::*;
