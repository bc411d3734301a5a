//! Configuration constants and structures for the OCC playground.
//!
//! Error codes, limits and sandbox path rules live here so the controller,
//! the executors and the terminal agree on them.

pub mod errors;
pub mod limits;
pub mod paths;

mod runner;

pub use runner::{ExecutorKind, RunnerConfig};
