//! Execution control
//!
//! Runs features in forked children and aggregates their verdicts.

pub mod context;
pub mod executor;
pub mod runner;
