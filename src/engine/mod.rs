//! Verification engine.
//!
//! Provides expectation evaluation, control execution, and result aggregation.

pub mod evaluator;
pub mod result;
pub mod runner;
