//! Integration tests for infra-verify.
//!
//! These tests drive the runner, profiles, formatters and binary against
//! fixture and mock providers.

pub mod profile_tests;
pub mod runner_tests;
