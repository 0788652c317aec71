//! Mock collaborators for testing without Azure.
//!
//! Providers that delay, block or panic on demand, a guard source that
//! counts its calls, and the canonical network watcher fixture.

pub mod provider;

pub use provider::*;
