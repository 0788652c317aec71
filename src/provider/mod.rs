//! Provider clients.
//!
//! A provider answers one question: does the resource with these lookup keys
//! exist, and if so, what are its fields? Authentication, transport and retry
//! policy all live behind this seam.
//!
//! # Graceful Degradation
//!
//! - Resource absent: `Ok(ProviderResult { found: false, .. })`, never an error
//! - Credentials missing or expired: `ProviderError::Auth`
//! - Network or tool failure: `ProviderError::Network` / `ProviderError::Command`
//! - Slow backend: `ProviderError::Timeout` once the client's own timeout fires
//!
//! Dropping a pending `query` future abandons the request; clients that
//! spawn child processes kill them on drop.

pub mod azure_cli;
pub mod fixture;

use crate::resource::types::ResourceType;
use async_trait::async_trait;
use thiserror::Error;

pub use azure_cli::AzureCliProvider;
pub use fixture::FixtureProvider;

/// Raw provider answer for one lookup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderResult {
    pub found: bool,
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl ProviderResult {
    pub fn not_found() -> Self {
        ProviderResult::default()
    }

    pub fn found(fields: serde_json::Map<String, serde_json::Value>) -> Self {
        ProviderResult {
            found: true,
            fields,
        }
    }
}

/// Collaborator failures. Distinct from "not found".
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProviderError {
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("network failure: {0}")]
    Network(String),
    #[error("command '{command}' failed: {message}")]
    Command { command: String, message: String },
    #[error("timeout after {timeout_ms}ms: {operation}")]
    Timeout { operation: String, timeout_ms: u64 },
    #[error("could not decode response in {context}: {message}")]
    Decode { context: String, message: String },
    #[error("fixture error: {0}")]
    Fixture(String),
}

/// Source of resource data.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Short name used in logs and reports.
    fn name(&self) -> &str;

    /// Look up a single resource. Called exactly once per resolution.
    async fn query(
        &self,
        resource_type: &ResourceType,
        keys: &[(String, String)],
    ) -> Result<ProviderResult, ProviderError>;
}
