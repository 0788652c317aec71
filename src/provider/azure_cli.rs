//! Azure provider backed by the `az` command line tool.
//!
//! `az` owns login state, token refresh, and the ARM wire protocol; this
//! client only builds the command, bounds it with a timeout, and sorts the
//! outcome into found / not found / error.

use super::{ProviderClient, ProviderError, ProviderResult};
use crate::resource::lookup_key;
use crate::resource::types::{ResourceType, Scope};
use async_trait::async_trait;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

const DEFAULT_PROGRAM: &str = "az";
const DEFAULT_TIMEOUT_MS: u64 = 60_000;

/// ARM error codes `az` prints when the lookup target is absent.
const NOT_FOUND_CODES: &[&str] = &["(ResourceNotFound)", "(ResourceGroupNotFound)"];

/// Free-text not-found messages, trusted only when no auth or network
/// marker matches.
const NOT_FOUND_PHRASES: &[&str] = &["could not be found", "was not found"];

const AUTH_MARKERS: &[&str] = &["az login", "AADSTS", "InvalidAuthenticationToken", "AuthorizationFailed"];

const NETWORK_MARKERS: &[&str] = &[
    "Failed to establish a new connection",
    "Max retries exceeded",
    "ConnectionError",
    "Name or service not known",
];

/// How a failed `az` invocation should be reported.
#[derive(Debug, PartialEq)]
enum Failure {
    NotFound,
    Auth,
    Network,
    Other,
}

/// Provider that shells out to `az`.
#[derive(Debug, Clone)]
pub struct AzureCliProvider {
    program: String,
    subscription: Option<String>,
    timeout: Duration,
}

impl Default for AzureCliProvider {
    fn default() -> Self {
        AzureCliProvider {
            program: DEFAULT_PROGRAM.to_string(),
            subscription: None,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }
}

impl AzureCliProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the executable (useful for wrappers and tests).
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_subscription(mut self, subscription: Option<String>) -> Self {
        self.subscription = subscription;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the `az` argument list for a lookup.
    fn build_args(
        &self,
        resource_type: &ResourceType,
        keys: &[(String, String)],
    ) -> Result<Vec<String>, ProviderError> {
        let require = |name: &str| {
            lookup_key(keys, name)
                .map(str::to_string)
                .ok_or_else(|| ProviderError::Command {
                    command: self.program.clone(),
                    message: format!("lookup key '{}' missing", name),
                })
        };

        let mut args: Vec<String> = match resource_type.scope {
            Scope::Group => vec!["group".into(), "show".into(), "--name".into(), require("name")?],
            Scope::GroupMember => vec![
                "resource".into(),
                "show".into(),
                "--resource-group".into(),
                require("resource_group")?,
                "--name".into(),
                require("name")?,
                "--resource-type".into(),
                resource_type.arm_type.into(),
            ],
        };

        if let Some(ref subscription) = self.subscription {
            args.push("--subscription".into());
            args.push(subscription.clone());
        }
        args.push("--output".into());
        args.push("json".into());
        Ok(args)
    }
}

fn classify_failure(stderr: &str) -> Failure {
    let has = |markers: &[&str]| markers.iter().any(|m| stderr.contains(m));
    if has(NOT_FOUND_CODES) {
        Failure::NotFound
    } else if has(AUTH_MARKERS) {
        Failure::Auth
    } else if has(NETWORK_MARKERS) {
        Failure::Network
    } else if has(NOT_FOUND_PHRASES) {
        Failure::NotFound
    } else {
        Failure::Other
    }
}

fn parse_fields(stdout: &[u8]) -> Result<serde_json::Map<String, serde_json::Value>, ProviderError> {
    let value: serde_json::Value =
        serde_json::from_slice(stdout).map_err(|e| ProviderError::Decode {
            context: "az output".to_string(),
            message: e.to_string(),
        })?;
    match value {
        serde_json::Value::Object(fields) => Ok(fields),
        other => Err(ProviderError::Decode {
            context: "az output".to_string(),
            message: format!("expected a JSON object, got {}", other),
        }),
    }
}

#[async_trait]
impl ProviderClient for AzureCliProvider {
    fn name(&self) -> &str {
        "azure-cli"
    }

    async fn query(
        &self,
        resource_type: &ResourceType,
        keys: &[(String, String)],
    ) -> Result<ProviderResult, ProviderError> {
        let args = self.build_args(resource_type, keys)?;
        let command_line = format!("{} {}", self.program, args.join(" "));
        debug!(command = %command_line, "querying azure");

        let child = Command::new(&self.program)
            .args(&args)
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| ProviderError::Timeout {
                operation: command_line.clone(),
                timeout_ms: self.timeout.as_millis() as u64,
            })?
            .map_err(|e| ProviderError::Command {
                command: command_line.clone(),
                message: format!("could not start '{}': {}", self.program, e),
            })?;

        if output.status.success() {
            return parse_fields(&output.stdout).map(ProviderResult::found);
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        match classify_failure(&stderr) {
            Failure::NotFound => Ok(ProviderResult::not_found()),
            Failure::Auth => Err(ProviderError::Auth(stderr)),
            Failure::Network => Err(ProviderError::Network(stderr)),
            Failure::Other => Err(ProviderError::Command {
                command: command_line,
                message: stderr,
            }),
        }
    }
}
