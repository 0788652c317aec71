//! infra-verify library
//!
//! Declarative verification of cloud infrastructure.
//!
//! This library provides the pieces of a compliance run:
//! - Resource resolution against a provider (Azure CLI or a JSON fixture)
//! - Uniform, typed property access on resolved resources
//! - Expectation evaluation (existence, equality, membership)
//! - Guarded controls, loaded from TOML profiles or built in code
//! - Concurrent execution with cancellation and ordered, sealed reports
//!
//! # Example
//!
//! ```no_run
//! use infra_verify::guard::EnvGuardSource;
//! use infra_verify::{run_profile, VerifyConfig};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), infra_verify::VerifyError> {
//! let config = VerifyConfig {
//!     fixture: Some("profiles/fixtures/network_watcher.json".into()),
//!     ..Default::default()
//! };
//! let report = run_profile(&config, Arc::new(EnvGuardSource), CancellationToken::new()).await?;
//! println!("Expectations passed: {}", report.summary().passed);
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod control;
pub mod engine;
pub mod guard;
pub mod profile;
pub mod provider;
pub mod resource;
pub mod version;

use cli::args::{ProfileArgs, RunArgs};
use control::Control;
use engine::runner::{ControlRunner, RunnerConfig};
use guard::GuardSource;
use profile::inputs::Inputs;
use profile::{builtin, Profile};
use provider::{AzureCliProvider, FixtureProvider, ProviderClient, ProviderError};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

// Re-exports for public API
pub use engine::result::{Report, ResultSummary};
pub use engine::runner::ControlRunner as Runner;

/// Verdict for one expectation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Passed,
    Failed,
    Skipped,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Passed => write!(f, "PASS"),
            Status::Failed => write!(f, "FAIL"),
            Status::Skipped => write!(f, "SKIP"),
        }
    }
}

/// Why an expectation did not pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Cause {
    /// Present and same type, different value
    ValueMismatch,
    /// Expected and actual values have different types
    TypeMismatch,
    /// Property absent, or the resource itself does not exist
    PropertyNotFound,
    /// exists / not-exists did not hold
    ExistenceMismatch,
    /// Membership test against a non-list property
    NotAList,
    InvalidDescriptor,
    ProviderError,
    GuardNotSatisfied,
    /// Profile input missing for this control
    UnboundInput,
    RunCancelled,
    FailFast,
    Panicked,
}

impl Cause {
    /// True for causes that are errors rather than assertion verdicts.
    pub fn is_error(self) -> bool {
        matches!(
            self,
            Cause::InvalidDescriptor | Cause::ProviderError | Cause::UnboundInput | Cause::Panicked
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Cause::ValueMismatch => "value_mismatch",
            Cause::TypeMismatch => "type_mismatch",
            Cause::PropertyNotFound => "property_not_found",
            Cause::ExistenceMismatch => "existence_mismatch",
            Cause::NotAList => "not_a_list",
            Cause::InvalidDescriptor => "invalid_descriptor",
            Cause::ProviderError => "provider_error",
            Cause::GuardNotSatisfied => "guard_not_satisfied",
            Cause::UnboundInput => "unbound_input",
            Cause::RunCancelled => "run_cancelled",
            Cause::FailFast => "fail_fast",
            Cause::Panicked => "panicked",
        }
    }
}

impl fmt::Display for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one expectation. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outcome {
    pub control_id: String,
    pub control_index: usize,
    pub describe_index: usize,
    pub expectation_index: usize,
    /// Descriptor display text, e.g. `azurerm_network_watcher(name: "nw1")`
    pub subject: String,
    /// Expectation display text, e.g. `its 'name' should eq "nw1"`
    pub expectation: String,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<Cause>,
    pub message: String,
    pub duration_ms: u64,
}

/// Error types for infra-verify operations.
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    /// Descriptor cannot be resolved as written
    #[error("invalid descriptor {descriptor}: {reason}")]
    InvalidDescriptor { descriptor: String, reason: String },

    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Fatal configuration problem found before any control runs
    #[error("configuration error: {0}")]
    Config(String),

    #[error("profile {path}: {message}")]
    Profile { path: String, message: String },

    #[error("I/O error {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

/// Configuration for a verification run.
#[derive(Debug, Clone)]
pub struct VerifyConfig {
    /// Profile file path, or the name of a built-in profile
    pub profile: String,
    /// Serve resources from this JSON fixture instead of Azure
    pub fixture: Option<PathBuf>,
    pub subscription: Option<String>,
    /// Per-query timeout for the Azure CLI provider
    pub provider_timeout_ms: u64,
    /// TOML input files, applied in order
    pub input_files: Vec<PathBuf>,
    /// Command line inputs; win over input files and profile defaults
    pub inputs: Inputs,
    pub only: Vec<String>,
    pub skip: Vec<String>,
    pub parallel: bool,
    pub max_parallel: usize,
    pub fail_fast: bool,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        VerifyConfig {
            profile: builtin::NETWORK_WATCHER.to_string(),
            fixture: None,
            subscription: None,
            provider_timeout_ms: 60_000,
            input_files: Vec::new(),
            inputs: Inputs::new(),
            only: Vec::new(),
            skip: Vec::new(),
            parallel: true,
            max_parallel: 4,
            fail_fast: false,
        }
    }
}

impl VerifyConfig {
    /// Profile and input settings from command line arguments
    pub fn from_profile_args(args: &ProfileArgs) -> Result<Self, VerifyError> {
        let mut inputs = Inputs::new();
        for assignment in &args.input {
            let (name, value) = Inputs::parse_assignment(assignment)?;
            inputs.set(name, value);
        }

        Ok(VerifyConfig {
            profile: args.profile.clone(),
            input_files: args.input_file.clone(),
            inputs,
            ..Default::default()
        })
    }

    /// Create configuration from `run` arguments
    pub fn from_args(args: &RunArgs) -> Result<Self, VerifyError> {
        let base = Self::from_profile_args(&args.source)?;
        Ok(VerifyConfig {
            fixture: args.fixture.clone(),
            subscription: args.subscription.clone(),
            provider_timeout_ms: args.provider_timeout.saturating_mul(1000),
            only: args.only.clone(),
            skip: args.skip.clone(),
            parallel: !args.sequential,
            max_parallel: args.max_parallel,
            fail_fast: args.fail_fast,
            ..base
        })
    }

    /// Load the profile: a built-in name or a path.
    pub fn load_profile(&self) -> Result<Profile, VerifyError> {
        match builtin::load(&self.profile) {
            Some(profile) => profile,
            None => Profile::from_file(Path::new(&self.profile)),
        }
    }

    /// Input files merged in order, then command line inputs on top.
    pub fn resolve_inputs(&self) -> Result<Inputs, VerifyError> {
        let mut inputs = Inputs::new();
        for path in &self.input_files {
            inputs = inputs.merged(&Inputs::from_file(path)?);
        }
        Ok(inputs.merged(&self.inputs))
    }

    /// Load the profile and bind it to the configured inputs.
    pub fn load_controls(&self) -> Result<(Profile, Vec<Control>), VerifyError> {
        let profile = self.load_profile()?;
        let controls = profile.bind(&self.resolve_inputs()?);
        Ok((profile, controls))
    }

    /// Provider selected by the configuration.
    pub fn provider(&self) -> Result<Arc<dyn ProviderClient>, VerifyError> {
        match &self.fixture {
            Some(path) => Ok(Arc::new(FixtureProvider::from_file(path)?)),
            None => Ok(Arc::new(
                AzureCliProvider::new()
                    .with_subscription(self.subscription.clone())
                    .with_timeout(Duration::from_millis(self.provider_timeout_ms)),
            )),
        }
    }

    fn runner_config(&self, profile: &Profile) -> RunnerConfig {
        RunnerConfig {
            profile: profile.name().to_string(),
            parallel: self.parallel,
            max_parallel: self.max_parallel,
            fail_fast: self.fail_fast,
            only: self.only.clone(),
            skip: self.skip.clone(),
        }
    }
}

/// Run a profile end to end.
///
/// This is the main entry point: loads and binds the profile, builds the
/// provider and runs every selected control.
///
/// # Returns
///
/// A sealed `Report`, or a `VerifyError` for fatal configuration problems
/// (unreadable profile, undeclared inputs, no recognized resource types).
/// Failed assertions and provider errors are outcomes, not errors.
pub async fn run_profile(
    config: &VerifyConfig,
    guards: Arc<dyn GuardSource>,
    cancel: CancellationToken,
) -> Result<Report, VerifyError> {
    let (profile, controls) = config.load_controls()?;
    let provider = config.provider()?;
    info!(profile = %profile.name(), provider = provider.name(), "profile bound");

    let runner = ControlRunner::new(config.runner_config(&profile), provider, guards);
    runner.run(&controls, cancel).await
}
