//! Command line arguments.
//!
//! Environment fallbacks: `INFRA_VERIFY_PROFILE`, `INFRA_VERIFY_FORMAT`,
//! `AZURE_SUBSCRIPTION_ID` and `NO_COLOR`.

use crate::profile::builtin;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Declarative verification of cloud infrastructure
#[derive(Parser, Debug)]
#[command(name = "infra-verify")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Log filter when RUST_LOG is unset (e.g. "debug", "infra_verify=trace")
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a profile's controls and report the results
    Run(RunArgs),
    /// Show a profile's inputs and controls without running them
    List(ListArgs),
    /// Print version information
    Version {
        /// Print build information as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Where the profile comes from and how its inputs are bound.
#[derive(Args, Debug, Clone)]
pub struct ProfileArgs {
    /// Profile TOML file, or a built-in profile name
    #[arg(short, long, env = "INFRA_VERIFY_PROFILE", default_value = builtin::NETWORK_WATCHER)]
    pub profile: String,

    /// Set an input (repeatable), e.g. --input resource_group=rg1
    #[arg(short, long, value_name = "NAME=VALUE")]
    pub input: Vec<String>,

    /// TOML file of inputs (repeatable, later files win)
    #[arg(long, value_name = "FILE")]
    pub input_file: Vec<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub source: ProfileArgs,

    /// Answer queries from a JSON fixture instead of the Azure CLI
    #[arg(long, value_name = "FILE")]
    pub fixture: Option<PathBuf>,

    /// Azure subscription passed to every az call
    #[arg(long, env = "AZURE_SUBSCRIPTION_ID")]
    pub subscription: Option<String>,

    /// Timeout for a single provider query, in seconds
    #[arg(long, value_name = "SECS", default_value_t = 60)]
    pub provider_timeout: u64,

    /// Run only this control (repeatable)
    #[arg(long, value_name = "ID")]
    pub only: Vec<String>,

    /// Skip this control (repeatable)
    #[arg(long, value_name = "ID")]
    pub skip: Vec<String>,

    /// Run controls one at a time, in declaration order
    #[arg(long)]
    pub sequential: bool,

    /// Maximum controls in flight at once
    #[arg(long, value_name = "N", default_value_t = 4)]
    pub max_parallel: usize,

    /// Skip remaining controls after the first failure
    #[arg(long)]
    pub fail_fast: bool,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    #[command(flatten)]
    pub source: ProfileArgs,

    /// List the built-in profile names instead
    #[arg(long)]
    pub builtins: bool,
}

#[derive(Args, Debug, Clone)]
pub struct OutputArgs {
    /// Output format
    #[arg(short, long, value_enum, env = "INFRA_VERIFY_FORMAT", default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Only print failures and the summary
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Include messages for passing and skipped expectations
    #[arg(short, long)]
    pub verbose: bool,

    /// Disable colored output (NO_COLOR accepts any non-falsey value, e.g. 1)
    #[arg(long, env = "NO_COLOR", value_parser = clap::builder::FalseyValueParser::new())]
    pub no_color: bool,
}

/// Output format selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable terminal output
    #[default]
    Text,
    /// Machine-readable JSON
    Json,
    /// JUnit XML for CI/CD integration
    Junit,
}
