//! infra-verify CLI entry point
//!
//! Runs infrastructure verification profiles against Azure or a fixture.
//!
//! Exit codes: 0 no failures, 1 failures, 2 usage error, 3 fatal error
//! before any control ran.

use anyhow::{Context, Result};
use clap::Parser;
use infra_verify::cli::args::{Cli, Commands, ListArgs, RunArgs};
use infra_verify::cli::output::get_formatter;
use infra_verify::guard::EnvGuardSource;
use infra_verify::profile::builtin;
use infra_verify::resource::types;
use infra_verify::version::get_build_info;
use infra_verify::{run_profile, VerifyConfig};
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    // clap exits with status 2 on usage errors
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let result = match cli.command {
        Commands::Run(args) => run(&args).await,
        Commands::List(args) => list(&args).map(|()| 0),
        Commands::Version { json } => version(json),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(3)
        }
    }
}

/// Logs go to stderr so reports on stdout stay machine readable.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}

async fn run(args: &RunArgs) -> Result<u8> {
    let config = VerifyConfig::from_args(args)?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling run");
            on_interrupt.cancel();
        }
    });

    let report = run_profile(&config, Arc::new(EnvGuardSource), cancel)
        .await
        .with_context(|| format!("cannot run profile '{}'", config.profile))?;

    let output = &args.output;
    let formatter = get_formatter(output.format, output.no_color, output.verbose, output.quiet);
    println!("{}", formatter.format(&report));

    Ok(report.exit_code())
}

fn version(json: bool) -> Result<u8> {
    let info = get_build_info();
    if json {
        let text = serde_json::to_string_pretty(&info).context("cannot serialize build info")?;
        println!("{}", text);
    } else {
        println!("{}", info);
    }
    Ok(0)
}

fn list(args: &ListArgs) -> Result<()> {
    if args.builtins {
        for name in builtin::names() {
            println!("{}", name);
        }
        return Ok(());
    }

    let config = VerifyConfig::from_profile_args(&args.source)?;
    let (profile, controls) = config
        .load_controls()
        .with_context(|| format!("cannot load profile '{}'", config.profile))?;

    match profile.title() {
        Some(title) => println!("Profile: {} ({})", profile.name(), title),
        None => println!("Profile: {}", profile.name()),
    }

    if !profile.inputs().is_empty() {
        println!();
        println!("INPUTS:");
        for (name, spec) in profile.inputs() {
            let default = spec
                .default
                .as_ref()
                .map(|v| format!("default {}", v))
                .unwrap_or_else(|| "required".to_string());
            match &spec.description {
                Some(description) => println!("  {:<28} {} - {}", name, default, description),
                None => println!("  {:<28} {}", name, default),
            }
        }
    }

    println!();
    println!("CONTROLS:");
    for control in &controls {
        match &control.title {
            Some(title) => println!("  {:<28} {}", control.id, title),
            None => println!("  {}", control.id),
        }
        println!("    guard: {}", control.guard);
        if let Some(reason) = &control.unbound {
            println!("    {}", reason);
        }
        for describe in &control.describes {
            match types::lookup(describe.descriptor.resource_type()) {
                Some(resource_type) => {
                    println!("    {} ({})", describe.descriptor, resource_type.description)
                }
                None => println!("    {} (unrecognized type)", describe.descriptor),
            }
            for expectation in &describe.expectations {
                println!("      {}", expectation);
            }
        }
    }

    Ok(())
}
