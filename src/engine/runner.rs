//! Control execution.
//!
//! Runs every selected control through
//! `Pending -> Skipped-all | Resolving -> Evaluating -> Completed`.
//!
//! # Graceful Degradation
//!
//! - Guard not satisfied: every expectation Skipped, resolver never called
//! - Unbound profile input: every expectation Failed, resolver never called
//! - Invalid descriptor: that describe's expectations Failed, control continues
//! - Provider error: same, logged at warn with the descriptor
//! - Task panic: remaining expectations of that control Failed
//! - Cancellation: unfinished expectations Skipped with "run cancelled"
//! - Fail-fast: controls not yet started are Skipped after the first failure
//!
//! The only fatal condition is a control set in which no describe uses a
//! recognized resource type; that is rejected before anything runs.

use crate::control::Control;
use crate::engine::evaluator;
use crate::engine::result::{Report, ResultAggregator};
use crate::guard::GuardSource;
use crate::provider::ProviderClient;
use crate::resource::resolver::Resolver;
use crate::resource::types;
use crate::{Cause, Outcome, Status, VerifyError};
use chrono::Utc;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const CANCELLED_MESSAGE: &str = "run cancelled";

/// Runner configuration
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Name recorded in the report
    pub profile: String,
    pub parallel: bool,
    pub max_parallel: usize,
    pub fail_fast: bool,
    /// Run only these control ids (empty = all)
    pub only: Vec<String>,
    /// Never run these control ids
    pub skip: Vec<String>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        RunnerConfig {
            profile: "default".to_string(),
            parallel: true,
            max_parallel: 4,
            fail_fast: false,
            only: Vec::new(),
            skip: Vec::new(),
        }
    }
}

/// State shared by all control tasks of one run.
struct RunContext {
    resolver: Resolver,
    guards: Arc<dyn GuardSource>,
    aggregator: Mutex<ResultAggregator>,
    cancel: CancellationToken,
    fail_fast: bool,
}

impl RunContext {
    fn aggregator(&self) -> MutexGuard<'_, ResultAggregator> {
        // A panicking control task cannot leave an outcome half-written,
        // so a poisoned lock is still safe to use.
        self.aggregator
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn fill(&self, index: usize, control: &Control, status: Status, cause: Cause, message: &str) {
        self.aggregator()
            .fill_unrecorded(index, control, status, cause, message);
    }
}

/// Executes controls against a provider.
pub struct ControlRunner {
    config: RunnerConfig,
    resolver: Resolver,
    guards: Arc<dyn GuardSource>,
}

impl ControlRunner {
    /// Create a new runner with the given configuration
    pub fn new(
        config: RunnerConfig,
        provider: Arc<dyn ProviderClient>,
        guards: Arc<dyn GuardSource>,
    ) -> Self {
        ControlRunner {
            config,
            resolver: Resolver::new(provider),
            guards,
        }
    }

    /// Controls selected by `only` / `skip`, with their declaration index.
    pub fn select<'a>(&self, controls: &'a [Control]) -> Vec<(usize, &'a Control)> {
        controls
            .iter()
            .enumerate()
            .filter(|(_, c)| self.config.only.is_empty() || self.config.only.contains(&c.id))
            .filter(|(_, c)| !self.config.skip.contains(&c.id))
            .collect()
    }

    /// Reject control sets that cannot possibly resolve anything.
    pub fn validate(&self, controls: &[Control]) -> Result<(), VerifyError> {
        check_resource_types(controls.iter())
    }

    /// Run all selected controls and seal the report.
    ///
    /// Returns `Err` only for fatal configuration problems found before any
    /// control starts; every other failure is recorded as an outcome.
    pub async fn run(
        &self,
        controls: &[Control],
        cancel: CancellationToken,
    ) -> Result<Report, VerifyError> {
        let selected = self.select(controls);
        check_resource_types(selected.iter().map(|(_, c)| *c))?;

        let started_at = Utc::now();
        let start = Instant::now();
        let ctx = Arc::new(RunContext {
            resolver: self.resolver.clone(),
            guards: self.guards.clone(),
            aggregator: Mutex::new(ResultAggregator::new()),
            cancel,
            fail_fast: self.config.fail_fast,
        });

        info!(
            profile = %self.config.profile,
            provider = self.resolver.provider_name(),
            controls = selected.len(),
            parallel = self.config.parallel,
            "starting run"
        );

        let indexed: Vec<(usize, Arc<Control>)> = selected
            .iter()
            .map(|(i, c)| (*i, Arc::new((*c).clone())))
            .collect();

        if self.config.parallel {
            run_parallel(&ctx, indexed, self.config.max_parallel.max(1)).await;
        } else {
            run_sequential(&ctx, indexed).await;
        }

        let aggregator = std::mem::take(&mut *ctx.aggregator());
        let report = aggregator.seal(
            &self.config.profile,
            self.resolver.provider_name(),
            started_at,
            start.elapsed().as_millis() as u64,
            selected.len() as u32,
        );

        let summary = report.summary();
        info!(
            passed = summary.passed,
            failed = summary.failed,
            skipped = summary.skipped,
            "run complete"
        );
        Ok(report)
    }
}

fn check_resource_types<'a>(controls: impl Iterator<Item = &'a Control>) -> Result<(), VerifyError> {
    let mut tags: Vec<&str> = controls
        .flat_map(|c| c.describes.iter())
        .map(|d| d.descriptor.resource_type())
        .collect();

    if !tags.is_empty() && tags.iter().all(|t| types::lookup(t).is_none()) {
        tags.sort_unstable();
        tags.dedup();
        return Err(VerifyError::Config(format!(
            "no control uses a recognized resource type (found: {})",
            tags.join(", ")
        )));
    }
    Ok(())
}

/// Run controls one at a time in declaration order
async fn run_sequential(ctx: &Arc<RunContext>, controls: Vec<(usize, Arc<Control>)>) {
    for (index, control) in controls {
        if ctx.cancel.is_cancelled() {
            ctx.fill(index, &control, Status::Skipped, Cause::RunCancelled, CANCELLED_MESSAGE);
            continue;
        }
        let halted = ctx.fail_fast && ctx.aggregator().has_failures();
        if halted {
            skip_fail_fast(ctx, index, &control);
            continue;
        }

        let handle = tokio::spawn(execute_control(ctx.clone(), index, control.clone()));
        collect(ctx, index, &control, handle).await;
    }
}

/// Run controls concurrently, bounded by a semaphore
async fn run_parallel(ctx: &Arc<RunContext>, controls: Vec<(usize, Arc<Control>)>, max_parallel: usize) {
    let semaphore = Arc::new(Semaphore::new(max_parallel));

    let handles: Vec<(usize, Arc<Control>, JoinHandle<()>)> = controls
        .into_iter()
        .map(|(index, control)| {
            let ctx = ctx.clone();
            let semaphore = semaphore.clone();
            let task_control = control.clone();
            let handle = tokio::spawn(async move {
                let permit = tokio::select! {
                    biased;
                    _ = ctx.cancel.cancelled() => None,
                    permit = semaphore.acquire_owned() => permit.ok(),
                };
                let Some(_permit) = permit else {
                    ctx.fill(index, &task_control, Status::Skipped, Cause::RunCancelled, CANCELLED_MESSAGE);
                    return;
                };
                let halted = ctx.fail_fast && ctx.aggregator().has_failures();
                if halted {
                    skip_fail_fast(&ctx, index, &task_control);
                    return;
                }
                execute_control(ctx, index, task_control).await;
            });
            (index, control, handle)
        })
        .collect();

    for (index, control, handle) in handles {
        collect(ctx, index, &control, handle).await;
    }
}

/// Await a control task and turn a panic into failed outcomes.
async fn collect(ctx: &RunContext, index: usize, control: &Control, handle: JoinHandle<()>) {
    if let Err(e) = handle.await {
        let message = if e.is_panic() {
            "control panicked during execution".to_string()
        } else {
            format!("control task aborted: {}", e)
        };
        warn!(control = %control.id, error = %e, "control task did not complete");
        ctx.fill(index, control, Status::Failed, Cause::Panicked, &message);
    }
}

fn skip_fail_fast(ctx: &RunContext, index: usize, control: &Control) {
    debug!(control = %control.id, "skipping after earlier failure");
    ctx.fill(
        index,
        control,
        Status::Skipped,
        Cause::FailFast,
        "skipped after an earlier failure (fail-fast)",
    );
}

/// Execute one control: guard, then resolve and evaluate each describe.
async fn execute_control(ctx: Arc<RunContext>, index: usize, control: Arc<Control>) {
    if !control.guard.evaluate(ctx.guards.as_ref()) {
        info!(control = %control.id, guard = %control.guard, "guard not satisfied, skipping");
        let message = format!("guard not satisfied: {}", control.guard);
        ctx.fill(index, &control, Status::Skipped, Cause::GuardNotSatisfied, &message);
        return;
    }

    if let Some(reason) = &control.unbound {
        warn!(control = %control.id, reason = %reason, "control inputs are unbound");
        ctx.fill(index, &control, Status::Failed, Cause::UnboundInput, reason);
        return;
    }

    debug!(control = %control.id, "control started");

    for (d, describe) in control.describes.iter().enumerate() {
        let started = Instant::now();
        let subject = describe.descriptor.to_string();

        let resolved = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => {
                info!(control = %control.id, "run cancelled during resolution");
                ctx.fill(index, &control, Status::Skipped, Cause::RunCancelled, CANCELLED_MESSAGE);
                return;
            }
            resolved = ctx.resolver.resolve(&describe.descriptor) => resolved,
        };

        let record = |e: usize, status: Status, cause: Option<Cause>, message: String| Outcome {
            control_id: control.id.clone(),
            control_index: index,
            describe_index: d,
            expectation_index: e,
            subject: subject.clone(),
            expectation: describe.expectations[e].to_string(),
            status,
            cause,
            message,
            duration_ms: started.elapsed().as_millis() as u64,
        };

        match resolved {
            Ok(resource) => {
                let outcomes: Vec<Outcome> = describe
                    .expectations
                    .iter()
                    .enumerate()
                    .map(|(e, expectation)| {
                        let eval = evaluator::evaluate(&resource, expectation);
                        record(e, eval.status, eval.cause, eval.message)
                    })
                    .collect();
                let mut aggregator = ctx.aggregator();
                for outcome in outcomes {
                    aggregator.add(outcome);
                }
            }
            Err(err) => {
                let cause = match err {
                    VerifyError::InvalidDescriptor { .. } => Cause::InvalidDescriptor,
                    _ => Cause::ProviderError,
                };
                if cause == Cause::ProviderError {
                    warn!(control = %control.id, resource = %subject, error = %err, "provider error");
                } else {
                    warn!(control = %control.id, error = %err, "invalid descriptor");
                }
                let message = err.to_string();
                let mut aggregator = ctx.aggregator();
                for e in 0..describe.expectations.len() {
                    aggregator.add(record(e, Status::Failed, Some(cause), message.clone()));
                }
            }
        }
    }

    debug!(control = %control.id, "control completed");
}
