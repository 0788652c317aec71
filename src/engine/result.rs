//! Result aggregation and reporting.
//!
//! Workers append outcomes to a [`ResultAggregator`] in whatever order they
//! finish. Sealing sorts them back into declaration order and produces a
//! read-only [`Report`].

use crate::control::Control;
use crate::{Cause, Outcome, Status};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;

/// Result summary statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResultSummary {
    pub passed: u32,
    pub failed: u32,
    pub skipped: u32,
    /// Failed outcomes caused by provider errors, invalid descriptors or panics
    pub errors: u32,
    pub total: u32,
    pub controls: u32,
}

impl ResultSummary {
    fn from_outcomes(outcomes: &[Outcome], controls: u32) -> Self {
        let mut summary = ResultSummary {
            controls,
            ..Default::default()
        };

        for outcome in outcomes {
            summary.total += 1;
            match outcome.status {
                Status::Passed => summary.passed += 1,
                Status::Failed => {
                    summary.failed += 1;
                    if outcome.cause.map(Cause::is_error).unwrap_or(false) {
                        summary.errors += 1;
                    }
                }
                Status::Skipped => summary.skipped += 1,
            }
        }

        summary
    }
}

/// Sealed verification report. Read-only.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    profile: String,
    provider: String,
    started_at: DateTime<Utc>,
    total_duration_ms: u64,
    controls: u32,
    outcomes: Vec<Outcome>,
}

impl Report {
    pub fn profile(&self) -> &str {
        &self.profile
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn total_duration_ms(&self) -> u64 {
        self.total_duration_ms
    }

    /// Outcomes in declaration order.
    pub fn outcomes(&self) -> &[Outcome] {
        &self.outcomes
    }

    /// Calculate summary statistics
    pub fn summary(&self) -> ResultSummary {
        ResultSummary::from_outcomes(&self.outcomes, self.controls)
    }

    pub fn has_failures(&self) -> bool {
        self.outcomes.iter().any(|o| o.status == Status::Failed)
    }

    /// Process exit status: 1 if anything failed, 0 otherwise.
    pub fn exit_code(&self) -> u8 {
        if self.has_failures() {
            1
        } else {
            0
        }
    }

    /// Outcomes grouped by control, in declaration order.
    pub fn by_control(&self) -> Vec<(&str, Vec<&Outcome>)> {
        let mut groups: Vec<(&str, Vec<&Outcome>)> = Vec::new();
        for outcome in &self.outcomes {
            match groups.last_mut() {
                Some((id, items)) if *id == outcome.control_id => items.push(outcome),
                _ => groups.push((outcome.control_id.as_str(), vec![outcome])),
            }
        }
        groups
    }

    pub fn failures(&self) -> impl Iterator<Item = &Outcome> {
        self.outcomes.iter().filter(|o| o.status == Status::Failed)
    }
}

/// Result aggregator for collecting outcomes during a run
#[derive(Debug, Default)]
pub struct ResultAggregator {
    outcomes: Vec<Outcome>,
}

impl ResultAggregator {
    /// Create a new result aggregator
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one outcome
    pub fn add(&mut self, outcome: Outcome) {
        self.outcomes.push(outcome);
    }

    /// Check if there are any failures
    pub fn has_failures(&self) -> bool {
        self.outcomes.iter().any(|o| o.status == Status::Failed)
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Record an outcome for every expectation of `control` that has none yet.
    ///
    /// Used when a control stops early (cancellation, panic, fail-fast) so
    /// that every expectation still ends up with exactly one outcome.
    pub fn fill_unrecorded(
        &mut self,
        control_index: usize,
        control: &Control,
        status: Status,
        cause: Cause,
        message: &str,
    ) {
        let recorded: HashSet<(usize, usize)> = self
            .outcomes
            .iter()
            .filter(|o| o.control_index == control_index)
            .map(|o| (o.describe_index, o.expectation_index))
            .collect();

        for (d, describe) in control.describes.iter().enumerate() {
            for (e, expectation) in describe.expectations.iter().enumerate() {
                if recorded.contains(&(d, e)) {
                    continue;
                }
                self.outcomes.push(Outcome {
                    control_id: control.id.clone(),
                    control_index,
                    describe_index: d,
                    expectation_index: e,
                    subject: describe.descriptor.to_string(),
                    expectation: expectation.to_string(),
                    status,
                    cause: Some(cause),
                    message: message.to_string(),
                    duration_ms: 0,
                });
            }
        }
    }

    /// Seal into a report, restoring declaration order.
    pub fn seal(
        mut self,
        profile: &str,
        provider: &str,
        started_at: DateTime<Utc>,
        total_duration_ms: u64,
        controls: u32,
    ) -> Report {
        self.outcomes.sort_by_key(|o| (o.control_index, o.describe_index, o.expectation_index));
        Report {
            profile: profile.to_string(),
            provider: provider.to_string(),
            started_at,
            total_duration_ms,
            controls,
            outcomes: self.outcomes,
        }
    }
}
