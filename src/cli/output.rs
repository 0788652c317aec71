//! Output formatting for infra-verify.
//!
//! Provides terminal, JSON, and JUnit XML output formatters.
//!
//! # Graceful Degradation
//!
//! This module handles errors gracefully:
//! - Non-TTY output: Color disabled via NO_COLOR or --no-color
//! - Empty reports: Produces valid output with zero expectations
//! - Serialization failure: JSON output falls back to an error object
//!
//! All formatters produce valid output for any Report input.
//! No function in this module will panic.

use crate::cli::args::OutputFormat;
use crate::engine::result::{Report, ResultSummary};
use crate::{Outcome, Status};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

const RULE: &str = "--------------------------------------------------------------------------------";

/// Trait for output formatters
pub trait OutputFormatter {
    /// Format a sealed report into a string
    fn format(&self, report: &Report) -> String;
}

/// Terminal (human-readable) formatter
pub struct TerminalFormatter {
    color: bool,
    verbose: bool,
    quiet: bool,
}

impl TerminalFormatter {
    pub fn new(color: bool, verbose: bool, quiet: bool) -> Self {
        TerminalFormatter {
            color,
            verbose,
            quiet,
        }
    }

    fn colorize(&self, text: &str, color_code: &str) -> String {
        if self.color {
            format!("\x1b[{}m{}\x1b[0m", color_code, text)
        } else {
            text.to_string()
        }
    }

    fn green(&self, text: &str) -> String {
        self.colorize(text, "32")
    }

    fn red(&self, text: &str) -> String {
        self.colorize(text, "31")
    }

    fn gray(&self, text: &str) -> String {
        self.colorize(text, "90")
    }

    fn bold(&self, text: &str) -> String {
        self.colorize(text, "1")
    }

    fn status_tag(&self, status: Status) -> String {
        let tag = format!("[{}]", status);
        match status {
            Status::Passed => self.green(&tag),
            Status::Failed => self.red(&tag),
            Status::Skipped => self.gray(&tag),
        }
    }

    fn outcome_line(&self, outcome: &Outcome) -> String {
        let mut line = format!("    {} {}", self.status_tag(outcome.status), outcome.expectation);

        let show_message = match outcome.status {
            Status::Failed | Status::Skipped => true,
            Status::Passed => self.verbose,
        };
        if show_message && !outcome.message.is_empty() {
            let detail = match (outcome.status, outcome.cause) {
                (Status::Failed, Some(cause)) if self.verbose => {
                    format!("{} [{}]", outcome.message, cause)
                }
                _ => outcome.message.clone(),
            };
            line.push_str(&format!("\n      {}", self.gray(&detail)));
        }
        if self.verbose {
            line.push_str(&self.gray(&format!(" ({}ms)", outcome.duration_ms)));
        }
        line
    }
}

impl OutputFormatter for TerminalFormatter {
    fn format(&self, report: &Report) -> String {
        let mut output = String::new();

        // Header
        output.push_str(RULE);
        output.push('\n');
        output.push_str("infra-verify report\n");
        output.push_str(&format!("Profile: {}\n", report.profile()));
        output.push_str(&format!("Provider: {}\n", report.provider()));
        output.push_str(&format!("Started: {}\n", format_timestamp(report.started_at())));
        output.push_str(RULE);
        output.push_str("\n\n");

        for (control_id, outcomes) in report.by_control() {
            let visible: Vec<&Outcome> = outcomes
                .into_iter()
                .filter(|o| !self.quiet || o.status == Status::Failed)
                .collect();
            if visible.is_empty() {
                continue;
            }

            output.push_str(&format!("{}\n", self.bold(control_id)));

            let mut current_describe = None;
            for outcome in visible {
                if current_describe != Some(outcome.describe_index) {
                    current_describe = Some(outcome.describe_index);
                    output.push_str(&format!("  {}\n", outcome.subject));
                }
                output.push_str(&self.outcome_line(outcome));
                output.push('\n');
            }
            output.push('\n');
        }

        // Summary
        let summary = report.summary();
        output.push_str(RULE);
        output.push('\n');
        output.push_str(&format!(
            "SUMMARY: {} passed, {} failed, {} skipped ({} expectations, {} controls)\n",
            summary.passed, summary.failed, summary.skipped, summary.total, summary.controls
        ));
        if summary.errors > 0 {
            output.push_str(&format!(
                "Errors: {} failures were provider, descriptor or input errors\n",
                summary.errors
            ));
        }
        output.push_str(&format!(
            "Total time: {:.1}s\n",
            report.total_duration_ms() as f64 / 1000.0
        ));

        let exit_desc = if report.has_failures() {
            "failures detected"
        } else {
            "no failures"
        };
        output.push_str(&format!("Exit code: {} ({})\n", report.exit_code(), exit_desc));
        output.push_str(RULE);

        output
    }
}

/// JSON formatter
pub struct JsonFormatter {
    pretty: bool,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    profile: &'a str,
    provider: &'a str,
    started_at: DateTime<Utc>,
    total_duration_ms: u64,
    exit_code: u8,
    summary: ResultSummary,
    outcomes: &'a [Outcome],
}

impl JsonFormatter {
    pub fn new(pretty: bool) -> Self {
        JsonFormatter { pretty }
    }
}

impl OutputFormatter for JsonFormatter {
    fn format(&self, report: &Report) -> String {
        let view = JsonReport {
            profile: report.profile(),
            provider: report.provider(),
            started_at: report.started_at(),
            total_duration_ms: report.total_duration_ms(),
            exit_code: report.exit_code(),
            summary: report.summary(),
            outcomes: report.outcomes(),
        };

        let result = if self.pretty {
            serde_json::to_string_pretty(&view)
        } else {
            serde_json::to_string(&view)
        };
        result.unwrap_or_else(|e| serde_json::json!({ "error": e.to_string() }).to_string())
    }
}

/// JUnit XML formatter
pub struct JunitFormatter;

impl JunitFormatter {
    pub fn new() -> Self {
        JunitFormatter
    }

    fn escape_xml(s: &str) -> String {
        let mut result = String::with_capacity(s.len());
        for c in s.chars() {
            match c {
                '&' => result.push_str("&amp;"),
                '<' => result.push_str("&lt;"),
                '>' => result.push_str("&gt;"),
                '"' => result.push_str("&quot;"),
                '\'' => result.push_str("&apos;"),
                c => result.push(c),
            }
        }
        result
    }

    fn is_error(outcome: &Outcome) -> bool {
        outcome.status == Status::Failed && outcome.cause.map(|c| c.is_error()).unwrap_or(false)
    }
}

impl Default for JunitFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputFormatter for JunitFormatter {
    fn format(&self, report: &Report) -> String {
        let mut output = String::new();
        output.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");

        // <failure> and <error> are disjoint in JUnit
        let summary = report.summary();
        output.push_str(&format!(
            "<testsuites name=\"{}\" tests=\"{}\" failures=\"{}\" errors=\"{}\" skipped=\"{}\" time=\"{:.3}\">\n",
            Self::escape_xml(report.profile()),
            summary.total,
            summary.failed - summary.errors,
            summary.errors,
            summary.skipped,
            report.total_duration_ms() as f64 / 1000.0
        ));

        for (control_id, outcomes) in report.by_control() {
            let errors = outcomes.iter().filter(|o| Self::is_error(o)).count();
            let failures = outcomes
                .iter()
                .filter(|o| o.status == Status::Failed)
                .count()
                - errors;
            let skipped = outcomes
                .iter()
                .filter(|o| o.status == Status::Skipped)
                .count();
            let suite_time: u64 = outcomes.iter().map(|o| o.duration_ms).sum();

            output.push_str(&format!(
                "  <testsuite name=\"{}\" tests=\"{}\" failures=\"{}\" errors=\"{}\" skipped=\"{}\" time=\"{:.3}\">\n",
                Self::escape_xml(control_id),
                outcomes.len(),
                failures,
                errors,
                skipped,
                suite_time as f64 / 1000.0
            ));

            for outcome in outcomes {
                output.push_str(&format!(
                    "    <testcase name=\"{} {}\" classname=\"infra-verify.{}\" time=\"{:.3}\"",
                    Self::escape_xml(&outcome.subject),
                    Self::escape_xml(&outcome.expectation),
                    Self::escape_xml(control_id),
                    outcome.duration_ms as f64 / 1000.0
                ));

                let cause = outcome.cause.map(|c| c.as_str()).unwrap_or("");
                match outcome.status {
                    Status::Passed => output.push_str(" />\n"),
                    Status::Failed => {
                        let element = if Self::is_error(outcome) { "error" } else { "failure" };
                        output.push_str(">\n");
                        output.push_str(&format!(
                            "      <{} message=\"{}\" type=\"{}\">{}</{}>\n",
                            element,
                            Self::escape_xml(&outcome.message),
                            cause,
                            Self::escape_xml(&outcome.message),
                            element
                        ));
                        output.push_str("    </testcase>\n");
                    }
                    Status::Skipped => {
                        output.push_str(">\n");
                        output.push_str(&format!(
                            "      <skipped message=\"{}\" />\n",
                            Self::escape_xml(&outcome.message)
                        ));
                        output.push_str("    </testcase>\n");
                    }
                }
            }

            output.push_str("  </testsuite>\n");
        }

        output.push_str("</testsuites>");
        output
    }
}

/// Get a formatter based on the output format
pub fn get_formatter(
    format: OutputFormat,
    no_color: bool,
    verbose: bool,
    quiet: bool,
) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::Text => Box::new(TerminalFormatter::new(!no_color, verbose, quiet)),
        OutputFormat::Json => Box::new(JsonFormatter::new(true)),
        OutputFormat::Junit => Box::new(JunitFormatter::new()),
    }
}

/// Format a timestamp as ISO 8601
fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
}
