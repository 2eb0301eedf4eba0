//! Output formatting for the trace validator CLI
//!
//! Provides JSON, YAML, plain-text and colored table renderings of a batch of
//! reports.

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use colored::{ColoredString, Colorize};
use cot_trace::{Report, Verdict};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use uuid::Uuid;

use crate::error::CliError;

/// Output format options for CLI results
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug, Default)]
pub enum OutputFormat {
    /// Human-readable table format with colors
    #[default]
    Table,
    /// Plain report text, one block per document
    Text,
    /// JSON format for machine processing
    Json,
    /// YAML format
    Yaml,
}

/// Verdict counts over a batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub passed: usize,
    pub warned: usize,
    pub failed: usize,
    /// Documents that could not be read or parsed (also counted as failed)
    pub errored: usize,
}

impl BatchSummary {
    pub fn from_reports(reports: &[Report]) -> Self {
        let mut summary = BatchSummary {
            total: reports.len(),
            ..Default::default()
        };
        for report in reports {
            match report.overall_verdict {
                Verdict::Pass => summary.passed += 1,
                Verdict::Warn => summary.warned += 1,
                Verdict::Fail => summary.failed += 1,
            }
            if report.is_errored() {
                summary.errored += 1;
            }
        }
        summary
    }
}

/// Everything one invocation produces
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOutput {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    /// Instant freshness was measured against
    pub evaluated_at: DateTime<Utc>,
    pub summary: BatchSummary,
    pub reports: Vec<Report>,
}

impl BatchOutput {
    pub fn new(reports: Vec<Report>, evaluated_at: DateTime<Utc>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            evaluated_at,
            summary: BatchSummary::from_reports(&reports),
            reports,
        }
    }

    /// Render in the specified format
    pub fn render(&self, format: OutputFormat) -> Result<String, CliError> {
        match format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(self)? + "\n"),
            OutputFormat::Yaml => Ok(serde_yaml::to_string(self)?),
            OutputFormat::Text => Ok(self.render_text()),
            OutputFormat::Table => Ok(self.render_table()),
        }
    }

    fn render_text(&self) -> String {
        let mut out = String::new();
        for report in &self.reports {
            out.push_str(&report.render_text());
            out.push('\n');
        }
        if self.reports.len() > 1 {
            let _ = writeln!(out, "{}", self.summary_line());
        }
        out
    }

    fn render_table(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out);
        let _ = writeln!(out, "{}", "Trace Validation Results".cyan().bold());
        let _ = writeln!(out, "{}", "=".repeat(60));

        for report in &self.reports {
            let _ = writeln!(out);
            let _ = writeln!(
                out,
                "{} {}",
                verdict_label(report.overall_verdict),
                report.path.bold()
            );
            for check in report.checks.iter().filter(|c| c.status != Verdict::Pass) {
                let _ = writeln!(
                    out,
                    "    {} {:<36} {}",
                    verdict_marker(check.status),
                    check.name,
                    check.reason.as_deref().unwrap_or_default()
                );
            }
            let _ = writeln!(
                out,
                "    {}",
                format!(
                    "{} passed, {} warned, {} failed",
                    report.summary.passed, report.summary.warned, report.summary.failed
                )
                .dimmed()
            );
            for rec in &report.recommendations {
                let _ = writeln!(out, "    {} {}", "→".blue(), rec);
            }
        }

        let _ = writeln!(out);
        let _ = writeln!(out, "{}", "-".repeat(60));
        let _ = writeln!(out, "{}", self.summary_line());
        out
    }

    fn summary_line(&self) -> String {
        let s = &self.summary;
        format!(
            "Total: {}  Passed: {}  Warned: {}  Failed: {}  Errored: {}",
            s.total, s.passed, s.warned, s.failed, s.errored
        )
    }
}

fn verdict_label(verdict: Verdict) -> ColoredString {
    match verdict {
        Verdict::Pass => "PASS".green().bold(),
        Verdict::Warn => "WARN".yellow().bold(),
        Verdict::Fail => "FAIL".red().bold(),
    }
}

fn verdict_marker(verdict: Verdict) -> ColoredString {
    match verdict {
        Verdict::Pass => "+".green(),
        Verdict::Warn => "!".yellow(),
        Verdict::Fail => "x".red(),
    }
}
