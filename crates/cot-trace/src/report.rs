//! Verdict records and their human-readable rendering
//!
//! Building a [`Report`] has no side effects. Writing it anywhere is up to the
//! caller.

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

use crate::engine::rules::token_budget::TokenEstimate;
use crate::engine::rules::{CheckResult, Finding, RuleCategory, Verdict};
use crate::engine::{CheckSummary, VerdictDraft};
use crate::error::{Result, TraceError};

/// Name of the single check reported for unreadable documents
pub const PARSE_CHECK: &str = "parse";

/// Scores describing the root trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceMetrics {
    /// Task complexity in [0, 100]
    pub complexity_score: f64,
    /// Mean evidence quality in [0, 1]
    pub evidence_quality: f64,
    pub evidence_count: usize,
    /// At least three distinct source files
    pub diverse_sources: bool,
    /// Predicted usage, only when the trace declares none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_estimate: Option<TokenEstimate>,
}

/// Shape of the decision chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainSummary {
    pub fragments: usize,
    pub max_depth: u32,
    pub deepest: u32,
    pub halted: bool,
}

/// Structured verdict for one document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub path: String,
    pub overall_verdict: Verdict,
    pub checks: Vec<CheckResult>,
    pub summary: CheckSummary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<TraceMetrics>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain: Option<ChainSummary>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recommendations: Vec<String>,
}

impl Report {
    pub fn from_draft(path: impl Into<String>, draft: VerdictDraft) -> Self {
        Self {
            path: path.into(),
            overall_verdict: draft.verdict(),
            summary: draft.summary(),
            checks: draft.checks,
            metrics: None,
            chain: None,
            recommendations: Vec::new(),
        }
    }

    /// A failed record for a document that could not be read or parsed
    pub fn from_error(path: impl Into<String>, err: &TraceError) -> Self {
        let code = match err {
            TraceError::Parse(_) => "PARSE_ERROR",
            TraceError::Io(_) => "IO_ERROR",
            _ => "DOCUMENT_ERROR",
        };
        let mut draft = VerdictDraft::new();
        draft.push(CheckResult::from_finding(
            PARSE_CHECK,
            RuleCategory::Document,
            Finding::fail(format!("{}: {}", code, err)),
        ));
        Self::from_draft(path, draft)
    }

    pub fn with_metrics(mut self, metrics: TraceMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_chain(mut self, chain: ChainSummary) -> Self {
        self.chain = Some(chain);
        self
    }

    pub fn with_recommendations(mut self, recommendations: Vec<String>) -> Self {
        self.recommendations = recommendations;
        self
    }

    /// Pass or Warn
    pub fn is_valid(&self) -> bool {
        self.overall_verdict != Verdict::Fail
    }

    /// Whether this record stands for an unreadable document
    pub fn is_errored(&self) -> bool {
        self.checks.len() == 1 && self.checks[0].category == RuleCategory::Document
    }

    pub fn has_code(&self, code: &str) -> bool {
        self.checks.iter().any(|c| c.code() == Some(code))
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Plain-text report ending in `TRACE VALID` or `TRACE INVALID`
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Validation Report: {}", self.path);
        let _ = writeln!(out, "{}", "=".repeat(60));

        for check in &self.checks {
            let _ = match &check.reason {
                Some(reason) => writeln!(out, "{} {}: {}", check.status.symbol(), check.name, reason),
                None => writeln!(out, "{} {}", check.status.symbol(), check.name),
            };
        }

        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "Summary: {} passed, {} warned, {} failed",
            self.summary.passed, self.summary.warned, self.summary.failed
        );
        if let Some(metrics) = &self.metrics {
            let _ = writeln!(
                out,
                "Metrics: complexity={:.0} evidence_quality={:.2} evidence={}",
                metrics.complexity_score, metrics.evidence_quality, metrics.evidence_count
            );
            if let Some(estimate) = &metrics.token_estimate {
                let _ = writeln!(
                    out,
                    "Estimated tokens: {} ({:.0}% of typical limit)",
                    estimate.estimated_tokens, estimate.percentage_of_limit
                );
            }
        }
        if let Some(chain) = &self.chain {
            let _ = writeln!(
                out,
                "Chain: {} fragments, deepest {} of max {}{}",
                chain.fragments,
                chain.deepest,
                chain.max_depth,
                if chain.halted { ", halted" } else { "" }
            );
        }
        if !self.recommendations.is_empty() {
            let _ = writeln!(out, "Recommendations:");
            for rec in &self.recommendations {
                let _ = writeln!(out, "  - {}", rec);
            }
        }

        let _ = writeln!(out);
        let _ = writeln!(out, "{}", terminal_line(self.overall_verdict));
        out
    }
}

fn terminal_line(verdict: Verdict) -> String {
    match verdict {
        Verdict::Pass => format!("{} TRACE VALID", verdict.symbol()),
        Verdict::Warn => format!("{} TRACE VALID (with warnings)", verdict.symbol()),
        Verdict::Fail => format!("{} TRACE INVALID", verdict.symbol()),
    }
}
