//! Rule framework for trace validation
//!
//! Every check is a [`Rule`]. A rule reads the trace and the resolved rule set
//! and returns findings; an empty list means the check passed.

pub mod checklist;
pub mod conflict;
pub mod evidence;
pub mod freshness;
pub mod quality;
pub mod recursion;
pub mod required;
pub mod token_budget;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::freshness::FreshnessCalculator;
use crate::model::Trace;
use crate::recursion::SpawnOutcome;
use crate::schema::RuleSet;

/// Categories of trace checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleCategory {
    /// The document could not be read or parsed
    Document,
    /// Schema and runtime contract resolution
    Schema,
    /// Mandatory fields
    Required,
    /// Evidence count, integrity, freshness and quality
    Evidence,
    /// Token budget and pressure
    Budget,
    /// Decision chain depth and cycles
    Recursion,
    /// Conflict resolution and contradicting evidence
    Conflict,
    /// Self-reported validation checklist
    Checklist,
    /// Section layout and formatting conventions
    Structure,
}

impl fmt::Display for RuleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleCategory::Document => write!(f, "document"),
            RuleCategory::Schema => write!(f, "schema"),
            RuleCategory::Required => write!(f, "required"),
            RuleCategory::Evidence => write!(f, "evidence"),
            RuleCategory::Budget => write!(f, "budget"),
            RuleCategory::Recursion => write!(f, "recursion"),
            RuleCategory::Conflict => write!(f, "conflict"),
            RuleCategory::Checklist => write!(f, "checklist"),
            RuleCategory::Structure => write!(f, "structure"),
        }
    }
}

/// Outcome of a check, and of a whole trace
///
/// Ordered `Pass < Warn < Fail`; the overall verdict is the maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Pass,
    Warn,
    Fail,
}

impl Verdict {
    /// Fold verdicts into one; `Pass` for an empty input
    pub fn reduce<I>(verdicts: I) -> Verdict
    where
        I: IntoIterator<Item = Verdict>,
    {
        verdicts.into_iter().max().unwrap_or(Verdict::Pass)
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Verdict::Pass => "✅",
            Verdict::Warn => "⚠️",
            Verdict::Fail => "❌",
        }
    }
}

impl Default for Verdict {
    fn default() -> Self {
        Verdict::Pass
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Pass => write!(f, "PASS"),
            Verdict::Warn => write!(f, "WARN"),
            Verdict::Fail => write!(f, "FAIL"),
        }
    }
}

/// A non-passing observation from one rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub status: Verdict,
    pub reason: String,
}

impl Finding {
    pub fn warn(reason: impl Into<String>) -> Self {
        Self {
            status: Verdict::Warn,
            reason: reason.into(),
        }
    }

    pub fn fail(reason: impl Into<String>) -> Self {
        Self {
            status: Verdict::Fail,
            reason: reason.into(),
        }
    }
}

/// One line of the verdict
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    pub name: String,
    pub category: RuleCategory,
    pub status: Verdict,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl CheckResult {
    pub fn pass(name: impl Into<String>, category: RuleCategory) -> Self {
        Self {
            name: name.into(),
            category,
            status: Verdict::Pass,
            reason: None,
        }
    }

    pub fn from_finding(name: impl Into<String>, category: RuleCategory, finding: Finding) -> Self {
        Self {
            name: name.into(),
            category,
            status: finding.status,
            reason: Some(finding.reason),
        }
    }

    /// Same result under `<prefix>.<name>`
    pub fn prefixed(mut self, prefix: &str) -> Self {
        self.name = format!("{}.{}", prefix, self.name);
        self
    }

    /// Reason code: the reason text up to the first `:` or space
    pub fn code(&self) -> Option<&str> {
        self.reason
            .as_deref()
            .map(|r| r.split(|c: char| c == ':' || c.is_whitespace()).next().unwrap_or(r))
    }
}

impl fmt::Display for CheckResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            Some(reason) => write!(f, "[{}] {}: {}", self.status, self.name, reason),
            None => write!(f, "[{}] {}", self.status, self.name),
        }
    }
}

/// Everything a rule may look at
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    pub trace: &'a Trace,
    pub rules: &'a RuleSet,
    pub freshness: &'a FreshnessCalculator,
    /// What the chain tracker made of this fragment
    pub chain: &'a SpawnOutcome,
}

/// A single check over a parsed trace
///
/// Rules are pure: the same context always yields the same findings.
pub trait Rule: Send + Sync {
    /// Check name as it appears in the report
    fn name(&self) -> &'static str;

    /// One-line summary for rule listings
    fn description(&self) -> &'static str;

    fn category(&self) -> RuleCategory;

    /// Rules that do not apply produce no result at all
    fn is_applicable(&self, _ctx: &RuleContext<'_>) -> bool {
        true
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Vec<Finding>;
}
