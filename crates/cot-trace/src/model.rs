//! In-memory representation of a parsed reasoning trace
//!
//! A [`Trace`] is built once by the parser and only read afterwards. Fields that
//! the policy engine has to judge (risk level, schema version, context level)
//! keep their raw text so that unrecognized values can be reported instead of
//! being silently dropped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::TimestampFormatError;

/// Risk level declared in the risk assessment
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(RiskLevel::Low),
            "medium" | "moderate" => Ok(RiskLevel::Medium),
            "high" => Ok(RiskLevel::High),
            "critical" => Ok(RiskLevel::Critical),
            other => Err(format!("Unknown risk level: {}", other)),
        }
    }
}

/// How much of the workspace the author could see
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextLevel {
    None,
    Partial,
    FullFileAccess,
    /// Anything else, kept verbatim
    Other(String),
}

impl ContextLevel {
    /// Parse either the snake_case form or the prose form ("Full File Access")
    pub fn parse(raw: &str) -> Self {
        let normalized: String = raw
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { '_' })
            .collect();
        match normalized.trim_matches('_') {
            "none" | "no_access" => ContextLevel::None,
            "partial" | "partial_access" => ContextLevel::Partial,
            "full_file_access" | "full" | "full_access" => ContextLevel::FullFileAccess,
            _ => ContextLevel::Other(raw.trim().to_string()),
        }
    }
}

/// A `major.minor.patch` version as used by `schema` and `runtime_contract`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SemVer {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl SemVer {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self { major, minor, patch }
    }
}

impl fmt::Display for SemVer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for SemVer {
    type Err = String;

    /// Accepts `7.0.0`, `v7.0`, `7` and `chain_of_thought/v7.0.0`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_matches(|c| c == '"' || c == '\'');
        let tail = trimmed.rsplit('/').next().unwrap_or(trimmed);
        let tail = tail.strip_prefix(['v', 'V']).unwrap_or(tail);
        let mut parts = tail.split('.');
        let mut next = |name: &str, required: bool| -> Result<u32, String> {
            match parts.next() {
                Some(p) => p
                    .trim()
                    .parse::<u32>()
                    .map_err(|_| format!("Invalid {} component in version '{}'", name, s)),
                None if required => Err(format!("Empty version '{}'", s)),
                None => Ok(0),
            }
        };
        let major = next("major", true)?;
        let minor = next("minor", false)?;
        let patch = next("patch", false)?;
        if parts.next().is_some() {
            return Err(format!("Too many components in version '{}'", s));
        }
        Ok(SemVer::new(major, minor, patch))
    }
}

/// The decision under review
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub text: Option<String>,
    pub id: Option<String>,
}

/// The `Risk Assessment` section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub change_type: Option<String>,
    /// Raw risk level text; see [`RiskAssessment::level`]
    pub risk_level: Option<String>,
    pub impact_scope: Option<String>,
    pub reversibility: Option<String>,
}

impl RiskAssessment {
    /// The recognized risk level, if any
    ///
    /// Only the first word counts, so `High (touches billing)` reads as high.
    pub fn level(&self) -> Option<RiskLevel> {
        self.risk_level
            .as_deref()
            .and_then(|r| r.split(|c: char| !c.is_alphanumeric()).find(|w| !w.is_empty()))
            .and_then(|w| w.parse().ok())
    }
}

/// Timestamps attached to a piece of evidence
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceTimestamps {
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
    pub accessed: Option<DateTime<Utc>>,
}

/// One cited source supporting the decision
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvidenceItem {
    /// 1-based position in the Evidence Collection section
    pub index: usize,
    pub source: Option<String>,
    pub quote: Option<String>,
    pub relevance: Option<String>,
    pub timestamps: EvidenceTimestamps,
    /// Timestamp sub-fields that were present but unreadable
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub timestamp_errors: Vec<TimestampFormatError>,
}

impl EvidenceItem {
    /// Neither source nor a non-empty quote
    pub fn is_empty(&self) -> bool {
        let no_source = self.source.as_deref().map_or(true, |s| s.trim().is_empty());
        no_source && self.quote_is_empty()
    }

    pub fn quote_is_empty(&self) -> bool {
        self.quote.as_deref().map_or(true, |q| q.trim().is_empty())
    }
}

/// The `Analysis` section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub primary_rationale: Option<String>,
    pub alternative_considered: Option<String>,
    pub alternative_rejected_because: Option<String>,
    /// Unlabelled text in the section
    pub notes: Option<String>,
}

/// One line of the self-reported validation checklist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub name: String,
    pub met: bool,
}

/// Declared token consumption
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub used: u64,
    /// `None` when only the usage was declared
    pub limit: Option<u64>,
    pub fallback_strategy: Option<String>,
}

/// Declared position in a decision chain
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecursionInfo {
    pub current_depth: u32,
    pub max_depth: Option<u32>,
    pub parent_decision_id: Option<String>,
}

/// Declared conflict handling between disagreeing evidence
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConflictResolution {
    pub strategy: Option<String>,
    pub weights: BTreeMap<String, f64>,
    pub minority_report: Option<String>,
}

/// Recognized section headings
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    Decision,
    RiskAssessment,
    EvidenceCollection,
    Analysis,
    ConflictResolution,
    Validation,
    Action,
}

impl SectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SectionKind::Decision => "decision",
            SectionKind::RiskAssessment => "risk_assessment",
            SectionKind::EvidenceCollection => "evidence_collection",
            SectionKind::Analysis => "analysis",
            SectionKind::ConflictResolution => "conflict_resolution",
            SectionKind::Validation => "validation",
            SectionKind::Action => "action",
        }
    }
}

/// A parsed reasoning trace
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    /// Raw `schema` value, e.g. `chain_of_thought/v7.0.0`
    pub schema_version: Option<String>,
    /// Raw `runtime_contract` value
    pub runtime_contract: Option<String>,
    /// `validation: required` in the front-matter
    pub validation_required: bool,
    pub context_level: Option<ContextLevel>,
    pub available_tools: Vec<String>,
    pub decision: Decision,
    pub risk_assessment: RiskAssessment,
    pub evidence_items: Vec<EvidenceItem>,
    /// `evidence_count` as declared in the front-matter
    pub declared_evidence_count: Option<u64>,
    pub analysis: Option<Analysis>,
    pub validation_checklist: Vec<ChecklistItem>,
    pub action: Option<String>,
    /// Whether the action carried the `Therefore, I will:` directive
    pub action_directive: bool,
    pub token_usage: Option<TokenUsage>,
    pub recursion: Option<RecursionInfo>,
    pub conflict_resolution: Option<ConflictResolution>,
    /// Section headings found in the text, in order of appearance
    pub sections: Vec<SectionKind>,
}

impl Trace {
    pub fn has_section(&self, kind: SectionKind) -> bool {
        self.sections.contains(&kind)
    }
}

/// One trace in a multi-block document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceFragment {
    /// 0 for the root trace, 1.. for sub-decisions in document order
    pub position: usize,
    /// Heading title for sub-decisions
    pub title: Option<String>,
    /// Depth stated by the `(Depth: N)` marker or front-matter
    pub depth: u32,
    /// Decision id of the parent fragment, when known
    pub parent: Option<String>,
    /// 1-based line where the fragment starts
    pub line: usize,
    pub trace: Trace,
}

impl TraceFragment {
    pub fn is_root(&self) -> bool {
        self.position == 0
    }

    /// Label used to prefix check names
    pub fn label(&self) -> String {
        if self.is_root() {
            "root".to_string()
        } else {
            format!("sub_decision[{}]", self.position)
        }
    }
}

/// A whole document: the root trace followed by its sub-decisions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedDocument {
    pub fragments: Vec<TraceFragment>,
}

impl ParsedDocument {
    pub fn root(&self) -> &TraceFragment {
        &self.fragments[0]
    }

    pub fn sub_decisions(&self) -> &[TraceFragment] {
        &self.fragments[1..]
    }

    pub fn is_chained(&self) -> bool {
        self.fragments.len() > 1
    }
}
