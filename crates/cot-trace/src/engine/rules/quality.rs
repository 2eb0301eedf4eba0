//! Evidence quality heuristics

use regex::Regex;
use std::sync::OnceLock;

use super::{Finding, Rule, RuleCategory, RuleContext};

/// `path:12`, `path:12-40`, `path:§3.2` or `command (context)`
fn source_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^.+:(\d+(-\d+)?|§.+)$|^.+\s+\(.*\)$").expect("source regex is valid")
    })
}

pub fn is_well_formed_source(source: &str) -> bool {
    source_re().is_match(source.trim())
}

/// Quote length, relevance length, source format and declared count
pub struct EvidenceQualityRule;

impl EvidenceQualityRule {
    pub fn new() -> Self {
        Self
    }
}

impl Default for EvidenceQualityRule {
    fn default() -> Self {
        Self::new()
    }
}

impl Rule for EvidenceQualityRule {
    fn name(&self) -> &'static str {
        "evidence_quality"
    }

    fn description(&self) -> &'static str {
        "Quotes and relevance notes should be substantive and sources locatable"
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Evidence
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Vec<Finding> {
        let rules = ctx.rules;
        let mut findings = Vec::new();

        // Empty items are already failed by evidence_integrity
        for item in ctx.trace.evidence_items.iter().filter(|i| !i.is_empty()) {
            if let Some(quote) = item.quote.as_deref().filter(|q| !q.trim().is_empty()) {
                if quote.trim().chars().count() < rules.quote_min_len {
                    findings.push(Finding::warn(format!("QUOTE_TOO_SHORT:{}", item.index)));
                }
            }
            let relevance_len = item
                .relevance
                .as_deref()
                .map_or(0, |r| r.trim().chars().count());
            if relevance_len < rules.relevance_min_len {
                findings.push(Finding::warn(format!("RELEVANCE_TOO_BRIEF:{}", item.index)));
            }
            if let Some(source) = item.source.as_deref() {
                if !is_well_formed_source(source) {
                    findings.push(Finding::warn(format!("SOURCE_FORMAT:{}", item.index)));
                }
            }
        }

        if let Some(declared) = ctx.trace.declared_evidence_count {
            let found = ctx.trace.evidence_items.len() as u64;
            if declared != found {
                findings.push(Finding::warn(format!(
                    "EVIDENCE_COUNT_MISMATCH: declared={} found={}",
                    declared, found
                )));
            }
        }
        findings
    }
}
