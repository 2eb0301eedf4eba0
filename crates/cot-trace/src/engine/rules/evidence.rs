//! Evidence sufficiency and integrity

use super::{Finding, Rule, RuleCategory, RuleContext};

/// Evidence count against the risk-level minimum
pub struct EvidenceSufficiencyRule;

impl EvidenceSufficiencyRule {
    pub fn new() -> Self {
        Self
    }
}

impl Default for EvidenceSufficiencyRule {
    fn default() -> Self {
        Self::new()
    }
}

impl Rule for EvidenceSufficiencyRule {
    fn name(&self) -> &'static str {
        "evidence_sufficiency"
    }

    fn description(&self) -> &'static str {
        "Evidence count must reach the minimum for the declared risk level"
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Evidence
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Vec<Finding> {
        let risk = &ctx.trace.risk_assessment;
        let level = risk.level();
        let need = ctx.rules.min_evidence(level);
        let have = ctx.trace.evidence_items.len();

        let mut findings = Vec::new();
        if level.is_none() {
            let raw = risk.risk_level.as_deref().unwrap_or("missing");
            findings.push(Finding::warn(format!(
                "UNRECOGNIZED_RISK_LEVEL:{} (defaulting to {} evidence items)",
                raw, need
            )));
        }
        if have < need {
            findings.push(Finding::fail(format!(
                "INSUFFICIENT_EVIDENCE: have={} need={}",
                have, need
            )));
        }
        findings
    }
}

/// Each evidence item must cite something
pub struct EvidenceIntegrityRule;

impl EvidenceIntegrityRule {
    pub fn new() -> Self {
        Self
    }
}

impl Default for EvidenceIntegrityRule {
    fn default() -> Self {
        Self::new()
    }
}

impl Rule for EvidenceIntegrityRule {
    fn name(&self) -> &'static str {
        "evidence_integrity"
    }

    fn description(&self) -> &'static str {
        "Evidence items need a source or quote, quotes may not be empty, timestamps must be readable"
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Evidence
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Vec<Finding> {
        let mut findings = Vec::new();
        for item in &ctx.trace.evidence_items {
            let empty_quote = item.quote.as_deref().map_or(false, |q| q.trim().is_empty());
            if item.is_empty() || empty_quote {
                findings.push(Finding::fail(format!("EMPTY_EVIDENCE_ITEM:{}", item.index)));
            }
            for err in &item.timestamp_errors {
                findings.push(Finding::warn(format!(
                    "TIMESTAMP_FORMAT:{} {}",
                    item.index, err
                )));
            }
        }
        findings
    }
}
