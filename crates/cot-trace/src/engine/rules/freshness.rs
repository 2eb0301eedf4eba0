//! Evidence freshness

use super::{Finding, Rule, RuleCategory, RuleContext};
use crate::freshness::FreshnessCategory;

/// Stale or undated evidence is reported, never failed
pub struct EvidenceFreshnessRule;

impl EvidenceFreshnessRule {
    pub fn new() -> Self {
        Self
    }
}

impl Default for EvidenceFreshnessRule {
    fn default() -> Self {
        Self::new()
    }
}

impl Rule for EvidenceFreshnessRule {
    fn name(&self) -> &'static str {
        "evidence_freshness"
    }

    fn description(&self) -> &'static str {
        "Evidence should carry recent modification or creation timestamps"
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Evidence
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Vec<Finding> {
        ctx.trace
            .evidence_items
            .iter()
            .filter(|item| !item.is_empty())
            .filter_map(|item| {
                let freshness = ctx.freshness.assess(&item.timestamps);
                match (freshness.category, freshness.score) {
                    (FreshnessCategory::Unknown, _) => {
                        Some(Finding::warn(format!("FRESHNESS_UNKNOWN:{}", item.index)))
                    }
                    (FreshnessCategory::Stale, Some(score)) => Some(Finding::warn(format!(
                        "STALE_EVIDENCE:{} score={:.2}",
                        item.index, score
                    ))),
                    _ => None,
                }
            })
            .collect()
    }
}
