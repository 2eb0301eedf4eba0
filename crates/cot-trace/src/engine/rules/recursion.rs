//! Decision chain depth

use super::{Finding, Rule, RuleCategory, RuleContext};
use crate::recursion::SpawnOutcome;

/// Reports what the chain tracker decided for this fragment
pub struct RecursionDepthRule;

impl RecursionDepthRule {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RecursionDepthRule {
    fn default() -> Self {
        Self::new()
    }
}

impl Rule for RecursionDepthRule {
    fn name(&self) -> &'static str {
        "recursion_depth"
    }

    fn description(&self) -> &'static str {
        "Sub-decisions stay within the maximum depth, deepen along the chain and never repeat"
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Recursion
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Vec<Finding> {
        match ctx.chain {
            SpawnOutcome::Accepted { .. } => Vec::new(),
            SpawnOutcome::Regressed { depth, parent_depth } => vec![Finding::fail(format!(
                "RECURSION_DEPTH_REGRESSION: depth={} parent_depth={}",
                depth, parent_depth
            ))],
            SpawnOutcome::Rejected(err) => vec![Finding::fail(err.to_string())],
        }
    }
}
