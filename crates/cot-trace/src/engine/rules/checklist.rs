//! Self-reported validation checklist

use super::{Finding, Rule, RuleCategory, RuleContext};

/// Unchecked items are advisory warnings
pub struct ChecklistRule;

impl ChecklistRule {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ChecklistRule {
    fn default() -> Self {
        Self::new()
    }
}

impl Rule for ChecklistRule {
    fn name(&self) -> &'static str {
        "checklist"
    }

    fn description(&self) -> &'static str {
        "Every validation checklist item should be checked off"
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Checklist
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Vec<Finding> {
        ctx.trace
            .validation_checklist
            .iter()
            .filter(|item| !item.met)
            .map(|item| Finding::warn(format!("CHECKLIST_ITEM_UNMET:{}", item.name)))
            .collect()
    }
}
