//! Token budget, token pressure and predicted token usage

use serde::{Deserialize, Serialize};

use super::{Finding, Rule, RuleCategory, RuleContext};
use crate::model::{TokenUsage, Trace};

/// Budget assumed for traces that declare no usage of their own
pub const TYPICAL_TOKEN_LIMIT: u64 = 4_000;

const CHARS_PER_TOKEN: usize = 4;
const METADATA_TOKENS: u64 = 100;
const TOKENS_PER_EVIDENCE_ITEM: u64 = 50;
const HIGH_USAGE_PERCENT: f64 = 75.0;
const CRITICAL_USAGE_PERCENT: f64 = 90.0;

/// Predicted token usage of a trace
///
/// Text tokens are the character count of the trace's JSON form divided by
/// four; every trace adds a fixed structure overhead and a flat cost per
/// evidence item.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenEstimate {
    pub estimated_tokens: u64,
    pub text_tokens: u64,
    pub metadata_tokens: u64,
    pub evidence_tokens: u64,
    /// Share of [`TYPICAL_TOKEN_LIMIT`] in percent
    pub percentage_of_limit: f64,
}

impl TokenEstimate {
    pub fn for_trace(trace: &Trace) -> Self {
        let chars = serde_json::to_string_pretty(trace).map_or(0, |json| json.chars().count());
        let text_tokens = (chars / CHARS_PER_TOKEN) as u64;
        let evidence_tokens = trace.evidence_items.len() as u64 * TOKENS_PER_EVIDENCE_ITEM;
        let estimated_tokens = text_tokens + METADATA_TOKENS + evidence_tokens;
        Self {
            estimated_tokens,
            text_tokens,
            metadata_tokens: METADATA_TOKENS,
            evidence_tokens,
            percentage_of_limit: estimated_tokens as f64 / TYPICAL_TOKEN_LIMIT as f64 * 100.0,
        }
    }

    /// Above 75% of the typical limit
    pub fn is_high(&self) -> bool {
        self.percentage_of_limit > HIGH_USAGE_PERCENT
    }

    /// Above 90% of the typical limit
    pub fn is_critical(&self) -> bool {
        self.percentage_of_limit > CRITICAL_USAGE_PERCENT
    }
}

fn recognized_fallback<'a>(ctx: &RuleContext<'_>, usage: &'a TokenUsage) -> Option<&'a str> {
    usage
        .fallback_strategy
        .as_deref()
        .filter(|s| ctx.rules.is_recognized_fallback(s))
}

/// Usage above the limit needs a recognized fallback strategy
///
/// Usage at or below the limit always passes. Usage declared without a limit
/// cannot be judged and only warns.
pub struct TokenBudgetRule;

impl TokenBudgetRule {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TokenBudgetRule {
    fn default() -> Self {
        Self::new()
    }
}

impl Rule for TokenBudgetRule {
    fn name(&self) -> &'static str {
        "token_budget"
    }

    fn description(&self) -> &'static str {
        "Token usage over the limit requires a recognized fallback strategy"
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Budget
    }

    fn is_applicable(&self, ctx: &RuleContext<'_>) -> bool {
        ctx.trace.token_usage.is_some()
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Vec<Finding> {
        let Some(usage) = &ctx.trace.token_usage else {
            return Vec::new();
        };
        let Some(limit) = usage.limit else {
            return vec![Finding::warn(format!(
                "TOKEN_LIMIT_UNDECLARED: used={}",
                usage.used
            ))];
        };
        if usage.used <= limit {
            return Vec::new();
        }
        match (recognized_fallback(ctx, usage), usage.fallback_strategy.as_deref()) {
            (Some(strategy), _) => vec![Finding::warn(format!(
                "TOKEN_BUDGET_FALLBACK_APPLIED:{}",
                strategy
            ))],
            (None, Some(unknown)) => vec![Finding::fail(format!(
                "TOKEN_BUDGET_EXCEEDED_NO_FALLBACK: used={} limit={} fallback '{}' not recognized",
                usage.used, limit, unknown
            ))],
            (None, None) => vec![Finding::fail(format!(
                "TOKEN_BUDGET_EXCEEDED_NO_FALLBACK: used={} limit={}",
                usage.used, limit
            ))],
        }
    }
}

/// Usage within the limit but above the rule set's pressure ratio
pub struct TokenPressureRule;

impl TokenPressureRule {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TokenPressureRule {
    fn default() -> Self {
        Self::new()
    }
}

impl Rule for TokenPressureRule {
    fn name(&self) -> &'static str {
        "token_pressure"
    }

    fn description(&self) -> &'static str {
        "Token usage close to the limit should declare how it degrades"
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Budget
    }

    fn is_applicable(&self, ctx: &RuleContext<'_>) -> bool {
        ctx.trace.token_usage.is_some()
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Vec<Finding> {
        let Some((usage, limit)) = ctx
            .trace
            .token_usage
            .as_ref()
            .and_then(|u| u.limit.map(|limit| (u, limit)))
        else {
            return Vec::new();
        };
        if limit == 0 || usage.used > limit {
            return Vec::new();
        }
        let ratio = usage.used as f64 / limit as f64;
        if ratio <= ctx.rules.pressure_ratio {
            return Vec::new();
        }
        let finding = match recognized_fallback(ctx, usage) {
            Some(strategy) => Finding::warn(format!("TOKEN_BUDGET_FALLBACK_APPLIED:{}", strategy)),
            None => Finding::warn(format!(
                "TOKEN_BUDGET_PRESSURE: used={} limit={}",
                usage.used, limit
            )),
        };
        vec![finding]
    }
}

/// Predicted usage for traces that declare none
pub struct TokenEstimateRule;

impl TokenEstimateRule {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TokenEstimateRule {
    fn default() -> Self {
        Self::new()
    }
}

impl Rule for TokenEstimateRule {
    fn name(&self) -> &'static str {
        "token_estimate"
    }

    fn description(&self) -> &'static str {
        "Traces without declared usage should stay well inside the typical token limit"
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Budget
    }

    fn is_applicable(&self, ctx: &RuleContext<'_>) -> bool {
        ctx.trace.token_usage.is_none()
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Vec<Finding> {
        let estimate = TokenEstimate::for_trace(ctx.trace);
        if !estimate.is_high() {
            return Vec::new();
        }
        let reason = format!(
            "TOKEN_USAGE_HIGH: estimated={} ({:.0}% of {})",
            estimate.estimated_tokens, estimate.percentage_of_limit, TYPICAL_TOKEN_LIMIT
        );
        if estimate.is_critical() {
            vec![Finding::warn(format!("{} critical", reason))]
        } else {
            vec![Finding::warn(reason)]
        }
    }
}
