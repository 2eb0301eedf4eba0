//! Policy engine
//!
//! Resolves the rule set for a trace and runs every registered rule against it
//! in registration order. Only an unresolved schema stops evaluation early;
//! every other problem becomes a check result.

pub mod rules;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::error::{Result, TraceError};
use crate::freshness::FreshnessCalculator;
use crate::model::Trace;
use crate::recursion::SpawnOutcome;
use crate::schema::{RuleSet, SchemaRegistry};
use rules::{CheckResult, Finding, Rule, RuleCategory, RuleContext, Verdict};

/// Name of the check that reports schema resolution
pub const SCHEMA_CHECK: &str = "schema_resolution";

/// Pass/warn/fail counts over a list of checks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckSummary {
    pub passed: usize,
    pub warned: usize,
    pub failed: usize,
}

impl CheckSummary {
    pub fn record(&mut self, status: Verdict) {
        match status {
            Verdict::Pass => self.passed += 1,
            Verdict::Warn => self.warned += 1,
            Verdict::Fail => self.failed += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.passed + self.warned + self.failed
    }
}

/// Ordered check results for one trace or a whole chain
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VerdictDraft {
    pub checks: Vec<CheckResult>,
}

impl VerdictDraft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, check: CheckResult) {
        self.checks.push(check);
    }

    /// Append another draft, prefixing its check names with `label`
    pub fn extend_prefixed(&mut self, other: VerdictDraft, label: &str) {
        self.checks
            .extend(other.checks.into_iter().map(|c| c.prefixed(label)));
    }

    /// Overall verdict: the worst status of any check
    pub fn verdict(&self) -> Verdict {
        Verdict::reduce(self.checks.iter().map(|c| c.status))
    }

    pub fn summary(&self) -> CheckSummary {
        let mut summary = CheckSummary::default();
        for check in &self.checks {
            summary.record(check.status);
        }
        summary
    }

    /// Whether any check carries the given reason code
    pub fn has_code(&self, code: &str) -> bool {
        self.checks.iter().any(|c| c.code() == Some(code))
    }

    pub fn failures(&self) -> impl Iterator<Item = &CheckResult> {
        self.checks.iter().filter(|c| c.status == Verdict::Fail)
    }
}

/// The rule evaluator
pub struct PolicyEngine {
    registry: &'static SchemaRegistry,
    rules: Vec<Arc<dyn Rule>>,
}

impl Default for PolicyEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PolicyEngine {
    /// Engine over the global registry with the standard checks
    pub fn new() -> Self {
        let mut engine = Self::empty();
        engine.register_default_rules();
        engine
    }

    /// Engine with no rules registered
    pub fn empty() -> Self {
        Self {
            registry: SchemaRegistry::global(),
            rules: Vec::new(),
        }
    }

    /// The standard checks, in report order
    fn register_default_rules(&mut self) {
        self.register(Arc::new(rules::required::RequiredFieldsRule::new()));
        self.register(Arc::new(rules::evidence::EvidenceSufficiencyRule::new()));
        self.register(Arc::new(rules::evidence::EvidenceIntegrityRule::new()));
        self.register(Arc::new(rules::freshness::EvidenceFreshnessRule::new()));
        self.register(Arc::new(rules::quality::EvidenceQualityRule::new()));
        self.register(Arc::new(rules::token_budget::TokenBudgetRule::new()));
        self.register(Arc::new(rules::token_budget::TokenPressureRule::new()));
        self.register(Arc::new(rules::token_budget::TokenEstimateRule::new()));
        self.register(Arc::new(rules::recursion::RecursionDepthRule::new()));
        self.register(Arc::new(rules::conflict::ConflictResolutionRule::new()));
        self.register(Arc::new(rules::conflict::EvidenceConsistencyRule::new()));
        self.register(Arc::new(rules::checklist::ChecklistRule::new()));
        self.register(Arc::new(rules::required::StructureRule::new()));
    }

    pub fn register(&mut self, rule: Arc<dyn Rule>) {
        self.rules.push(rule);
    }

    pub fn rules(&self) -> &[Arc<dyn Rule>] {
        &self.rules
    }

    /// Rule set for the trace's declared schema and runtime contract
    pub fn resolve(&self, trace: &Trace) -> Result<&'static RuleSet> {
        self.registry.resolve(
            trace.schema_version.as_deref(),
            trace.runtime_contract.as_deref(),
        )
    }

    /// Resolve the schema, then run every rule
    ///
    /// An unresolved schema yields a single failing `schema_resolution` check.
    pub fn evaluate(
        &self,
        trace: &Trace,
        freshness: &FreshnessCalculator,
        chain: &SpawnOutcome,
    ) -> VerdictDraft {
        match self.resolve(trace) {
            Ok(rule_set) => {
                let mut draft = VerdictDraft::new();
                draft.push(CheckResult::pass(SCHEMA_CHECK, RuleCategory::Schema));
                draft
                    .checks
                    .extend(self.evaluate_with(trace, rule_set, freshness, chain).checks);
                draft
            }
            Err(err) => {
                debug!(error = %err, "schema unresolved, skipping remaining checks");
                let mut draft = VerdictDraft::new();
                draft.push(CheckResult::from_finding(
                    SCHEMA_CHECK,
                    RuleCategory::Schema,
                    Finding::fail(format!("SCHEMA_UNRESOLVED: {}", schema_reason(&err))),
                ));
                draft
            }
        }
    }

    /// Run every rule against an already resolved rule set
    pub fn evaluate_with(
        &self,
        trace: &Trace,
        rule_set: &RuleSet,
        freshness: &FreshnessCalculator,
        chain: &SpawnOutcome,
    ) -> VerdictDraft {
        let ctx = RuleContext {
            trace,
            rules: rule_set,
            freshness,
            chain,
        };
        let mut draft = VerdictDraft::new();

        for rule in self.rules.iter().filter(|r| r.is_applicable(&ctx)) {
            let findings = rule.evaluate(&ctx);
            debug!(check = rule.name(), findings = findings.len(), "check evaluated");
            if findings.is_empty() {
                draft.push(CheckResult::pass(rule.name(), rule.category()));
            } else {
                draft.checks.extend(
                    findings
                        .into_iter()
                        .map(|f| CheckResult::from_finding(rule.name(), rule.category(), f)),
                );
            }
        }
        draft
    }
}

fn schema_reason(err: &TraceError) -> String {
    match err {
        TraceError::Schema(msg) => msg.clone(),
        other => other.to_string(),
    }
}
