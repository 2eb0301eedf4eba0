//! Document validation pipeline
//!
//! text → [`parse_document`] → chain tracking → [`PolicyEngine`] per fragment →
//! [`Report`]. The evaluation instant is always passed in; nothing here reads
//! the clock.

use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};
use tracing::{info, info_span};

use crate::config::ValidatorConfig;
use crate::engine::rules::token_budget::TokenEstimate;
use crate::engine::rules::{CheckResult, Finding, RuleCategory};
use crate::engine::{PolicyEngine, VerdictDraft};
use crate::freshness::{FreshnessCalculator, FreshnessCategory};
use crate::model::{ParsedDocument, RiskLevel, Trace};
use crate::parser::parse_document;
use crate::recursion::{decision_key, ChainTracker, SpawnOutcome};
use crate::report::{ChainSummary, Report, TraceMetrics};
use crate::error::Result;

/// Validates trace documents with a fixed configuration
pub struct Validator {
    engine: PolicyEngine,
    config: ValidatorConfig,
}

impl Default for Validator {
    fn default() -> Self {
        Self {
            engine: PolicyEngine::new(),
            config: ValidatorConfig::default(),
        }
    }
}

impl Validator {
    /// Rejects a freshness configuration that cannot score consistently
    pub fn new(config: ValidatorConfig) -> Result<Self> {
        config.freshness.validate()?;
        Ok(Self {
            engine: PolicyEngine::new(),
            config,
        })
    }

    pub fn with_engine(mut self, engine: PolicyEngine) -> Self {
        self.engine = engine;
        self
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    pub fn engine(&self) -> &PolicyEngine {
        &self.engine
    }

    /// Parse and validate one document
    ///
    /// Fails only when the text is not a trace at all; every other problem is
    /// part of the returned report.
    pub fn validate_str(&self, path: &str, text: &str, now: DateTime<Utc>) -> Result<Report> {
        let span = info_span!("validate_document", path);
        let _guard = span.enter();
        let document = parse_document(text)?;
        Ok(self.validate_document(path, &document, now))
    }

    /// Parse and validate, turning a parse failure into a failed report
    pub fn validate_or_report(&self, path: &str, text: &str, now: DateTime<Utc>) -> Report {
        match self.validate_str(path, text, now) {
            Ok(report) => report,
            Err(err) => {
                info!(path, error = %err, "document rejected");
                Report::from_error(path, &err)
            }
        }
    }

    /// Validate an already parsed document
    pub fn validate_document(
        &self,
        path: &str,
        document: &ParsedDocument,
        now: DateTime<Utc>,
    ) -> Report {
        let freshness = FreshnessCalculator::new(self.config.freshness.clone(), now);
        let root = document.root();

        let rule_set = match self.engine.resolve(&root.trace) {
            Ok(rule_set) => rule_set,
            Err(_) => {
                // Nothing else is meaningful without a rule set
                let draft = self.engine.evaluate(
                    &root.trace,
                    &freshness,
                    &SpawnOutcome::Accepted { depth: root.depth },
                );
                let report = Report::from_draft(path, draft);
                info!(path, verdict = %report.overall_verdict, "trace validated");
                return report;
            }
        };

        let max_depth = root
            .trace
            .recursion
            .as_ref()
            .and_then(|r| r.max_depth)
            .unwrap_or(rule_set.default_max_depth);
        let mut tracker = ChainTracker::new(max_depth);
        let root_key = decision_key(&root.trace);
        let root_outcome = tracker.begin(root_key.clone(), root.depth);

        let mut draft = self.engine.evaluate(&root.trace, &freshness, &root_outcome);
        let mut depths: HashMap<String, u32> = HashMap::new();
        depths.insert(root_key.clone(), root.depth);
        let mut deepest = root.depth;

        for fragment in document.sub_decisions() {
            let key = decision_key(&fragment.trace);
            let (parent_key, parent_depth) = fragment
                .parent
                .as_deref()
                .and_then(|p| depths.get(p).map(|depth| (p, *depth)))
                .unwrap_or((root_key.as_str(), root.depth));
            let outcome = tracker.spawn(&key, Some(parent_key), fragment.depth, parent_depth);
            let label = fragment.label();

            match &outcome {
                SpawnOutcome::Rejected(err) => {
                    draft.push(
                        CheckResult::from_finding(
                            "recursion_depth",
                            RuleCategory::Recursion,
                            Finding::fail(err.to_string()),
                        )
                        .prefixed(&label),
                    );
                }
                _ => {
                    depths.insert(key, fragment.depth);
                    deepest = deepest.max(fragment.depth);
                    let sub = self
                        .engine
                        .evaluate_with(&fragment.trace, rule_set, &freshness, &outcome);
                    draft.extend_prefixed(sub, &label);
                }
            }
        }

        let metrics = trace_metrics(&root.trace, &freshness);
        let recommendations = recommendations(&draft, &metrics);
        let mut report = Report::from_draft(path, draft)
            .with_metrics(metrics)
            .with_recommendations(recommendations);
        if document.is_chained() || root.trace.recursion.is_some() {
            report = report.with_chain(ChainSummary {
                fragments: document.fragments.len(),
                max_depth,
                deepest,
                halted: tracker.is_halted(),
            });
        }

        info!(
            path,
            verdict = %report.overall_verdict,
            passed = report.summary.passed,
            warned = report.summary.warned,
            failed = report.summary.failed,
            "trace validated"
        );
        report
    }
}

/// Complexity and evidence quality of a single trace
pub fn trace_metrics(trace: &Trace, freshness: &FreshnessCalculator) -> TraceMetrics {
    let items = &trace.evidence_items;
    let sources: BTreeSet<&str> = items
        .iter()
        .filter_map(|i| i.source.as_deref())
        .map(|s| s.split(':').next().unwrap_or(s).trim())
        .filter(|s| !s.is_empty())
        .collect();
    let diverse_sources = sources.len() >= 3;

    TraceMetrics {
        complexity_score: complexity_score(trace),
        evidence_quality: evidence_quality(trace, freshness, diverse_sources),
        evidence_count: items.len(),
        diverse_sources,
        token_estimate: trace
            .token_usage
            .is_none()
            .then(|| TokenEstimate::for_trace(trace)),
    }
}

/// Task complexity in [0, 100]
pub fn complexity_score(trace: &Trace) -> f64 {
    let mut score = (trace.evidence_items.len() as f64 * 5.0).min(30.0);
    score += match trace.risk_assessment.level() {
        Some(RiskLevel::Low) => 10.0,
        Some(RiskLevel::High) => 50.0,
        Some(RiskLevel::Critical) => 70.0,
        Some(RiskLevel::Medium) | None => 30.0,
    };
    if let Some(analysis) = &trace.analysis {
        if analysis.alternative_considered.is_some() {
            score += 10.0;
        }
        if analysis.alternative_rejected_because.is_some() {
            score += 10.0;
        }
    }
    let scope = trace
        .risk_assessment
        .impact_scope
        .as_deref()
        .unwrap_or_default()
        .to_lowercase();
    if scope.contains("system-wide") || scope.contains("system wide") {
        score += 20.0;
    } else if scope.contains("module") {
        score += 10.0;
    }
    score.min(100.0)
}

fn evidence_quality(trace: &Trace, freshness: &FreshnessCalculator, diverse: bool) -> f64 {
    let items = &trace.evidence_items;
    if items.is_empty() {
        return 0.0;
    }
    let total: f64 = items
        .iter()
        .map(|item| {
            let mut score = 0.0;
            if item.quote.as_deref().map_or(0, |q| q.chars().count()) > 20 {
                score += 0.3;
            }
            if item.relevance.as_deref().map_or(0, |r| r.chars().count()) > 30 {
                score += 0.3;
            }
            let ts = &item.timestamps;
            if ts.created.is_some() || ts.modified.is_some() || ts.accessed.is_some() {
                score += 0.2;
            }
            let category = freshness.assess(ts).category;
            if matches!(category, FreshnessCategory::Current | FreshnessCategory::Recent) {
                score += 0.2;
            }
            score
        })
        .sum();
    let mut quality = total / items.len() as f64;
    if diverse {
        quality = (quality + 0.1).min(1.0);
    }
    quality
}

/// Follow-up advice derived from the check outcomes
pub fn recommendations(draft: &VerdictDraft, metrics: &TraceMetrics) -> Vec<String> {
    let mut out = Vec::new();
    let mut add = |text: &str| out.push(text.to_string());

    if draft.has_code("MISSING_REQUIRED_FIELD") || draft.has_code("MISSING_SECTION") {
        add("Add all required fields and sections to the reasoning trace");
    }
    if draft.has_code("INSUFFICIENT_EVIDENCE") {
        add("Cite more evidence: the declared risk level requires more sources");
    }
    if metrics.evidence_count > 0 && metrics.evidence_quality < 0.7 {
        add("Improve evidence quality by adding timestamps and fuller relevance notes");
    }
    if metrics.evidence_count > 0 && !metrics.diverse_sources {
        add("Use more diverse evidence sources for stronger reasoning");
    }
    if metrics.complexity_score > 60.0 && metrics.evidence_count < 3 {
        add("High complexity task requires more evidence sources");
    }
    if draft.has_code("STALE_EVIDENCE") || draft.has_code("FRESHNESS_UNKNOWN") {
        add("Refresh or timestamp evidence before relying on it");
    }
    if draft.has_code("TOKEN_BUDGET_PRESSURE")
        || draft.has_code("TOKEN_BUDGET_FALLBACK_APPLIED")
        || draft.has_code("TOKEN_BUDGET_EXCEEDED_NO_FALLBACK")
        || metrics.token_estimate.as_ref().is_some_and(TokenEstimate::is_high)
    {
        add("Consider decomposing the task to reduce token usage");
    }
    if draft.has_code("POTENTIAL_CONTRADICTION") || draft.has_code("CONFLICT_UNRESOLVED") {
        add("Resolve contradictions before proceeding, or declare a conflict resolution strategy");
    }
    if draft.has_code("RECURSION_LIMIT_EXCEEDED")
        || draft.has_code("CYCLE_DETECTED")
        || draft.has_code("CHAIN_HALTED")
    {
        add("Restructure the decision chain to stay within its depth limit and avoid revisiting decisions");
    }
    if draft.has_code("CHECKLIST_ITEM_UNMET") {
        add("Complete the unchecked validation checklist items");
    }
    out
}
