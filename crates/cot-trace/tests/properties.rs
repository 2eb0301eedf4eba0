//! Property tests for scoring, thresholds and chain limits

use chrono::{Duration, TimeZone, Utc};
use cot_trace::model::{
    Analysis, ChecklistItem, Decision, EvidenceItem, EvidenceTimestamps, RiskAssessment,
    SectionKind, TokenUsage,
};
use cot_trace::{
    ChainTracker, FreshnessCalculator, FreshnessConfig, PolicyEngine, RecursionError,
    SchemaRegistry, SpawnOutcome, Trace, Verdict,
};
use proptest::prelude::*;

fn calculator() -> FreshnessCalculator {
    FreshnessCalculator::new(
        FreshnessConfig::default(),
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
    )
}

fn evaluate(trace: &Trace) -> cot_trace::VerdictDraft {
    let rules = SchemaRegistry::global()
        .resolve(Some("7.0.0"), None)
        .unwrap();
    PolicyEngine::new().evaluate_with(
        trace,
        rules,
        &calculator(),
        &SpawnOutcome::Accepted { depth: 0 },
    )
}

fn risk_strategy() -> impl Strategy<Value = (&'static str, usize)> {
    prop_oneof![
        Just(("low", 1usize)),
        Just(("medium", 2usize)),
        Just(("high", 3usize)),
        Just(("critical", 5usize)),
    ]
}

/// A trace that declares everything the v7 rules require
///
/// Only warn-level problems vary: stale evidence, an unmet checklist item, a
/// missing directive and token usage within the limit.
fn compliant_trace(
    risk: &str,
    evidence_count: usize,
    quote: &str,
    ages_hours: &[i64],
    directive: bool,
    checklist_met: bool,
    used: Option<u64>,
) -> Trace {
    let now = calculator().now();
    Trace {
        schema_version: Some("chain_of_thought/v7.0.0".to_string()),
        runtime_contract: Some("2.0.0".to_string()),
        decision: Decision {
            text: Some("Move the retry helper into its own module".to_string()),
            id: Some("D-1".to_string()),
        },
        risk_assessment: RiskAssessment {
            risk_level: Some(risk.to_string()),
            impact_scope: Some("Module".to_string()),
            ..Default::default()
        },
        evidence_items: (1..=evidence_count)
            .map(|index| EvidenceItem {
                index,
                source: Some(format!("src/net/part_{}.rs:{}", index, index * 10)),
                quote: Some(format!("{} {}", quote, index)),
                relevance: Some(format!("Shows how part {} depends on the retry helper", index)),
                timestamps: EvidenceTimestamps {
                    modified: Some(now - Duration::hours(ages_hours[index % ages_hours.len()])),
                    ..Default::default()
                },
                ..Default::default()
            })
            .collect(),
        analysis: Some(Analysis {
            primary_rationale: Some("The helper has a single caller".to_string()),
            ..Default::default()
        }),
        validation_checklist: vec![
            ChecklistItem { name: "evidence_sources_cited".to_string(), met: true },
            ChecklistItem { name: "edge_cases_addressed".to_string(), met: checklist_met },
        ],
        action: Some("move the helper into src/net/backoff.rs".to_string()),
        action_directive: directive,
        token_usage: used.map(|used| TokenUsage {
            used,
            limit: Some(4_000),
            fallback_strategy: None,
        }),
        sections: vec![
            SectionKind::Decision,
            SectionKind::RiskAssessment,
            SectionKind::EvidenceCollection,
            SectionKind::Analysis,
            SectionKind::Validation,
            SectionKind::Action,
        ],
        ..Default::default()
    }
}

fn verdict_strategy() -> impl Strategy<Value = Verdict> {
    prop_oneof![Just(Verdict::Pass), Just(Verdict::Warn), Just(Verdict::Fail)]
}

proptest! {
    #[test]
    fn freshness_score_is_bounded(age_hours in 0i64..50_000) {
        let calc = calculator();
        let score = calc.score_at(calc.now() - Duration::hours(age_hours));
        prop_assert!(score <= 1.0);
        prop_assert!(score >= calc.config().minimum_score);
    }

    #[test]
    fn freshness_never_increases_with_age(a in 0i64..50_000, b in 0i64..50_000) {
        let calc = calculator();
        let (younger, older) = if a <= b { (a, b) } else { (b, a) };
        let young = calc.score_at(calc.now() - Duration::hours(younger));
        let old = calc.score_at(calc.now() - Duration::hours(older));
        prop_assert!(young >= old);
    }

    #[test]
    fn freshness_is_deterministic(age_minutes in -10_000i64..500_000) {
        let reference = calculator().now() - Duration::minutes(age_minutes);
        prop_assert_eq!(calculator().score_at(reference), calculator().score_at(reference));
    }

    #[test]
    fn token_usage_within_limit_passes_budget(limit in 1u64..1_000_000, fraction in 0.0f64..=1.0) {
        let used = (limit as f64 * fraction) as u64;
        let trace = Trace {
            token_usage: Some(TokenUsage { used, limit: Some(limit), fallback_strategy: None }),
            ..Default::default()
        };
        let draft = evaluate(&trace);
        let budget: Vec<_> = draft.checks.iter().filter(|c| c.name == "token_budget").collect();
        prop_assert_eq!(budget.len(), 1);
        prop_assert_eq!(budget[0].status, Verdict::Pass);
    }

    #[test]
    fn token_usage_over_limit_without_fallback_fails(limit in 1u64..1_000_000, extra in 1u64..1_000) {
        let trace = Trace {
            token_usage: Some(TokenUsage { used: limit + extra, limit: Some(limit), fallback_strategy: None }),
            ..Default::default()
        };
        prop_assert!(evaluate(&trace).has_code("TOKEN_BUDGET_EXCEEDED_NO_FALLBACK"));
    }

    #[test]
    fn evidence_threshold_follows_risk((risk, need) in risk_strategy(), have in 0usize..8) {
        let trace = Trace {
            risk_assessment: RiskAssessment {
                risk_level: Some(risk.to_string()),
                ..Default::default()
            },
            evidence_items: (1..=have)
                .map(|index| EvidenceItem {
                    index,
                    source: Some(format!("src/lib.rs:{}", index)),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        };
        let draft = evaluate(&trace);
        prop_assert_eq!(draft.has_code("INSUFFICIENT_EVIDENCE"), have < need);
    }

    #[test]
    fn chain_depth_limit_is_enforced(max_depth in 1u32..10, depth in 1u32..20) {
        let mut tracker = ChainTracker::new(max_depth);
        tracker.begin("root", 0);
        match tracker.spawn("child", Some("root"), depth, 0) {
            SpawnOutcome::Rejected(RecursionError::LimitExceeded { attempted, max }) => {
                prop_assert!(depth > max_depth);
                prop_assert_eq!(attempted, depth);
                prop_assert_eq!(max, max_depth);
                prop_assert!(tracker.is_halted());
            }
            outcome => {
                prop_assert!(depth <= max_depth);
                prop_assert!(outcome.is_accepted());
            }
        }
    }

    #[test]
    fn compliant_trace_never_fails(
        (risk, need) in risk_strategy(),
        extra in 0usize..3,
        quote in "[a-z]{12,40}",
        ages_hours in proptest::collection::vec(0i64..20_000, 1..6),
        directive in any::<bool>(),
        checklist_met in any::<bool>(),
        used in proptest::option::of(0u64..=4_000),
    ) {
        let trace = compliant_trace(
            risk,
            need + extra,
            &quote,
            &ages_hours,
            directive,
            checklist_met,
            used,
        );
        let draft = PolicyEngine::new().evaluate(
            &trace,
            &calculator(),
            &SpawnOutcome::Accepted { depth: 0 },
        );
        let failed: Vec<_> = draft
            .checks
            .iter()
            .filter(|c| c.status == Verdict::Fail)
            .map(|c| c.reason.clone().unwrap_or_default())
            .collect();
        prop_assert!(failed.is_empty(), "unexpected failures: {:?}", failed);
        prop_assert_ne!(draft.verdict(), Verdict::Fail);
    }

    #[test]
    fn overall_verdict_ignores_order(statuses in proptest::collection::vec(verdict_strategy(), 0..12)) {
        let forward = Verdict::reduce(statuses.iter().copied());
        let backward = Verdict::reduce(statuses.iter().rev().copied());
        prop_assert_eq!(forward, backward);
        prop_assert_eq!(forward, statuses.iter().copied().max().unwrap_or(Verdict::Pass));
    }
}
