//! Conflict resolution and contradicting evidence

use super::{Finding, Rule, RuleCategory, RuleContext};

const WEIGHT_TOLERANCE: f64 = 0.01;

/// Term pairs whose co-occurrence across two quotes suggests disagreement
const OPPOSITES: [(&str, &str); 7] = [
    ("true", "false"),
    ("yes", "no"),
    ("always", "never"),
    ("must", "must not"),
    ("should", "should not"),
    ("increase", "decrease"),
    ("add", "remove"),
];

/// A declared conflict block must name a recognized strategy
pub struct ConflictResolutionRule;

impl ConflictResolutionRule {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ConflictResolutionRule {
    fn default() -> Self {
        Self::new()
    }
}

impl Rule for ConflictResolutionRule {
    fn name(&self) -> &'static str {
        "conflict_resolution"
    }

    fn description(&self) -> &'static str {
        "Declared evidence conflicts must be resolved with a recognized strategy"
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Conflict
    }

    fn is_applicable(&self, ctx: &RuleContext<'_>) -> bool {
        ctx.trace.conflict_resolution.is_some()
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Vec<Finding> {
        let Some(conflict) = &ctx.trace.conflict_resolution else {
            return Vec::new();
        };
        let strategy = match conflict.strategy.as_deref().map(str::trim) {
            None | Some("") => {
                return vec![Finding::fail("CONFLICT_UNRESOLVED: no strategy declared")];
            }
            Some(s) => s,
        };
        if !ctx.rules.is_recognized_conflict_strategy(strategy) {
            return vec![Finding::fail(format!(
                "CONFLICT_UNRESOLVED: unrecognized strategy '{}'",
                strategy
            ))];
        }
        if strategy.eq_ignore_ascii_case("weighted_consensus") {
            let sum: f64 = conflict.weights.values().sum();
            if (sum - 1.0).abs() > WEIGHT_TOLERANCE {
                return vec![Finding::warn(format!("CONFLICT_WEIGHTS_UNBALANCED: sum={:.2}", sum))];
            }
        }
        Vec::new()
    }
}

/// Flags quote pairs that look contradictory when no conflict block exists
pub struct EvidenceConsistencyRule;

impl EvidenceConsistencyRule {
    pub fn new() -> Self {
        Self
    }
}

impl Default for EvidenceConsistencyRule {
    fn default() -> Self {
        Self::new()
    }
}

impl Rule for EvidenceConsistencyRule {
    fn name(&self) -> &'static str {
        "evidence_consistency"
    }

    fn description(&self) -> &'static str {
        "Evidence with opposing statements should come with a conflict resolution block"
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Conflict
    }

    fn is_applicable(&self, ctx: &RuleContext<'_>) -> bool {
        ctx.trace.conflict_resolution.is_none()
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Vec<Finding> {
        let quotes: Vec<(usize, Vec<String>)> = ctx
            .trace
            .evidence_items
            .iter()
            .filter_map(|item| item.quote.as_deref().map(|q| (item.index, words(q))))
            .collect();

        let mut findings = Vec::new();
        for (i, (left_idx, left)) in quotes.iter().enumerate() {
            for (right_idx, right) in &quotes[i + 1..] {
                if opposes(left, right) {
                    findings.push(Finding::warn(format!(
                        "POTENTIAL_CONTRADICTION:{},{}",
                        left_idx, right_idx
                    )));
                }
            }
        }
        findings
    }
}

fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric() && c != '\'')
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Whole-word match; a single word followed by `not` does not count
fn contains_term(words: &[String], term: &str) -> bool {
    let parts: Vec<&str> = term.split(' ').collect();
    if parts.len() == 1 {
        return words
            .iter()
            .enumerate()
            .any(|(i, w)| w == term && words.get(i + 1).map_or(true, |next| next != "not"));
    }
    words
        .windows(parts.len())
        .any(|window| window.iter().zip(&parts).all(|(w, p)| w == p))
}

fn opposes(left: &[String], right: &[String]) -> bool {
    OPPOSITES.iter().any(|(a, b)| {
        (contains_term(left, a) && contains_term(right, b))
            || (contains_term(left, b) && contains_term(right, a))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::rules::test_support::{reasons, run};
    use crate::engine::rules::Verdict;
    use crate::model::{ConflictResolution, EvidenceItem, Trace};
    use std::collections::BTreeMap;

    fn conflict(strategy: Option<&str>, weights: &[(&str, f64)]) -> Trace {
        Trace {
            conflict_resolution: Some(ConflictResolution {
                strategy: strategy.map(str::to_string),
                weights: weights
                    .iter()
                    .map(|(k, v)| (k.to_string(), *v))
                    .collect::<BTreeMap<_, _>>(),
                minority_report: None,
            }),
            ..Default::default()
        }
    }

    fn quotes(texts: &[&str]) -> Trace {
        Trace {
            evidence_items: texts
                .iter()
                .enumerate()
                .map(|(i, q)| EvidenceItem {
                    index: i + 1,
                    quote: Some(q.to_string()),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_recognized_strategies() {
        assert!(run(&ConflictResolutionRule::new(), &conflict(Some("majority"), &[])).is_empty());
        let balanced = conflict(Some("weighted_consensus"), &[("docs", 0.6), ("code", 0.4)]);
        assert!(run(&ConflictResolutionRule::new(), &balanced).is_empty());
    }

    #[test]
    fn test_unresolved_conflict() {
        let findings = run(&ConflictResolutionRule::new(), &conflict(None, &[]));
        assert_eq!(findings[0].status, Verdict::Fail);
        assert!(findings[0].reason.starts_with("CONFLICT_UNRESOLVED"));

        let findings = run(&ConflictResolutionRule::new(), &conflict(Some("coin_flip"), &[]));
        assert_eq!(
            reasons(&findings),
            vec!["CONFLICT_UNRESOLVED: unrecognized strategy 'coin_flip'"]
        );
    }

    #[test]
    fn test_unbalanced_weights() {
        let trace = conflict(Some("weighted_consensus"), &[("docs", 0.5), ("code", 0.3)]);
        let findings = run(&ConflictResolutionRule::new(), &trace);
        assert_eq!(reasons(&findings), vec!["CONFLICT_WEIGHTS_UNBALANCED: sum=0.80"]);
        assert_eq!(findings[0].status, Verdict::Warn);
    }

    #[test]
    fn test_no_conflict_block_is_not_applicable() {
        assert!(run(&ConflictResolutionRule::new(), &Trace::default()).is_empty());
    }

    #[test]
    fn test_opposing_quotes() {
        let trace = quotes(&[
            "Callers must validate input first",
            "Callers must not validate input, the parser does",
            "Unrelated remark about logging",
        ]);
        let findings = run(&EvidenceConsistencyRule::new(), &trace);
        assert_eq!(reasons(&findings), vec!["POTENTIAL_CONTRADICTION:1,2"]);
    }

    #[test]
    fn test_same_phrase_is_not_a_contradiction() {
        let trace = quotes(&["You must not block here", "Handlers must not block either"]);
        assert!(run(&EvidenceConsistencyRule::new(), &trace).is_empty());

        // Word boundaries: "address" does not contain the word "add"
        let trace = quotes(&["address the reviewer", "remove the flag"]);
        assert!(run(&EvidenceConsistencyRule::new(), &trace).is_empty());
    }

    #[test]
    fn test_declared_conflict_suppresses_heuristic() {
        let mut trace = quotes(&["always retry", "never retry"]);
        trace.conflict_resolution = Some(ConflictResolution {
            strategy: Some("escalate".to_string()),
            ..Default::default()
        });
        assert!(run(&EvidenceConsistencyRule::new(), &trace).is_empty());
    }
}
