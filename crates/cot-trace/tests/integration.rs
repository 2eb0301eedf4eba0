//! End-to-end validation of reasoning trace documents
//!
//! Covers:
//! - Single-block traces from parse to verdict
//! - Evidence thresholds, token budgets and missing fields
//! - Decision chains: depth limits, cycles and halting
//! - Report rendering

use chrono::{DateTime, TimeZone, Utc};
use cot_trace::{Report, Validator, ValidatorConfig, Verdict};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 2, 1, 12, 0, 0).unwrap()
}

fn validate(text: &str) -> Report {
    Validator::new(ValidatorConfig::default())
        .expect("default config is valid")
        .validate_str("trace.md", text, now())
        .expect("document parses")
}

const FRONT_MATTER: &str = "```yaml
schema: chain_of_thought/v7.0.0
runtime_contract: 2.0.0
decision_id: D-1
```";

const EVIDENCE_ONE: &str = r#"1. **Source**: `src/net/retry.rs:12-40`
   **Quote**: "pub fn retry_with_backoff<F>(op: F) -> Result<()>"
   **Relevance**: The helper is self-contained and only called from the client
   **Timestamp**:
     - Modified: 2024-02-01T08:00:00Z"#;

const EVIDENCE_TWO: &str = r#"2. **Source**: `src/net/client.rs:88`
   **Quote**: "let delay = retry_with_backoff(send_request);"
   **Relevance**: The client is the only caller of the retry helper today
   **Timestamp**:
     - Created: 2024-01-31T20:00:00Z"#;

/// A complete trace with the given front matter, risk level and evidence
fn trace(front_matter: &str, risk: &str, evidence: &[&str]) -> String {
    format!(
        "## 🧠 Reasoning Trace (Chain-of-Thought)\n\n{}\n\n{}",
        front_matter,
        body("Extract the retry helper into its own module", risk, evidence)
    )
}

/// Decision through action, every section filled in
fn body(decision: &str, risk: &str, evidence: &[&str]) -> String {
    format!(
        r#"### Decision: {decision}

#### Risk Assessment:
- **Change Type**: Refactor
- **Risk Level**: {risk}
- **Impact Scope**: Module
- **Reversibility**: Trivial

#### Evidence Collection:
{evidence}

#### Analysis:
- **Primary rationale**: Isolating the helper makes it testable on its own

#### Validation:
- [✓] Evidence sources cited
- [✓] Edge cases addressed

#### Action:
→ Therefore, I will: move retry_with_backoff into src/net/backoff.rs
"#,
        decision = decision,
        risk = risk,
        evidence = evidence.join("\n\n"),
    )
}

fn check<'a>(report: &'a Report, name: &str) -> Vec<&'a cot_trace::CheckResult> {
    report.checks.iter().filter(|c| c.name == name).collect()
}

#[test]
fn test_complete_low_risk_trace_passes() {
    let report = validate(&trace(FRONT_MATTER, "Low", &[EVIDENCE_ONE, EVIDENCE_TWO]));

    assert_eq!(
        report.overall_verdict,
        Verdict::Pass,
        "unexpected findings:\n{}",
        report.render_text()
    );
    assert_eq!(report.summary.failed, 0);
    assert_eq!(report.summary.warned, 0);
    assert_eq!(report.checks[0].name, "schema_resolution");
    assert!(check(&report, "token_budget").is_empty());
    assert!(report.chain.is_none());
    assert!(report.render_text().trim_end().ends_with("TRACE VALID"));
}

#[test]
fn test_medium_risk_needs_two_evidence_items() {
    let report = validate(&trace(FRONT_MATTER, "Medium", &[EVIDENCE_ONE]));

    assert_eq!(report.overall_verdict, Verdict::Fail);
    let sufficiency = check(&report, "evidence_sufficiency");
    assert_eq!(sufficiency.len(), 1);
    assert_eq!(sufficiency[0].status, Verdict::Fail);
    assert_eq!(
        sufficiency[0].reason.as_deref(),
        Some("INSUFFICIENT_EVIDENCE: have=1 need=2")
    );
    assert!(report.render_text().trim_end().ends_with("TRACE INVALID"));
}

#[test]
fn test_token_pressure_with_fallback_warns() {
    let front_matter = "```yaml
schema: chain_of_thought/v7.0.0
runtime_contract: 2.0.0
decision_id: D-1
token_usage: 3500
token_limit: 4000
fallback_strategy: summarize
```";
    let report = validate(&trace(front_matter, "Low", &[EVIDENCE_ONE, EVIDENCE_TWO]));

    assert_eq!(report.overall_verdict, Verdict::Warn);
    assert_eq!(check(&report, "token_budget")[0].status, Verdict::Pass);
    let pressure = check(&report, "token_pressure");
    assert_eq!(pressure[0].status, Verdict::Warn);
    assert_eq!(
        pressure[0].reason.as_deref(),
        Some("TOKEN_BUDGET_FALLBACK_APPLIED:summarize")
    );
    assert!(report.is_valid());
}

#[test]
fn test_exceeded_budget_without_fallback_fails() {
    let front_matter = "```yaml
schema: chain_of_thought/v7.0.0
runtime_contract: 2.0.0
token_usage: 4100
token_limit: 4000
```";
    let report = validate(&trace(front_matter, "Low", &[EVIDENCE_ONE, EVIDENCE_TWO]));

    assert_eq!(report.overall_verdict, Verdict::Fail);
    assert!(report.has_code("TOKEN_BUDGET_EXCEEDED_NO_FALLBACK"));
}

#[test]
fn test_missing_decision_fails() {
    let text = trace(FRONT_MATTER, "Low", &[EVIDENCE_ONE, EVIDENCE_TWO])
        .replace("### Decision: Extract the retry helper into its own module\n", "");
    let report = validate(&text);

    assert_eq!(report.overall_verdict, Verdict::Fail);
    assert!(report
        .checks
        .iter()
        .any(|c| c.reason.as_deref() == Some("MISSING_REQUIRED_FIELD:decision")));
    // Remaining checks still run
    assert!(!check(&report, "structure").is_empty());
}

#[test]
fn test_unsupported_schema_is_the_only_check() {
    let front_matter = "```yaml
schema: chain_of_thought/v3.0.0
runtime_contract: 2.0.0
```";
    let report = validate(&trace(front_matter, "Low", &[EVIDENCE_ONE, EVIDENCE_TWO]));

    assert_eq!(report.checks.len(), 1);
    assert_eq!(report.overall_verdict, Verdict::Fail);
    assert!(report.has_code("SCHEMA_UNRESOLVED"));
}

#[test]
fn test_incompatible_runtime_contract() {
    let front_matter = "```yaml
schema: chain_of_thought/v7.0.0
runtime_contract: 1.4.0
```";
    let report = validate(&trace(front_matter, "Low", &[EVIDENCE_ONE, EVIDENCE_TWO]));

    assert!(report.has_code("SCHEMA_UNRESOLVED"));
    assert!(report.checks[0]
        .reason
        .as_deref()
        .unwrap_or_default()
        .contains("requires 2.x"));
}

#[test]
fn test_stale_evidence_warns() {
    let stale = EVIDENCE_TWO.replace("2024-01-31T20:00:00Z", "2023-01-01T00:00:00Z");
    let report = validate(&trace(FRONT_MATTER, "Low", &[EVIDENCE_ONE, &stale]));

    assert_eq!(report.overall_verdict, Verdict::Warn);
    let freshness = check(&report, "evidence_freshness");
    assert_eq!(freshness.len(), 1);
    assert_eq!(freshness[0].reason.as_deref(), Some("STALE_EVIDENCE:2 score=0.30"));
}

#[test]
fn test_validation_is_deterministic() {
    let text = trace(FRONT_MATTER, "High", &[EVIDENCE_ONE, EVIDENCE_TWO]);
    let first = validate(&text);
    let second = validate(&text);
    assert_eq!(first, second);
    assert_eq!(first.to_json().unwrap(), second.to_json().unwrap());
}

fn chain(depths: &[u32]) -> String {
    let mut text = String::from(
        "```yaml
schema: chain_of_thought/v7.0.0
runtime_contract: 2.0.0
decision_id: ROOT
max_depth: 5
```
",
    );
    text.push_str(&body("Plan the storage migration", "Low", &[EVIDENCE_ONE, EVIDENCE_TWO]));
    for depth in depths {
        text.push_str(&format!(
            "\n## 🧠 Sub-Decision: Step at level {depth} (Depth: {depth})\n{}",
            body(
                &format!("Handle level {}", depth),
                "Low",
                &[EVIDENCE_ONE, EVIDENCE_TWO]
            )
        ));
    }
    text
}

#[test]
fn test_chain_within_limit() {
    let report = validate(&chain(&[1, 2, 3, 4, 5]));

    assert_eq!(
        report.overall_verdict,
        Verdict::Pass,
        "unexpected findings:\n{}",
        report.render_text()
    );
    for i in 1..=5 {
        let name = format!("sub_decision[{}].recursion_depth", i);
        let checks = check(&report, &name);
        assert_eq!(checks.len(), 1, "missing {}", name);
        assert_eq!(checks[0].status, Verdict::Pass);

        let prefix = format!("sub_decision[{}].", i);
        let fragment: Vec<_> = report
            .checks
            .iter()
            .filter(|c| c.name.starts_with(&prefix))
            .collect();
        assert!(fragment.len() > 5, "{} ran only {} checks", prefix, fragment.len());
        assert!(
            fragment.iter().all(|c| c.status == Verdict::Pass),
            "{} did not pass: {:?}",
            prefix,
            fragment
        );
    }
    let summary = report.chain.as_ref().unwrap();
    assert_eq!(summary.fragments, 6);
    assert_eq!(summary.deepest, 5);
    assert_eq!(summary.max_depth, 5);
    assert!(!summary.halted);
    assert!(!report.has_code("RECURSION_LIMIT_EXCEEDED"));
}

#[test]
fn test_chain_exceeding_limit() {
    let report = validate(&chain(&[1, 2, 3, 4, 5, 6]));

    assert_eq!(report.overall_verdict, Verdict::Fail);
    let sixth = check(&report, "sub_decision[6].recursion_depth");
    assert_eq!(sixth.len(), 1);
    assert_eq!(
        sixth[0].reason.as_deref(),
        Some("RECURSION_LIMIT_EXCEEDED: attempted depth=6 max=5")
    );
    // The rejected fragment gets no other checks
    assert!(!report
        .checks
        .iter()
        .any(|c| c.name.starts_with("sub_decision[6].") && c.name != "sub_decision[6].recursion_depth"));
    assert_eq!(
        check(&report, "sub_decision[5].recursion_depth")[0].status,
        Verdict::Pass
    );
    assert!(report.chain.as_ref().unwrap().halted);
}

#[test]
fn test_cycle_halts_chain() {
    let text = "```yaml
schema: chain_of_thought/v7.0.0
runtime_contract: 2.0.0
decision_id: ROOT
```
### Decision: Root

## Sub-Decision: First (Depth: 1)
```yaml
decision_id: A
```
### Decision: Do A

## Sub-Decision: Again (Depth: 2)
```yaml
decision_id: A
```
### Decision: Do A again

## Sub-Decision: Later (Depth: 1)
### Decision: Something else
";
    let report = validate(text);

    let second = check(&report, "sub_decision[2].recursion_depth");
    assert_eq!(
        second[0].reason.as_deref(),
        Some("CYCLE_DETECTED: decision 'A' already in chain")
    );
    let third = check(&report, "sub_decision[3].recursion_depth");
    assert_eq!(
        third[0].reason.as_deref(),
        Some("CHAIN_HALTED: chain already halted by CYCLE_DETECTED")
    );
    assert!(report.has_code("CHAIN_HALTED"));
    assert_eq!(report.overall_verdict, Verdict::Fail);
}

#[test]
fn test_depth_regression_against_parent() {
    let text = "```yaml
schema: chain_of_thought/v7.0.0
runtime_contract: 2.0.0
decision_id: ROOT
```
### Decision: Root

## Sub-Decision: Deep (Depth: 2)
```yaml
decision_id: DEEP
```
### Decision: Go deep

## Sub-Decision: Shallow child (Depth: 1)
```yaml
decision_id: CHILD
parent_decision_id: DEEP
```
### Decision: Come back up
";
    let report = validate(text);

    let checks = check(&report, "sub_decision[2].recursion_depth");
    assert_eq!(
        checks[0].reason.as_deref(),
        Some("RECURSION_DEPTH_REGRESSION: depth=1 parent_depth=2")
    );
}

#[test]
fn test_unparseable_document_report() {
    let validator = Validator::default();
    let report = validator.validate_or_report("notes.md", "plain prose only", now());

    assert!(report.is_errored());
    assert!(report.has_code("PARSE_ERROR"));
    let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
    assert_eq!(json["overallVerdict"], "FAIL");
}

#[test]
fn test_identical_siblings_are_not_a_cycle() {
    let text = format!(
        "```yaml
schema: chain_of_thought/v7.0.0
runtime_contract: 2.0.0
decision_id: ROOT
```
{root}
## Sub-Decision: Check the caller (Depth: 1)
{child}
## Sub-Decision: Check the caller (Depth: 1)
{child}",
        root = body("Plan the retry refactor", "Low", &[EVIDENCE_ONE]),
        child = body("Check the caller", "Low", &[EVIDENCE_TWO]),
    );
    let report = validate(&text);

    assert!(!report.has_code("CYCLE_DETECTED"), "{}", report.render_text());
    assert!(!report.chain.as_ref().unwrap().halted);
    assert_eq!(
        check(&report, "sub_decision[2].recursion_depth")[0].status,
        Verdict::Pass
    );
}

#[test]
fn test_malformed_timestamp_warns() {
    let malformed = EVIDENCE_TWO.replace("Created: 2024-01-31T20:00:00Z", "Modified: last tuesday");
    let report = validate(&trace(FRONT_MATTER, "Low", &[EVIDENCE_ONE, &malformed]));

    assert!(!report.is_errored());
    assert_eq!(report.overall_verdict, Verdict::Warn, "{}", report.render_text());
    assert!(report.has_code("TIMESTAMP_FORMAT"));
    let integrity = check(&report, "evidence_integrity");
    assert!(integrity
        .iter()
        .any(|c| c.status == Verdict::Warn
            && c.reason.as_deref().unwrap_or_default().contains("last tuesday")));
}

#[test]
fn test_freshness_env_overrides() {
    let aged = EVIDENCE_TWO.replace("2024-01-31T20:00:00Z", "2023-12-03T12:00:00Z");
    let text = trace(FRONT_MATTER, "Low", &[EVIDENCE_ONE, &aged]);

    assert!(!validate(&text).has_code("STALE_EVIDENCE"));

    std::env::set_var("COT_FRESHNESS_STALE_DAYS", "30");
    let config = ValidatorConfig::default().with_env_overrides();
    std::env::remove_var("COT_FRESHNESS_STALE_DAYS");
    assert_eq!(config.freshness.stale_threshold_days, 30);

    let report = Validator::new(config)
        .unwrap()
        .validate_str("trace.md", &text, now())
        .unwrap();
    assert_eq!(report.overall_verdict, Verdict::Warn);
    assert_eq!(
        check(&report, "evidence_freshness")[0].reason.as_deref(),
        Some("STALE_EVIDENCE:2 score=0.30")
    );
}

const JSON_TRACE: &str = r#"{
  "schema": "chain_of_thought/v7.0.0",
  "runtime_contract": "2.0.0",
  "decision": "Extract the retry helper into its own module",
  "decision_id": "D-1",
  "risk_assessment": {
    "change_type": "Refactor",
    "risk_level": "Low",
    "impact_scope": "Module",
    "reversibility": "Trivial"
  },
  "evidence_collection": [
    {
      "source": "src/net/retry.rs:12-40",
      "quote": "pub fn retry_with_backoff<F>(op: F) -> Result<()>",
      "relevance": "The helper is self-contained and only called from the client",
      "timestamp": {"modified": "2024-02-01T08:00:00Z"}
    },
    {
      "source": "src/net/client.rs:88",
      "quote": "let delay = retry_with_backoff(send_request);",
      "relevance": "The client is the only caller of the retry helper today",
      "timestamp": "2024-01-31T20:00:00Z"
    }
  ],
  "analysis": {"primary_rationale": "Isolating the helper makes it testable on its own"},
  "validation": {"Evidence sources cited": true, "Edge cases addressed": true},
  "action": "→ Therefore, I will: move retry_with_backoff into src/net/backoff.rs"
}"#;

#[test]
fn test_json_trace_matches_markdown() {
    let json = validate(JSON_TRACE);
    let markdown = validate(&trace(FRONT_MATTER, "Low", &[EVIDENCE_ONE, EVIDENCE_TWO]));

    assert_eq!(json.overall_verdict, Verdict::Pass, "{}", json.render_text());
    assert_eq!(json.summary.failed, markdown.summary.failed);
    assert_eq!(json.metrics.as_ref().unwrap().evidence_count, 2);

    let fenced = format!("Reasoning follows.\n\n```json\n{}\n```\n", JSON_TRACE);
    assert_eq!(validate(&fenced).overall_verdict, Verdict::Pass);
}

#[test]
fn test_json_trace_missing_evidence_fails() {
    let text = JSON_TRACE.replace("\"risk_level\": \"Low\"", "\"risk_level\": \"High\"");
    let report = validate(&text);

    assert_eq!(report.overall_verdict, Verdict::Fail);
    assert!(report.has_code("INSUFFICIENT_EVIDENCE"));
}

#[test]
fn test_malformed_json_is_a_parse_error() {
    let report = Validator::default().validate_or_report("inline", "{\"decision\": ", now());
    assert!(report.is_errored());
    assert!(report.has_code("PARSE_ERROR"));
}

#[test]
fn test_large_trace_without_usage_gets_estimate() {
    let long_quote = format!(
        r#"3. **Source**: `docs/design.md:1`
   **Quote**: "{}"
   **Relevance**: The design document describes every retry path in detail"#,
        "retry ".repeat(2_500)
    );
    let report = validate(&trace(
        FRONT_MATTER,
        "Low",
        &[EVIDENCE_ONE, EVIDENCE_TWO, &long_quote],
    ));

    let estimate = report.metrics.as_ref().unwrap().token_estimate.unwrap();
    assert!(estimate.is_high());
    assert!(report.has_code("TOKEN_USAGE_HIGH"));
    assert_eq!(report.overall_verdict, Verdict::Warn);
    assert!(report
        .recommendations
        .iter()
        .any(|r| r.contains("decomposing the task")));
}

#[test]
fn test_usage_without_limit_warns() {
    let front_matter = "```yaml
schema: chain_of_thought/v7.0.0
runtime_contract: 2.0.0
token_usage: 3500
```";
    let report = validate(&trace(front_matter, "Low", &[EVIDENCE_ONE, EVIDENCE_TWO]));

    assert_eq!(report.overall_verdict, Verdict::Warn);
    assert_eq!(
        check(&report, "token_budget")[0].reason.as_deref(),
        Some("TOKEN_LIMIT_UNDECLARED: used=3500")
    );
    assert!(report.metrics.as_ref().unwrap().token_estimate.is_none());
}
