//! Structured (JSON) trace documents
//!
//! A document is read as JSON when the whole text is an object, or when a
//! plain or `json` fenced block holds an object with `decision` or
//! `evidence_collection`. Nested `sub_decisions` become chain fragments in
//! depth-first order. JSON fragments all report line 1.

use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

use super::evidence::apply_timestamp;
use super::sections::checklist_key;
use super::{normalize_token, parse_action};
use crate::error::{Result, TraceError};
use crate::model::{
    Analysis, ChecklistItem, ConflictResolution, ContextLevel, Decision, EvidenceItem,
    ParsedDocument, RecursionInfo, RiskAssessment, SectionKind, TokenUsage, Trace, TraceFragment,
};
use crate::recursion::decision_key;

const TRACE_KEYS: [&str; 2] = ["decision", "evidence_collection"];

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct JsonTrace {
    #[serde(alias = "schema_version")]
    schema: Option<String>,
    #[serde(alias = "contract")]
    runtime_contract: Option<String>,
    context_level: Option<String>,
    available_tools: Vec<String>,
    title: Option<String>,
    decision: Option<String>,
    #[serde(alias = "id")]
    decision_id: Option<String>,
    risk_assessment: Option<JsonRisk>,
    evidence_collection: Option<Vec<JsonEvidence>>,
    evidence_count: Option<u64>,
    analysis: Option<JsonAnalysis>,
    /// Checklist object, or the string `required`
    validation: Option<Value>,
    action: Option<String>,
    token_usage: Option<JsonTokenUsage>,
    #[serde(alias = "token_budget")]
    token_limit: Option<u64>,
    #[serde(alias = "fallback")]
    fallback_strategy: Option<String>,
    recursion: Option<JsonRecursion>,
    conflict_resolution: Option<JsonConflict>,
    sub_decisions: Vec<JsonTrace>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct JsonRisk {
    change_type: Option<String>,
    risk_level: Option<String>,
    impact_scope: Option<String>,
    reversibility: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct JsonEvidence {
    source: Option<String>,
    quote: Option<String>,
    relevance: Option<String>,
    #[serde(alias = "timestamps")]
    timestamp: Option<JsonTimestamp>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum JsonTimestamp {
    Modified(String),
    Detailed {
        #[serde(default)]
        created: Option<String>,
        #[serde(default)]
        modified: Option<String>,
        #[serde(default)]
        accessed: Option<String>,
    },
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct JsonAnalysis {
    primary_rationale: Option<String>,
    alternative_considered: Option<String>,
    alternative_rejected_because: Option<String>,
    notes: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum JsonTokenUsage {
    Used(u64),
    Detailed {
        #[serde(alias = "tokens_used")]
        used: u64,
        #[serde(default, alias = "token_limit")]
        limit: Option<u64>,
        #[serde(default, alias = "fallback")]
        fallback_strategy: Option<String>,
    },
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct JsonRecursion {
    #[serde(alias = "depth", alias = "recursion_depth")]
    current_depth: Option<u32>,
    #[serde(alias = "max_recursion_depth")]
    max_depth: Option<u32>,
    #[serde(alias = "parent_id", alias = "parent_decision")]
    parent_decision_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct JsonConflict {
    strategy: Option<String>,
    weights: BTreeMap<String, f64>,
    minority_report: Option<String>,
}

/// Read `text` as a JSON trace when it is one
///
/// `Ok(None)` means the text is not JSON and should be read as markdown. A
/// bare object that does not deserialize, or carries no trace section, is a
/// parse error.
pub fn extract(text: &str) -> Result<Option<ParsedDocument>> {
    let trimmed = text.trim();
    if trimmed.starts_with('{') {
        let value: Value = serde_json::from_str(trimmed)
            .map_err(|e| TraceError::parse(format!("invalid JSON trace: {}", e)))?;
        return from_value(value).map(Some);
    }
    for block in fenced_objects(text) {
        match serde_json::from_str::<Value>(&block) {
            Ok(value) if is_trace_object(&value) => return from_value(value).map(Some),
            Ok(_) => continue,
            Err(e) => debug!(error = %e, "skipping unreadable JSON block"),
        }
    }
    Ok(None)
}

fn is_trace_object(value: &Value) -> bool {
    value
        .as_object()
        .map_or(false, |map| TRACE_KEYS.iter().any(|k| map.contains_key(*k)))
}

/// Bodies of plain or `json` fenced blocks that start with `{`
fn fenced_objects(text: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut lines = text.lines();

    while let Some(line) = lines.next() {
        let Some(info) = line.trim().strip_prefix("```") else {
            continue;
        };
        let body: Vec<&str> = lines
            .by_ref()
            .take_while(|l| !l.trim_start().starts_with("```"))
            .collect();
        let info = info.trim();
        if !(info.is_empty() || info.eq_ignore_ascii_case("json")) {
            continue;
        }
        let body = body.join("\n");
        if body.trim_start().starts_with('{') {
            blocks.push(body);
        }
    }
    blocks
}

fn from_value(value: Value) -> Result<ParsedDocument> {
    let root: JsonTrace = serde_json::from_value(value)
        .map_err(|e| TraceError::parse(format!("invalid JSON trace: {}", e)))?;
    let mut fragments = Vec::new();
    collect(root, None, &mut fragments);

    if fragments[0].trace.sections.is_empty() {
        return Err(TraceError::parse(
            "JSON trace has no recognized fields (decision, risk_assessment, evidence_collection, analysis, validation, action)",
        ));
    }
    Ok(ParsedDocument { fragments })
}

/// Push `node` and then its sub-decisions, depth first
fn collect(mut node: JsonTrace, parent: Option<usize>, fragments: &mut Vec<TraceFragment>) {
    let children = std::mem::take(&mut node.sub_decisions);
    let title = node.title.clone();
    let declared_depth = node.recursion.as_ref().and_then(|r| r.current_depth);
    let position = fragments.len();
    let mut trace = node.into_trace();

    let (depth, parent_key) = match parent {
        None => (
            declared_depth.unwrap_or(0),
            trace.recursion.as_ref().and_then(|r| r.parent_decision_id.clone()),
        ),
        Some(index) => {
            let up = &fragments[index];
            let root = &fragments[0].trace;
            if trace.decision.text.is_none() {
                trace.decision.text = title.clone();
            }
            if trace.schema_version.is_none() {
                trace.schema_version = root.schema_version.clone();
            }
            if trace.runtime_contract.is_none() {
                trace.runtime_contract = root.runtime_contract.clone();
            }
            trace.validation_required |= root.validation_required;

            let explicit = trace.recursion.as_ref().and_then(|r| r.parent_decision_id.clone());
            let own_max = trace.recursion.as_ref().and_then(|r| r.max_depth);
            let inherited_max = root.recursion.as_ref().and_then(|r| r.max_depth);
            let depth = declared_depth.unwrap_or_else(|| up.depth.saturating_add(1));
            let parent_key = explicit.or_else(|| Some(decision_key(&up.trace)));
            trace.recursion = Some(RecursionInfo {
                current_depth: depth,
                max_depth: own_max.or(inherited_max),
                parent_decision_id: parent_key.clone(),
            });
            (depth, parent_key)
        }
    };

    debug!(
        position,
        depth,
        evidence = trace.evidence_items.len(),
        "parsed JSON trace fragment"
    );
    fragments.push(TraceFragment {
        position,
        title: if position == 0 { None } else { title },
        depth,
        parent: parent_key,
        line: 1,
        trace,
    });

    for child in children {
        collect(child, Some(position), fragments);
    }
}

impl JsonTrace {
    fn into_trace(self) -> Trace {
        let JsonTrace {
            schema,
            runtime_contract,
            context_level,
            available_tools,
            decision,
            decision_id,
            risk_assessment,
            evidence_collection,
            evidence_count,
            analysis,
            validation,
            action,
            token_usage,
            token_limit,
            fallback_strategy,
            recursion,
            conflict_resolution,
            ..
        } = self;

        let mut sections = Vec::new();
        let mut mark = |present: bool, kind: SectionKind| {
            if present {
                sections.push(kind);
            }
        };
        mark(decision.is_some(), SectionKind::Decision);
        mark(risk_assessment.is_some(), SectionKind::RiskAssessment);
        mark(evidence_collection.is_some(), SectionKind::EvidenceCollection);
        mark(analysis.is_some(), SectionKind::Analysis);
        mark(conflict_resolution.is_some(), SectionKind::ConflictResolution);
        mark(matches!(validation, Some(Value::Object(_))), SectionKind::Validation);
        mark(action.is_some(), SectionKind::Action);

        let validation_required = matches!(
            &validation,
            Some(Value::String(v)) if v.eq_ignore_ascii_case("required")
        );
        let validation_checklist = match validation {
            Some(Value::Object(map)) => map
                .iter()
                .map(|(name, met)| ChecklistItem {
                    name: checklist_key(name),
                    met: met.as_bool().unwrap_or(false),
                })
                .filter(|item| !item.name.is_empty())
                .collect(),
            _ => Vec::new(),
        };

        let (action, action_directive) = match action.as_deref() {
            Some(text) => parse_action(&[text]),
            None => (None, false),
        };

        let normalize_fallback =
            |f: Option<String>| f.map(|f| normalize_token(&f)).filter(|f| !f.is_empty());
        let token_usage = match token_usage {
            Some(JsonTokenUsage::Used(used)) => Some(TokenUsage {
                used,
                limit: token_limit,
                fallback_strategy: normalize_fallback(fallback_strategy),
            }),
            Some(JsonTokenUsage::Detailed {
                used,
                limit,
                fallback_strategy: nested,
            }) => Some(TokenUsage {
                used,
                limit: limit.or(token_limit),
                fallback_strategy: normalize_fallback(nested.or(fallback_strategy)),
            }),
            None => None,
        };

        let risk = risk_assessment.unwrap_or_default();
        Trace {
            schema_version: clean(schema),
            runtime_contract: clean(runtime_contract),
            validation_required,
            context_level: clean(context_level).map(|raw| ContextLevel::parse(&raw)),
            available_tools,
            decision: Decision {
                text: clean(decision),
                id: clean(decision_id),
            },
            risk_assessment: RiskAssessment {
                change_type: clean(risk.change_type),
                risk_level: clean(risk.risk_level),
                impact_scope: clean(risk.impact_scope),
                reversibility: clean(risk.reversibility),
            },
            evidence_items: evidence_collection
                .unwrap_or_default()
                .into_iter()
                .enumerate()
                .map(|(i, e)| evidence_item(i + 1, e))
                .collect(),
            declared_evidence_count: evidence_count,
            analysis: analysis.map(|a| Analysis {
                primary_rationale: clean(a.primary_rationale),
                alternative_considered: clean(a.alternative_considered),
                alternative_rejected_because: clean(a.alternative_rejected_because),
                notes: clean(a.notes),
            }),
            validation_checklist,
            action,
            action_directive,
            token_usage,
            recursion: recursion.map(|r| RecursionInfo {
                current_depth: r.current_depth.unwrap_or(0),
                max_depth: r.max_depth,
                parent_decision_id: clean(r.parent_decision_id),
            }),
            conflict_resolution: conflict_resolution.map(|c| ConflictResolution {
                strategy: c.strategy.map(|s| normalize_token(&s)).filter(|s| !s.is_empty()),
                weights: c.weights,
                minority_report: clean(c.minority_report),
            }),
            sections,
        }
    }
}

fn evidence_item(index: usize, raw: JsonEvidence) -> EvidenceItem {
    let mut item = EvidenceItem {
        index,
        source: clean(raw.source),
        quote: raw.quote,
        relevance: clean(raw.relevance),
        ..Default::default()
    };
    match raw.timestamp {
        Some(JsonTimestamp::Modified(value)) => apply_timestamp(&mut item, "modified", &value),
        Some(JsonTimestamp::Detailed {
            created,
            modified,
            accessed,
        }) => {
            for (label, value) in [("created", created), ("modified", modified), ("accessed", accessed)] {
                if let Some(value) = value {
                    apply_timestamp(&mut item, label, &value);
                }
            }
        }
        None => {}
    }
    item
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
