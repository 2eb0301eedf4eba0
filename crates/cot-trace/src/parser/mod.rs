//! Document parser
//!
//! Turns trace text into a [`ParsedDocument`]: the root trace followed by any
//! `## 🧠 Sub-Decision: ... (Depth: N)` blocks. Structured JSON traces are
//! handled by [`json`] before the markdown rules run. Parsing is tolerant pattern
//! extraction. It only fails when no recognized section heading exists at all;
//! missing fields are left empty for the policy engine to report.
//!
//! The parser never looks at the clock and never enforces depth limits.

pub mod evidence;
pub mod front_matter;
pub mod json;
pub mod sections;

use regex::Regex;
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::sync::OnceLock;
use tracing::debug;

use crate::error::{Result, TraceError};
use crate::model::{
    Analysis, ChecklistItem, ConflictResolution, ContextLevel, Decision, ParsedDocument,
    RecursionInfo, RiskAssessment, SectionKind, TokenUsage, Trace, TraceFragment,
};
use crate::recursion::decision_key;
use front_matter::{scalar_to_string, value_to_u64, FrontMatter};
use sections::{checklist_line, join_text, label_line, unquote, SectionMap};

fn sub_decision_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)^\s{0,3}#{2,4}\s*(?:[^\w\s]+\s*)?sub[- ]?decision\s*:\s*(?P<title>.*?)\s*(?:\(\s*depth\s*:\s*(?P<depth>\d+)\s*\))?\s*$",
        )
        .expect("sub-decision regex is valid")
    })
}

fn directive_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)therefore,?\s*i\s+will\s*:\s*(?P<rest>.*)$").expect("directive regex is valid")
    })
}

struct Block<'a> {
    title: Option<String>,
    depth: Option<u32>,
    start: usize,
    lines: &'a [&'a str],
}

/// Parse a single- or multi-block trace document
pub fn parse_document(text: &str) -> Result<ParsedDocument> {
    if text.trim().is_empty() {
        return Err(TraceError::parse("document is empty"));
    }
    if let Some(document) = json::extract(text)? {
        debug!(fragments = document.fragments.len(), "parsed JSON trace");
        return Ok(document);
    }
    let lines: Vec<&str> = text.lines().collect();
    let blocks = split_blocks(&lines);

    let mut fragments: Vec<TraceFragment> = Vec::with_capacity(blocks.len());
    let mut recognized_sections = 0usize;

    for (position, block) in blocks.iter().enumerate() {
        let fm = front_matter::extract(block.lines);
        let map = sections::split(block.lines, fm.span.clone());
        recognized_sections += map.sections.iter().filter(|s| s.kind.is_some()).count();

        let mut trace = build_trace(&fm, &map);
        let fm_recursion = recursion_info(&fm);

        let depth = if position == 0 {
            fm_recursion.as_ref().map_or(0, |r| r.current_depth)
        } else {
            let previous = fragments.last().map_or(0, |f| f.depth);
            block
                .depth
                .or_else(|| {
                    fm_recursion
                        .as_ref()
                        .filter(|_| fm_declares_depth(&fm))
                        .map(|r| r.current_depth)
                })
                .unwrap_or_else(|| previous.saturating_add(1))
        };

        if position > 0 {
            let root = &fragments[0].trace;
            if trace.decision.text.is_none() {
                trace.decision.text = block.title.clone().filter(|t| !t.is_empty());
            }
            if trace.schema_version.is_none() {
                trace.schema_version = root.schema_version.clone();
            }
            if trace.runtime_contract.is_none() {
                trace.runtime_contract = root.runtime_contract.clone();
            }
            trace.validation_required |= root.validation_required;
        }

        let inherited_max = fragments
            .first()
            .and_then(|root| root.trace.recursion.as_ref())
            .and_then(|r| r.max_depth);
        let explicit_parent = fm_recursion.as_ref().and_then(|r| r.parent_decision_id.clone());
        let parent = explicit_parent.clone().or_else(|| {
            fragments
                .iter()
                .rev()
                .find(|f| f.depth < depth)
                .map(|f| decision_key(&f.trace))
        });

        if position > 0 || fm_recursion.is_some() {
            trace.recursion = Some(RecursionInfo {
                current_depth: depth,
                max_depth: fm_recursion
                    .as_ref()
                    .and_then(|r| r.max_depth)
                    .or(inherited_max),
                parent_decision_id: parent.clone(),
            });
        }

        debug!(
            position,
            depth,
            sections = trace.sections.len(),
            evidence = trace.evidence_items.len(),
            "parsed trace fragment"
        );

        fragments.push(TraceFragment {
            position,
            title: block.title.clone(),
            depth,
            parent,
            line: block.start + 1,
            trace,
        });
    }

    if recognized_sections == 0 {
        return Err(TraceError::parse(
            "no recognized section headings (Decision, Risk Assessment, Evidence Collection, Analysis, Validation, Action)",
        ));
    }

    Ok(ParsedDocument { fragments })
}

/// Parse a document and return its root trace
pub fn parse_trace(text: &str) -> Result<Trace> {
    let mut document = parse_document(text)?;
    Ok(document.fragments.swap_remove(0).trace)
}

fn split_blocks<'a>(lines: &'a [&'a str]) -> Vec<Block<'a>> {
    let mut blocks = Vec::new();
    let mut start = 0usize;
    let mut title = None;
    let mut depth = None;
    let mut in_fence = false;

    for (idx, line) in lines.iter().enumerate() {
        if front_matter::is_fence(line) {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }
        if let Some(caps) = sub_decision_re().captures(line) {
            blocks.push(Block {
                title: title.take(),
                depth: depth.take(),
                start,
                lines: &lines[start..idx],
            });
            title = Some(caps["title"].trim().to_string());
            depth = caps
                .name("depth")
                .map(|m| m.as_str().parse::<u32>().unwrap_or(u32::MAX));
            start = idx;
        }
    }
    blocks.push(Block {
        title,
        depth,
        start,
        lines: &lines[start..],
    });
    blocks
}

fn build_trace(fm: &FrontMatter, map: &SectionMap<'_>) -> Trace {
    let preamble = preamble_labels(&map.preamble);

    let context_level = fm
        .get_str(&["context_level"])
        .or_else(|| preamble.get("context level").cloned())
        .map(|raw| ContextLevel::parse(&raw));

    let available_tools = match fm.get("available_tools") {
        Some(Value::Sequence(seq)) => seq.iter().filter_map(scalar_to_string).collect(),
        _ => fm
            .get_str(&["available_tools"])
            .or_else(|| preamble.get("available tools").cloned())
            .map(|raw| parse_list(&raw))
            .unwrap_or_default(),
    };

    let decision = Decision {
        text: map.get(SectionKind::Decision).and_then(|s| {
            let inline = s.inline.trim();
            if inline.is_empty() {
                first_paragraph(&s.body)
            } else {
                Some(inline.to_string())
            }
        }),
        id: fm.get_str(&["decision_id", "id"]),
    };

    let mut risk_assessment = map
        .get(SectionKind::RiskAssessment)
        .map(|s| parse_risk(&s.body))
        .unwrap_or_default();
    if risk_assessment.risk_level.is_none() {
        risk_assessment.risk_level = fm.get_str(&["risk_level"]);
    }

    let evidence_items = map
        .get(SectionKind::EvidenceCollection)
        .map(|s| evidence::parse_evidence(&s.body))
        .unwrap_or_default();

    let analysis = map.get(SectionKind::Analysis).map(|s| parse_analysis(&s.body));

    let validation_checklist = map
        .get(SectionKind::Validation)
        .map(|s| {
            s.body
                .iter()
                .filter_map(|l| checklist_line(l))
                .map(|(name, met)| ChecklistItem { name, met })
                .collect()
        })
        .unwrap_or_default();

    let (action, action_directive) = map
        .get(SectionKind::Action)
        .map(|s| {
            let mut all = vec![s.inline];
            all.extend(s.body.iter().copied());
            parse_action(&all)
        })
        .unwrap_or((None, false));

    let conflict_resolution = match map.get(SectionKind::ConflictResolution) {
        Some(s) => Some(parse_conflict_section(&s.body)),
        None => conflict_from_front_matter(fm),
    };

    Trace {
        schema_version: fm.get_str(&["schema", "schema_version"]),
        runtime_contract: fm.get_str(&["runtime_contract", "contract"]),
        validation_required: fm
            .get_str(&["validation"])
            .map_or(false, |v| v.eq_ignore_ascii_case("required")),
        context_level,
        available_tools,
        decision,
        risk_assessment,
        evidence_items,
        declared_evidence_count: fm.get_u64(&["evidence_count"]),
        analysis,
        validation_checklist,
        action,
        action_directive,
        token_usage: token_usage(fm),
        recursion: recursion_info(fm),
        conflict_resolution,
        sections: map.kinds(),
    }
}

fn preamble_labels(lines: &[&str]) -> BTreeMap<String, String> {
    lines
        .iter()
        .filter_map(|l| label_line(l, false))
        .filter(|f| !f.value.is_empty())
        .map(|f| (f.label, f.value.to_string()))
        .collect()
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .split(',')
        .map(unquote)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn first_paragraph(body: &[&str]) -> Option<String> {
    let paragraph: Vec<&str> = body
        .iter()
        .copied()
        .skip_while(|l| l.trim().is_empty())
        .take_while(|l| !l.trim().is_empty())
        .collect();
    join_text(&paragraph)
}

fn parse_risk(body: &[&str]) -> RiskAssessment {
    let mut risk = RiskAssessment::default();
    for field in body.iter().filter_map(|l| label_line(l, true)) {
        let value = Some(field.value.trim().to_string()).filter(|v| !v.is_empty());
        match field.label.as_str() {
            "change type" => risk.change_type = value,
            "risk level" | "risk" => risk.risk_level = value,
            "impact scope" | "impact" | "scope" => risk.impact_scope = value,
            "reversibility" => risk.reversibility = value,
            _ => {}
        }
    }
    risk
}

fn parse_analysis(body: &[&str]) -> Analysis {
    let mut analysis = Analysis::default();
    let mut notes = Vec::new();
    for line in body {
        match label_line(line, false) {
            Some(field) => {
                let value = Some(field.value.trim().to_string()).filter(|v| !v.is_empty());
                match field.label.as_str() {
                    "primary rationale" | "rationale" => analysis.primary_rationale = value,
                    "alternative considered" | "alternatives considered" => {
                        analysis.alternative_considered = value
                    }
                    "alternative rejected because" | "alternative rejected" | "rejected because" => {
                        analysis.alternative_rejected_because = value
                    }
                    _ => notes.push(*line),
                }
            }
            None => notes.push(*line),
        }
    }
    analysis.notes = join_text(&notes);
    analysis
}

fn parse_action(lines: &[&str]) -> (Option<String>, bool) {
    let Some(text) = join_text(lines) else {
        return (None, false);
    };
    if let Some(caps) = directive_re().captures(&text) {
        let rest = caps["rest"].trim();
        return (Some(rest.to_string()).filter(|r| !r.is_empty()), true);
    }
    let stripped = text
        .trim_start_matches(|c: char| c == '→' || c == '-' || c == '>' || c.is_whitespace())
        .trim();
    (Some(stripped.to_string()).filter(|s| !s.is_empty()), false)
}

fn parse_conflict_section(body: &[&str]) -> ConflictResolution {
    let mut conflict = ConflictResolution::default();
    for field in body.iter().filter_map(|l| label_line(l, true)) {
        let value = field.value.trim();
        match field.label.as_str() {
            "strategy" | "resolution strategy" => {
                conflict.strategy = Some(normalize_token(value)).filter(|s| !s.is_empty())
            }
            "weights" => conflict.weights = parse_weights(value),
            "minority report" => {
                conflict.minority_report = Some(value.to_string()).filter(|v| !v.is_empty())
            }
            _ => {}
        }
    }
    conflict
}

fn conflict_from_front_matter(fm: &FrontMatter) -> Option<ConflictResolution> {
    if let Some(map) = fm.get_map("conflict_resolution") {
        let weights = match map.get("weights") {
            Some(Value::Mapping(w)) => w
                .iter()
                .filter_map(|(k, v)| Some((scalar_to_string(k)?, v.as_f64()?)))
                .collect(),
            Some(other) => scalar_to_string(other)
                .map(|raw| parse_weights(&raw))
                .unwrap_or_default(),
            None => BTreeMap::new(),
        };
        return Some(ConflictResolution {
            strategy: map
                .get("strategy")
                .and_then(scalar_to_string)
                .map(|s| normalize_token(&s)),
            weights,
            minority_report: map.get("minority_report").and_then(scalar_to_string),
        });
    }
    if fm.contains("conflict_resolution") || fm.contains("conflict_strategy") {
        return Some(ConflictResolution {
            strategy: fm
                .get_str(&["conflict_resolution", "conflict_strategy"])
                .map(|s| normalize_token(&s)),
            ..Default::default()
        });
    }
    None
}

/// `docs=0.6, code: 0.4` → {docs: 0.6, code: 0.4}
fn parse_weights(raw: &str) -> BTreeMap<String, f64> {
    raw.split(',')
        .filter_map(|pair| {
            let (name, weight) = pair.split_once('=').or_else(|| pair.split_once(':'))?;
            let weight = weight.trim().parse::<f64>().ok()?;
            let name = unquote(name).trim();
            (!name.is_empty()).then(|| (name.to_string(), weight))
        })
        .collect()
}

fn normalize_token(raw: &str) -> String {
    unquote(raw)
        .trim()
        .trim_matches('`')
        .to_lowercase()
        .replace([' ', '-'], "_")
}

fn token_usage(fm: &FrontMatter) -> Option<TokenUsage> {
    let top_fallback = fm.get_str(&["fallback_strategy", "fallback"]);
    let (used, limit, fallback) = match fm.get_map("token_usage") {
        Some(map) => (
            ["used", "tokens_used", "usage"]
                .iter()
                .find_map(|k| map.get(*k).and_then(value_to_u64)),
            ["limit", "token_limit", "budget"]
                .iter()
                .find_map(|k| map.get(*k).and_then(value_to_u64))
                .or_else(|| fm.get_u64(&["token_limit", "token_budget"])),
            ["fallback_strategy", "fallback"]
                .iter()
                .find_map(|k| map.get(*k).and_then(scalar_to_string))
                .or(top_fallback),
        ),
        None => (
            fm.get_u64(&["token_usage", "tokens_used"]),
            fm.get_u64(&["token_limit", "token_budget"]),
            top_fallback,
        ),
    };
    let used = used?;
    if limit.is_none() {
        debug!(used, "token usage declared without a limit");
    }
    Some(TokenUsage {
        used,
        limit,
        fallback_strategy: fallback.map(|f| normalize_token(&f)).filter(|f| !f.is_empty()),
    })
}

const DEPTH_KEYS: [&str; 3] = ["recursion_depth", "current_depth", "depth"];
const MAX_DEPTH_KEYS: [&str; 2] = ["max_depth", "max_recursion_depth"];
const PARENT_KEYS: [&str; 3] = ["parent_decision_id", "parent_decision", "parent_id"];

fn fm_declares_depth(fm: &FrontMatter) -> bool {
    DEPTH_KEYS.iter().any(|k| fm.contains(k))
        || fm
            .get_map("recursion")
            .map_or(false, |m| DEPTH_KEYS.iter().any(|k| m.contains_key(*k)))
}

fn recursion_info(fm: &FrontMatter) -> Option<RecursionInfo> {
    if let Some(map) = fm.get_map("recursion") {
        return Some(RecursionInfo {
            current_depth: DEPTH_KEYS
                .iter()
                .find_map(|k| map.get(*k).and_then(value_to_u64))
                .map_or(0, saturate),
            max_depth: MAX_DEPTH_KEYS
                .iter()
                .find_map(|k| map.get(*k).and_then(value_to_u64))
                .map(saturate),
            parent_decision_id: PARENT_KEYS
                .iter()
                .find_map(|k| map.get(*k).and_then(scalar_to_string)),
        });
    }
    let current = fm.get_u64(&DEPTH_KEYS);
    let max = fm.get_u64(&MAX_DEPTH_KEYS);
    let parent = fm.get_str(&PARENT_KEYS);
    if current.is_none() && max.is_none() && parent.is_none() {
        return None;
    }
    Some(RecursionInfo {
        current_depth: current.map_or(0, saturate),
        max_depth: max.map(saturate),
        parent_decision_id: parent,
    })
}

fn saturate(value: u64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}
