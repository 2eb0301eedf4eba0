//! Heading-delimited sections and label-anchored fields
//!
//! Spacing and bullet style vary a lot between hand-written traces, so fields
//! are located by their `**Label**:` marker rather than by position.

use regex::Regex;
use std::sync::OnceLock;

use super::front_matter::is_fence;
use crate::model::SectionKind;

fn heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s{0,3}#{2,6}\s*(?P<name>[^:#]+?)\s*:\s*(?P<rest>.*?)\s*$")
            .expect("heading regex is valid")
    })
}

fn bare_heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s{0,3}#{2,6}\s*(?P<name>[^:#]+?)\s*$").expect("bare heading regex is valid")
    })
}

fn bold_label_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(?:[-*+]\s+|\d+[.)]\s+)?\*\*(?P<label>[^*]+?)\*\*(?P<value>.*)$")
            .expect("bold label regex is valid")
    })
}

fn plain_label_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*[-*+]\s+(?P<label>[A-Za-z][A-Za-z ]*?)\s*:\s*(?P<value>.+?)\s*$")
            .expect("plain label regex is valid")
    })
}

fn checklist_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(?:[-*+]\s+)?\[(?P<mark>[^\]]?)\]\s*(?P<text>.+?)\s*$")
            .expect("checklist regex is valid")
    })
}

/// A section heading and the lines up to the next heading
#[derive(Debug, Clone, PartialEq)]
pub struct Section<'a> {
    /// `None` for headings that are not part of the trace vocabulary
    pub kind: Option<SectionKind>,
    /// Text after the colon on the heading line
    pub inline: &'a str,
    pub body: Vec<&'a str>,
    /// 0-based line of the heading
    pub line: usize,
}

/// Lines before the first heading plus every recognized section
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SectionMap<'a> {
    pub preamble: Vec<&'a str>,
    pub sections: Vec<Section<'a>>,
}

impl<'a> SectionMap<'a> {
    /// First section of the given kind
    pub fn get(&self, kind: SectionKind) -> Option<&Section<'a>> {
        self.sections.iter().find(|s| s.kind == Some(kind))
    }

    /// Recognized kinds in order of appearance, without duplicates
    pub fn kinds(&self) -> Vec<SectionKind> {
        let mut kinds = Vec::new();
        for kind in self.sections.iter().filter_map(|s| s.kind) {
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }
        kinds
    }
}

/// Map a heading name onto the section vocabulary
pub fn classify_heading(name: &str) -> Option<SectionKind> {
    let normalized = name
        .trim()
        .trim_start_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase();
    match normalized.as_str() {
        "decision" => Some(SectionKind::Decision),
        "risk assessment" | "risk" => Some(SectionKind::RiskAssessment),
        "evidence collection" | "evidence" => Some(SectionKind::EvidenceCollection),
        "analysis" => Some(SectionKind::Analysis),
        "conflict resolution" => Some(SectionKind::ConflictResolution),
        "validation" | "validation checklist" => Some(SectionKind::Validation),
        "action" => Some(SectionKind::Action),
        _ => None,
    }
}

/// Split `lines` into sections
///
/// Lines in `skip` (the front-matter fence) are left out. Headings inside other
/// fenced code blocks are treated as body text.
pub fn split<'a>(lines: &[&'a str], skip: Option<std::ops::Range<usize>>) -> SectionMap<'a> {
    let mut map = SectionMap::default();
    let mut current: Option<Section<'a>> = None;
    let mut in_fence = false;

    for (idx, line) in lines.iter().enumerate() {
        if skip.as_ref().map_or(false, |r| r.contains(&idx)) {
            continue;
        }
        if is_fence(line) {
            in_fence = !in_fence;
        }
        let heading = if in_fence { None } else { parse_heading(line) };
        match heading {
            Some((kind, inline)) => {
                if let Some(done) = current.take() {
                    map.sections.push(done);
                }
                current = Some(Section {
                    kind,
                    inline,
                    body: Vec::new(),
                    line: idx,
                });
            }
            None => match current.as_mut() {
                Some(section) => section.body.push(line),
                None => map.preamble.push(line),
            },
        }
    }
    if let Some(done) = current {
        map.sections.push(done);
    }
    map
}

/// Kind and inline text of a heading line
///
/// `### Name: text` is always a heading. Without the colon only the trace
/// vocabulary counts, so titles such as `## Reasoning Trace` stay in the
/// preamble.
fn parse_heading(line: &str) -> Option<(Option<SectionKind>, &str)> {
    if let Some(caps) = heading_re().captures(line) {
        let name = caps.name("name").map_or("", |m| m.as_str());
        let inline = caps.name("rest").map_or("", |m| m.as_str());
        return Some((classify_heading(name), inline));
    }
    let caps = bare_heading_re().captures(line)?;
    let kind = classify_heading(caps.name("name").map_or("", |m| m.as_str()))?;
    Some((Some(kind), ""))
}

/// A `Label: value` pair found on one line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabeledField<'a> {
    /// Lower-cased label
    pub label: String,
    pub value: &'a str,
}

/// Read `**Label**: value` (and, when `allow_plain`, `- Label: value`)
pub fn label_line(line: &str, allow_plain: bool) -> Option<LabeledField<'_>> {
    if let Some(caps) = bold_label_re().captures(line) {
        let raw_label = caps.name("label").map_or("", |m| m.as_str()).trim();
        let raw_value = caps.name("value").map_or("", |m| m.as_str()).trim();
        let colon_in_label = raw_label.ends_with(':');
        let colon_after = raw_value.starts_with(':');
        if colon_in_label || colon_after {
            let label = raw_label.trim_end_matches(':').trim().to_lowercase();
            let value = raw_value.trim_start_matches(':').trim();
            return Some(LabeledField { label, value });
        }
        return None;
    }
    if allow_plain {
        if let Some(caps) = plain_label_re().captures(line) {
            let label = caps.name("label").map_or("", |m| m.as_str());
            let value = caps.name("value").map_or("", |m| m.as_str());
            return Some(LabeledField {
                label: label.trim().to_lowercase(),
                value,
            });
        }
    }
    None
}

/// Read a checklist line such as `- [✓] Edge cases addressed`
pub fn checklist_line(line: &str) -> Option<(String, bool)> {
    let caps = checklist_re().captures(line)?;
    let met = matches!(
        caps.name("mark").map_or("", |m| m.as_str()),
        "✓" | "✔" | "x" | "X"
    );
    let key = checklist_key(caps.name("text").map_or("", |m| m.as_str()));
    (!key.is_empty()).then_some((key, met))
}

/// `Minimum 2 evidence sources cited!` → `minimum_2_evidence_sources_cited`
pub fn checklist_key(text: &str) -> String {
    let mut key = String::with_capacity(text.len());
    let mut pending_sep = false;
    for c in text.trim().chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            if pending_sep && !key.is_empty() {
                key.push('_');
            }
            pending_sep = false;
            key.push(c);
        } else {
            pending_sep = true;
        }
    }
    key
}

/// Non-blank lines joined with single spaces
pub fn join_text(lines: &[&str]) -> Option<String> {
    let text = lines
        .iter()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    (!text.is_empty()).then_some(text)
}

/// Strip one layer of surrounding quotes or backticks
pub fn unquote(value: &str) -> &str {
    let v = value.trim();
    for (open, close) in [('"', '"'), ('“', '”'), ('\'', '\''), ('`', '`')] {
        if v.len() >= open.len_utf8() + close.len_utf8() && v.starts_with(open) && v.ends_with(close) {
            return v[open.len_utf8()..v.len() - close.len_utf8()].trim();
        }
    }
    v
}
