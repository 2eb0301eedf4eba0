//! Fenced `key: value` block at the top of a trace
//!
//! The block is read with `serde_yaml`. Hand-written traces are not always
//! valid YAML, so a failed YAML parse falls back to a line scanner that keeps
//! every `key: value` pair it can find.

use regex::Regex;
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::ops::Range;
use std::sync::OnceLock;
use tracing::debug;

fn key_value_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(?P<key>[A-Za-z_][A-Za-z0-9_\-]*)\s*:\s*(?P<value>.*?)\s*$")
            .expect("front-matter key regex is valid")
    })
}

/// Parsed front-matter values keyed by lower-cased name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrontMatter {
    values: BTreeMap<String, Value>,
    /// Line range (0-based, exclusive end) occupied by the fence, including markers
    pub span: Option<Range<usize>>,
}

impl FrontMatter {
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// First of `keys` that holds a scalar, rendered as text
    pub fn get_str(&self, keys: &[&str]) -> Option<String> {
        keys.iter()
            .filter_map(|k| self.values.get(*k))
            .find_map(scalar_to_string)
    }

    /// First of `keys` that holds a non-negative integer
    pub fn get_u64(&self, keys: &[&str]) -> Option<u64> {
        keys.iter()
            .filter_map(|k| self.values.get(*k))
            .find_map(value_to_u64)
    }

    /// Nested mapping under `key`, with lower-cased keys
    pub fn get_map(&self, key: &str) -> Option<BTreeMap<String, Value>> {
        match self.values.get(key) {
            Some(Value::Mapping(map)) => Some(normalize_mapping(map)),
            _ => None,
        }
    }
}

/// Locate and parse the front-matter fence in `lines`
///
/// The first fenced block whose first non-blank line looks like `key: value`
/// is taken. Returns an empty [`FrontMatter`] when there is none.
pub fn extract(lines: &[&str]) -> FrontMatter {
    let mut i = 0;
    while i < lines.len() {
        if !is_fence(lines[i]) {
            i += 1;
            continue;
        }
        let open = i;
        let close = lines[open + 1..]
            .iter()
            .position(|l| is_fence(l))
            .map(|p| open + 1 + p);
        let Some(close) = close else {
            break;
        };
        let body = &lines[open + 1..close];
        let looks_like_front_matter = body
            .iter()
            .find(|l| !l.trim().is_empty())
            .map_or(false, |l| key_value_re().is_match(l));
        if looks_like_front_matter {
            let values = parse_body(body);
            debug!(keys = values.len(), line = open + 1, "front-matter block found");
            return FrontMatter {
                values,
                span: Some(open..close + 1),
            };
        }
        i = close + 1;
    }
    FrontMatter::default()
}

pub(crate) fn is_fence(line: &str) -> bool {
    let t = line.trim_start();
    t.starts_with("```") || t.starts_with("~~~")
}

fn parse_body(body: &[&str]) -> BTreeMap<String, Value> {
    let text = body.join("\n");
    match serde_yaml::from_str::<Value>(&text) {
        Ok(Value::Mapping(map)) => normalize_mapping(&map),
        Ok(_) | Err(_) => scan_lines(body),
    }
}

fn scan_lines(body: &[&str]) -> BTreeMap<String, Value> {
    let mut values = BTreeMap::new();
    for line in body {
        if line.trim_start().starts_with('#') {
            continue;
        }
        if let Some(caps) = key_value_re().captures(line) {
            let raw = strip_comment(&caps["value"]);
            if raw.is_empty() {
                continue;
            }
            values.insert(caps["key"].to_lowercase(), Value::String(raw.to_string()));
        }
    }
    values
}

fn strip_comment(value: &str) -> &str {
    match value.find(" #") {
        Some(idx) => value[..idx].trim(),
        None => value.trim(),
    }
}

fn normalize_mapping(map: &serde_yaml::Mapping) -> BTreeMap<String, Value> {
    map.iter()
        .filter_map(|(k, v)| scalar_to_string(k).map(|k| (k.to_lowercase(), v.clone())))
        .collect()
}

pub(crate) fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub(crate) fn value_to_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => {
            let digits: String = s
                .trim()
                .chars()
                .filter(|c| *c != ',' && *c != '_')
                .collect();
            digits.parse().ok()
        }
        _ => None,
    }
}
