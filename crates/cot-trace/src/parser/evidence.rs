//! Evidence entries inside the `Evidence Collection` section

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use std::sync::OnceLock;
use tracing::warn;

use super::sections::{label_line, unquote};
use crate::error::TimestampFormatError;
use crate::model::{EvidenceItem, EvidenceTimestamps};

fn entry_start_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*\d+[.)]\s+").expect("entry regex is valid"))
}

fn timestamp_sub_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*[-*+]\s*(?:\*\*)?(?P<label>created|modified|accessed)(?:\*\*)?\s*:\s*(?:\*\*)?\s*(?P<value>.+?)\s*$")
            .expect("timestamp regex is valid")
    })
}

/// Which field a continuation line belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Source,
    Quote,
    Relevance,
    Timestamp,
    Other,
}

#[derive(Debug, Default)]
struct EntryBuilder {
    item: EvidenceItem,
    last: Option<Field>,
    started: bool,
}

impl EntryBuilder {
    fn new(index: usize) -> Self {
        Self {
            item: EvidenceItem {
                index,
                ..Default::default()
            },
            last: None,
            started: true,
        }
    }

    fn set_timestamp(&mut self, label: &str, raw: &str) {
        apply_timestamp(&mut self.item, label, raw);
    }

    fn append(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        let target = match self.last {
            Some(Field::Quote) => &mut self.item.quote,
            Some(Field::Relevance) => &mut self.item.relevance,
            _ => return,
        };
        let joined = match target.take() {
            Some(existing) => format!("{} {}", existing, text),
            None => text.to_string(),
        };
        *target = Some(unquote(&joined).to_string());
    }

    fn finish(self) -> EvidenceItem {
        self.item
    }
}

/// Store `raw` under the `created`, `accessed` or (otherwise) `modified` slot
///
/// Unreadable values are kept on the item as [`TimestampFormatError`]s.
pub fn apply_timestamp(item: &mut EvidenceItem, label: &str, raw: &str) {
    let raw = unquote(raw);
    match parse_instant(raw) {
        Ok(instant) => {
            let ts = &mut item.timestamps;
            match label {
                "created" => ts.created = Some(instant),
                "accessed" => ts.accessed = Some(instant),
                _ => ts.modified = Some(instant),
            }
        }
        Err(reason) => {
            warn!(evidence = item.index, field = label, raw, "unreadable timestamp");
            item.timestamp_errors.push(TimestampFormatError {
                field: label.to_string(),
                raw: raw.to_string(),
                reason,
            });
        }
    }
}

/// Extract evidence items from the section body
///
/// Entries begin at numbered lines (`1.`, `2)`). A section without numbering
/// starts a new entry at every `**Source**` label after the first.
pub fn parse_evidence(body: &[&str]) -> Vec<EvidenceItem> {
    let mut items = Vec::new();
    let mut current = EntryBuilder::default();

    for line in body {
        let numbered = entry_start_re().is_match(line);
        let field = label_line(line, false);
        let repeated_source = field.as_ref().map_or(false, |f| f.label == "source")
            && current.item.source.is_some();

        if numbered || repeated_source || (!current.started && field.is_some()) {
            if current.started {
                items.push(std::mem::take(&mut current).finish());
            }
            current = EntryBuilder::new(items.len() + 1);
        }
        if !current.started {
            continue;
        }

        if let Some(field) = field {
            let value = field.value;
            match field.label.as_str() {
                "source" => {
                    current.item.source = non_empty(unquote(value));
                    current.last = Some(Field::Source);
                }
                "quote" => {
                    current.item.quote = Some(unquote(value).to_string());
                    current.last = Some(Field::Quote);
                }
                "relevance" => {
                    current.item.relevance = non_empty(value.trim());
                    current.last = Some(Field::Relevance);
                }
                "timestamp" | "timestamps" => {
                    if !value.is_empty() {
                        current.set_timestamp("modified", value);
                    }
                    current.last = Some(Field::Timestamp);
                }
                label @ ("created" | "modified" | "accessed") => {
                    current.set_timestamp(label, value);
                    current.last = Some(Field::Timestamp);
                }
                _ => current.last = Some(Field::Other),
            }
            continue;
        }

        if let Some(caps) = timestamp_sub_re().captures(line) {
            let label = caps["label"].to_lowercase();
            current.set_timestamp(&label, &caps["value"]);
            current.last = Some(Field::Timestamp);
            continue;
        }

        current.append(line);
    }
    if current.started {
        items.push(current.finish());
    }
    items
}

/// Parse an ISO-8601 instant
///
/// Accepts RFC 3339, a naive date-time (taken as UTC) and a bare date
/// (midnight UTC). Trailing annotations after whitespace are ignored when the
/// whole string does not parse.
pub fn parse_instant(raw: &str) -> Result<DateTime<Utc>, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err("empty timestamp".to_string());
    }
    match parse_exact(raw) {
        Ok(instant) => Ok(instant),
        Err(first_err) => match raw.split_whitespace().next() {
            Some(token) if token != raw => parse_exact(token).map_err(|_| first_err),
            _ => Err(first_err),
        },
    }
}

fn parse_exact(raw: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(naive.and_utc());
        }
    }
    match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        Ok(date) => date
            .and_hms_opt(0, 0, 0)
            .map(|naive| naive.and_utc())
            .ok_or_else(|| format!("'{}' is not a valid date", raw)),
        Err(e) => Err(e.to_string()),
    }
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Timestamps with nothing set
pub fn no_timestamps(ts: &EvidenceTimestamps) -> bool {
    ts.created.is_none() && ts.modified.is_none() && ts.accessed.is_none()
}
