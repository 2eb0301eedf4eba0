//! Versioned rule sets
//!
//! Rule sets come from a table compiled into the binary, so validation does not
//! depend on anything in the working directory. The registry is built once and
//! shared read-only by every validation in the process.

use serde::Serialize;
use std::sync::OnceLock;
use tracing::debug;

use crate::error::{Result, TraceError};
use crate::model::{RiskLevel, SemVer};

/// Fields every trace must carry, whatever its schema
pub const REQUIRED_FIELDS: &[&str] = &["decision", "risk_level", "action"];

/// Thresholds and vocabularies for one schema version
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleSet {
    pub schema: SemVer,
    /// Major version of the runtime contract this schema runs under
    pub contract_major: u32,
    /// Minimum evidence items, indexed low, medium, high, critical
    min_evidence: [usize; 4],
    /// Used when the risk level is missing or unrecognized
    pub default_min_evidence: usize,
    pub fallback_strategies: &'static [&'static str],
    pub conflict_strategies: &'static [&'static str],
    pub default_max_depth: u32,
    pub quote_min_len: usize,
    pub relevance_min_len: usize,
    /// `used / limit` above which token pressure is reported
    pub pressure_ratio: f64,
}

impl RuleSet {
    /// Minimum evidence count for a risk level
    pub fn min_evidence(&self, risk: Option<RiskLevel>) -> usize {
        match risk {
            Some(RiskLevel::Low) => self.min_evidence[0],
            Some(RiskLevel::Medium) => self.min_evidence[1],
            Some(RiskLevel::High) => self.min_evidence[2],
            Some(RiskLevel::Critical) => self.min_evidence[3],
            None => self.default_min_evidence,
        }
    }

    pub fn is_recognized_fallback(&self, strategy: &str) -> bool {
        self.fallback_strategies
            .iter()
            .any(|s| s.eq_ignore_ascii_case(strategy.trim()))
    }

    pub fn is_recognized_conflict_strategy(&self, strategy: &str) -> bool {
        self.conflict_strategies
            .iter()
            .any(|s| s.eq_ignore_ascii_case(strategy.trim()))
    }

    pub fn required_fields(&self) -> &'static [&'static str] {
        REQUIRED_FIELDS
    }
}

const V6_FALLBACKS: &[&str] = &["summarize", "truncate"];
const V7_FALLBACKS: &[&str] = &["summarize", "truncate", "defer"];
const V6_CONFLICT: &[&str] = &["majority", "escalate"];
const V7_CONFLICT: &[&str] = &["weighted_consensus", "majority", "escalate"];

const fn rule_set(
    schema: SemVer,
    contract_major: u32,
    min_evidence: [usize; 4],
    fallback_strategies: &'static [&'static str],
    conflict_strategies: &'static [&'static str],
    default_max_depth: u32,
) -> RuleSet {
    RuleSet {
        schema,
        contract_major,
        min_evidence,
        default_min_evidence: 2,
        fallback_strategies,
        conflict_strategies,
        default_max_depth,
        quote_min_len: 10,
        relevance_min_len: 20,
        pressure_ratio: 0.75,
    }
}

const EMBEDDED: [RuleSet; 3] = [
    rule_set(SemVer::new(6, 0, 0), 1, [1, 2, 3, 4], V6_FALLBACKS, V6_CONFLICT, 3),
    rule_set(SemVer::new(7, 0, 0), 2, [1, 2, 3, 5], V7_FALLBACKS, V7_CONFLICT, 5),
    rule_set(SemVer::new(7, 1, 0), 2, [1, 2, 3, 5], V7_FALLBACKS, V7_CONFLICT, 5),
];

/// Read-only collection of rule sets ordered by schema version
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    entries: Vec<RuleSet>,
}

impl SchemaRegistry {
    /// Registry holding the compiled-in table
    pub fn embedded() -> Self {
        let mut entries = EMBEDDED.to_vec();
        entries.sort_by_key(|r| r.schema);
        Self { entries }
    }

    /// Process-wide registry, built on first use
    pub fn global() -> &'static SchemaRegistry {
        static REGISTRY: OnceLock<SchemaRegistry> = OnceLock::new();
        REGISTRY.get_or_init(SchemaRegistry::embedded)
    }

    pub fn entries(&self) -> &[RuleSet] {
        &self.entries
    }

    /// Newest rule set; used when a trace declares no schema
    pub fn latest(&self) -> Option<&RuleSet> {
        self.entries.last()
    }

    /// Resolve the rule set for a declared schema and runtime contract
    ///
    /// An exact match wins. Otherwise the highest entry with the same major
    /// version and a minor version not above the requested one is used. A
    /// missing schema resolves to [`SchemaRegistry::latest`]. A declared
    /// contract must share the rule set's contract major version.
    pub fn resolve(&self, schema: Option<&str>, contract: Option<&str>) -> Result<&RuleSet> {
        let rules = match schema {
            None => self
                .latest()
                .ok_or_else(|| TraceError::schema("schema registry is empty"))?,
            Some(raw) => {
                let requested: SemVer = raw
                    .parse()
                    .map_err(|e| TraceError::schema(format!("unreadable schema version: {}", e)))?;
                self.entries
                    .iter()
                    .filter(|r| r.schema.major == requested.major && r.schema.minor <= requested.minor)
                    .max_by_key(|r| r.schema)
                    .ok_or_else(|| {
                        TraceError::schema(format!("unsupported schema version {}", requested))
                    })?
            }
        };

        if let Some(raw) = contract {
            let declared: SemVer = raw
                .parse()
                .map_err(|e| TraceError::schema(format!("unreadable runtime contract: {}", e)))?;
            if declared.major != rules.contract_major {
                return Err(TraceError::schema(format!(
                    "runtime contract {} is not compatible with schema {} (requires {}.x)",
                    declared, rules.schema, rules.contract_major
                )));
            }
        }

        debug!(schema = %rules.schema, "rule set resolved");
        Ok(rules)
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::embedded()
    }
}
