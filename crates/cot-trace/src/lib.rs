//! Validation for Chain-of-Thought reasoning traces
//!
//! A reasoning trace is a markdown document in which an agent records a
//! decision, its risk assessment, the evidence it relied on, its analysis, a
//! self-check list and the action it will take. This crate parses such
//! documents and checks them against versioned rule sets.
//!
//! # Pipeline
//!
//! 1. [`parser`] turns text into a [`ParsedDocument`]: a root trace plus any
//!    nested sub-decision traces.
//! 2. [`schema`] resolves the rule set for the declared schema version.
//! 3. [`recursion`] tracks the decision chain for depth limits and cycles.
//! 4. [`engine`] runs every [`Rule`] and collects Pass/Warn/Fail results.
//! 5. [`report`] turns the results into a [`Report`] with JSON, YAML and
//!    plain-text renderings.
//!
//! [`Validator`] runs the whole pipeline:
//!
//! ```no_run
//! use chrono::Utc;
//! use cot_trace::{Validator, ValidatorConfig};
//!
//! let validator = Validator::new(ValidatorConfig::default())?;
//! let report = validator.validate_or_report("trace.md", "### Decision: ship", Utc::now());
//! println!("{}", report.render_text());
//! # Ok::<(), cot_trace::TraceError>(())
//! ```
//!
//! Validation is synchronous and side-effect free. The evaluation instant is
//! always supplied by the caller, so the same input always yields the same
//! report.

pub mod config;
pub mod engine;
pub mod error;
pub mod freshness;
pub mod model;
pub mod parser;
pub mod recursion;
pub mod report;
pub mod schema;
pub mod validation;

pub use config::{FreshnessConfig, ValidatorConfig};
pub use engine::rules::token_budget::TokenEstimate;
pub use engine::rules::{CheckResult, Finding, Rule, RuleCategory, RuleContext, Verdict};
pub use engine::{CheckSummary, PolicyEngine, VerdictDraft};
pub use error::{RecursionError, Result, TimestampFormatError, TraceError};
pub use freshness::{Freshness, FreshnessCalculator, FreshnessCategory};
pub use model::{ParsedDocument, RiskLevel, SemVer, Trace, TraceFragment};
pub use parser::{parse_document, parse_trace};
pub use recursion::{decision_key, ChainState, ChainTracker, SpawnOutcome};
pub use report::{ChainSummary, Report, TraceMetrics};
pub use schema::{RuleSet, SchemaRegistry};
pub use validation::Validator;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
