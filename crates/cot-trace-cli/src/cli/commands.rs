//! CLI command definitions for the trace validator
//!
//! Provides Clap-based commands for validating trace documents and listing the
//! embedded schema rule sets and policy checks.

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use colored::Colorize;
use cot_trace::{PolicyEngine, RuleCategory, SchemaRegistry, Validator, ValidatorConfig};
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

use super::output::{BatchOutput, OutputFormat};
use super::ExitCode;
use crate::batch;
use crate::error::CliError;

/// Chain-of-Thought trace validator
///
/// Validate reasoning trace documents against the versioned schema rules.
#[derive(Parser, Debug)]
#[command(name = "cot-validate")]
#[command(about = "Validate Chain-of-Thought reasoning trace documents", long_about = None)]
#[command(version)]
pub struct TraceCli {
    /// Output verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit logs as JSON on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: TraceCommands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum TraceCommands {
    /// Validate trace documents
    ///
    /// Accepts files and directories. Directories are searched recursively for
    /// .md, .markdown and .txt files. An argument that is not a path but starts
    /// with `{` is validated as a JSON trace.
    Validate {
        /// Trace files, directories or inline JSON traces
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Output format for validation results
        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,

        /// Treat warnings as failures
        #[arg(long)]
        strict: bool,

        /// Validator configuration file (TOML)
        #[arg(short, long, env = "COT_VALIDATOR_CONFIG")]
        config: Option<PathBuf>,

        /// Evaluation instant for freshness scoring (RFC 3339, defaults to now)
        #[arg(long)]
        now: Option<String>,

        /// Write results to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List the embedded schema rule sets
    Schemas {
        /// Output format for the rule set listing
        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// List the policy checks in the order they run
    Rules {
        /// Output format for the check listing
        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
}

/// One policy check in the `rules` listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleEntry {
    pub name: &'static str,
    pub category: RuleCategory,
    pub description: &'static str,
}

/// Registered checks of `engine`, in evaluation order
pub fn rule_entries(engine: &PolicyEngine) -> Vec<RuleEntry> {
    engine
        .rules()
        .iter()
        .map(|rule| RuleEntry {
            name: rule.name(),
            category: rule.category(),
            description: rule.description(),
        })
        .collect()
}

/// Load the validator configuration with env overrides and the CLI strict flag
pub fn load_config(path: Option<&PathBuf>, strict: bool) -> Result<ValidatorConfig, CliError> {
    let base = match path {
        Some(path) => ValidatorConfig::from_file(path)?,
        None => ValidatorConfig::default(),
    };
    let config = base.with_env_overrides();
    config.freshness.validate()?;
    let strict = strict || config.strict;
    Ok(config.with_strict(strict))
}

/// Parse the `--now` value
pub fn parse_now(raw: Option<&str>) -> Result<DateTime<Utc>, CliError> {
    match raw {
        None => Ok(Utc::now()),
        Some(raw) => DateTime::parse_from_rfc3339(raw.trim())
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| CliError::invalid_input(format!("invalid --now '{}': {}", raw, e))),
    }
}

/// Execute the validate command
pub fn execute_validate(
    paths: Vec<PathBuf>,
    format: OutputFormat,
    strict: bool,
    config: Option<PathBuf>,
    now: Option<String>,
    output: Option<PathBuf>,
) -> Result<ExitCode, CliError> {
    let config = load_config(config.as_ref(), strict)?;
    let now = parse_now(now.as_deref())?;
    let inputs = batch::collect_inputs(&paths)?;
    if inputs.is_empty() {
        return Err(CliError::invalid_input("no trace documents found"));
    }
    info!(inputs = inputs.len(), %now, "validating traces");

    let strict = config.strict;
    let reports = batch::run_batch(Validator::new(config)?, inputs, now)?;
    let result = BatchOutput::new(reports, now);

    if output.is_some() {
        colored::control::set_override(false);
    }
    let rendered = result.render(format)?;
    match &output {
        Some(path) => std::fs::write(path, rendered).map_err(|e| {
            CliError::file_error(format!("Failed to write '{}': {}", path.display(), e))
        })?,
        None => print!("{}", rendered),
    }

    Ok(ExitCode::from_summary(&result.summary, strict))
}

/// Execute the schemas command
pub fn execute_schemas(format: OutputFormat) -> Result<ExitCode, CliError> {
    let entries = SchemaRegistry::global().entries();
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(entries)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(entries)?),
        OutputFormat::Table | OutputFormat::Text => {
            println!("{}", "Schema Rule Sets".cyan().bold());
            println!("{}", "=".repeat(60));
            for rules in entries {
                println!(
                    "{:<10} contract {}.x  max depth {}  fallbacks [{}]  conflict [{}]",
                    rules.schema.to_string().bold(),
                    rules.contract_major,
                    rules.default_max_depth,
                    rules.fallback_strategies.join(", "),
                    rules.conflict_strategies.join(", ")
                );
            }
        }
    }
    Ok(ExitCode::Success)
}

/// Execute the rules command
pub fn execute_rules(format: OutputFormat) -> Result<ExitCode, CliError> {
    let entries = rule_entries(&PolicyEngine::new());
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&entries)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(&entries)?),
        OutputFormat::Table | OutputFormat::Text => {
            println!("{}", "Policy Checks".cyan().bold());
            println!("{}", "=".repeat(60));
            for entry in &entries {
                println!(
                    "{} {:<10} {}",
                    format!("{:<22}", entry.name).bold(),
                    entry.category.to_string(),
                    entry.description
                );
            }
        }
    }
    Ok(ExitCode::Success)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        TraceCli::command().debug_assert();
    }

    #[test]
    fn test_parse_validate_args() {
        let cli = TraceCli::parse_from([
            "cot-validate",
            "-vv",
            "validate",
            "a.md",
            "traces/",
            "--format",
            "json",
            "--strict",
            "--now",
            "2024-02-01T12:00:00Z",
        ]);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            TraceCommands::Validate {
                paths,
                format,
                strict,
                now,
                ..
            } => {
                assert_eq!(paths.len(), 2);
                assert_eq!(format, OutputFormat::Json);
                assert!(strict);
                assert_eq!(now.as_deref(), Some("2024-02-01T12:00:00Z"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_rule_entries_follow_engine_order() {
        let entries = rule_entries(&PolicyEngine::new());
        assert_eq!(entries.len(), PolicyEngine::new().rules().len());
        assert_eq!(entries[0].name, "required_fields");
        assert_eq!(entries[0].category, RuleCategory::Required);
        assert!(entries.iter().all(|e| !e.description.is_empty()));

        let estimate = entries.iter().find(|e| e.name == "token_estimate").unwrap();
        assert_eq!(estimate.category, RuleCategory::Budget);
        let json = serde_json::to_value(estimate).unwrap();
        assert_eq!(json["category"], "budget");
    }

    #[test]
    fn test_parse_now() {
        let now = parse_now(Some("2024-02-01T12:00:00+02:00")).unwrap();
        assert_eq!(now.to_rfc3339(), "2024-02-01T10:00:00+00:00");
        assert!(matches!(parse_now(Some("yesterday")), Err(CliError::InvalidInput(_))));
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cot.toml");
        std::fs::write(&path, "strict = true\n[freshness]\nstale_threshold_days = 90\n").unwrap();
        let config = load_config(Some(&path), false).unwrap();
        assert!(config.strict);
        assert_eq!(config.freshness.stale_threshold_days, 90);

        std::fs::write(&path, "[freshness]\ncurrent_window_hours = 10000\n").unwrap();
        assert!(matches!(
            load_config(Some(&path), false),
            Err(CliError::ConfigError(_))
        ));
    }
}
