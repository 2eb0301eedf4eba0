//! Chain-of-Thought trace validator CLI
//!
//! # Usage
//!
//! ```bash
//! # Validate a single trace
//! cot-validate validate trace.md
//!
//! # Validate a directory as JSON, treating warnings as failures
//! cot-validate validate traces/ --format json --strict
//!
//! # Reproducible freshness scoring
//! cot-validate validate traces/ --now 2024-02-01T12:00:00Z
//!
//! # List the embedded schema rule sets
//! cot-validate schemas
//! ```
//!
//! Logging goes to stderr. `RUST_LOG` overrides the level chosen by
//! `-v`/`--quiet`.

use anyhow::Context;
use clap::Parser;
use cot_trace_cli::{run_cli, ExitCode, TraceCli};
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = TraceCli::parse();

    if let Err(e) = init_tracing(&cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(ExitCode::InternalError.into());
    }

    let exit_code = run_cli(cli);
    std::process::exit(exit_code.into());
}

fn init_tracing(cli: &TraceCli) -> anyhow::Result<()> {
    let level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level).context("invalid log level")?,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if cli.log_json {
        builder
            .json()
            .try_init()
            .map_err(|e| anyhow::anyhow!("failed to install JSON logger: {}", e))
    } else {
        builder
            .try_init()
            .map_err(|e| anyhow::anyhow!("failed to install logger: {}", e))
    }
}
