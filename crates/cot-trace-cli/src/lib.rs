//! Command-line validator for Chain-of-Thought reasoning traces
//!
//! Wraps the `cot-trace` library: expands file and directory arguments,
//! validates every document in parallel and renders the reports as a colored
//! table, plain text, JSON or YAML.
//!
//! # Exit codes
//!
//! - 0: every trace passed or warned
//! - 1: at least one trace failed (including unreadable documents)
//! - 2: warnings under `--strict`
//! - 3: invalid arguments or configuration
//! - 4: an input path or the output file could not be accessed
//! - 10: internal error

pub mod batch;
pub mod cli;
pub mod error;

pub use cli::{BatchOutput, BatchSummary, ExitCode, OutputFormat, TraceCli, TraceCommands};
pub use error::CliError;

/// CLI version
pub const CLI_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Run the CLI and map any error to an exit code
///
/// ```rust,no_run
/// use clap::Parser;
/// use cot_trace_cli::{run_cli, TraceCli};
///
/// let cli = TraceCli::parse();
/// std::process::exit(run_cli(cli).into());
/// ```
pub fn run_cli(cli: TraceCli) -> ExitCode {
    match cli::run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from_error(&e)
        }
    }
}
