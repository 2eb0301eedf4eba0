//! CLI module for the trace validator
//!
//! Command definitions, output rendering and the exit code contract.

pub mod commands;
pub mod output;

pub use commands::{TraceCli, TraceCommands};
pub use output::{BatchOutput, BatchSummary, OutputFormat};

use crate::error::CliError;

/// Exit codes for CLI operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Every trace passed or warned
    Success = 0,
    /// At least one trace failed
    ValidationError = 1,
    /// Warnings only, under `--strict`
    ValidationWarning = 2,
    /// Invalid input or arguments
    InvalidInput = 3,
    /// File not found or inaccessible
    FileError = 4,
    /// Internal error
    InternalError = 10,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl ExitCode {
    /// Determine exit code from batch counts
    ///
    /// Errored documents are counted as failed.
    pub fn from_summary(summary: &BatchSummary, strict: bool) -> Self {
        if summary.failed > 0 {
            ExitCode::ValidationError
        } else if strict && summary.warned > 0 {
            ExitCode::ValidationWarning
        } else {
            ExitCode::Success
        }
    }

    /// Exit code for an error that stopped the run
    pub fn from_error(err: &CliError) -> Self {
        match err {
            CliError::FileError(_) => ExitCode::FileError,
            e if e.is_user_error() => ExitCode::InvalidInput,
            _ => ExitCode::InternalError,
        }
    }
}

/// Run the CLI with the given arguments and return the exit code
pub fn run(cli: TraceCli) -> Result<ExitCode, CliError> {
    match cli.command {
        TraceCommands::Validate {
            paths,
            format,
            strict,
            config,
            now,
            output,
        } => commands::execute_validate(paths, format, strict, config, now, output),
        TraceCommands::Schemas { format } => commands::execute_schemas(format),
        TraceCommands::Rules { format } => commands::execute_rules(format),
    }
}
