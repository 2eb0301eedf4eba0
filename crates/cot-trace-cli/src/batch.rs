//! Input discovery and parallel validation
//!
//! Each document is read and validated on the blocking pool. The validator is
//! shared read-only; results come back in input order.

use chrono::{DateTime, Utc};
use cot_trace::{Report, TraceError, Validator};
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::error::CliError;

/// File extensions treated as trace documents inside directories
pub const TRACE_EXTENSIONS: &[&str] = &["md", "markdown", "txt"];

/// Report path used for a trace passed as a command-line argument
pub const INLINE_LABEL: &str = "<inline>";

/// One document to validate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceInput {
    File(PathBuf),
    /// JSON trace text given in place of a path
    Inline(String),
}

impl TraceInput {
    pub fn label(&self) -> String {
        match self {
            TraceInput::File(path) => path.display().to_string(),
            TraceInput::Inline(_) => INLINE_LABEL.to_string(),
        }
    }
}

/// Expand the given arguments into trace inputs
///
/// Files are taken as given whatever their extension. Directories are walked
/// recursively, honoring git ignore rules, and sorted so output is stable. An
/// argument that names nothing on disk but starts with `{` is a JSON trace.
pub fn collect_inputs(paths: &[PathBuf]) -> Result<Vec<TraceInput>, CliError> {
    let mut inputs = Vec::new();
    for path in paths {
        if path.is_file() {
            inputs.push(TraceInput::File(path.clone()));
        } else if path.is_dir() {
            let mut found = walk_dir(path);
            found.sort();
            debug!(dir = %path.display(), files = found.len(), "scanned directory");
            inputs.extend(found.into_iter().map(TraceInput::File));
        } else if let Some(json) = inline_json(path) {
            debug!(bytes = json.len(), "taking argument as an inline JSON trace");
            inputs.push(TraceInput::Inline(json));
        } else {
            return Err(CliError::file_error(format!(
                "'{}' is not a file or directory",
                path.display()
            )));
        }
    }
    Ok(inputs)
}

fn inline_json(arg: &Path) -> Option<String> {
    let text = arg.to_str()?;
    text.trim_start().starts_with('{').then(|| text.to_string())
}

fn walk_dir(root: &Path) -> Vec<PathBuf> {
    WalkBuilder::new(root)
        .hidden(false)
        .git_ignore(true)
        .filter_entry(|entry| {
            let name = entry.file_name().to_string_lossy();
            !matches!(name.as_ref(), ".git" | "target" | "node_modules")
        })
        .build()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!(error = %err, "skipping unreadable directory entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_some_and(|ft| ft.is_file()))
        .map(|entry| entry.into_path())
        .filter(|path| is_trace_file(path))
        .collect()
}

fn is_trace_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| TRACE_EXTENSIONS.iter().any(|t| ext.eq_ignore_ascii_case(t)))
}

/// Read and validate one file; read failures become errored reports
pub fn validate_file(validator: &Validator, path: &Path, now: DateTime<Utc>) -> Report {
    let label = path.display().to_string();
    match std::fs::read_to_string(path) {
        Ok(text) => validator.validate_or_report(&label, &text, now),
        Err(err) => {
            warn!(path = %label, error = %err, "failed to read trace");
            Report::from_error(&label, &TraceError::from(err))
        }
    }
}

/// Validate one input of either kind
pub fn validate_input(validator: &Validator, input: &TraceInput, now: DateTime<Utc>) -> Report {
    match input {
        TraceInput::File(path) => validate_file(validator, path, now),
        TraceInput::Inline(text) => validator.validate_or_report(INLINE_LABEL, text, now),
    }
}

/// Validate every input concurrently, preserving input order
pub async fn validate_all(
    validator: Arc<Validator>,
    inputs: Vec<TraceInput>,
    now: DateTime<Utc>,
) -> Result<Vec<Report>, CliError> {
    let mut tasks = JoinSet::new();
    for (index, input) in inputs.iter().cloned().enumerate() {
        let validator = Arc::clone(&validator);
        tasks.spawn_blocking(move || (index, validate_input(&validator, &input, now)));
    }

    let mut slots: Vec<Option<Report>> = vec![None; inputs.len()];
    while let Some(joined) = tasks.join_next().await {
        let (index, report) =
            joined.map_err(|e| CliError::InternalError(format!("validation task failed: {}", e)))?;
        slots[index] = Some(report);
    }

    slots
        .into_iter()
        .zip(&inputs)
        .map(|(slot, input)| {
            slot.ok_or_else(|| CliError::InternalError(format!("no result for '{}'", input.label())))
        })
        .collect()
}

/// Blocking entry point: builds a runtime and runs [`validate_all`]
pub fn run_batch(
    validator: Validator,
    inputs: Vec<TraceInput>,
    now: DateTime<Utc>,
) -> Result<Vec<Report>, CliError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::InternalError(format!("failed to start runtime: {}", e)))?;
    runtime.block_on(validate_all(Arc::new(validator), inputs, now))
}
