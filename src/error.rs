//! Error types for the ofd2docx library.
//!
//! Four error types reflect four distinct failure scopes:
//!
//! * [`BatchError`] (**fatal**): the batch cannot start or cannot be waited
//!   for (missing input directory, converter not installed, pool
//!   interrupted). Returned as `Err(BatchError)` from
//!   [`crate::batch::run_batch`].
//!
//! * [`ItemError`] (**per item**): one document failed in Stage-1 or
//!   Stage-2. Caught at the pipeline boundary and stored as text inside
//!   [`crate::pipeline::ConversionOutcome`]; it never reaches the scheduler.
//!
//! * [`ConverterError`]: what a converter adapter reports to the pipeline.
//!   The pipeline wraps it in the matching [`ItemError`] stage.
//!
//! * [`CleanupDeleteError`]: one artifact could not be deleted. Logged,
//!   listed in the summary, never escalated.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the ofd2docx library.
///
/// Item-level failures use [`ItemError`] and are stored in
/// [`crate::pipeline::ConversionOutcome`] rather than propagated here.
#[derive(Debug, Error)]
pub enum BatchError {
    // ── Setup errors ──────────────────────────────────────────────────────
    /// Input root is missing or is not a directory.
    #[error("Input directory '{path}' does not exist or is not a directory")]
    InvalidInputDirectory { path: PathBuf },

    /// Output root is absent and could not be created.
    #[error("Output directory '{path}' does not exist and could not be created: {source}")]
    OutputDirUncreatable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A required external converter is not installed or not loadable.
    #[error("Converter '{converter}' not found: {detail}")]
    ConverterNotFound { converter: String, detail: String },

    // ── Scan errors ───────────────────────────────────────────────────────
    /// Directory traversal failed part-way (e.g. unreadable subtree).
    #[error("Failed to scan '{path}': {detail}")]
    ScanFailure { path: PathBuf, detail: String },

    // ── Pool errors ───────────────────────────────────────────────────────
    /// Waiting for the worker pool was interrupted before every item finished.
    #[error("Batch interrupted after {completed}/{total} items: {detail}")]
    BatchInterrupted {
        completed: usize,
        total: usize,
        detail: String,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A per-item conversion failure.
///
/// The `Display` text is what ends up in the batch summary after
/// `"<fileName> - reason: "`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ItemError {
    /// Source → intermediate conversion failed.
    #[error("failed converting to PDF: {0}")]
    Stage1ConversionError(String),

    /// Intermediate → final conversion failed.
    #[error("failed converting PDF to {extension}: {detail}")]
    Stage2ConversionError { extension: String, detail: String },
}

/// Failure reported by a Stage-1 or Stage-2 converter adapter.
#[derive(Debug, Error)]
pub enum ConverterError {
    /// Reading the input or writing the output failed.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// External tool could not be started.
    #[error("Failed to launch '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// External tool exited with a non-zero status.
    #[error("{program} failed (exit code: {code}): {stderr}")]
    ToolFailed {
        program: String,
        code: String,
        stderr: String,
    },

    /// Tool reported success but the expected file is not there.
    #[error("converter reported success but produced no '{path}'")]
    MissingOutput { path: PathBuf },

    /// Conversion exceeded the configured per-stage timeout.
    #[error("timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The caller stopped waiting before the output was published.
    #[error("conversion cancelled before its output was written")]
    Cancelled,

    /// The in-process library rejected the document.
    #[error("{0}")]
    Library(String),
}

/// One artifact that the cleanup pass could not delete.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
#[error("failed to delete {file_name} | reason: {reason}")]
pub struct CleanupDeleteError {
    pub path: PathBuf,
    pub file_name: String,
    pub reason: String,
}
