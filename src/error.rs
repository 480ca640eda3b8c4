//! Error types for the analysis pipeline.
//!
//! The taxonomy mirrors the failure model of the pipeline:
//! - [`LoadError`]: fatal input problems surfaced before any stage runs
//! - [`StageFailure`]: an unexpected error inside a pipeline stage, caught at
//!   the coordinator boundary and converted into an `Error` run status
//!
//! Soft data warnings are not errors; they are recorded in the
//! [`ValidationHistory`](crate::types::ValidationHistory) and the run continues.
//! Text-generation failures live in [`crate::llm::GenerationError`] and never
//! propagate past the narrative synthesizer.

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Fatal input error raised by the data loader.
///
/// These abort the run before the first validation gate; no report is produced.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("data file not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("input has no header row")]
    MissingHeader,

    #[error("header does not contain a Machine_ID column")]
    MissingIdentity,
}

/// An unexpected error inside a pipeline stage.
///
/// The coordinator converts any stage error into this record, tags it with the
/// originating stage name, and finishes the run with `RunStatus::Error` instead
/// of crashing the host process.
#[derive(Debug, Clone, Serialize, Error)]
#[error("stage '{stage}' failed: {message}")]
pub struct StageFailure {
    /// Name of the stage that failed
    pub stage: String,
    /// Human-readable failure description
    pub message: String,
    /// Itemized issues, when the failure came from a validation gate
    pub issues: Vec<String>,
}

impl StageFailure {
    pub fn new(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            message: message.into(),
            issues: Vec::new(),
        }
    }

    pub fn with_issues(
        stage: impl Into<String>,
        message: impl Into<String>,
        issues: Vec<String>,
    ) -> Self {
        Self {
            stage: stage.into(),
            message: message.into(),
            issues,
        }
    }

    /// Failure recorded when the caller cancels the run at a stage boundary.
    pub fn cancelled(stage: impl Into<String>) -> Self {
        Self::new(stage, "run cancelled by caller")
    }
}
