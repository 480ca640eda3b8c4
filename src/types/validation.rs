//! Validation traceability types and quality-gate verdicts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Traceability log
// ============================================================================

/// One validation decision, pass or fail. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationEntry {
    /// Name of the validating stage, e.g. "raw_validation"
    pub stage: String,
    pub passed: bool,
    pub message: String,
    /// Hard issues found (empty on pass)
    pub issues: Vec<String>,
    /// Attempt number when inside a retry loop; 1 otherwise
    pub attempt: u32,
    pub timestamp: DateTime<Utc>,
}

/// Ordered, append-only record of every validation decision in a run.
///
/// The sole source of truth for the report's traceability section. Entries are
/// never mutated or removed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationHistory {
    entries: Vec<ValidationEntry>,
}

/// Pass/fail totals over a validation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    /// Pass rate in percent; 0 when no validations ran
    pub pass_rate: f64,
}

impl ValidationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one entry. There is deliberately no way to remove or edit.
    pub fn record(
        &mut self,
        stage: impl Into<String>,
        passed: bool,
        message: impl Into<String>,
        issues: Vec<String>,
        attempt: u32,
    ) {
        self.entries.push(ValidationEntry {
            stage: stage.into(),
            passed,
            message: message.into(),
            issues,
            attempt,
            timestamp: Utc::now(),
        });
    }

    pub fn entries(&self) -> &[ValidationEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn summary(&self) -> ValidationSummary {
        let total = self.entries.len();
        let passed = self.entries.iter().filter(|e| e.passed).count();
        ValidationSummary {
            total,
            passed,
            failed: total - passed,
            pass_rate: if total == 0 {
                0.0
            } else {
                passed as f64 / total as f64 * 100.0
            },
        }
    }
}

// ============================================================================
// Gate state machine
// ============================================================================

/// State of a quality-gated artifact.
///
/// `Pending -> Valid` is terminal success. `Pending -> Invalid` is terminal per
/// attempt; the coordinator may re-enter `Pending` by re-producing the artifact,
/// up to the retry budget, after which `Invalid` is final and surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateState {
    Pending,
    Valid,
    Invalid,
}

// ============================================================================
// Data validation verdict
// ============================================================================

/// Verdict from the raw / post-cleaning data validation gates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub issues: Vec<String>,
    pub warnings: Vec<String>,
    pub row_count: usize,
}

// ============================================================================
// Quality-gate verdicts
// ============================================================================

/// Verdict on narrative text quality and numeric consistency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrativeValidation {
    pub valid: bool,
    /// Hard failures: too short, or inconsistent with the numeric facts
    pub issues: Vec<String>,
    /// Soft findings: fallback mode, missing topics, concerning terms
    pub warnings: Vec<String>,
    /// True iff there are hard issues AND the narrative was not already a
    /// fallback (retrying deterministic output would change nothing)
    pub retry_advised: bool,
    pub quality_score: f64,
}

/// Verdict on the final composed report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportValidation {
    pub valid: bool,
    pub issues: Vec<String>,
    pub warnings: Vec<String>,
    pub score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_summary_counts_passes_and_failures() {
        let mut history = ValidationHistory::new();
        history.record("raw_validation", true, "ok", Vec::new(), 1);
        history.record("narrative_quality", false, "too short", vec!["short".into()], 1);
        history.record("narrative_quality", true, "ok", Vec::new(), 2);

        let summary = history.summary();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.passed, 2);
        assert_eq!(summary.failed, 1);
        assert!((summary.pass_rate - 66.666).abs() < 0.1);
    }

    #[test]
    fn entries_preserve_append_order() {
        let mut history = ValidationHistory::new();
        history.record("a", true, "first", Vec::new(), 1);
        history.record("b", true, "second", Vec::new(), 1);
        let stages: Vec<_> = history.entries().iter().map(|e| e.stage.as_str()).collect();
        assert_eq!(stages, ["a", "b"]);
    }
}
