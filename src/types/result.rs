//! Structured pipeline result.

use serde::{Deserialize, Serialize};

use super::{
    AnalysisSummary, AnomalyMap, DataProfile, DecisionRecord, GateState, Narrative,
    NarrativeValidation, ReportValidation, ValidationHistory,
};
use crate::error::StageFailure;

/// Final status of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Run completed; quality gates may still have recorded unresolved failures
    Success,
    /// Raw input validation rejected the batch; no report produced
    Failed,
    /// An unexpected stage error or cancellation aborted the run
    Error,
}

/// Record of what the cleaning stage changed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CleaningReport {
    pub initial_rows: usize,
    pub final_rows: usize,
    pub rows_removed: usize,
    /// Percentage of rows removed
    pub removal_rate: f64,
    pub values_filled: usize,
    pub values_capped: usize,
    /// Ordered descriptions of the cleaning steps that changed something
    pub steps: Vec<String>,
}

/// Everything a pipeline run produced.
///
/// Stages that did not run (fatal input error, upstream abort) leave their
/// fields as `None`. The validation history is always present, even for
/// failed runs, so rejections stay traceable.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    pub status: RunStatus,
    /// Rows that survived cleaning and were analyzed
    pub row_count: usize,
    pub profile: Option<DataProfile>,
    pub cleaning: Option<CleaningReport>,
    pub summary: Option<AnalysisSummary>,
    pub anomalies: Option<AnomalyMap>,
    pub decisions: Option<DecisionRecord>,
    pub narrative: Option<Narrative>,
    pub narrative_validation: Option<NarrativeValidation>,
    /// Terminal gate state of the narrative artifact
    pub narrative_gate: GateState,
    pub report: Option<String>,
    pub report_validation: Option<ReportValidation>,
    /// Terminal gate state of the report artifact
    pub report_gate: GateState,
    pub validation_history: ValidationHistory,
    /// Stage names in completion order
    pub stages_completed: Vec<String>,
    pub errors: Vec<StageFailure>,
}

impl PipelineResult {
    /// Empty result in its initial state; the coordinator fills it in.
    pub fn pending() -> Self {
        Self {
            status: RunStatus::Error,
            row_count: 0,
            profile: None,
            cleaning: None,
            summary: None,
            anomalies: None,
            decisions: None,
            narrative: None,
            narrative_validation: None,
            narrative_gate: GateState::Pending,
            report: None,
            report_validation: None,
            report_gate: GateState::Pending,
            validation_history: ValidationHistory::new(),
            stages_completed: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }
}
