//! Core data types shared across pipeline stages.
//!
//! Inter-stage contracts are explicit typed records: machine rows and KPI
//! blocks, the aggregate summary, the anomaly map, decision records, narrative
//! text, and the append-only validation history. Optional data is represented
//! with `Option`, never with key-existence conventions.

mod anomaly;
mod decision;
mod narrative;
mod record;
mod result;
mod summary;
mod validation;

pub use anomaly::{AnomalyCategory, AnomalyMap, AnomalySeverity, CategoryFinding, PriorityItem};
pub use decision::{Decision, DecisionCategory, DecisionRecord, Impact, OverallPriority, Priority};
pub use narrative::{Narrative, NarrativeMode};
pub use record::{Column, ColumnPresence, DataProfile, Kpi, MachineDataset, MachineRecord, RiskCategory};
pub use result::{CleaningReport, PipelineResult, RunStatus};
pub use summary::{AnalysisSummary, MachineAge, MetricCorrelation, TrendIndicators};
pub use validation::{
    GateState, NarrativeValidation, ReportValidation, ValidationEntry, ValidationHistory,
    ValidationReport, ValidationSummary,
};
