//! Fleet-Insight: industrial fleet telemetry analysis.
//!
//! Batch pipeline over tabular machine telemetry: derived KPI computation,
//! statistical anomaly detection, rule-based decision synthesis, narrative
//! report generation with an optional LLM backend, and dual quality gates
//! with bounded retry and full validation traceability.
//!
//! ## Architecture
//!
//! - **Agents**: one component per transformation stage (validation,
//!   cleaning, metrics, analysis, anomaly detection, decisions, narrative,
//!   quality gates, report assembly)
//! - **Pipeline**: the coordinator sequencing all stages, with the bounded
//!   retry combinator and the per-run enrichment context
//! - **LLM**: the injected text-generation capability with timeout and
//!   deterministic fallback

pub mod acquisition;
pub mod agents;
pub mod api;
pub mod config;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod types;

// Re-export the analysis configuration
pub use config::AnalysisConfig;

// Re-export commonly used types
pub use types::{
    AnalysisSummary, AnomalyCategory, AnomalyMap, DecisionRecord, MachineDataset, MachineRecord,
    Narrative, NarrativeMode, OverallPriority, PipelineResult, RiskCategory, RunStatus,
    ValidationHistory,
};

// Re-export pipeline entry points
pub use pipeline::{PipelineCoordinator, PipelineOptions};

// Re-export the generation capability
pub use llm::{GeminiClient, GenerationError, TextGenerator};

// Re-export errors
pub use error::{LoadError, StageFailure};
