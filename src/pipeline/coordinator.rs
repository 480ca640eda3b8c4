//! Pipeline Coordinator - staged batch-analysis sequence.
//!
//! This module implements the processing sequence for one telemetry batch:
//!
//! ```text
//! STAGE 1: Ingest (profile the raw batch)
//! STAGE 2: Raw Validation (HARD gate: abort on failure)
//! STAGE 3: Cleaning
//! STAGE 4: Processed Validation (SOFT gate: warn and continue)
//! STAGE 5: KPI Computation
//! STAGE 6: Fleet Analysis (aggregate summary)
//! STAGE 7: Anomaly Detection
//! STAGE 8: Enrichment (reasoning / debate / planning, each optional)
//! STAGE 9: Narrative + Quality Gate (bounded retry)
//! STAGE 10: Decision Synthesis
//! STAGE 11: Report Assembly + Final Gate (bounded retry)
//! ```
//!
//! The gate asymmetry in stages 2 and 4 is intentional: pre-cleaning issues
//! are fatal, post-cleaning issues are informational. Both retry loops share
//! the bounded combinator in [`super::retry`]; exhaustion never blocks the
//! run: the unresolved failure is surfaced in the traceability history and
//! the report carries an explicit marker.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::context::{self, EnrichmentContext};
use super::retry;
use crate::agents::{
    AnomalyDetector, DataCleaner, DataValidator, FleetAnalyzer, MetricEngine,
    NarrativeSynthesizer, OutputValidator, ReportComposer, RuleBasedAdvisor,
};
use crate::config::defaults::MAX_VALIDATION_ATTEMPTS;
use crate::error::StageFailure;
use crate::llm::TextGenerator;
use crate::types::{
    GateState, MachineDataset, PipelineResult, RunStatus, ValidationHistory,
};

/// Per-run feature toggles and budgets.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub enable_reasoning: bool,
    pub enable_debate: bool,
    pub enable_planning: bool,
    /// Retry budget shared by the narrative and report quality gates
    pub max_validation_attempts: u32,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            enable_reasoning: true,
            enable_debate: true,
            enable_planning: true,
            max_validation_attempts: MAX_VALIDATION_ATTEMPTS,
        }
    }
}

/// Cumulative coordinator statistics across runs.
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    pub runs_completed: u64,
    pub runs_failed: u64,
    pub narrative_retries: u64,
    pub report_retries: u64,
}

impl std::fmt::Display for PipelineStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Pipeline: {} runs completed, {} failed, {} narrative retries, {} report retries",
            self.runs_completed, self.runs_failed, self.narrative_retries, self.report_retries
        )
    }
}

/// Sequences all stages for one batch and owns the retry loops around the
/// quality gates. All per-run state (dataset, history, gate counters) is
/// local to `run`, so independent runs can execute concurrently as long as
/// each owns its coordinator.
pub struct PipelineCoordinator {
    validator: DataValidator,
    cleaner: DataCleaner,
    metrics: MetricEngine,
    analyzer: FleetAnalyzer,
    detector: AnomalyDetector,
    synthesizer: NarrativeSynthesizer,
    quality: OutputValidator,
    advisor: RuleBasedAdvisor,
    composer: ReportComposer,
    options: PipelineOptions,
    stats: PipelineStats,
}

impl PipelineCoordinator {
    /// Create a coordinator with an optional text-generation backend.
    ///
    /// Without a backend the narrative stage always uses the deterministic
    /// fallback.
    pub fn new(generator: Option<Arc<dyn TextGenerator>>) -> Self {
        Self::with_options(generator, PipelineOptions::default())
    }

    pub fn with_options(
        generator: Option<Arc<dyn TextGenerator>>,
        options: PipelineOptions,
    ) -> Self {
        info!(
            reasoning = options.enable_reasoning,
            debate = options.enable_debate,
            planning = options.enable_planning,
            retry_budget = options.max_validation_attempts,
            "Initializing pipeline coordinator"
        );
        Self {
            validator: DataValidator::new(),
            cleaner: DataCleaner::new(),
            metrics: MetricEngine::new(),
            analyzer: FleetAnalyzer::new(),
            detector: AnomalyDetector::new(),
            synthesizer: NarrativeSynthesizer::new(generator),
            quality: OutputValidator::new(),
            advisor: RuleBasedAdvisor::new(),
            composer: ReportComposer::new(),
            options,
            stats: PipelineStats::default(),
        }
    }

    /// Load a CSV batch and run the pipeline on it.
    ///
    /// Loader failures are fatal input errors: no stages run and the result
    /// carries the failure verbatim.
    pub async fn run_file(&mut self, path: &Path) -> PipelineResult {
        match crate::acquisition::load_csv(path) {
            Ok(dataset) => self.run(dataset).await,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Batch load failed");
                let mut result = PipelineResult::pending();
                result.status = RunStatus::Failed;
                result.errors.push(StageFailure::new("load", e.to_string()));
                self.stats.runs_failed += 1;
                result
            }
        }
    }

    /// Run the full pipeline on an owned batch.
    pub async fn run(&mut self, dataset: MachineDataset) -> PipelineResult {
        self.run_with_cancel(dataset, &CancellationToken::new())
            .await
    }

    /// Run the pipeline, checking for caller cancellation at stage
    /// boundaries. Cancellation never interrupts a stage mid-flight.
    pub async fn run_with_cancel(
        &mut self,
        mut dataset: MachineDataset,
        cancel: &CancellationToken,
    ) -> PipelineResult {
        let run_start = Instant::now();
        let mut result = PipelineResult::pending();
        let mut history = ValidationHistory::new();

        // STAGE 1: Ingest
        result.profile = Some(dataset.profile.clone());
        history.record(
            "ingest",
            true,
            format!("Loaded {} rows", dataset.len()),
            Vec::new(),
            1,
        );
        result.stages_completed.push("ingest".into());
        debug!(rows = dataset.len(), "Stage 1: batch ingested");

        // STAGE 2: Raw validation, the hard gate.
        let raw = self.validator.validate_raw(&dataset);
        history.record(
            "raw_validation",
            raw.valid,
            format!("Raw data validation ({} warnings)", raw.warnings.len()),
            raw.issues.clone(),
            1,
        );
        if !raw.valid {
            // Abort: no further stages, no report. Issues surface verbatim.
            result.status = RunStatus::Failed;
            result
                .errors
                .push(StageFailure::with_issues("raw_validation", "raw data validation failed", raw.issues));
            result.validation_history = history;
            self.stats.runs_failed += 1;
            return result;
        }
        result.stages_completed.push("raw_validation".into());

        if self.abort_if_cancelled(cancel, "cleaning", &mut result, &history) {
            return result;
        }

        // STAGE 3: Cleaning
        let cleaning = self.cleaner.clean(&mut dataset);
        result.cleaning = Some(cleaning);
        result.stages_completed.push("cleaning".into());

        // STAGE 4: Processed validation, the soft gate. A failure here is
        // recorded and logged but the pipeline continues; residual issues
        // after cleaning are informational.
        let processed = self.validator.validate_processed(&dataset);
        history.record(
            "processed_validation",
            processed.valid,
            format!("Post-cleaning validation ({} warnings)", processed.warnings.len()),
            processed.issues.clone(),
            1,
        );
        if !processed.valid {
            warn!(issues = ?processed.issues, "Post-cleaning validation flagged issues — continuing");
        }
        result.stages_completed.push("processed_validation".into());
        result.row_count = dataset.len();

        if self.abort_if_cancelled(cancel, "kpi_computation", &mut result, &history) {
            return result;
        }

        // STAGE 5: KPI computation
        let kpis = self.metrics.compute(&mut dataset);
        debug!(kpis = ?kpis, "Stage 5: KPIs computed");
        result.stages_completed.push("kpi_computation".into());

        // STAGE 6: Aggregate analysis
        let summary = self.analyzer.analyze(&dataset);
        result.stages_completed.push("analysis".into());

        // STAGE 7: Anomaly detection
        let anomalies = self.detector.detect(&dataset);
        result.stages_completed.push("anomaly_detection".into());

        if self.abort_if_cancelled(cancel, "enrichment", &mut result, &history) {
            result.summary = Some(summary);
            result.anomalies = Some(anomalies);
            return result;
        }

        // STAGE 8: Enrichment: each stage extends the context it received,
        // never mutating prior additions.
        let mut ctx = EnrichmentContext::new();
        if self.options.enable_reasoning {
            ctx = ctx.with_reasoning(context::reason(&summary, &anomalies));
            result.stages_completed.push("reasoning".into());
        }
        if self.options.enable_debate {
            ctx = ctx.with_debate(context::debate(&summary, &anomalies));
            result.stages_completed.push("debate".into());
        }
        if self.options.enable_planning {
            ctx = ctx.with_plan(context::plan(&summary, &anomalies));
            result.stages_completed.push("planning".into());
        }

        // STAGE 9: Narrative synthesis under its quality gate. Each retry
        // re-derives the prompt from the current context; the synthesizer
        // itself never retries.
        let narrative_outcome = {
            let synthesizer = &self.synthesizer;
            let quality = &self.quality;
            retry::run_gated(
                "narrative_quality",
                self.options.max_validation_attempts,
                &mut history,
                |_attempt| synthesizer.synthesize(&summary, &anomalies, &ctx),
                |narrative| quality.validate_narrative(narrative, &summary),
            )
            .await
        };
        self.stats.narrative_retries += u64::from(narrative_outcome.attempts - 1);
        let narrative = narrative_outcome.artifact;
        let narrative_valid = narrative_outcome.verdict.valid;
        result.narrative_validation = Some(narrative_outcome.verdict);
        result.narrative_gate = narrative_outcome.state;
        result.stages_completed.push("narrative".into());

        if self.abort_if_cancelled(cancel, "decision", &mut result, &history) {
            result.summary = Some(summary);
            result.anomalies = Some(anomalies);
            result.narrative = Some(narrative);
            return result;
        }

        // STAGE 10: Decision synthesis
        let decisions = self
            .advisor
            .decide(&summary, &anomalies, &narrative, narrative_valid);
        result.stages_completed.push("decision".into());

        // STAGE 11: Report assembly under the final gate. Re-assembly inside
        // the loop reads a pre-gate history snapshot; the published report is
        // re-composed afterwards with the complete history so traceability
        // stays whole.
        let report_outcome = {
            let composer = &self.composer;
            let quality = &self.quality;
            let snapshot = history.clone();
            retry::run_gated(
                "report_validation",
                self.options.max_validation_attempts,
                &mut history,
                |_attempt| {
                    let report = composer.compose(
                        &summary, &anomalies, &narrative, &decisions, &snapshot, &ctx, false,
                    );
                    async move { report }
                },
                |report| quality.validate_report(report, &decisions),
            )
            .await
        };
        self.stats.report_retries += u64::from(report_outcome.attempts - 1);

        let validation_incomplete = report_outcome.state == GateState::Invalid;
        if validation_incomplete {
            warn!("Report gate exhausted — publishing with validation-incomplete marker");
        }
        let report = self.composer.compose(
            &summary,
            &anomalies,
            &narrative,
            &decisions,
            &history,
            &ctx,
            validation_incomplete,
        );

        result.report_validation = Some(report_outcome.verdict);
        result.report_gate = report_outcome.state;
        result.report = Some(report);
        result.stages_completed.push("report".into());

        // Complete. Gate exhaustion does not demote the run: producing a
        // report always wins over blocking, and the unresolved failure stays
        // on record.
        result.summary = Some(summary);
        result.anomalies = Some(anomalies);
        result.narrative = Some(narrative);
        result.decisions = Some(decisions);
        result.validation_history = history;
        result.status = RunStatus::Success;
        self.stats.runs_completed += 1;

        info!(
            elapsed_ms = run_start.elapsed().as_millis(),
            machines = result.row_count,
            stages = result.stages_completed.len(),
            validations = result.validation_history.len(),
            "Pipeline run complete"
        );

        result
    }

    /// Check the cancellation token at a stage boundary.
    fn abort_if_cancelled(
        &mut self,
        cancel: &CancellationToken,
        next_stage: &str,
        result: &mut PipelineResult,
        history: &ValidationHistory,
    ) -> bool {
        if !cancel.is_cancelled() {
            return false;
        }
        warn!(next_stage, "Run cancelled at stage boundary");
        result.status = RunStatus::Error;
        result.errors.push(StageFailure::cancelled(next_stage));
        result.validation_history = history.clone();
        self.stats.runs_failed += 1;
        true
    }

    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ColumnPresence, MachineRecord};

    fn healthy_batch(n: usize) -> MachineDataset {
        let machines = (0..n)
            .map(|i| {
                let f = f64::from(u32::try_from(i).unwrap_or(0));
                MachineRecord {
                    machine_id: format!("M{i:04}"),
                    machine_type: "CNC".to_string(),
                    installation_year: Some(2018.0),
                    operational_hours: Some(5000.0 + f * 20.0),
                    temperature_c: Some(40.0 + f.rem_euclid(10.0)),
                    vibration_mms: Some(1.0 + f.rem_euclid(5.0) * 0.1),
                    sound_db: Some(62.0 + f.rem_euclid(8.0)),
                    power_consumption_kw: Some(30.0 + f.rem_euclid(12.0)),
                    last_maintenance_days_ago: Some(40.0 + f.rem_euclid(30.0)),
                    maintenance_history_count: Some(8.0),
                    failure_history_count: Some(f.rem_euclid(3.0)),
                    error_codes_last_30_days: Some(f.rem_euclid(4.0)),
                    ai_override_events: Some(2.0),
                    ..Default::default()
                }
            })
            .collect();
        MachineDataset::from_records(machines, ColumnPresence::all())
    }

    #[tokio::test]
    async fn small_batch_fails_at_the_hard_gate_with_no_report() {
        let mut coordinator = PipelineCoordinator::new(None);
        let result = coordinator.run(healthy_batch(4)).await;

        assert_eq!(result.status, RunStatus::Failed);
        assert!(result.report.is_none());
        assert!(result.summary.is_none());
        assert!(result.errors[0].issues[0].contains("Insufficient data"));
        // Ingest and the failed gate are both on record.
        assert_eq!(result.validation_history.len(), 2);
    }

    #[tokio::test]
    async fn healthy_batch_completes_all_stages() {
        let mut coordinator = PipelineCoordinator::new(None);
        let result = coordinator.run(healthy_batch(40)).await;

        assert_eq!(result.status, RunStatus::Success);
        assert!(result.report.is_some());
        assert!(result.summary.is_some());
        assert!(result.anomalies.is_some());
        assert!(result.decisions.is_some());
        let stages = &result.stages_completed;
        for stage in [
            "ingest",
            "raw_validation",
            "cleaning",
            "processed_validation",
            "kpi_computation",
            "analysis",
            "anomaly_detection",
            "reasoning",
            "debate",
            "planning",
            "narrative",
            "decision",
            "report",
        ] {
            assert!(stages.iter().any(|s| s == stage), "missing stage {stage}");
        }
    }

    #[tokio::test]
    async fn disabled_enrichment_stages_are_skipped() {
        let options = PipelineOptions {
            enable_reasoning: false,
            enable_debate: false,
            enable_planning: false,
            ..Default::default()
        };
        let mut coordinator = PipelineCoordinator::with_options(None, options);
        let result = coordinator.run(healthy_batch(30)).await;

        assert_eq!(result.status, RunStatus::Success);
        assert!(!result.stages_completed.iter().any(|s| s == "reasoning"));
        assert!(!result.stages_completed.iter().any(|s| s == "debate"));
        assert!(!result.stages_completed.iter().any(|s| s == "planning"));
    }

    #[tokio::test]
    async fn pre_cancelled_run_stops_at_the_first_boundary() {
        let mut coordinator = PipelineCoordinator::new(None);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = coordinator
            .run_with_cancel(healthy_batch(30), &cancel)
            .await;
        assert_eq!(result.status, RunStatus::Error);
        assert!(result.report.is_none());
        assert!(result.errors[0].message.contains("cancelled"));
    }

    #[tokio::test]
    async fn every_validation_is_traceable() {
        let mut coordinator = PipelineCoordinator::new(None);
        let result = coordinator.run(healthy_batch(40)).await;

        let stages: Vec<&str> = result
            .validation_history
            .entries()
            .iter()
            .map(|e| e.stage.as_str())
            .collect();
        assert!(stages.contains(&"ingest"));
        assert!(stages.contains(&"raw_validation"));
        assert!(stages.contains(&"processed_validation"));
        assert!(stages.contains(&"narrative_quality"));
        assert!(stages.contains(&"report_validation"));
    }

    #[tokio::test]
    async fn fallback_narrative_closes_the_gate_in_one_attempt() {
        let mut coordinator = PipelineCoordinator::new(None);
        let result = coordinator.run(healthy_batch(40)).await;

        let narrative_entries: Vec<_> = result
            .validation_history
            .entries()
            .iter()
            .filter(|e| e.stage == "narrative_quality")
            .collect();
        assert_eq!(narrative_entries.len(), 1, "no retry on deterministic fallback");
        assert_eq!(coordinator.stats().narrative_retries, 0);
    }

    #[tokio::test]
    async fn missing_file_surfaces_as_failed_load() {
        let mut coordinator = PipelineCoordinator::new(None);
        let result = coordinator.run_file(Path::new("/nonexistent/batch.csv")).await;
        assert_eq!(result.status, RunStatus::Failed);
        assert_eq!(result.errors[0].stage, "load");
    }
}
