//! Narrative Synthesizer - human-readable insight text.
//!
//! Makes exactly one call per invocation to the external text-generation
//! capability, bounded by a timeout. Any failure falls back to a deterministic
//! templated narrative built purely from the numeric summary; the fallback
//! carries the same structural sections as generated text and can stand alone
//! as the report's analysis content. Retrying is the coordinator's job, so a
//! later attempt re-derives the prompt from current context.

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::{self, LlmConfig};
use crate::llm::{GenerationError, TextGenerator};
use crate::pipeline::context::EnrichmentContext;
use crate::types::{AnalysisSummary, AnomalyCategory, AnomalyMap, Narrative};

pub struct NarrativeSynthesizer {
    generator: Option<Arc<dyn TextGenerator>>,
    config: LlmConfig,
}

impl NarrativeSynthesizer {
    pub fn new(generator: Option<Arc<dyn TextGenerator>>) -> Self {
        Self {
            generator,
            config: config::get().llm.clone(),
        }
    }

    pub fn with_config(generator: Option<Arc<dyn TextGenerator>>, config: LlmConfig) -> Self {
        Self { generator, config }
    }

    /// Produce narrative text for the current analysis state.
    pub async fn synthesize(
        &self,
        summary: &AnalysisSummary,
        anomalies: &AnomalyMap,
        context: &EnrichmentContext,
    ) -> Narrative {
        let Some(generator) = &self.generator else {
            info!("No text-generation backend configured — using fallback narrative");
            return Narrative::fallback(fallback_narrative(summary, anomalies));
        };

        let prompt = build_prompt(summary, anomalies, context);
        let deadline = Duration::from_secs(self.config.timeout_secs);

        let outcome = match tokio::time::timeout(deadline, generator.generate(&prompt)).await {
            Ok(result) => result,
            Err(_) => Err(GenerationError::Timeout(self.config.timeout_secs)),
        };

        match outcome {
            Ok(text) => {
                info!(chars = text.len(), model = generator.model_name(), "Narrative generated");
                Narrative::generated(text, generator.model_name())
            }
            Err(e) => {
                // Provider detail stays in the logs; the narrative never
                // carries it.
                warn!(error = %e, "Text generation failed — falling back to templated narrative");
                Narrative::fallback(fallback_narrative(summary, anomalies))
            }
        }
    }
}

// ============================================================================
// Prompt
// ============================================================================

fn build_prompt(
    summary: &AnalysisSummary,
    anomalies: &AnomalyMap,
    context: &EnrichmentContext,
) -> String {
    let mut prompt = format!(
        "You are an expert in industrial operations and predictive maintenance. \
         Analyze this fleet telemetry summary and provide actionable insights.\n\n\
         ## PERFORMANCE DATA\n\n\
         ### Fleet KPIs:\n\
         - Total machines: {}\n\
         - Average utilization: {}\n\
         - Average energy efficiency: {}\n\
         - Average health score: {}\n\
         - Critical machines: {}/{}\n\n\
         ### Detected anomalies:\n\
         - High temperatures: {} machines\n\
         - High vibration: {} machines\n\
         - Energy spikes: {} machines\n\
         - Idle machines: {} machines\n\
         - Maintenance overdue: {} machines\n",
        summary.total_machines,
        summary
            .avg_utilization
            .map_or_else(|| "n/a".into(), |v| format!("{:.1}%", v * 100.0)),
        summary
            .avg_energy_efficiency
            .map_or_else(|| "n/a".into(), |v| format!("{v:.2} kW/h")),
        summary
            .avg_health_score
            .map_or_else(|| "n/a".into(), |v| format!("{v:.1}/100")),
        summary.critical_machine_count,
        summary.total_machines,
        anomalies.count(AnomalyCategory::HighTemperature),
        anomalies.count(AnomalyCategory::HighVibration),
        anomalies.count(AnomalyCategory::EnergySpike),
        anomalies.count(AnomalyCategory::ZeroUtilization),
        anomalies.count(AnomalyCategory::MaintenanceOverdue),
    );

    if !summary.risk_distribution.is_empty() {
        prompt.push_str("\n### Risk distribution:\n");
        for (category, count) in &summary.risk_distribution {
            prompt.push_str(&format!("- {category}: {count}\n"));
        }
    }

    if let Some(reasoning) = context.reasoning() {
        prompt.push_str(&format!(
            "\n### Prior reasoning (confidence {}):\n",
            reasoning.confidence
        ));
        for finding in &reasoning.findings {
            prompt.push_str(&format!("- {finding}\n"));
        }
    }
    if let Some(debate) = context.debate() {
        prompt.push_str(&format!("\n### Operational consensus:\n{}\n", debate.consensus));
    }
    if let Some(plan) = context.plan() {
        prompt.push_str(&format!("\n### Draft plan goal:\n{}\n", plan.goal));
    }

    prompt.push_str(
        "\n## ANALYSIS TASK:\n\n\
         Provide a structured analysis with:\n\n\
         ### 1. OVERALL DIAGNOSTIC (2-3 sentences)\n\
         Summarize the general condition of the machine fleet.\n\n\
         ### 2. MAJOR PROBLEMS (3 priority problems)\n\
         For each: description, estimated production impact, machines concerned.\n\n\
         ### 3. RECOMMENDED ACTIONS (5 concrete actions)\n\
         For each: specific measurable action, priority (URGENT/HIGH/MEDIUM), \
         expected impact, implementation delay.\n\n\
         ### 4. FORECAST AND RISKS\n\
         Short-term risks (7 days), medium-term risks (30 days), indicators to watch.\n\n\
         ### 5. CONCLUSION\n\
         Two or three sentences with the key message for management.\n\n\
         Be precise, actionable, and use the numbers provided.",
    );

    prompt
}

// ============================================================================
// Fallback template
// ============================================================================

/// Deterministic narrative with the same structural sections as generated
/// text: diagnostic, problems, recommended actions, watch indicators,
/// conclusion.
fn fallback_narrative(summary: &AnalysisSummary, anomalies: &AnomalyMap) -> String {
    let total = summary.total_machines;
    let critical = summary.critical_machine_count;
    let utilization = summary.avg_utilization.unwrap_or(0.0);
    let health = summary.avg_health_score.unwrap_or(50.0);
    let critical_pct = if total > 0 {
        critical as f64 / total as f64 * 100.0
    } else {
        0.0
    };

    let condition = if critical as f64 > total as f64 * 0.3 || health < 50.0 {
        "CRITICAL"
    } else if critical as f64 > total as f64 * 0.15 || health < 70.0 {
        "ATTENTION REQUIRED"
    } else {
        "NORMAL"
    };

    let mut text = format!(
        "===========================================================\n\
         FLEET PERFORMANCE ANALYSIS (rule-based mode)\n\
         ===========================================================\n\n\
         OVERALL DIAGNOSTIC\n\
         ------------------\n\
         Fleet condition: {condition}\n\
         - {total} machines analyzed\n\
         - {critical} machines in critical condition ({critical_pct:.1}% of fleet)\n\
         - Average utilization: {:.1}%\n\
         - Average health score: {health:.1}/100\n\n\
         PROBLEMS IDENTIFIED\n\
         -------------------\n",
        utilization * 100.0,
    );

    let mut problems = Vec::new();
    let high_temp = anomalies.count(AnomalyCategory::HighTemperature);
    if high_temp > 0 {
        problems.push(format!(
            "{}. OVERHEATING: {high_temp} machines with abnormal temperature",
            problems.len() + 1
        ));
    }
    let high_vib = anomalies.count(AnomalyCategory::HighVibration);
    if high_vib > 0 {
        problems.push(format!(
            "{}. VIBRATION: {high_vib} machines with excessive vibration",
            problems.len() + 1
        ));
    }
    let overdue = anomalies.count(AnomalyCategory::MaintenanceOverdue);
    if overdue > 0 {
        problems.push(format!(
            "{}. MAINTENANCE: {overdue} machines past their service window",
            problems.len() + 1
        ));
    }
    let idle = anomalies.count(AnomalyCategory::ZeroUtilization);
    if idle > 0 {
        problems.push(format!(
            "{}. STOPPAGE: {idle} machines fully idle",
            problems.len() + 1
        ));
    }
    if problems.is_empty() {
        text.push_str("No major problem detected.\n");
    } else {
        text.push_str(&problems.join("\n"));
        text.push('\n');
    }

    text.push_str(&format!(
        "\nRECOMMENDED ACTIONS\n\
         -------------------\n\
         1. [URGENT] Inspect machines with thermal anomalies immediately\n\
         2. [HIGH] Schedule maintenance for the {overdue} machines past their window\n\
         3. [HIGH] Run vibration diagnostics on flagged machines\n\
         4. [MEDIUM] Investigate the causes of low utilization rates\n\
         5. [MEDIUM] Put reinforced monitoring in place for the critical group\n\n\
         INDICATORS TO WATCH\n\
         -------------------\n\
         - Utilization rate trend (target: above 70%)\n\
         - Critical machine count (target: below 10% of fleet)\n\
         - Mean time between service visits\n\
         - Energy draw per machine\n\n\
         CONCLUSION\n\
         ----------\n\
         The fleet requires {} attention as a priority. Addressing the {critical} \
         critical machines restores production capacity and protects overall \
         equipment health. Estimated productivity recovery: {:.0}%.\n\n\
         ===========================================================\n\
         Report generated automatically\n\
         ===========================================================\n",
        if condition == "CRITICAL" { "IMMEDIATE" } else { "sustained" },
        (critical_pct * 0.5).min(20.0),
    ));

    text
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct EchoGenerator;

    #[async_trait]
    impl TextGenerator for EchoGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
            Ok("Structured diagnostic with recommended urgent actions for fleet health.".into())
        }
        fn model_name(&self) -> &str {
            "echo-model"
        }
    }

    struct DownGenerator;

    #[async_trait]
    impl TextGenerator for DownGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
            Err(GenerationError::ServiceUnavailable("connection refused".into()))
        }
        fn model_name(&self) -> &str {
            "down-model"
        }
    }

    fn summary() -> AnalysisSummary {
        AnalysisSummary {
            total_machines: 40,
            critical_machine_count: 4,
            avg_utilization: Some(0.55),
            avg_health_score: Some(72.0),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn no_backend_always_falls_back_with_nonempty_text() {
        let synthesizer =
            NarrativeSynthesizer::with_config(None, crate::config::LlmConfig::default());
        let narrative = synthesizer
            .synthesize(&summary(), &AnomalyMap::new(), &EnrichmentContext::new())
            .await;
        assert!(narrative.is_fallback());
        assert!(!narrative.text.is_empty());
    }

    #[tokio::test]
    async fn backend_failure_falls_back_without_leaking_error_detail() {
        let synthesizer = NarrativeSynthesizer::with_config(
            Some(Arc::new(DownGenerator)),
            crate::config::LlmConfig::default(),
        );
        let narrative = synthesizer
            .synthesize(&summary(), &AnomalyMap::new(), &EnrichmentContext::new())
            .await;
        assert!(narrative.is_fallback());
        assert!(!narrative.text.contains("connection refused"));
    }

    #[tokio::test]
    async fn successful_generation_is_tagged_with_the_model() {
        let synthesizer = NarrativeSynthesizer::with_config(
            Some(Arc::new(EchoGenerator)),
            crate::config::LlmConfig::default(),
        );
        let narrative = synthesizer
            .synthesize(&summary(), &AnomalyMap::new(), &EnrichmentContext::new())
            .await;
        assert!(!narrative.is_fallback());
        assert_eq!(narrative.model.as_deref(), Some("echo-model"));
    }

    #[test]
    fn fallback_carries_all_structural_sections() {
        let text = fallback_narrative(&summary(), &AnomalyMap::new());
        for section in [
            "OVERALL DIAGNOSTIC",
            "PROBLEMS IDENTIFIED",
            "RECOMMENDED ACTIONS",
            "INDICATORS TO WATCH",
            "CONCLUSION",
        ] {
            assert!(text.contains(section), "missing section {section}");
        }
        assert!(text.len() > 100);
    }

    #[test]
    fn fallback_escalates_wording_for_degraded_fleets() {
        let mut bad = summary();
        bad.critical_machine_count = 20;
        bad.avg_health_score = Some(35.0);
        let text = fallback_narrative(&bad, &AnomalyMap::new());
        assert!(text.contains("CRITICAL"));
        assert!(text.contains("IMMEDIATE"));
    }

    #[test]
    fn prompt_includes_enrichment_additions() {
        let ctx = EnrichmentContext::new().with_reasoning(crate::pipeline::context::ReasoningDigest {
            findings: vec!["aging fleet drives degradation".into()],
            confidence: crate::pipeline::context::Confidence::High,
        });
        let prompt = build_prompt(&summary(), &AnomalyMap::new(), &ctx);
        assert!(prompt.contains("aging fleet drives degradation"));
        assert!(prompt.contains("RECOMMENDED ACTIONS"));
    }
}
