//! Per-run enrichment context.
//!
//! Optional analysis stages (reasoning, debate, planning) run between anomaly
//! detection and narrative synthesis. Each stage receives the context built so
//! far and returns a new context extended with its own typed addition; nothing
//! it receives is ever mutated. Downstream consumers (narrative prompt, report
//! sections) read whatever additions are present.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::{AnalysisSummary, AnomalyCategory, AnomalyMap};

/// Confidence attached to the reasoning digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "LOW"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::High => write!(f, "HIGH"),
        }
    }
}

/// Stepwise findings about probable root causes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningDigest {
    pub findings: Vec<String>,
    pub confidence: Confidence,
}

/// Competing operational viewpoints and where they converge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebateDigest {
    pub perspectives: Vec<String>,
    pub consensus: String,
}

/// Outline of a phased remediation plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionPlanOutline {
    pub goal: String,
    pub phases: Vec<String>,
    pub success_metrics: Vec<String>,
}

/// Immutable accumulation of stage additions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnrichmentContext {
    reasoning: Option<ReasoningDigest>,
    debate: Option<DebateDigest>,
    plan: Option<ActionPlanOutline>,
}

impl EnrichmentContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extend with a reasoning digest, returning the new context.
    #[must_use]
    pub fn with_reasoning(mut self, digest: ReasoningDigest) -> Self {
        self.reasoning = Some(digest);
        self
    }

    #[must_use]
    pub fn with_debate(mut self, digest: DebateDigest) -> Self {
        self.debate = Some(digest);
        self
    }

    #[must_use]
    pub fn with_plan(mut self, plan: ActionPlanOutline) -> Self {
        self.plan = Some(plan);
        self
    }

    pub fn reasoning(&self) -> Option<&ReasoningDigest> {
        self.reasoning.as_ref()
    }

    pub fn debate(&self) -> Option<&DebateDigest> {
        self.debate.as_ref()
    }

    pub fn plan(&self) -> Option<&ActionPlanOutline> {
        self.plan.as_ref()
    }
}

// ============================================================================
// Enrichment stages
// ============================================================================

/// Derive stepwise root-cause findings from the numeric picture.
pub fn reason(summary: &AnalysisSummary, anomalies: &AnomalyMap) -> ReasoningDigest {
    let mut findings = Vec::new();

    let overdue = anomalies.count(AnomalyCategory::MaintenanceOverdue);
    let critical_health = summary.machines_critical_health.len();
    if overdue > 0 && critical_health > 0 {
        findings.push(format!(
            "Maintenance backlog ({overdue} machines) coincides with {critical_health} machines in critical health; deferred servicing is the most likely driver"
        ));
    }

    let high_temp = anomalies.count(AnomalyCategory::HighTemperature);
    let high_vib = anomalies.count(AnomalyCategory::HighVibration);
    if high_temp > 0 && high_vib > 0 {
        findings.push(format!(
            "Thermal ({high_temp}) and vibration ({high_vib}) outliers overlap, pointing at mechanical wear rather than ambient conditions"
        ));
    }

    let idle = anomalies.count(AnomalyCategory::ZeroUtilization);
    if idle > 0 {
        findings.push(format!(
            "{idle} idle machines depress fleet utilization; verify whether stoppages are planned"
        ));
    }

    if let Some(corr) = summary
        .key_correlations
        .iter()
        .find(|c| c.pair == "Machine_Age_vs_Health_Score")
    {
        if corr.r < -0.3 {
            findings.push(format!(
                "Health degrades with machine age (r = {:.2}); prioritize the oldest units",
                corr.r
            ));
        }
    }

    if findings.is_empty() {
        findings.push("No compounding failure pattern identified; readings are within expected spread".to_string());
    }

    let confidence = if summary.total_machines >= 50 && findings.len() >= 2 {
        Confidence::High
    } else if summary.total_machines >= 20 {
        Confidence::Medium
    } else {
        Confidence::Low
    };

    debug!(findings = findings.len(), confidence = %confidence, "Reasoning stage complete");
    ReasoningDigest { findings, confidence }
}

/// Contrast the maintenance, production, and finance viewpoints.
pub fn debate(summary: &AnalysisSummary, anomalies: &AnomalyMap) -> DebateDigest {
    let overdue = anomalies.count(AnomalyCategory::MaintenanceOverdue);
    let critical = summary.critical_machine_count;
    let avg_health = summary.avg_health_score.unwrap_or(100.0);

    let perspectives = vec![
        format!(
            "Maintenance: service the {overdue} overdue machines first; every deferred visit raises failure risk"
        ),
        format!(
            "Production: {critical} underutilized machines are the capacity bottleneck; restore throughput before deep maintenance"
        ),
        format!(
            "Finance: target interventions by health score (fleet average {avg_health:.0}/100) to cap unplanned downtime cost"
        ),
    ];

    let consensus = if overdue > critical {
        "Converge on maintenance-first: clearing the service backlog addresses both reliability and the utilization shortfall".to_string()
    } else {
        "Converge on utilization-first: reactivate idle capacity, folding maintenance visits into the restart schedule".to_string()
    };

    debug!("Debate stage complete");
    DebateDigest { perspectives, consensus }
}

/// Sketch a phased remediation plan from the dominant findings.
pub fn plan(summary: &AnalysisSummary, anomalies: &AnomalyMap) -> ActionPlanOutline {
    let mut phases = Vec::new();

    let multi = anomalies.count(AnomalyCategory::MultiFactorCritical);
    if multi > 0 {
        phases.push(format!(
            "Phase 1 - Stabilize: inspect the {multi} multi-factor critical machines within 48 hours"
        ));
    }
    let overdue = anomalies.count(AnomalyCategory::MaintenanceOverdue);
    if overdue > 0 {
        phases.push(format!(
            "Phase {} - Recover: clear the maintenance backlog ({overdue} machines) over the next two weeks",
            phases.len() + 1
        ));
    }
    phases.push(format!(
        "Phase {} - Sustain: institute weekly KPI review against the current baseline",
        phases.len() + 1
    ));

    let success_metrics = vec![
        "Average health score above 70/100".to_string(),
        "Zero machines past the critical maintenance threshold".to_string(),
        "Fleet utilization above 60%".to_string(),
    ];

    debug!(phases = phases.len(), "Planning stage complete");
    ActionPlanOutline {
        goal: format!(
            "Reduce the critical-machine count below {} while holding utilization",
            (summary.total_machines / 10).max(1)
        ),
        phases,
        success_metrics,
    }
}

// ============================================================================
// Tests
// ============================================================================
