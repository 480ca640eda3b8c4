//! Rule-Based Advisor - converts analysis results into prioritized decisions.
//!
//! Every rule is evaluated independently and unconditionally: each match
//! appends a decision. The overall priority only ever escalates within a run
//! (Normal -> High -> Urgent), never downgrades, regardless of rule order.

use chrono::Utc;
use tracing::info;

use crate::config::{self, DecisionConfig};
use crate::config::defaults::MACHINE_ID_PREVIEW;
use crate::types::{
    AnalysisSummary, AnomalyCategory, AnomalyMap, Decision, DecisionCategory, DecisionRecord,
    Impact, Narrative, OverallPriority, Priority,
};

/// Produces the run's decision record from the summary, anomalies, and the
/// validated narrative.
pub struct RuleBasedAdvisor {
    config: DecisionConfig,
}

impl RuleBasedAdvisor {
    pub fn new() -> Self {
        Self::with_config(config::get().decision.clone())
    }

    pub fn with_config(config: DecisionConfig) -> Self {
        Self { config }
    }

    /// Evaluate all decision rules. The returned record is immutable.
    pub fn decide(
        &self,
        summary: &AnalysisSummary,
        anomalies: &AnomalyMap,
        narrative: &Narrative,
        narrative_valid: bool,
    ) -> DecisionRecord {
        let mut decisions = Vec::new();
        let mut priority = OverallPriority::Normal;
        let mut risk_factors = Vec::new();

        let total = summary.total_machines.max(1);

        // Critical-machine ratio across the fleet
        let critical_count = summary.critical_machine_count;
        let critical_ratio = summary.critical_ratio();
        if critical_ratio > self.config.critical_machine_ratio {
            decisions.push(Decision {
                action: format!(
                    "Launch fleet-wide maintenance campaign ({critical_count} critical machines, {:.0}% of fleet)",
                    critical_ratio * 100.0
                ),
                priority: Priority::P1,
                category: DecisionCategory::Maintenance,
                impact: Impact::High,
            });
            priority.escalate_to(OverallPriority::Urgent);
            risk_factors.push(format!("Critical machine ratio: {:.0}%", critical_ratio * 100.0));
        }

        // Temperature anomalies
        let high_temp = anomalies.count(AnomalyCategory::HighTemperature);
        if high_temp > self.config.high_temp_count {
            decisions.push(Decision {
                action: format!("Immediate cooling intervention ({high_temp} machines overheating)"),
                priority: Priority::P1,
                category: DecisionCategory::Safety,
                impact: Impact::High,
            });
            priority.escalate_to(OverallPriority::Urgent);
            risk_factors.push(format!("High temperature anomalies: {high_temp}"));
        } else if high_temp > 0 {
            decisions.push(Decision {
                action: format!("Monitor machine temperatures ({high_temp} machines elevated)"),
                priority: Priority::P2,
                category: DecisionCategory::Monitoring,
                impact: Impact::Medium,
            });
        }

        // Vibration anomalies
        let high_vib = anomalies.count(AnomalyCategory::HighVibration);
        if high_vib > self.config.vibration_count {
            decisions.push(Decision {
                action: format!("Vibration diagnostics required ({high_vib} machines)"),
                priority: Priority::P2,
                category: DecisionCategory::Diagnostic,
                impact: Impact::Medium,
            });
            risk_factors.push(format!("Vibration anomalies: {high_vib}"));
        }

        // Idle machines
        let idle = anomalies.machines_in(AnomalyCategory::ZeroUtilization);
        if !idle.is_empty() {
            let preview = idle
                .iter()
                .take(MACHINE_ID_PREVIEW)
                .cloned()
                .collect::<Vec<_>>()
                .join(", ");
            let suffix = if idle.len() > MACHINE_ID_PREVIEW { "..." } else { "" };
            decisions.push(Decision {
                action: format!("Inspect idle machines: {preview}{suffix}"),
                priority: Priority::P2,
                category: DecisionCategory::Operations,
                impact: Impact::Medium,
            });
        }

        // Maintenance backlog
        let overdue = anomalies.count(AnomalyCategory::MaintenanceOverdue);
        if overdue as f64 > total as f64 * self.config.maintenance_overdue_ratio {
            decisions.push(Decision {
                action: format!("Schedule urgent maintenance ({overdue} machines overdue)"),
                priority: Priority::P1,
                category: DecisionCategory::Maintenance,
                impact: Impact::High,
            });
            priority.escalate_to(OverallPriority::High);
        } else if overdue > 0 {
            decisions.push(Decision {
                action: format!("Plan maintenance window ({overdue} machines)"),
                priority: Priority::P3,
                category: DecisionCategory::Maintenance,
                impact: Impact::Low,
            });
        }

        // Narrative that failed quality validation needs a human pass
        if !narrative_valid {
            decisions.push(Decision {
                action: "AI analysis requires manual review".to_string(),
                priority: Priority::P3,
                category: DecisionCategory::Quality,
                impact: Impact::Low,
            });
        }

        // Risk keywords surfaced by the narrative
        let narrative_lower = narrative.text.to_lowercase();
        if self
            .config
            .risk_keywords
            .iter()
            .any(|kw| narrative_lower.contains(kw.as_str()))
        {
            priority.escalate_to(OverallPriority::High);
            decisions.push(Decision {
                action: "In-depth audit recommended following AI analysis".to_string(),
                priority: Priority::P2,
                category: DecisionCategory::Audit,
                impact: Impact::Medium,
            });
        }

        // Fleet-wide health alert
        if let Some(avg_health) = summary.avg_health_score {
            if avg_health < self.config.low_health_threshold {
                decisions.push(Decision {
                    action: format!("Fleet health alert (average score: {avg_health:.1}/100)"),
                    priority: Priority::P1,
                    category: DecisionCategory::Health,
                    impact: Impact::High,
                });
                priority.escalate_to(OverallPriority::Urgent);
            }
        }

        // Stable sort keeps insertion order within equal priorities.
        decisions.sort_by_key(|d| d.priority);

        let action_needed = matches!(priority, OverallPriority::Urgent | OverallPriority::High);

        info!(
            decisions = decisions.len(),
            priority = %priority,
            action_needed,
            "Decision synthesis complete"
        );

        DecisionRecord {
            timestamp: Utc::now(),
            overall_priority: priority,
            decisions,
            action_needed,
            risk_factors,
        }
    }
}

impl Default for RuleBasedAdvisor {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
