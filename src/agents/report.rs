//! Report Composer - assembles the final text report.
//!
//! Pure string assembly over the run's artifacts, in a fixed section order:
//! header, executive summary, KPI, anomalies, AI analysis, optional
//! enrichment sections, decisions, traceability, footer. The section markers
//! are load-bearing: the output validator checks for them verbatim.

use chrono::Utc;
use tracing::info;

use crate::config::defaults::{MACHINE_ID_PREVIEW, NARRATIVE_REPORT_LIMIT};
use crate::pipeline::context::EnrichmentContext;
use crate::types::{
    AnalysisSummary, AnomalyCategory, AnomalyMap, DecisionRecord, Narrative, NarrativeMode,
    OverallPriority, Priority, ValidationHistory,
};

pub struct ReportComposer;

impl ReportComposer {
    pub fn new() -> Self {
        Self
    }

    /// Assemble the full report.
    ///
    /// `validation_incomplete` marks a run whose report gate exhausted its
    /// retry budget; the marker lands inside the traceability section rather
    /// than being silently suppressed.
    #[allow(clippy::too_many_arguments)]
    pub fn compose(
        &self,
        summary: &AnalysisSummary,
        anomalies: &AnomalyMap,
        narrative: &Narrative,
        decisions: &DecisionRecord,
        history: &ValidationHistory,
        context: &EnrichmentContext,
        validation_incomplete: bool,
    ) -> String {
        let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string();

        let mut parts = vec![
            header(decisions.overall_priority, &timestamp),
            executive_summary(summary, decisions),
            kpi_section(summary),
            anomalies_section(anomalies),
            ai_analysis_section(narrative, context),
        ];
        if let Some(debate) = context.debate() {
            parts.push(debate_section(debate));
        }
        parts.push(decisions_section(decisions));
        if let Some(plan) = context.plan() {
            parts.push(plan_section(plan));
        }
        parts.push(traceability_section(history, validation_incomplete));
        parts.push(footer(&timestamp));

        let report = parts.join("\n");
        info!(chars = report.len(), priority = %decisions.overall_priority, "Report assembled");
        report
    }
}

impl Default for ReportComposer {
    fn default() -> Self {
        Self::new()
    }
}

fn frame(title: &str) -> String {
    format!(
        "┌──────────────────────────────────────────────────────────────────┐\n\
         │  {title:<64}│\n\
         └──────────────────────────────────────────────────────────────────┘"
    )
}

fn header(priority: OverallPriority, timestamp: &str) -> String {
    let indicator = match priority {
        OverallPriority::Urgent => "[!!]",
        OverallPriority::High => "[! ]",
        OverallPriority::Normal => "[OK]",
    };
    let priority = priority.to_string();
    format!(
        "╔══════════════════════════════════════════════════════════════════╗\n\
         ║                                                                  ║\n\
         ║     INDUSTRIAL FLEET PERFORMANCE REPORT                          ║\n\
         ║     Multi-Stage Analysis Pipeline                                ║\n\
         ║                                                                  ║\n\
         ║     {indicator} Priority: {priority:<10}                                     ║\n\
         ║     Date: {timestamp:<42}           ║\n\
         ║                                                                  ║\n\
         ╚══════════════════════════════════════════════════════════════════╝\n"
    )
}

fn executive_summary(summary: &AnalysisSummary, decisions: &DecisionRecord) -> String {
    let total = summary.total_machines;
    let critical = summary.critical_machine_count;
    let ratio = summary.critical_ratio();
    let status = if ratio < 0.1 {
        "OPERATIONAL"
    } else if ratio < 0.3 {
        "ATTENTION REQUIRED"
    } else {
        "CRITICAL"
    };
    let p1_count = decisions.p1_count();

    format!(
        "{}\n\n\
         Overall status: {status}\n\n\
         - Fleet of {total} machines analyzed\n\
         - Average utilization: {}\n\
         - Fleet health score: {}\n\
         - Machines requiring intervention: {critical} ({:.1}%)\n\
         - Decisions generated: {}\n\
         - Priority actions: {p1_count}\n",
        frame("EXECUTIVE SUMMARY"),
        summary
            .avg_utilization
            .map_or_else(|| "n/a".into(), |v| format!("{:.1}%", v * 100.0)),
        summary
            .avg_health_score
            .map_or_else(|| "n/a".into(), |v| format!("{v:.1}/100")),
        ratio * 100.0,
        decisions.decisions.len(),
    )
}

fn kpi_section(summary: &AnalysisSummary) -> String {
    let fmt_pct = |v: Option<f64>| v.map_or_else(|| "n/a".into(), |x| format!("{:.2}%", x * 100.0));
    let fmt_num = |v: Option<f64>| v.map_or_else(|| "n/a".into(), |x| format!("{x:.2}"));

    let mut section = format!(
        "{}\n\n\
         Operational performance:\n\
         - Average utilization: {}\n\
         - Median utilization: {}\n\
         - Well-utilized machines (>=70%): {}\n\n\
         Energy efficiency:\n\
         - Average: {} kW/h\n\
         - Standard deviation: {}\n\n\
         Fleet health:\n\
         - Average score: {}\n\
         - Minimum score: {}\n\
         - Machines in good health (>=80): {}\n\
         - Machines in critical health (<50): {}\n\n\
         Stability:\n\
         - Average index: {}\n\
         - Unstable machines: {}\n",
        frame("KEY PERFORMANCE INDICATORS (KPI)"),
        fmt_pct(summary.avg_utilization),
        fmt_pct(summary.median_utilization),
        summary.machines_well_utilized.len(),
        fmt_num(summary.avg_energy_efficiency),
        fmt_num(summary.energy_efficiency_std),
        summary
            .avg_health_score
            .map_or_else(|| "n/a".into(), |v| format!("{v:.1}/100")),
        summary
            .min_health_score
            .map_or_else(|| "n/a".into(), |v| format!("{v:.1}/100")),
        summary.machines_good_health.len(),
        summary.machines_critical_health.len(),
        fmt_num(summary.avg_stability),
        summary.machines_unstable.len(),
    );

    if !summary.key_correlations.is_empty() {
        section.push_str("\nKey correlations:\n");
        for corr in &summary.key_correlations {
            section.push_str(&format!("- {}: r = {:.3} (n = {})\n", corr.pair, corr.r, corr.sample_count));
        }
    }
    if let Some(trend) = &summary.trends.utilization {
        section.push_str(&format!("\nUtilization trend: {trend}\n"));
    }
    if let Some(trend) = &summary.trends.health {
        section.push_str(&format!("Health trend: {trend}\n"));
    }

    section
}

fn anomalies_section(anomalies: &AnomalyMap) -> String {
    let mut lines = vec![frame("DETECTED ANOMALIES"), String::new()];

    for &category in AnomalyCategory::all() {
        let Some(finding) = anomalies.get(category) else {
            continue;
        };
        if finding.machines.is_empty() {
            continue;
        }
        let count = finding.machines.len();
        let mut preview = finding
            .machines
            .iter()
            .take(MACHINE_ID_PREVIEW)
            .cloned()
            .collect::<Vec<_>>()
            .join(", ");
        if count > MACHINE_ID_PREVIEW {
            preview.push_str(&format!("... (+{})", count - MACHINE_ID_PREVIEW));
        }
        lines.push(format!(
            "  [{}] {}: {count} machines",
            finding.severity,
            category.label()
        ));
        lines.push(format!("      -> {preview}"));
    }

    lines.push(String::new());
    lines.push(format!(
        "  Total anomalies detected: {}",
        anomalies.total_flagged()
    ));
    lines.join("\n")
}

fn ai_analysis_section(narrative: &Narrative, context: &EnrichmentContext) -> String {
    let mut lines = vec![frame("AI ANALYSIS"), String::new()];

    let status = match narrative.mode {
        NarrativeMode::Generated => format!(
            "generated ({})",
            narrative.model.as_deref().unwrap_or("unknown model")
        ),
        NarrativeMode::Fallback => "fallback (rule-based)".to_string(),
    };
    lines.push(format!("Narrative source: {status}"));
    lines.push(String::new());

    if narrative.text.len() > NARRATIVE_REPORT_LIMIT {
        let mut cut = NARRATIVE_REPORT_LIMIT;
        while !narrative.text.is_char_boundary(cut) {
            cut -= 1;
        }
        lines.push(format!(
            "{}\n... [analysis truncated — full text in the structured result]",
            &narrative.text[..cut]
        ));
    } else {
        lines.push(narrative.text.clone());
    }

    if let Some(reasoning) = context.reasoning() {
        lines.push(String::new());
        lines.push(format!(
            "--- Root-cause reasoning (confidence: {}) ---",
            reasoning.confidence
        ));
        for finding in reasoning.findings.iter().take(3) {
            lines.push(format!("  - {finding}"));
        }
    }

    lines.join("\n")
}

fn debate_section(debate: &crate::pipeline::context::DebateDigest) -> String {
    let mut lines = vec![frame("MULTI-PERSPECTIVE REVIEW"), String::new()];
    for perspective in &debate.perspectives {
        lines.push(format!("  - {perspective}"));
    }
    lines.push(String::new());
    lines.push(format!("Consensus: {}", debate.consensus));
    lines.join("\n")
}

fn decisions_section(decisions: &DecisionRecord) -> String {
    let mut lines = vec![frame("STRATEGIC DECISIONS"), String::new()];

    lines.push(format!("Overall priority: {}", decisions.overall_priority));
    lines.push(format!(
        "Immediate action required: {}",
        if decisions.action_needed { "YES" } else { "NO" }
    ));
    lines.push(String::new());

    for (i, decision) in decisions.decisions.iter().enumerate() {
        let badge = match decision.priority {
            Priority::P1 => "(!)",
            Priority::P2 => "(*)",
            Priority::P3 => "(.)",
        };
        lines.push(format!(
            "{}. {badge} [{}] {}",
            i + 1,
            decision.priority,
            decision.action
        ));
        lines.push(format!(
            "   Category: {} | Impact: {}",
            decision.category, decision.impact
        ));
    }

    if !decisions.risk_factors.is_empty() {
        lines.push(String::new());
        lines.push("Identified risk factors:".to_string());
        for risk in &decisions.risk_factors {
            lines.push(format!("  ! {risk}"));
        }
    }

    lines.join("\n")
}

fn plan_section(plan: &crate::pipeline::context::ActionPlanOutline) -> String {
    let mut lines = vec![frame("ACTION PLAN"), String::new()];
    lines.push(format!("Goal: {}", plan.goal));
    lines.push(String::new());
    for phase in &plan.phases {
        lines.push(format!("  {phase}"));
    }
    if !plan.success_metrics.is_empty() {
        lines.push(String::new());
        lines.push("Success metrics:".to_string());
        for metric in &plan.success_metrics {
            lines.push(format!("  + {metric}"));
        }
    }
    lines.join("\n")
}

fn traceability_section(history: &ValidationHistory, validation_incomplete: bool) -> String {
    let mut lines = vec![frame("TRACEABILITY & VALIDATIONS"), String::new()];

    let summary = history.summary();
    lines.push(format!(
        "Validations performed: {} ({} passed, {} failed)",
        summary.total, summary.passed, summary.failed
    ));
    lines.push(String::new());

    for entry in history.entries() {
        let mark = if entry.passed { "[PASS]" } else { "[FAIL]" };
        let attempt = if entry.attempt > 1 {
            format!(" (attempt {})", entry.attempt)
        } else {
            String::new()
        };
        lines.push(format!("  {mark} [{}]{attempt} {}", entry.stage, entry.message));
        for issue in &entry.issues {
            lines.push(format!("         - {issue}"));
        }
    }

    if validation_incomplete {
        lines.push(String::new());
        lines.push(
            "  >>> VALIDATION INCOMPLETE: the report quality gate exhausted its \
             retry budget; unresolved findings are listed above."
                .to_string(),
        );
    }

    lines.join("\n")
}

fn footer(timestamp: &str) -> String {
    format!(
        "══════════════════════════════════════════════════════════════════\n\
         \x20                       END OF REPORT\n\n\
         \x20       Generated: {timestamp}\n\
         \x20       System: Fleet-Insight analysis pipeline\n\n\
         \x20       This report was generated automatically from the latest\n\
         \x20       telemetry batch. Address questions to the maintenance team.\n\
         ══════════════════════════════════════════════════════════════════\n"
    )
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        AnomalySeverity, CategoryFinding, Decision, DecisionCategory, Impact,
    };

    fn sample_inputs() -> (AnalysisSummary, AnomalyMap, Narrative, DecisionRecord, ValidationHistory)
    {
        let summary = AnalysisSummary {
            total_machines: 30,
            critical_machine_count: 3,
            avg_utilization: Some(0.6),
            avg_health_score: Some(70.0),
            ..Default::default()
        };
        let mut anomalies = AnomalyMap::new();
        anomalies.insert(
            AnomalyCategory::HighTemperature,
            CategoryFinding {
                machines: (0..8).map(|i| format!("M{i:04}")).collect(),
                severity: AnomalySeverity::High,
                threshold: 92.5,
            },
        );
        let narrative = Narrative::fallback("Diagnostic text with recommended actions.".into());
        let decisions = DecisionRecord {
            timestamp: Utc::now(),
            overall_priority: OverallPriority::High,
            decisions: vec![Decision {
                action: "Schedule maintenance".into(),
                priority: Priority::P1,
                category: DecisionCategory::Maintenance,
                impact: Impact::High,
            }],
            action_needed: true,
            risk_factors: vec!["Backlog growing".into()],
        };
        let mut history = ValidationHistory::new();
        history.record("raw_validation", true, "Raw data validation", Vec::new(), 1);
        history.record("narrative_quality", false, "Narrative validation", vec!["short".into()], 1);
        (summary, anomalies, narrative, decisions, history)
    }

    #[test]
    fn report_contains_all_required_section_markers() {
        let (summary, anomalies, narrative, decisions, history) = sample_inputs();
        let report = ReportComposer::new().compose(
            &summary,
            &anomalies,
            &narrative,
            &decisions,
            &history,
            &EnrichmentContext::new(),
            false,
        );

        let upper = report.to_uppercase();
        for marker in ["KPI", "ANOMALIES", "DECISIONS", "TRACEABILITY"] {
            assert!(upper.contains(marker), "missing {marker}");
        }
        // Frames stay balanced so the format validator is satisfied.
        let count = |c: char| report.chars().filter(|&x| x == c).count();
        assert_eq!(count('╔'), count('╚'));
        assert_eq!(count('┌'), count('└'));
    }

    #[test]
    fn anomaly_listing_previews_at_most_five_ids() {
        let (summary, anomalies, narrative, decisions, history) = sample_inputs();
        let report = ReportComposer::new().compose(
            &summary,
            &anomalies,
            &narrative,
            &decisions,
            &history,
            &EnrichmentContext::new(),
            false,
        );
        assert!(report.contains("M0004"));
        assert!(!report.contains("M0005,"));
        assert!(report.contains("(+3)"));
    }

    #[test]
    fn traceability_lists_every_validation_entry() {
        let (summary, anomalies, narrative, decisions, history) = sample_inputs();
        let report = ReportComposer::new().compose(
            &summary,
            &anomalies,
            &narrative,
            &decisions,
            &history,
            &EnrichmentContext::new(),
            false,
        );
        assert!(report.contains("[PASS] [raw_validation]"));
        assert!(report.contains("[FAIL] [narrative_quality]"));
    }

    #[test]
    fn incomplete_validation_marker_lands_in_traceability() {
        let (summary, anomalies, narrative, decisions, history) = sample_inputs();
        let composer = ReportComposer::new();
        let clean = composer.compose(
            &summary, &anomalies, &narrative, &decisions, &history,
            &EnrichmentContext::new(), false,
        );
        let marked = composer.compose(
            &summary, &anomalies, &narrative, &decisions, &history,
            &EnrichmentContext::new(), true,
        );
        assert!(!clean.contains("VALIDATION INCOMPLETE"));
        assert!(marked.contains("VALIDATION INCOMPLETE"));
    }

    #[test]
    fn long_narratives_are_truncated_in_the_report_only() {
        let (summary, anomalies, _, decisions, history) = sample_inputs();
        let narrative = Narrative::generated("x".repeat(5000), "test-model");
        let report = ReportComposer::new().compose(
            &summary,
            &anomalies,
            &narrative,
            &decisions,
            &history,
            &EnrichmentContext::new(),
            false,
        );
        assert!(report.contains("analysis truncated"));
    }
}
