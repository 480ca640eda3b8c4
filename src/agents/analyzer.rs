//! Fleet analyzer - aggregate statistics over the enriched dataset.
//!
//! Produces the `AnalysisSummary` consumed by the anomaly detector, advisor,
//! narrative synthesizer, and report composer. Every figure is derived from
//! the batch; nothing is carried over between runs.

use std::collections::BTreeMap;
use tracing::info;

use super::stats;
use crate::config::{self, SummaryConfig};
use crate::types::{
    AnalysisSummary, Column, MachineAge, MachineDataset, MetricCorrelation, TrendIndicators,
};

/// Fixed metric pairs for the named correlation coefficients.
///
/// Each side reads either a KPI or a raw column from a machine record.
const CORRELATION_PAIRS: [(&str, &str); 5] = [
    ("Utilization_Rate", "Energy_Efficiency"),
    ("Machine_Age", "Health_Score"),
    ("Temperature_C", "Vibration_mms"),
    ("Operational_Hours", "Failure_History_Count"),
    ("Last_Maintenance_Days_Ago", "Health_Score"),
];

pub struct FleetAnalyzer {
    config: SummaryConfig,
}

impl FleetAnalyzer {
    pub fn new() -> Self {
        Self::with_config(config::get().summary.clone())
    }

    pub fn with_config(config: SummaryConfig) -> Self {
        Self { config }
    }

    /// Build the aggregate summary for an enriched batch.
    pub fn analyze(&self, dataset: &MachineDataset) -> AnalysisSummary {
        let mut summary = AnalysisSummary {
            total_machines: dataset.len(),
            ..Default::default()
        };

        self.kpi_statistics(dataset, &mut summary);
        self.classify_machines(dataset, &mut summary);
        self.cross_tabulations(dataset, &mut summary);
        self.age_analysis(dataset, &mut summary);
        self.maintenance_analysis(dataset, &mut summary);
        summary.key_correlations = correlations(dataset);
        summary.trends = self.trend_indicators(&summary);

        info!(
            machines = summary.total_machines,
            critical = summary.critical_machine_count,
            correlations = summary.key_correlations.len(),
            "Fleet analysis complete"
        );
        summary
    }

    fn kpi_statistics(&self, dataset: &MachineDataset, summary: &mut AnalysisSummary) {
        let utilization = dataset.kpi_values(|k| k.utilization_rate);
        summary.avg_utilization = stats::mean(&utilization);
        summary.median_utilization = stats::median(&utilization);
        summary.utilization_std = stats::std_dev(&utilization);

        let energy = dataset.kpi_values(|k| k.energy_efficiency);
        summary.avg_energy_efficiency = stats::mean(&energy);
        summary.energy_efficiency_std = stats::std_dev(&energy);

        let stability = dataset.kpi_values(|k| k.stability_index);
        summary.avg_stability = stats::mean(&stability);
        summary.stability_std = stats::std_dev(&stability);

        let health = dataset.kpi_values(|k| k.health_score);
        summary.avg_health_score = stats::mean(&health);
        summary.min_health_score = stats::min_max(&health).map(|(min, _)| min);
    }

    fn classify_machines(&self, dataset: &MachineDataset, summary: &mut AnalysisSummary) {
        for machine in &dataset.machines {
            if let Some(rate) = machine.kpi.utilization_rate {
                if rate < self.config.underutilized_threshold {
                    summary.machines_underutilized.push(machine.machine_id.clone());
                } else if rate >= self.config.well_utilized_threshold {
                    summary.machines_well_utilized.push(machine.machine_id.clone());
                }
            }
            if let Some(score) = machine.kpi.health_score {
                if score < self.config.critical_health_threshold {
                    summary.machines_critical_health.push(machine.machine_id.clone());
                } else if score >= self.config.good_health_threshold {
                    summary.machines_good_health.push(machine.machine_id.clone());
                }
            }
        }
        summary.critical_machine_count = summary.machines_underutilized.len();

        // Unstable machines sit more than one standard deviation above the
        // mean stability index (higher index = more sensor spread).
        if let (Some(mean), Some(std)) = (summary.avg_stability, summary.stability_std) {
            let threshold = mean + std;
            summary.machines_unstable = dataset
                .machines
                .iter()
                .filter(|m| m.kpi.stability_index.is_some_and(|s| s > threshold))
                .map(|m| m.machine_id.clone())
                .collect();
        }
    }

    fn cross_tabulations(&self, dataset: &MachineDataset, summary: &mut AnalysisSummary) {
        for machine in &dataset.machines {
            if let Some(category) = machine.kpi.risk_category {
                *summary.risk_distribution.entry(category).or_insert(0) += 1;
            }
            if !machine.machine_type.is_empty() {
                *summary
                    .machine_type_counts
                    .entry(machine.machine_type.clone())
                    .or_insert(0) += 1;
            }
        }

        let mut utilization_by_type: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        let mut health_by_type: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        for machine in &dataset.machines {
            if machine.machine_type.is_empty() {
                continue;
            }
            if let Some(rate) = machine.kpi.utilization_rate {
                utilization_by_type
                    .entry(machine.machine_type.clone())
                    .or_default()
                    .push(rate);
            }
            if let Some(score) = machine.kpi.health_score {
                health_by_type
                    .entry(machine.machine_type.clone())
                    .or_default()
                    .push(score);
            }
        }
        summary.utilization_by_type = utilization_by_type
            .into_iter()
            .filter_map(|(t, v)| stats::mean(&v).map(|m| (t, m)))
            .collect();
        summary.health_by_type = health_by_type
            .into_iter()
            .filter_map(|(t, v)| stats::mean(&v).map(|m| (t, m)))
            .collect();
    }

    fn age_analysis(&self, dataset: &MachineDataset, summary: &mut AnalysisSummary) {
        let ages = dataset.kpi_values(|k| k.machine_age);
        summary.avg_machine_age = stats::mean(&ages);
        if ages.is_empty() {
            return;
        }

        let mut by_age: Vec<MachineAge> = dataset
            .machines
            .iter()
            .filter_map(|m| {
                m.kpi.machine_age.map(|age| MachineAge {
                    machine_id: m.machine_id.clone(),
                    age_years: age,
                })
            })
            .collect();
        by_age.sort_by(|a, b| {
            b.age_years
                .partial_cmp(&a.age_years)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        summary.oldest_machines = by_age.iter().take(5).cloned().collect();
        summary.newest_machines = by_age.iter().rev().take(5).cloned().collect();
    }

    fn maintenance_analysis(&self, dataset: &MachineDataset, summary: &mut AnalysisSummary) {
        if !dataset.columns.has(Column::LastMaintenanceDaysAgo) {
            return;
        }
        let days = dataset.column_values(Column::LastMaintenanceDaysAgo);
        summary.avg_days_since_maintenance = stats::mean(&days);
        summary.machines_overdue_maintenance = dataset
            .machines
            .iter()
            .filter(|m| {
                m.last_maintenance_days_ago
                    .is_some_and(|d| d > self.config.maintenance_overdue_days)
            })
            .map(|m| m.machine_id.clone())
            .collect();
    }

    fn trend_indicators(&self, summary: &AnalysisSummary) -> TrendIndicators {
        let utilization = summary.avg_utilization.map(|avg| {
            if avg < 0.5 {
                "LOW - action required".to_string()
            } else if avg < 0.7 {
                "MODERATE - monitor".to_string()
            } else {
                "GOOD - maintain".to_string()
            }
        });

        let health = summary.avg_health_score.map(|_| {
            let critical_pct = if summary.total_machines == 0 {
                0.0
            } else {
                summary.machines_critical_health.len() as f64 / summary.total_machines as f64
                    * 100.0
            };
            if critical_pct > 20.0 {
                format!("CRITICAL - {critical_pct:.1}% of machines need attention")
            } else if critical_pct > 10.0 {
                format!("CONCERNING - {critical_pct:.1}% of machines at risk")
            } else {
                format!("STABLE - {critical_pct:.1}% of machines critical")
            }
        });

        TrendIndicators { utilization, health }
    }
}

impl Default for FleetAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

/// Compute the named correlations over machines where both metrics exist.
fn correlations(dataset: &MachineDataset) -> Vec<MetricCorrelation> {
    let metric = |m: &crate::types::MachineRecord, name: &str| -> Option<f64> {
        match name {
            "Utilization_Rate" => m.kpi.utilization_rate,
            "Energy_Efficiency" => m.kpi.energy_efficiency,
            "Machine_Age" => m.kpi.machine_age,
            "Health_Score" => m.kpi.health_score,
            "Temperature_C" => m.temperature_c,
            "Vibration_mms" => m.vibration_mms,
            "Operational_Hours" => m.operational_hours,
            "Failure_History_Count" => m.failure_history_count,
            "Last_Maintenance_Days_Ago" => m.last_maintenance_days_ago,
            _ => None,
        }
    };

    CORRELATION_PAIRS
        .iter()
        .filter_map(|(a, b)| {
            let pairs: Vec<(f64, f64)> = dataset
                .machines
                .iter()
                .filter_map(|m| Some((metric(m, a)?, metric(m, b)?)))
                .collect();
            let x: Vec<f64> = pairs.iter().map(|p| p.0).collect();
            let y: Vec<f64> = pairs.iter().map(|p| p.1).collect();
            stats::pearson(&x, &y).map(|r| MetricCorrelation {
                pair: format!("{a}_vs_{b}"),
                r,
                sample_count: pairs.len(),
            })
        })
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
