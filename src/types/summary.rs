//! Aggregate analysis summary types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::RiskCategory;

/// Machine identity paired with its age, for the oldest/newest listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineAge {
    pub machine_id: String,
    pub age_years: f64,
}

/// A named Pearson correlation between two fixed metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricCorrelation {
    /// Pair label, e.g. "Utilization_Rate_vs_Energy_Efficiency"
    pub pair: String,
    /// Correlation coefficient in [-1, 1]
    pub r: f64,
    /// Paired samples the coefficient was computed from
    pub sample_count: usize,
}

/// Coarse trend assessments derived from the batch averages.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrendIndicators {
    pub utilization: Option<String>,
    pub health: Option<String>,
}

/// Aggregate statistics over the enriched dataset.
///
/// Every field is derived, never independently settable, and recomputed fresh
/// each run. Fields depending on a KPI that was not computed are None/empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub total_machines: usize,

    // Core KPI statistics
    pub avg_utilization: Option<f64>,
    pub median_utilization: Option<f64>,
    pub utilization_std: Option<f64>,
    pub avg_energy_efficiency: Option<f64>,
    pub energy_efficiency_std: Option<f64>,
    pub avg_stability: Option<f64>,
    pub stability_std: Option<f64>,
    pub avg_health_score: Option<f64>,
    pub min_health_score: Option<f64>,

    // Machine classifications (IDs in dataset order)
    pub machines_underutilized: Vec<String>,
    pub machines_well_utilized: Vec<String>,
    pub machines_unstable: Vec<String>,
    pub machines_critical_health: Vec<String>,
    pub machines_good_health: Vec<String>,
    pub machines_overdue_maintenance: Vec<String>,

    /// Count of underutilized machines, the fleet's critical-machine count
    pub critical_machine_count: usize,

    // Cross-tabulations
    pub risk_distribution: BTreeMap<RiskCategory, usize>,
    pub machine_type_counts: BTreeMap<String, usize>,
    pub utilization_by_type: BTreeMap<String, f64>,
    pub health_by_type: BTreeMap<String, f64>,

    // Age analysis
    pub avg_machine_age: Option<f64>,
    pub oldest_machines: Vec<MachineAge>,
    pub newest_machines: Vec<MachineAge>,

    // Maintenance analysis
    pub avg_days_since_maintenance: Option<f64>,

    // Correlations between fixed metric pairs
    pub key_correlations: Vec<MetricCorrelation>,

    pub trends: TrendIndicators,
}

impl AnalysisSummary {
    /// Critical machines as a fraction of the fleet.
    pub fn critical_ratio(&self) -> f64 {
        if self.total_machines == 0 {
            0.0
        } else {
            self.critical_machine_count as f64 / self.total_machines as f64
        }
    }
}
