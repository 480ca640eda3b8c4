//! Anomaly Detector - per-machine statistical outlier flagging.
//!
//! Quantile categories use the batch's 95th percentile with a strict `>`
//! membership test, so at most ~5% of machines land in each. Maintenance
//! categories use absolute day thresholds (business rules, not
//! distribution-relative). The multi-factor category aggregates across all
//! per-category lists and is computed last.

use std::collections::HashMap;
use tracing::{info, warn};

use super::stats;
use crate::config::{self, AnomalyConfig};
use crate::types::{
    AnomalyCategory, AnomalyMap, AnomalySeverity, CategoryFinding, Column, Kpi, MachineDataset,
};

/// Flags per-machine statistical outliers by category.
pub struct AnomalyDetector {
    config: AnomalyConfig,
}

impl AnomalyDetector {
    pub fn new() -> Self {
        Self::with_config(config::get().anomaly.clone())
    }

    pub fn with_config(config: AnomalyConfig) -> Self {
        Self { config }
    }

    /// Detect anomalies across all categories whose source data is present.
    pub fn detect(&self, dataset: &MachineDataset) -> AnomalyMap {
        let mut map = AnomalyMap::new();

        self.quantile_category(
            dataset,
            &mut map,
            AnomalyCategory::HighTemperature,
            |m, _| m.temperature_c,
            dataset.columns.has(Column::TemperatureC),
        );
        self.quantile_category(
            dataset,
            &mut map,
            AnomalyCategory::HighVibration,
            |m, _| m.vibration_mms,
            dataset.columns.has(Column::VibrationMms),
        );
        self.quantile_category(
            dataset,
            &mut map,
            AnomalyCategory::EnergySpike,
            |_, k| k.energy_efficiency,
            dataset
                .columns
                .has_all(&[Column::PowerConsumptionKw, Column::OperationalHours]),
        );
        self.utilization_categories(dataset, &mut map);
        self.quantile_category(
            dataset,
            &mut map,
            AnomalyCategory::HighSound,
            |m, _| m.sound_db,
            dataset.columns.has(Column::SoundDb),
        );
        self.maintenance_categories(dataset, &mut map);
        self.quantile_category(
            dataset,
            &mut map,
            AnomalyCategory::HighErrorRate,
            |m, _| m.error_codes_last_30_days,
            dataset.columns.has(Column::ErrorCodesLast30Days),
        );
        self.quantile_category(
            dataset,
            &mut map,
            AnomalyCategory::HighAiOverride,
            |_, k| k.ai_override_rate,
            dataset
                .columns
                .has_all(&[Column::AiOverrideEvents, Column::OperationalHours]),
        );

        // Aggregation rule, computed last: machines present in enough
        // distinct categories are critical regardless of any single reading.
        self.multi_factor_category(dataset, &mut map);

        info!(
            categories = map.len(),
            flagged = map.total_flagged(),
            "Anomaly detection complete"
        );
        for (category, finding) in map.categories() {
            if matches!(finding.severity, AnomalySeverity::High | AnomalySeverity::Critical)
                && !finding.machines.is_empty()
            {
                warn!(
                    category = %category,
                    machines = finding.machines.len(),
                    severity = %finding.severity,
                    "Elevated anomaly category"
                );
            }
        }

        map
    }

    /// Flag machines whose metric strictly exceeds the batch high quantile.
    fn quantile_category(
        &self,
        dataset: &MachineDataset,
        map: &mut AnomalyMap,
        category: AnomalyCategory,
        metric: impl Fn(&crate::types::MachineRecord, &Kpi) -> Option<f64>,
        present: bool,
    ) {
        if !present {
            return;
        }
        let values: Vec<f64> = dataset
            .machines
            .iter()
            .filter_map(|m| metric(m, &m.kpi))
            .collect();
        let Some(threshold) = stats::quantile(&values, self.config.percentile_high) else {
            return;
        };

        let machines: Vec<String> = dataset
            .machines
            .iter()
            .filter(|m| metric(m, &m.kpi).is_some_and(|v| v > threshold))
            .map(|m| m.machine_id.clone())
            .collect();

        let severity = self.count_severity(machines.len());
        map.insert(category, CategoryFinding { machines, severity, threshold });
    }

    fn utilization_categories(&self, dataset: &MachineDataset, map: &mut AnomalyMap) {
        if !dataset.columns.has(Column::OperationalHours) {
            return;
        }

        // Exact-equality test, distinct from the very-low band below it.
        let idle: Vec<String> = dataset
            .machines
            .iter()
            .filter(|m| m.kpi.utilization_rate == Some(0.0))
            .map(|m| m.machine_id.clone())
            .collect();
        let idle_severity = if idle.is_empty() {
            AnomalySeverity::Ok
        } else {
            AnomalySeverity::Critical
        };
        map.insert(
            AnomalyCategory::ZeroUtilization,
            CategoryFinding {
                machines: idle,
                severity: idle_severity,
                threshold: 0.0,
            },
        );

        let very_low: Vec<String> = dataset
            .machines
            .iter()
            .filter(|m| {
                m.kpi
                    .utilization_rate
                    .is_some_and(|r| r > 0.0 && r < self.config.very_low_utilization)
            })
            .map(|m| m.machine_id.clone())
            .collect();
        let severity = self.count_severity(very_low.len());
        map.insert(
            AnomalyCategory::VeryLowUtilization,
            CategoryFinding {
                machines: very_low,
                severity,
                threshold: self.config.very_low_utilization,
            },
        );
    }

    fn maintenance_categories(&self, dataset: &MachineDataset, map: &mut AnomalyMap) {
        if !dataset.columns.has(Column::LastMaintenanceDaysAgo) {
            return;
        }

        for (category, threshold) in [
            (AnomalyCategory::MaintenanceOverdue, self.config.maintenance_overdue_days),
            (AnomalyCategory::MaintenanceCritical, self.config.maintenance_critical_days),
        ] {
            let machines: Vec<String> = dataset
                .machines
                .iter()
                .filter(|m| m.last_maintenance_days_ago.is_some_and(|d| d > threshold))
                .map(|m| m.machine_id.clone())
                .collect();
            let severity = self.count_severity(machines.len());
            map.insert(category, CategoryFinding { machines, severity, threshold });
        }
    }

    fn multi_factor_category(&self, dataset: &MachineDataset, map: &mut AnomalyMap) {
        let mut category_hits: HashMap<&str, usize> = HashMap::new();
        for (_, finding) in map.categories() {
            for machine in &finding.machines {
                *category_hits.entry(machine.as_str()).or_insert(0) += 1;
            }
        }

        // Dataset order keeps the listing deterministic.
        let machines: Vec<String> = dataset
            .machines
            .iter()
            .filter(|m| {
                category_hits
                    .get(m.machine_id.as_str())
                    .is_some_and(|&hits| hits >= self.config.multi_factor_min_categories)
            })
            .map(|m| m.machine_id.clone())
            .collect();

        let severity = if machines.is_empty() {
            AnomalySeverity::Ok
        } else {
            AnomalySeverity::Critical
        };
        map.insert(
            AnomalyCategory::MultiFactorCritical,
            CategoryFinding {
                machines,
                severity,
                threshold: self.config.multi_factor_min_categories as f64,
            },
        );
    }

    fn count_severity(&self, count: usize) -> AnomalySeverity {
        if count > self.config.severity_high_count {
            AnomalySeverity::High
        } else {
            AnomalySeverity::Medium
        }
    }
}

impl Default for AnomalyDetector {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
