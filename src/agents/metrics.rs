//! Metric Engine - derived KPI computation.
//!
//! Enriches a cleaned dataset with per-machine KPIs. Each KPI is computed only
//! when its source columns are present in the batch; absence silently omits
//! the KPI (degrade-gracefully policy, not an error). The engine is purely
//! functional over its input and idempotent: recomputing on the same dataset
//! yields identical values.

use chrono::{Datelike, Utc};
use tracing::{debug, info};

use super::stats;
use crate::config::defaults::{AI_OVERRIDE_RATE_HOURS, CONSTANT_COLUMN_MIDPOINT, HOURS_PER_YEAR};
use crate::types::{Column, MachineDataset, RiskCategory};

/// Computes derived KPIs from validated, cleaned tabular data.
pub struct MetricEngine {
    /// Year used for machine-age computation; injectable for deterministic tests
    reference_year: f64,
}

impl MetricEngine {
    pub fn new() -> Self {
        Self {
            reference_year: f64::from(Utc::now().year()),
        }
    }

    pub fn with_reference_year(year: i32) -> Self {
        Self {
            reference_year: f64::from(year),
        }
    }

    /// Compute all KPIs whose source columns are available.
    ///
    /// Returns the names of the KPIs that were computed, in computation order.
    pub fn compute(&self, dataset: &mut MachineDataset) -> Vec<&'static str> {
        let mut computed = Vec::new();

        if dataset.is_empty() {
            return computed;
        }

        self.compute_machine_age(dataset, &mut computed);
        self.compute_utilization(dataset, &mut computed);
        self.compute_energy_efficiency(dataset, &mut computed);
        self.compute_stability_index(dataset, &mut computed);
        self.compute_ai_override_rate(dataset, &mut computed);
        self.compute_maintenance_urgency(dataset, &mut computed);
        self.compute_health_score(dataset, &mut computed);

        info!(kpis = computed.len(), machines = dataset.len(), "KPI computation complete");
        computed
    }

    fn compute_machine_age(&self, dataset: &mut MachineDataset, computed: &mut Vec<&'static str>) {
        if !dataset.columns.has(Column::InstallationYear) {
            return;
        }
        for machine in &mut dataset.machines {
            machine.kpi.machine_age = machine
                .installation_year
                .map(|year| self.reference_year - year);
        }
        computed.push("Machine_Age");
        debug!("Machine_Age calculated");
    }

    fn compute_utilization(&self, dataset: &mut MachineDataset, computed: &mut Vec<&'static str>) {
        if !dataset.columns.has(Column::OperationalHours) {
            return;
        }
        for machine in &mut dataset.machines {
            machine.kpi.utilization_rate = machine
                .operational_hours
                .map(|hours| (hours / HOURS_PER_YEAR).clamp(0.0, 1.0));
        }
        computed.push("Utilization_Rate");
        debug!("Utilization_Rate calculated");
    }

    fn compute_energy_efficiency(
        &self,
        dataset: &mut MachineDataset,
        computed: &mut Vec<&'static str>,
    ) {
        if !dataset
            .columns
            .has_all(&[Column::PowerConsumptionKw, Column::OperationalHours])
        {
            return;
        }
        for machine in &mut dataset.machines {
            machine.kpi.energy_efficiency =
                match (machine.power_consumption_kw, machine.operational_hours) {
                    (Some(power), Some(hours)) if hours > 0.0 => Some(power / hours),
                    _ => None,
                };
        }
        computed.push("Energy_Efficiency");
        debug!("Energy_Efficiency calculated");
    }

    fn compute_stability_index(
        &self,
        dataset: &mut MachineDataset,
        computed: &mut Vec<&'static str>,
    ) {
        let inputs: Vec<Column> = [Column::TemperatureC, Column::VibrationMms, Column::SoundDb]
            .into_iter()
            .filter(|c| dataset.columns.has(*c))
            .collect();
        if inputs.is_empty() {
            return;
        }

        // Per-column min/max over the whole batch; columns with no values at
        // all are unusable and dropped from the composite.
        let spans: Vec<(Column, (f64, f64))> = inputs
            .iter()
            .filter_map(|&c| stats::min_max(&dataset.column_values(c)).map(|span| (c, span)))
            .collect();
        if spans.is_empty() {
            return;
        }

        for machine in &mut dataset.machines {
            let normalized: Vec<f64> = spans
                .iter()
                .filter_map(|&(col, (min, max))| {
                    machine.value(col).map(|v| normalize(v, min, max, 100.0))
                })
                .collect();
            machine.kpi.stability_index = stats::mean(&normalized);
        }
        computed.push("Stability_Index");
        debug!(inputs = spans.len(), "Stability_Index calculated");
    }

    fn compute_ai_override_rate(
        &self,
        dataset: &mut MachineDataset,
        computed: &mut Vec<&'static str>,
    ) {
        if !dataset
            .columns
            .has_all(&[Column::AiOverrideEvents, Column::OperationalHours])
        {
            return;
        }
        for machine in &mut dataset.machines {
            machine.kpi.ai_override_rate =
                match (machine.ai_override_events, machine.operational_hours) {
                    (Some(events), Some(hours)) if hours > 0.0 => {
                        Some(events / hours * AI_OVERRIDE_RATE_HOURS)
                    }
                    (Some(_), Some(_)) => Some(0.0),
                    _ => None,
                };
        }
        computed.push("AI_Override_Rate");
        debug!("AI_Override_Rate calculated");
    }

    fn compute_maintenance_urgency(
        &self,
        dataset: &mut MachineDataset,
        computed: &mut Vec<&'static str>,
    ) {
        if !dataset
            .columns
            .has_all(&[Column::LastMaintenanceDaysAgo, Column::FailureHistoryCount])
        {
            return;
        }
        let max_failures = stats::min_max(&dataset.column_values(Column::FailureHistoryCount))
            .map_or(0.0, |(_, max)| max);

        for machine in &mut dataset.machines {
            let Some(days) = machine.last_maintenance_days_ago else {
                machine.kpi.maintenance_urgency = None;
                continue;
            };
            let failure_ratio = match machine.failure_history_count {
                Some(f) if max_failures > 0.0 => f / max_failures,
                _ => 0.0,
            };
            // The utilization term drops out when that KPI was not computed.
            let idle_term = machine
                .kpi
                .utilization_rate
                .map_or(0.0, |rate| 1.0 - rate);

            let urgency = days / 365.0 * 0.4 + failure_ratio * 0.3 + idle_term * 0.3;
            machine.kpi.maintenance_urgency = Some(urgency.clamp(0.0, 1.0));
        }
        computed.push("Maintenance_Urgency");
        debug!("Maintenance_Urgency calculated");
    }

    fn compute_health_score(&self, dataset: &mut MachineDataset, computed: &mut Vec<&'static str>) {
        // Risk factors: normalized temperature, normalized vibration, and
        // error count relative to the batch maximum.
        let temp_span = dataset
            .columns
            .has(Column::TemperatureC)
            .then(|| stats::min_max(&dataset.column_values(Column::TemperatureC)))
            .flatten();
        let vib_span = dataset
            .columns
            .has(Column::VibrationMms)
            .then(|| stats::min_max(&dataset.column_values(Column::VibrationMms)))
            .flatten();
        let max_errors = dataset
            .columns
            .has(Column::ErrorCodesLast30Days)
            .then(|| stats::min_max(&dataset.column_values(Column::ErrorCodesLast30Days)))
            .flatten()
            .map(|(_, max)| max);

        if temp_span.is_none() && vib_span.is_none() && max_errors.is_none() {
            return;
        }

        for machine in &mut dataset.machines {
            let mut factors = Vec::with_capacity(3);

            if let (Some((min, max)), Some(v)) = (temp_span, machine.temperature_c) {
                factors.push(normalize(v, min, max, 1.0));
            }
            if let (Some((min, max)), Some(v)) = (vib_span, machine.vibration_mms) {
                factors.push(normalize(v, min, max, 1.0));
            }
            if let (Some(max), Some(errors)) = (max_errors, machine.error_codes_last_30_days) {
                // A batch with zero errors everywhere carries no error risk.
                factors.push(if max > 0.0 { errors / max } else { 0.0 });
            }

            machine.kpi.health_score = stats::mean(&factors)
                .map(|risk| (100.0 * (1.0 - risk)).clamp(0.0, 100.0));
            machine.kpi.risk_category = machine
                .kpi
                .health_score
                .map(RiskCategory::from_health_score);
        }
        computed.push("Health_Score");
        computed.push("Risk_Category");
        debug!("Health_Score and Risk_Category calculated");
    }
}

impl Default for MetricEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Min-max scale a value into [0, scale].
///
/// A constant column (max == min) maps to the midpoint, never a division by
/// zero; this is a documented edge-case policy.
fn normalize(value: f64, min: f64, max: f64, scale: f64) -> f64 {
    if max > min {
        (value - min) / (max - min) * scale
    } else {
        scale * CONSTANT_COLUMN_MIDPOINT / 100.0
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ColumnPresence, MachineRecord};

    fn record(id: &str, temp: f64, vib: f64, sound: f64, hours: f64, errors: f64) -> MachineRecord {
        MachineRecord {
            machine_id: id.to_string(),
            machine_type: "CNC".to_string(),
            installation_year: Some(2015.0),
            operational_hours: Some(hours),
            temperature_c: Some(temp),
            vibration_mms: Some(vib),
            sound_db: Some(sound),
            power_consumption_kw: Some(40.0),
            last_maintenance_days_ago: Some(90.0),
            maintenance_history_count: Some(10.0),
            failure_history_count: Some(2.0),
            error_codes_last_30_days: Some(errors),
            ai_override_events: Some(3.0),
            ..Default::default()
        }
    }

    fn dataset(machines: Vec<MachineRecord>) -> MachineDataset {
        MachineDataset::from_records(machines, ColumnPresence::all())
    }

    #[test]
    fn health_scores_stay_in_range_with_consistent_bins() {
        let mut ds = dataset(
            (0..20)
                .map(|i| {
                    let f = f64::from(i);
                    record(&format!("M{i:04}"), 30.0 + f * 4.0, 0.5 + f * 0.5, 60.0, 4000.0, f)
                })
                .collect(),
        );
        MetricEngine::with_reference_year(2026).compute(&mut ds);

        for machine in &ds.machines {
            let score = machine.kpi.health_score.expect("health computed");
            assert!((0.0..=100.0).contains(&score), "score {score}");
            let category = machine.kpi.risk_category.expect("category computed");
            assert_eq!(category, RiskCategory::from_health_score(score));
        }
    }

    #[test]
    fn constant_sensor_column_normalizes_to_midpoint() {
        let mut ds = dataset(
            (0..10)
                .map(|i| record(&format!("M{i:04}"), 50.0, 2.0, 70.0, 4000.0, 1.0))
                .collect(),
        );
        MetricEngine::with_reference_year(2026).compute(&mut ds);

        // All three stability inputs are constant, so every normalized value
        // is the midpoint and the composite is exactly 50.
        for machine in &ds.machines {
            let stability = machine.kpi.stability_index.expect("stability computed");
            assert!((stability - 50.0).abs() < 1e-9, "stability {stability}");
        }
    }

    #[test]
    fn stability_is_invariant_under_affine_sensor_rescaling() {
        let base: Vec<MachineRecord> = (0..15)
            .map(|i| {
                let f = f64::from(i);
                record(&format!("M{i:04}"), 30.0 + f * 3.0, 0.2 + f * 0.3, 55.0 + f, 4000.0, 1.0)
            })
            .collect();

        let mut original = dataset(base.clone());
        MetricEngine::with_reference_year(2026).compute(&mut original);

        // Rescale temperature uniformly: order-preserving affine map.
        let mut rescaled = dataset(
            base.into_iter()
                .map(|mut m| {
                    m.temperature_c = m.temperature_c.map(|t| t * 1.8 + 32.0);
                    m
                })
                .collect(),
        );
        MetricEngine::with_reference_year(2026).compute(&mut rescaled);

        for (a, b) in original.machines.iter().zip(&rescaled.machines) {
            let sa = a.kpi.stability_index.expect("stability");
            let sb = b.kpi.stability_index.expect("stability");
            assert!((sa - sb).abs() < 1e-9, "{sa} vs {sb}");
        }
    }

    #[test]
    fn compute_is_idempotent() {
        let mut ds = dataset(
            (0..12)
                .map(|i| {
                    let f = f64::from(i);
                    record(&format!("M{i:04}"), 35.0 + f, 1.0 + f * 0.1, 62.0, 3000.0 + f * 100.0, f)
                })
                .collect(),
        );
        let engine = MetricEngine::with_reference_year(2026);
        engine.compute(&mut ds);
        let first: Vec<_> = ds.machines.iter().map(|m| m.kpi.clone()).collect();
        engine.compute(&mut ds);
        let second: Vec<_> = ds.machines.iter().map(|m| m.kpi.clone()).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn missing_columns_skip_their_kpis() {
        let mut columns = ColumnPresence::new();
        columns.insert(Column::MachineId);
        columns.insert(Column::MachineType);
        columns.insert(Column::TemperatureC);

        let machines = vec![
            MachineRecord {
                machine_id: "M0001".into(),
                machine_type: "Pump".into(),
                temperature_c: Some(40.0),
                ..Default::default()
            },
            MachineRecord {
                machine_id: "M0002".into(),
                machine_type: "Pump".into(),
                temperature_c: Some(55.0),
                ..Default::default()
            },
        ];
        let mut ds = MachineDataset::from_records(machines, columns);
        let computed = MetricEngine::with_reference_year(2026).compute(&mut ds);

        assert!(!computed.contains(&"Utilization_Rate"));
        assert!(!computed.contains(&"Energy_Efficiency"));
        assert!(computed.contains(&"Stability_Index"));
        assert!(computed.contains(&"Health_Score"));
        assert!(ds.machines[0].kpi.utilization_rate.is_none());
        assert!(ds.machines[0].kpi.energy_efficiency.is_none());
    }

    #[test]
    fn zero_hours_leaves_energy_efficiency_undefined() {
        let mut machines: Vec<MachineRecord> = (0..10)
            .map(|i| record(&format!("M{i:04}"), 40.0, 1.0, 60.0, 2000.0, 0.0))
            .collect();
        machines[0].operational_hours = Some(0.0);
        let mut ds = dataset(machines);
        MetricEngine::with_reference_year(2026).compute(&mut ds);

        assert!(ds.machines[0].kpi.energy_efficiency.is_none());
        assert!(ds.machines[1].kpi.energy_efficiency.is_some());
        // Utilization clamps at zero rather than going undefined.
        assert_eq!(ds.machines[0].kpi.utilization_rate, Some(0.0));
    }

    #[test]
    fn machine_age_uses_reference_year() {
        let mut ds = dataset(vec![record("M0001", 40.0, 1.0, 60.0, 2000.0, 0.0)]);
        MetricEngine::with_reference_year(2026).compute(&mut ds);
        assert_eq!(ds.machines[0].kpi.machine_age, Some(11.0));
    }
}
