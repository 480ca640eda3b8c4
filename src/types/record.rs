//! Machine records, dataset, and per-machine KPI block.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::config::defaults::{RISK_BIN_CRITICAL, RISK_BIN_HIGH, RISK_BIN_MEDIUM};

// ============================================================================
// Columns
// ============================================================================

/// Recognized input columns.
///
/// Unrecognized header columns are ignored by the loader (but profiled).
/// Presence of optional columns drives the degrade-gracefully policy in the
/// metric engine and anomaly detector: a KPI or category whose source columns
/// are absent is omitted, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Column {
    MachineId,
    MachineType,
    InstallationYear,
    OperationalHours,
    TemperatureC,
    VibrationMms,
    SoundDb,
    PowerConsumptionKw,
    OilLevelPct,
    CoolantLevelPct,
    LastMaintenanceDaysAgo,
    MaintenanceHistoryCount,
    FailureHistoryCount,
    ErrorCodesLast30Days,
    AiOverrideEvents,
}

impl Column {
    /// Resolve a header cell to a known column (case-insensitive, trimmed).
    pub fn from_header(header: &str) -> Option<Self> {
        match header.trim().to_ascii_lowercase().as_str() {
            "machine_id" => Some(Self::MachineId),
            "machine_type" => Some(Self::MachineType),
            "installation_year" => Some(Self::InstallationYear),
            "operational_hours" => Some(Self::OperationalHours),
            "temperature_c" => Some(Self::TemperatureC),
            "vibration_mms" => Some(Self::VibrationMms),
            "sound_db" => Some(Self::SoundDb),
            "power_consumption_kw" => Some(Self::PowerConsumptionKw),
            "oil_level_pct" => Some(Self::OilLevelPct),
            "coolant_level_pct" => Some(Self::CoolantLevelPct),
            "last_maintenance_days_ago" => Some(Self::LastMaintenanceDaysAgo),
            "maintenance_history_count" => Some(Self::MaintenanceHistoryCount),
            "failure_history_count" => Some(Self::FailureHistoryCount),
            "error_codes_last_30_days" => Some(Self::ErrorCodesLast30Days),
            "ai_override_events" => Some(Self::AiOverrideEvents),
            _ => None,
        }
    }

    /// Canonical header name.
    pub fn name(self) -> &'static str {
        match self {
            Self::MachineId => "Machine_ID",
            Self::MachineType => "Machine_Type",
            Self::InstallationYear => "Installation_Year",
            Self::OperationalHours => "Operational_Hours",
            Self::TemperatureC => "Temperature_C",
            Self::VibrationMms => "Vibration_mms",
            Self::SoundDb => "Sound_dB",
            Self::PowerConsumptionKw => "Power_Consumption_kW",
            Self::OilLevelPct => "Oil_Level_pct",
            Self::CoolantLevelPct => "Coolant_Level_pct",
            Self::LastMaintenanceDaysAgo => "Last_Maintenance_Days_Ago",
            Self::MaintenanceHistoryCount => "Maintenance_History_Count",
            Self::FailureHistoryCount => "Failure_History_Count",
            Self::ErrorCodesLast30Days => "Error_Codes_Last_30_Days",
            Self::AiOverrideEvents => "AI_Override_Events",
        }
    }

    /// All numeric (non-identity) columns.
    pub fn numeric() -> &'static [Self] {
        &[
            Self::InstallationYear,
            Self::OperationalHours,
            Self::TemperatureC,
            Self::VibrationMms,
            Self::SoundDb,
            Self::PowerConsumptionKw,
            Self::OilLevelPct,
            Self::CoolantLevelPct,
            Self::LastMaintenanceDaysAgo,
            Self::MaintenanceHistoryCount,
            Self::FailureHistoryCount,
            Self::ErrorCodesLast30Days,
            Self::AiOverrideEvents,
        ]
    }
}

/// Which columns appeared in the input header for this batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ColumnPresence {
    present: BTreeSet<Column>,
}

impl ColumnPresence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Presence set covering every recognized column (synthetic datasets).
    pub fn all() -> Self {
        let mut presence = Self::new();
        presence.insert(Column::MachineId);
        presence.insert(Column::MachineType);
        for &col in Column::numeric() {
            presence.insert(col);
        }
        presence
    }

    pub fn insert(&mut self, column: Column) {
        self.present.insert(column);
    }

    pub fn has(&self, column: Column) -> bool {
        self.present.contains(&column)
    }

    pub fn has_all(&self, columns: &[Column]) -> bool {
        columns.iter().all(|c| self.has(*c))
    }

    /// Numeric columns present in this batch.
    pub fn numeric_present(&self) -> Vec<Column> {
        Column::numeric()
            .iter()
            .copied()
            .filter(|c| self.has(*c))
            .collect()
    }
}

// ============================================================================
// KPI block
// ============================================================================

/// Risk category binned from the health score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskCategory {
    Critical,
    High,
    Medium,
    Low,
}

impl RiskCategory {
    /// Bin a health score at the fixed 30/60/80 edges, inclusive on the
    /// lower bound: a score of exactly 30 is High, exactly 80 is Low.
    pub fn from_health_score(score: f64) -> Self {
        if score < RISK_BIN_CRITICAL {
            Self::Critical
        } else if score < RISK_BIN_HIGH {
            Self::High
        } else if score < RISK_BIN_MEDIUM {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

impl std::fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Critical => write!(f, "Critical"),
            Self::High => write!(f, "High"),
            Self::Medium => write!(f, "Medium"),
            Self::Low => write!(f, "Low"),
        }
    }
}

/// Derived KPI values for one machine.
///
/// Every field is optional: a KPI whose source columns are absent from the
/// batch is simply not computed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Kpi {
    /// Years since installation
    pub machine_age: Option<f64>,
    /// Operational hours over 24/7 capacity, clipped to [0,1]
    pub utilization_rate: Option<f64>,
    /// Power draw per operational hour (kW/h); None when hours are zero
    pub energy_efficiency: Option<f64>,
    /// Composite sensor stability on a 0-100 scale
    pub stability_index: Option<f64>,
    /// AI override events per 1000 operational hours
    pub ai_override_rate: Option<f64>,
    /// Weighted maintenance urgency in [0,1]
    pub maintenance_urgency: Option<f64>,
    /// Composite inverse-risk score in [0,100], higher is better
    pub health_score: Option<f64>,
    /// Risk category binned from the health score
    pub risk_category: Option<RiskCategory>,
}

// ============================================================================
// Machine record & dataset
// ============================================================================

/// One row of input telemetry: identity, category, and optional sensor /
/// operational readings. Numeric fields are non-negative after cleaning
/// except power draw, which may arrive briefly negative from sensor noise
/// and is clipped by the cleaner.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MachineRecord {
    pub machine_id: String,
    pub machine_type: String,
    pub installation_year: Option<f64>,
    pub operational_hours: Option<f64>,
    pub temperature_c: Option<f64>,
    pub vibration_mms: Option<f64>,
    pub sound_db: Option<f64>,
    pub power_consumption_kw: Option<f64>,
    pub oil_level_pct: Option<f64>,
    pub coolant_level_pct: Option<f64>,
    pub last_maintenance_days_ago: Option<f64>,
    pub maintenance_history_count: Option<f64>,
    pub failure_history_count: Option<f64>,
    pub error_codes_last_30_days: Option<f64>,
    pub ai_override_events: Option<f64>,
    /// Derived KPI block, filled in by the metric engine
    #[serde(default)]
    pub kpi: Kpi,
}

impl MachineRecord {
    /// Read a numeric field by column. Identity columns return None.
    pub fn value(&self, column: Column) -> Option<f64> {
        match column {
            Column::MachineId | Column::MachineType => None,
            Column::InstallationYear => self.installation_year,
            Column::OperationalHours => self.operational_hours,
            Column::TemperatureC => self.temperature_c,
            Column::VibrationMms => self.vibration_mms,
            Column::SoundDb => self.sound_db,
            Column::PowerConsumptionKw => self.power_consumption_kw,
            Column::OilLevelPct => self.oil_level_pct,
            Column::CoolantLevelPct => self.coolant_level_pct,
            Column::LastMaintenanceDaysAgo => self.last_maintenance_days_ago,
            Column::MaintenanceHistoryCount => self.maintenance_history_count,
            Column::FailureHistoryCount => self.failure_history_count,
            Column::ErrorCodesLast30Days => self.error_codes_last_30_days,
            Column::AiOverrideEvents => self.ai_override_events,
        }
    }

    /// Write a numeric field by column. Identity columns are ignored.
    pub fn set_value(&mut self, column: Column, value: Option<f64>) {
        match column {
            Column::MachineId | Column::MachineType => {}
            Column::InstallationYear => self.installation_year = value,
            Column::OperationalHours => self.operational_hours = value,
            Column::TemperatureC => self.temperature_c = value,
            Column::VibrationMms => self.vibration_mms = value,
            Column::SoundDb => self.sound_db = value,
            Column::PowerConsumptionKw => self.power_consumption_kw = value,
            Column::OilLevelPct => self.oil_level_pct = value,
            Column::CoolantLevelPct => self.coolant_level_pct = value,
            Column::LastMaintenanceDaysAgo => self.last_maintenance_days_ago = value,
            Column::MaintenanceHistoryCount => self.maintenance_history_count = value,
            Column::FailureHistoryCount => self.failure_history_count = value,
            Column::ErrorCodesLast30Days => self.error_codes_last_30_days = value,
            Column::AiOverrideEvents => self.ai_override_events = value,
        }
    }
}

/// Profile of the raw input produced by the loader.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataProfile {
    /// Rows in the raw input, before any cleaning
    pub row_count: usize,
    /// Recognized header columns, in header order
    pub recognized_columns: Vec<String>,
    /// Header columns that were ignored as unrecognized
    pub ignored_columns: Vec<String>,
    /// Numeric cells that failed to parse and were treated as missing
    pub unparsable_cells: usize,
}

/// Ordered collection of machine records plus batch-level metadata.
///
/// Exclusively owned by one pipeline run: mutated in place by cleaning and
/// KPI computation, read-only from anomaly detection onward.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MachineDataset {
    pub machines: Vec<MachineRecord>,
    pub columns: ColumnPresence,
    pub profile: DataProfile,
}

impl MachineDataset {
    /// Build a dataset directly from records (synthetic batches, API input).
    pub fn from_records(machines: Vec<MachineRecord>, columns: ColumnPresence) -> Self {
        let profile = DataProfile {
            row_count: machines.len(),
            recognized_columns: Vec::new(),
            ignored_columns: Vec::new(),
            unparsable_cells: 0,
        };
        Self {
            machines,
            columns,
            profile,
        }
    }

    pub fn len(&self) -> usize {
        self.machines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.machines.is_empty()
    }

    /// All present (Some) values of one column, in dataset order.
    pub fn column_values(&self, column: Column) -> Vec<f64> {
        self.machines
            .iter()
            .filter_map(|m| m.value(column))
            .collect()
    }

    /// All present KPI values selected by `f`, in dataset order.
    pub fn kpi_values(&self, f: impl Fn(&Kpi) -> Option<f64>) -> Vec<f64> {
        self.machines.iter().filter_map(|m| f(&m.kpi)).collect()
    }

    /// Fraction of missing cells over rows x present numeric columns.
    pub fn null_fraction(&self) -> f64 {
        let numeric = self.columns.numeric_present();
        let total = self.machines.len() * numeric.len();
        if total == 0 {
            return 0.0;
        }
        let nulls: usize = self
            .machines
            .iter()
            .map(|m| numeric.iter().filter(|c| m.value(**c).is_none()).count())
            .sum();
        nulls as f64 / total as f64
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_resolution_is_case_insensitive() {
        assert_eq!(Column::from_header("machine_id"), Some(Column::MachineId));
        assert_eq!(Column::from_header(" MACHINE_ID "), Some(Column::MachineId));
        assert_eq!(Column::from_header("Temperature_C"), Some(Column::TemperatureC));
        assert_eq!(Column::from_header("Spindle_Speed_RPM"), None);
    }

    #[test]
    fn risk_bins_are_inclusive_on_lower_bound() {
        assert_eq!(RiskCategory::from_health_score(0.0), RiskCategory::Critical);
        assert_eq!(RiskCategory::from_health_score(29.9), RiskCategory::Critical);
        assert_eq!(RiskCategory::from_health_score(30.0), RiskCategory::High);
        assert_eq!(RiskCategory::from_health_score(60.0), RiskCategory::Medium);
        assert_eq!(RiskCategory::from_health_score(80.0), RiskCategory::Low);
        assert_eq!(RiskCategory::from_health_score(100.0), RiskCategory::Low);
    }

    #[test]
    fn null_fraction_counts_missing_cells() {
        let mut columns = ColumnPresence::new();
        columns.insert(Column::MachineId);
        columns.insert(Column::TemperatureC);
        columns.insert(Column::VibrationMms);

        let machines = vec![
            MachineRecord {
                machine_id: "M0001".into(),
                temperature_c: Some(40.0),
                vibration_mms: None,
                ..Default::default()
            },
            MachineRecord {
                machine_id: "M0002".into(),
                temperature_c: Some(42.0),
                vibration_mms: Some(1.0),
                ..Default::default()
            },
        ];
        let dataset = MachineDataset::from_records(machines, columns);
        assert!((dataset.null_fraction() - 0.25).abs() < 1e-9);
    }
}
