//! Data cleaning and preparation.
//!
//! Runs between the two validation gates. Removes rows that cannot be
//! analyzed, caps sensor outliers, clips noise-induced negative power draw,
//! and fills remaining gaps with column medians so the metric engine sees a
//! dense batch.

use chrono::{Datelike, Utc};
use tracing::info;

use super::stats;
use crate::config::defaults::{MIN_INSTALLATION_YEAR, OUTLIER_CAP_HIGH, OUTLIER_CAP_LOW};
use crate::types::{CleaningReport, Column, MachineDataset};

/// Sensor columns subject to percentile outlier capping.
const OUTLIER_COLUMNS: [Column; 4] = [
    Column::TemperatureC,
    Column::VibrationMms,
    Column::SoundDb,
    Column::PowerConsumptionKw,
];

/// Cleans a validated batch in place.
pub struct DataCleaner;

impl DataCleaner {
    pub fn new() -> Self {
        Self
    }

    /// Clean the dataset and report what changed.
    pub fn clean(&self, dataset: &mut MachineDataset) -> CleaningReport {
        let initial_rows = dataset.len();
        let mut steps = Vec::new();
        let mut values_filled = 0usize;
        let mut values_capped = 0usize;

        // Step 1: rows without identity cannot be attributed to a machine.
        let before = dataset.len();
        dataset
            .machines
            .retain(|m| !m.machine_id.trim().is_empty() && !m.machine_type.trim().is_empty());
        let dropped = before - dataset.len();
        if dropped > 0 {
            steps.push(format!("Dropped {dropped} rows with missing identity"));
        }

        // Step 2: non-positive operational hours make every rate KPI undefined.
        if dataset.columns.has(Column::OperationalHours) {
            let before = dataset.len();
            dataset
                .machines
                .retain(|m| m.operational_hours.map_or(true, |h| h > 0.0));
            let dropped = before - dataset.len();
            if dropped > 0 {
                steps.push(format!(
                    "Removed {dropped} rows with non-positive Operational_Hours"
                ));
            }
        }

        // Step 3: cap sensor outliers at the 1st/99th percentile.
        for col in OUTLIER_COLUMNS {
            if !dataset.columns.has(col) {
                continue;
            }
            let values = dataset.column_values(col);
            let (Some(low), Some(high)) = (
                stats::quantile(&values, OUTLIER_CAP_LOW),
                stats::quantile(&values, OUTLIER_CAP_HIGH),
            ) else {
                continue;
            };
            for machine in &mut dataset.machines {
                if let Some(v) = machine.value(col) {
                    let capped = v.clamp(low, high);
                    if (capped - v).abs() > f64::EPSILON {
                        machine.set_value(col, Some(capped));
                        values_capped += 1;
                    }
                }
            }
        }
        if values_capped > 0 {
            steps.push(format!(
                "Capped {values_capped} outlier values (1st-99th percentile)"
            ));
        }

        // Step 4: power draw may dip negative from sensor noise; clip at zero.
        if dataset.columns.has(Column::PowerConsumptionKw) {
            let mut clipped = 0usize;
            for machine in &mut dataset.machines {
                if let Some(v) = machine.power_consumption_kw {
                    if v < 0.0 {
                        machine.power_consumption_kw = Some(0.0);
                        clipped += 1;
                    }
                }
            }
            if clipped > 0 {
                steps.push(format!("Clipped {clipped} negative power readings to zero"));
            }
        }

        // Step 5: implausible installation years become the batch median.
        if dataset.columns.has(Column::InstallationYear) {
            let max_year = f64::from(Utc::now().year() + 5);
            let valid_years: Vec<f64> = dataset
                .column_values(Column::InstallationYear)
                .into_iter()
                .filter(|&y| (MIN_INSTALLATION_YEAR..=max_year).contains(&y))
                .collect();
            if let Some(median_year) = stats::median(&valid_years) {
                let mut corrected = 0usize;
                for machine in &mut dataset.machines {
                    if let Some(y) = machine.installation_year {
                        if !(MIN_INSTALLATION_YEAR..=max_year).contains(&y) {
                            machine.installation_year = Some(median_year);
                            corrected += 1;
                        }
                    }
                }
                if corrected > 0 {
                    steps.push(format!(
                        "Corrected {corrected} implausible Installation_Year values"
                    ));
                }
            }
        }

        // Step 6: fill remaining gaps with the column median.
        for col in dataset.columns.numeric_present() {
            let values = dataset.column_values(col);
            let Some(median) = stats::median(&values) else {
                continue;
            };
            for machine in &mut dataset.machines {
                if machine.value(col).is_none() {
                    machine.set_value(col, Some(median));
                    values_filled += 1;
                }
            }
        }
        if values_filled > 0 {
            steps.push(format!("Filled {values_filled} missing values with column medians"));
        }

        let final_rows = dataset.len();
        let report = CleaningReport {
            initial_rows,
            final_rows,
            rows_removed: initial_rows - final_rows,
            removal_rate: if initial_rows > 0 {
                (initial_rows - final_rows) as f64 / initial_rows as f64 * 100.0
            } else {
                0.0
            },
            values_filled,
            values_capped,
            steps,
        };

        info!(
            retained = final_rows,
            removed = report.rows_removed,
            filled = values_filled,
            capped = values_capped,
            "Cleaning complete"
        );

        report
    }
}

impl Default for DataCleaner {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
