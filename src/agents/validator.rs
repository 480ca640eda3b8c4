//! Data validation at two pipeline gates.
//!
//! Raw validation is the hard gate: a failure aborts the run before any
//! transformation. Post-cleaning validation is deliberately soft: its
//! failures are logged to the traceability history as warnings and the
//! pipeline continues (residual issues after cleaning are informational,
//! pre-cleaning issues are fatal).

use std::collections::HashSet;
use tracing::{info, warn};

use crate::config::{self, ValidationConfig};
use crate::types::{Column, MachineDataset, ValidationReport};

/// Validates data quality before and after cleaning.
pub struct DataValidator {
    config: ValidationConfig,
}

impl DataValidator {
    pub fn new() -> Self {
        Self::with_config(config::get().validation.clone())
    }

    pub fn with_config(config: ValidationConfig) -> Self {
        Self { config }
    }

    /// Validate a raw batch before preprocessing. A failed result is fatal.
    pub fn validate_raw(&self, dataset: &MachineDataset) -> ValidationReport {
        let mut issues = Vec::new();
        let mut warnings = Vec::new();

        // 1. Minimum batch size
        if dataset.len() < self.config.min_rows {
            issues.push(format!(
                "Insufficient data: {} rows (minimum: {})",
                dataset.len(),
                self.config.min_rows
            ));
        }

        // 2. Required columns
        let missing: Vec<&str> = self
            .config
            .required_columns
            .iter()
            .filter_map(|name| match Column::from_header(name) {
                Some(col) if dataset.columns.has(col) => None,
                _ => Some(name.as_str()),
            })
            .collect();
        if !missing.is_empty() {
            issues.push(format!("Missing required columns: {}", missing.join(", ")));
        }

        // 3. Missing-cell fraction
        let null_fraction = dataset.null_fraction();
        if null_fraction > self.config.max_null_fraction {
            issues.push(format!(
                "High null fraction: {:.1}% (max: {:.0}%)",
                null_fraction * 100.0,
                self.config.max_null_fraction * 100.0
            ));
        } else if null_fraction > self.config.warn_null_fraction {
            warnings.push(format!(
                "Moderate null fraction: {:.1}%",
                null_fraction * 100.0
            ));
        }

        // 4. Duplicate machine IDs
        let mut seen = HashSet::new();
        let duplicates = dataset
            .machines
            .iter()
            .filter(|m| !m.machine_id.is_empty() && !seen.insert(m.machine_id.as_str()))
            .count();
        if duplicates > 0 {
            warnings.push(format!("Found {duplicates} duplicate Machine_IDs"));
        }

        // 5. Plausibility ranges
        warnings.extend(self.check_value_ranges(dataset));

        let valid = issues.is_empty();
        if valid {
            info!(warnings = warnings.len(), "Raw data validation passed");
        } else {
            warn!(issues = ?issues, "Raw data validation failed");
        }

        ValidationReport {
            valid,
            issues,
            warnings,
            row_count: dataset.len(),
        }
    }

    /// Validate the batch after cleaning. Failures here are advisory.
    pub fn validate_processed(&self, dataset: &MachineDataset) -> ValidationReport {
        let mut issues = Vec::new();
        let mut warnings = Vec::new();

        // 1. Cleaning must not consume the batch
        if dataset.len() < self.config.min_rows_after_clean {
            issues.push(format!(
                "Too much data lost during cleaning: only {} rows remaining",
                dataset.len()
            ));
        }

        // 2. No residual missing cells in present numeric columns
        let residual: Vec<&str> = dataset
            .columns
            .numeric_present()
            .into_iter()
            .filter(|&col| dataset.machines.iter().any(|m| m.value(col).is_none()))
            .map(Column::name)
            .collect();
        if !residual.is_empty() {
            issues.push(format!(
                "Missing values persist after cleaning in: {}",
                residual.join(", ")
            ));
        }

        // 3. Non-finite values
        let non_finite: Vec<&str> = dataset
            .columns
            .numeric_present()
            .into_iter()
            .filter(|&col| {
                dataset
                    .machines
                    .iter()
                    .any(|m| m.value(col).is_some_and(|v| !v.is_finite()))
            })
            .map(Column::name)
            .collect();
        if !non_finite.is_empty() {
            issues.push(format!(
                "Non-finite values found in: {}",
                non_finite.join(", ")
            ));
        }

        // 4. Plausibility ranges, re-checked after transformation
        warnings.extend(self.check_value_ranges(dataset));

        // 5. Negative values where operations forbid them
        for col in [Column::OperationalHours, Column::PowerConsumptionKw] {
            if !dataset.columns.has(col) {
                continue;
            }
            let negatives = dataset
                .machines
                .iter()
                .filter(|m| m.value(col).is_some_and(|v| v < 0.0))
                .count();
            if negatives > 0 {
                warnings.push(format!("Found {negatives} negative values in {}", col.name()));
            }
        }

        let valid = issues.is_empty();
        if valid {
            info!(warnings = warnings.len(), "Processed data validation passed");
        } else {
            warn!(issues = ?issues, "Processed data validation flagged issues");
        }

        ValidationReport {
            valid,
            issues,
            warnings,
            row_count: dataset.len(),
        }
    }

    fn check_value_ranges(&self, dataset: &MachineDataset) -> Vec<String> {
        let mut findings = Vec::new();
        for range in &self.config.value_ranges {
            let Some(col) = Column::from_header(&range.column) else {
                continue;
            };
            if !dataset.columns.has(col) {
                continue;
            }
            let out_of_range = dataset
                .machines
                .iter()
                .filter(|m| {
                    m.value(col)
                        .is_some_and(|v| v < range.min || v > range.max)
                })
                .count();
            if out_of_range > 0 {
                findings.push(format!(
                    "{}: {} values outside range [{}, {}]",
                    col.name(),
                    out_of_range,
                    range.min,
                    range.max
                ));
            }
        }
        findings
    }
}

impl Default for DataValidator {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
