//! Analysis Configuration - All pipeline thresholds as operator-tunable TOML values
//!
//! Every threshold the pipeline applies is a field in this module. Each struct
//! implements `Default` with values matching the documented constants, ensuring
//! zero-change behavior when no config file is present.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for an analysis deployment.
///
/// Load with `AnalysisConfig::load()` which searches:
/// 1. `$FLEET_CONFIG` env var
/// 2. `./fleet_config.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Raw and post-cleaning data validation thresholds
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Summary classification thresholds
    #[serde(default)]
    pub summary: SummaryConfig,

    /// Anomaly detection thresholds
    #[serde(default)]
    pub anomaly: AnomalyConfig,

    /// Decision rule thresholds
    #[serde(default)]
    pub decision: DecisionConfig,

    /// Narrative and report quality-gate criteria
    #[serde(default)]
    pub quality: QualityConfig,

    /// Text-generation backend tuning
    #[serde(default)]
    pub llm: LlmConfig,

    /// HTTP server configuration for the `web` command
    #[serde(default)]
    pub server: ServerConfig,
}

impl AnalysisConfig {
    /// Load configuration using the standard search order:
    /// 1. `$FLEET_CONFIG` environment variable
    /// 2. `./fleet_config.toml` in the current working directory
    /// 3. Built-in defaults
    pub fn load() -> Self {
        if let Ok(path) = std::env::var("FLEET_CONFIG") {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded analysis config from FLEET_CONFIG");
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from FLEET_CONFIG, falling back");
                    }
                }
            } else {
                warn!(path = %path, "FLEET_CONFIG points to non-existent file, falling back");
            }
        }

        let local = PathBuf::from("fleet_config.toml");
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded analysis config from ./fleet_config.toml");
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./fleet_config.toml, using defaults");
                }
            }
        }

        info!("No fleet_config.toml found — using built-in defaults");
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: Self = toml::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(config)
    }
}

/// Error loading or parsing a config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

// ============================================================================
// Validation
// ============================================================================

/// Expected value range for one input column; out-of-range values are
/// reported as warnings, never dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValueRange {
    pub column: String,
    pub min: f64,
    pub max: f64,
}

/// Thresholds for the raw and post-cleaning validation gates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Minimum rows in the raw batch; below this the run is rejected
    pub min_rows: usize,
    /// Minimum rows that must survive cleaning
    pub min_rows_after_clean: usize,
    /// Null fraction above which raw validation fails hard
    pub max_null_fraction: f64,
    /// Null fraction above which raw validation warns
    pub warn_null_fraction: f64,
    /// Columns that must be present in the input header
    pub required_columns: Vec<String>,
    /// Plausibility ranges checked at both gates
    pub value_ranges: Vec<ValueRange>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_rows: 10,
            min_rows_after_clean: 5,
            max_null_fraction: 0.3,
            warn_null_fraction: 0.1,
            required_columns: vec![
                "Machine_ID".into(),
                "Machine_Type".into(),
                "Operational_Hours".into(),
                "Power_Consumption_kW".into(),
                "Temperature_C".into(),
                "Vibration_mms".into(),
                "Sound_dB".into(),
                "Installation_Year".into(),
            ],
            value_ranges: vec![
                ValueRange { column: "Temperature_C".into(), min: 0.0, max: 200.0 },
                ValueRange { column: "Vibration_mms".into(), min: 0.0, max: 100.0 },
                ValueRange { column: "Sound_dB".into(), min: 0.0, max: 150.0 },
                ValueRange { column: "Operational_Hours".into(), min: 0.0, max: 200_000.0 },
                ValueRange { column: "Power_Consumption_kW".into(), min: -50.0, max: 1000.0 },
            ],
        }
    }
}

// ============================================================================
// Summary
// ============================================================================

/// Classification thresholds for the aggregate analysis summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryConfig {
    /// Utilization below this marks a machine as underutilized (critical)
    pub underutilized_threshold: f64,
    /// Utilization at or above this marks a machine as well utilized
    pub well_utilized_threshold: f64,
    /// Health score below this marks a machine as critical health
    pub critical_health_threshold: f64,
    /// Health score at or above this marks a machine as good health
    pub good_health_threshold: f64,
    /// Days since maintenance above which a machine counts as overdue
    pub maintenance_overdue_days: f64,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            underutilized_threshold: 0.4,
            well_utilized_threshold: 0.7,
            critical_health_threshold: 50.0,
            good_health_threshold: 80.0,
            maintenance_overdue_days: 180.0,
        }
    }
}

// ============================================================================
// Anomaly Detection
// ============================================================================

/// Thresholds for the anomaly detector.
///
/// Quantile categories are distribution-relative; the maintenance thresholds
/// are absolute business rules in days. The multi-factor and severity counts
/// are preserved heuristics from the operating procedure, not derived values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyConfig {
    /// Quantile used for "high" anomaly thresholds
    pub percentile_high: f64,
    /// Quantile used for "low" anomaly thresholds
    pub percentile_low: f64,
    /// Utilization strictly below this (and above zero) is very low
    pub very_low_utilization: f64,
    /// Days since maintenance beyond which a machine is overdue
    pub maintenance_overdue_days: f64,
    /// Days since maintenance beyond which the backlog is critical
    pub maintenance_critical_days: f64,
    /// Distinct categories a machine must appear in to be multi-factor critical
    pub multi_factor_min_categories: usize,
    /// Flagged-machine count above which a category is labeled High severity
    pub severity_high_count: usize,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            percentile_high: 0.95,
            percentile_low: 0.05,
            very_low_utilization: 0.1,
            maintenance_overdue_days: 180.0,
            maintenance_critical_days: 365.0,
            multi_factor_min_categories: 3,
            severity_high_count: 5,
        }
    }
}

// ============================================================================
// Decision Rules
// ============================================================================

/// Thresholds for the rule-based advisor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionConfig {
    /// Critical-machine fraction above which fleet maintenance is urgent
    pub critical_machine_ratio: f64,
    /// High-temperature machine count above which a safety response is urgent
    pub high_temp_count: usize,
    /// Vibration anomaly count above which diagnostics are requested
    pub vibration_count: usize,
    /// Overdue-maintenance fraction of the fleet that escalates to High
    pub maintenance_overdue_ratio: f64,
    /// Average health score below which a fleet-wide alert is raised
    pub low_health_threshold: f64,
    /// Keywords in the narrative that trigger an audit decision
    pub risk_keywords: Vec<String>,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            critical_machine_ratio: 0.30,
            high_temp_count: 5,
            vibration_count: 3,
            maintenance_overdue_ratio: 0.20,
            low_health_threshold: 50.0,
            risk_keywords: vec![
                "major risk".into(),
                "danger".into(),
                "emergency".into(),
                "safety hazard".into(),
            ],
        }
    }
}

// ============================================================================
// Quality Gates
// ============================================================================

/// Criteria applied by the output validator to narrative text and the final
/// composed report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityConfig {
    /// Narrative shorter than this fails hard
    pub narrative_min_chars: usize,
    /// Narrative longer than this is flagged as a warning
    pub narrative_max_chars: usize,
    /// Report shorter than this fails hard
    pub report_min_chars: usize,
    /// Section identifiers that must appear (case-insensitive) in the report
    pub required_sections: Vec<String>,
    /// Critical-machine fraction above which the narrative must carry urgency
    pub consistency_critical_ratio: f64,
    /// Average health below which the narrative must address machine health
    pub consistency_health_floor: f64,
    /// Terms that satisfy the urgency consistency check
    pub urgency_terms: Vec<String>,
    /// Terms that satisfy the health consistency check
    pub health_terms: Vec<String>,
    /// Topic keywords the narrative is expected to cover
    pub topic_terms: Vec<String>,
    /// Terms whose presence in the narrative is flagged as concerning
    pub concerning_terms: Vec<String>,
    /// Terms indicating the narrative contains actionable recommendations
    pub actionable_terms: Vec<String>,
    /// Fraction of required sections below which the report is unbalanced
    pub section_coverage_warn: f64,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            narrative_min_chars: 100,
            narrative_max_chars: 10_000,
            report_min_chars: 1000,
            required_sections: vec![
                "KPI".into(),
                "ANOMALIES".into(),
                "DECISIONS".into(),
                "TRACEABILITY".into(),
            ],
            consistency_critical_ratio: 0.2,
            consistency_health_floor: 60.0,
            urgency_terms: vec![
                "urgent".into(),
                "critical".into(),
                "immediate".into(),
                "priority".into(),
            ],
            health_terms: vec![
                "health".into(),
                "condition".into(),
                "degraded".into(),
            ],
            topic_terms: vec!["problem".into(), "action".into(), "recommend".into()],
            concerning_terms: vec!["impossible".into(), "unavailable".into(), "cannot".into()],
            actionable_terms: vec![
                "recommend".into(),
                "action".into(),
                "priority".into(),
                "urgent".into(),
                "immediate".into(),
            ],
            section_coverage_warn: 0.75,
        }
    }
}

// ============================================================================
// LLM
// ============================================================================

/// Text-generation backend configuration.
///
/// The API key is never stored in the config file; it comes from the CLI flag
/// or the `GEMINI_API_KEY` environment variable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Model identifier passed to the backend
    pub model: String,
    /// Base URL of the generation endpoint
    pub endpoint: String,
    /// Hard timeout on a single generation call (seconds)
    pub timeout_secs: u64,
    /// Maximum output tokens requested per call
    pub max_output_tokens: u32,
    /// Sampling temperature
    pub temperature: f64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-flash".into(),
            endpoint: "https://generativelanguage.googleapis.com".into(),
            timeout_secs: 30,
            max_output_tokens: 2048,
            temperature: 0.7,
        }
    }
}

// ============================================================================
// Server
// ============================================================================

/// HTTP server configuration for the `web` command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    pub addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:8080".into(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_thresholds() {
        let config = AnalysisConfig::default();
        assert_eq!(config.validation.min_rows, 10);
        assert!((config.anomaly.percentile_high - 0.95).abs() < f64::EPSILON);
        assert!((config.anomaly.maintenance_overdue_days - 180.0).abs() < f64::EPSILON);
        assert!((config.anomaly.maintenance_critical_days - 365.0).abs() < f64::EPSILON);
        assert!((config.decision.critical_machine_ratio - 0.30).abs() < f64::EPSILON);
        assert_eq!(config.quality.report_min_chars, 1000);
        assert_eq!(config.quality.required_sections.len(), 4);
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let toml_str = r#"
            [anomaly]
            percentile_high = 0.9

            [decision]
            high_temp_count = 10
        "#;
        let config: AnalysisConfig = toml::from_str(toml_str).expect("valid TOML");
        assert!((config.anomaly.percentile_high - 0.9).abs() < f64::EPSILON);
        assert_eq!(config.decision.high_temp_count, 10);
        // Untouched sections keep their defaults
        assert_eq!(config.validation.min_rows, 10);
        assert!((config.decision.critical_machine_ratio - 0.30).abs() < f64::EPSILON);
    }

    #[test]
    fn load_from_missing_file_is_an_error() {
        let result = AnalysisConfig::load_from_file(Path::new("/nonexistent/fleet.toml"));
        assert!(result.is_err());
    }
}
