//! System-wide default constants.
//!
//! Centralises magic numbers that would otherwise be scattered across the
//! codebase. Grouped by subsystem for easy discovery.

// ============================================================================
// Pipeline
// ============================================================================

/// Maximum attempts for each quality-gated stage (narrative, final report).
///
/// Bounded retries are the pipeline's only backpressure mechanism; the budget
/// guarantees termination when an external dependency fails persistently.
pub const MAX_VALIDATION_ATTEMPTS: u32 = 3;

// ============================================================================
// Metrics
// ============================================================================

/// Hours in a year of continuous 24/7 operation, the utilization denominator.
pub const HOURS_PER_YEAR: f64 = 24.0 * 365.0;

/// AI override events are rated per this many operational hours.
pub const AI_OVERRIDE_RATE_HOURS: f64 = 1000.0;

/// Risk category bin edges over the 0-100 health score, inclusive on the
/// lower bound: [0,30) Critical, [30,60) High, [60,80) Medium, [80,100] Low.
pub const RISK_BIN_CRITICAL: f64 = 30.0;
pub const RISK_BIN_HIGH: f64 = 60.0;
pub const RISK_BIN_MEDIUM: f64 = 80.0;

/// Midpoint assigned to a normalized sensor value when the source column is
/// constant across the batch (max == min), avoiding a division by zero.
pub const CONSTANT_COLUMN_MIDPOINT: f64 = 50.0;

// ============================================================================
// Cleaning
// ============================================================================

/// Outlier capping percentiles applied to sensor columns during cleaning.
pub const OUTLIER_CAP_LOW: f64 = 0.01;
pub const OUTLIER_CAP_HIGH: f64 = 0.99;

/// Oldest plausible installation year; earlier values are treated as entry
/// errors and replaced with the batch median.
pub const MIN_INSTALLATION_YEAR: f64 = 1990.0;

// ============================================================================
// Reporting
// ============================================================================

/// Maximum machine IDs listed inline per anomaly category or decision action.
pub const MACHINE_ID_PREVIEW: usize = 5;

/// Narrative text longer than this is truncated inside the report's AI
/// analysis section (the full text stays in the structured result).
pub const NARRATIVE_REPORT_LIMIT: usize = 2000;
