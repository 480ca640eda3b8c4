//! Analysis Configuration Module
//!
//! Provides pipeline configuration loaded from TOML files, replacing all
//! hardcoded analysis thresholds with operator-tunable values.
//!
//! ## Loading Order
//!
//! 1. `FLEET_CONFIG` environment variable (path to TOML file)
//! 2. `fleet_config.toml` in the current working directory
//! 3. Built-in defaults (matching the documented thresholds)
//!
//! ## Usage
//!
//! Call `config::init()` once at startup, then `config::get()` anywhere:
//!
//! ```ignore
//! // In main():
//! config::init(AnalysisConfig::load());
//!
//! // Anywhere in the codebase:
//! let ratio = config::get().decision.critical_machine_ratio;
//! ```

mod analysis_config;
pub mod defaults;

pub use analysis_config::*;

use std::sync::OnceLock;

/// Global analysis configuration, initialized once at startup.
static ANALYSIS_CONFIG: OnceLock<AnalysisConfig> = OnceLock::new();

/// Initialize the global analysis configuration.
///
/// Should be called exactly once before the first `get()`. A second call is
/// ignored with a warning.
pub fn init(config: AnalysisConfig) {
    if ANALYSIS_CONFIG.set(config).is_err() {
        tracing::warn!("config::init() called more than once — ignoring");
    }
}

/// Get a reference to the global analysis configuration.
///
/// Falls back to built-in defaults when `init()` was never called, so library
/// consumers and tests do not need explicit initialization.
pub fn get() -> &'static AnalysisConfig {
    ANALYSIS_CONFIG.get_or_init(AnalysisConfig::default)
}

/// Check whether the config has been explicitly initialized.
pub fn is_initialized() -> bool {
    ANALYSIS_CONFIG.get().is_some()
}
