//! Anomaly categories, per-category findings, and the batch anomaly map.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fixed set of anomaly categories.
///
/// Declaration order is the report display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyCategory {
    HighTemperature,
    HighVibration,
    EnergySpike,
    ZeroUtilization,
    VeryLowUtilization,
    HighSound,
    MaintenanceOverdue,
    MaintenanceCritical,
    HighErrorRate,
    HighAiOverride,
    MultiFactorCritical,
}

impl AnomalyCategory {
    /// Human-readable label for reports.
    pub fn label(self) -> &'static str {
        match self {
            Self::HighTemperature => "High temperatures",
            Self::HighVibration => "High vibration",
            Self::EnergySpike => "Energy spikes",
            Self::ZeroUtilization => "Idle machines",
            Self::VeryLowUtilization => "Very low utilization",
            Self::HighSound => "High sound levels",
            Self::MaintenanceOverdue => "Maintenance overdue",
            Self::MaintenanceCritical => "Maintenance critical",
            Self::HighErrorRate => "Elevated fault codes",
            Self::HighAiOverride => "Frequent AI overrides",
            Self::MultiFactorCritical => "Multi-factor critical",
        }
    }

    /// All categories in display order.
    pub fn all() -> &'static [Self] {
        &[
            Self::HighTemperature,
            Self::HighVibration,
            Self::EnergySpike,
            Self::ZeroUtilization,
            Self::VeryLowUtilization,
            Self::HighSound,
            Self::MaintenanceOverdue,
            Self::MaintenanceCritical,
            Self::HighErrorRate,
            Self::HighAiOverride,
            Self::MultiFactorCritical,
        ]
    }
}

impl std::fmt::Display for AnomalyCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Severity tag attached to a category finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AnomalySeverity {
    Ok,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for AnomalySeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => write!(f, "OK"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::High => write!(f, "HIGH"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Machines flagged in one category, with the threshold that was applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryFinding {
    /// Flagged machine IDs, in dataset order
    pub machines: Vec<String>,
    pub severity: AnomalySeverity,
    /// Threshold value used for the membership test (quantile value, fixed
    /// day count, or rate bound depending on the category)
    pub threshold: f64,
}

/// A machine queued for action with the category that put it there.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriorityItem {
    pub machine_id: String,
    pub category: AnomalyCategory,
    /// "P1" or "P2"
    pub priority: &'static str,
}

/// Mapping from anomaly category to its finding for one batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnomalyMap {
    findings: BTreeMap<AnomalyCategory, CategoryFinding>,
}

impl AnomalyMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, category: AnomalyCategory, finding: CategoryFinding) {
        self.findings.insert(category, finding);
    }

    pub fn get(&self, category: AnomalyCategory) -> Option<&CategoryFinding> {
        self.findings.get(&category)
    }

    /// Flagged machine IDs for a category; empty when the category was not
    /// evaluated (source columns absent) or flagged nothing.
    pub fn machines_in(&self, category: AnomalyCategory) -> &[String] {
        self.findings
            .get(&category)
            .map_or(&[], |f| f.machines.as_slice())
    }

    pub fn count(&self, category: AnomalyCategory) -> usize {
        self.machines_in(category).len()
    }

    /// Total flagged machine entries across all categories (with repeats).
    pub fn total_flagged(&self) -> usize {
        self.findings.values().map(|f| f.machines.len()).sum()
    }

    /// Categories actually evaluated for this batch.
    pub fn categories(&self) -> impl Iterator<Item = (&AnomalyCategory, &CategoryFinding)> {
        self.findings.iter()
    }

    pub fn len(&self) -> usize {
        self.findings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }

    /// Prioritized action list: multi-factor and maintenance-critical
    /// machines first (P1), then temperature and vibration offenders (P2).
    /// Each machine appears once, at its highest priority.
    pub fn priority_list(&self) -> Vec<PriorityItem> {
        let mut items: Vec<PriorityItem> = Vec::new();
        let mut seen = std::collections::HashSet::new();

        let tiers: [(AnomalyCategory, &'static str); 4] = [
            (AnomalyCategory::MultiFactorCritical, "P1"),
            (AnomalyCategory::MaintenanceCritical, "P1"),
            (AnomalyCategory::HighTemperature, "P2"),
            (AnomalyCategory::HighVibration, "P2"),
        ];

        for (category, priority) in tiers {
            for machine in self.machines_in(category) {
                if seen.insert(machine.clone()) {
                    items.push(PriorityItem {
                        machine_id: machine.clone(),
                        category,
                        priority,
                    });
                }
            }
        }

        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(machines: &[&str], severity: AnomalySeverity) -> CategoryFinding {
        CategoryFinding {
            machines: machines.iter().map(|s| (*s).to_string()).collect(),
            severity,
            threshold: 0.0,
        }
    }

    #[test]
    fn priority_list_deduplicates_at_highest_priority() {
        let mut map = AnomalyMap::new();
        map.insert(
            AnomalyCategory::MultiFactorCritical,
            finding(&["M1"], AnomalySeverity::Critical),
        );
        map.insert(
            AnomalyCategory::HighTemperature,
            finding(&["M1", "M2"], AnomalySeverity::Medium),
        );

        let list = map.priority_list();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].machine_id, "M1");
        assert_eq!(list[0].priority, "P1");
        assert_eq!(list[1].machine_id, "M2");
        assert_eq!(list[1].priority, "P2");
    }

    #[test]
    fn missing_category_reads_as_empty() {
        let map = AnomalyMap::new();
        assert!(map.machines_in(AnomalyCategory::ZeroUtilization).is_empty());
        assert_eq!(map.count(AnomalyCategory::HighSound), 0);
    }
}
