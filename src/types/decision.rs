//! Decision types produced by the rule-based advisor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-decision priority. Ordering: P1 sorts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    P1,
    P2,
    P3,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::P1 => write!(f, "P1"),
            Self::P2 => write!(f, "P2"),
            Self::P3 => write!(f, "P3"),
        }
    }
}

/// Estimated operational impact of carrying out a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Impact {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for Impact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "LOW"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::High => write!(f, "HIGH"),
        }
    }
}

/// Functional category of a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionCategory {
    Maintenance,
    Safety,
    Monitoring,
    Diagnostic,
    Operations,
    Quality,
    Audit,
    Health,
}

impl std::fmt::Display for DecisionCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Maintenance => "maintenance",
            Self::Safety => "safety",
            Self::Monitoring => "monitoring",
            Self::Diagnostic => "diagnostic",
            Self::Operations => "operations",
            Self::Quality => "quality",
            Self::Audit => "audit",
            Self::Health => "health",
        };
        write!(f, "{s}")
    }
}

/// Overall run priority. Escalation is monotonic within a run: once raised,
/// never downgraded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OverallPriority {
    Normal,
    High,
    Urgent,
}

impl OverallPriority {
    /// Raise to `target` if it is higher than the current level.
    pub fn escalate_to(&mut self, target: Self) {
        if target > *self {
            *self = target;
        }
    }
}

impl std::fmt::Display for OverallPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Normal => write!(f, "NORMAL"),
            Self::High => write!(f, "HIGH"),
            Self::Urgent => write!(f, "URGENT"),
        }
    }
}

/// One actionable decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub action: String,
    pub priority: Priority,
    pub category: DecisionCategory,
    pub impact: Impact,
}

/// The advisor's full output for one run. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub timestamp: DateTime<Utc>,
    pub overall_priority: OverallPriority,
    /// Decisions sorted P1 -> P3, stable within equal priorities
    pub decisions: Vec<Decision>,
    /// True when the overall priority is High or Urgent
    pub action_needed: bool,
    pub risk_factors: Vec<String>,
}

impl DecisionRecord {
    pub fn p1_count(&self) -> usize {
        self.decisions
            .iter()
            .filter(|d| d.priority == Priority::P1)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escalation_never_downgrades() {
        let mut priority = OverallPriority::Normal;
        priority.escalate_to(OverallPriority::Urgent);
        assert_eq!(priority, OverallPriority::Urgent);
        priority.escalate_to(OverallPriority::High);
        assert_eq!(priority, OverallPriority::Urgent);
        priority.escalate_to(OverallPriority::Normal);
        assert_eq!(priority, OverallPriority::Urgent);
    }

    #[test]
    fn priority_orders_p1_first() {
        assert!(Priority::P1 < Priority::P2);
        assert!(Priority::P2 < Priority::P3);
    }
}
