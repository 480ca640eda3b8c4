//! Bounded-retry combinator for quality-gated stages.
//!
//! The pipeline has two quality gates (narrative, final report) with identical
//! retry semantics: produce the artifact, validate it, record the verdict, and
//! either accept, retry, or give up. Factoring the loop into one combinator
//! keeps the two sites from drifting apart.

use std::future::Future;
use tracing::warn;

use crate::types::{GateState, NarrativeValidation, ReportValidation, ValidationHistory};

/// A quality-gate verdict the retry loop can interpret.
pub trait GateVerdict {
    fn passed(&self) -> bool;
    /// Whether another attempt could plausibly change the outcome.
    fn retry_advised(&self) -> bool;
    fn issues(&self) -> &[String];
}

impl GateVerdict for NarrativeValidation {
    fn passed(&self) -> bool {
        self.valid
    }
    fn retry_advised(&self) -> bool {
        self.retry_advised
    }
    fn issues(&self) -> &[String] {
        &self.issues
    }
}

impl GateVerdict for ReportValidation {
    fn passed(&self) -> bool {
        self.valid
    }
    // Re-assembly picks up upstream corrections, so an invalid report is
    // always worth the remaining budget.
    fn retry_advised(&self) -> bool {
        !self.valid
    }
    fn issues(&self) -> &[String] {
        &self.issues
    }
}

/// Final outcome of a gated stage.
pub struct GateOutcome<T, V> {
    pub artifact: T,
    pub verdict: V,
    pub attempts: u32,
    /// `Valid` on success; `Invalid` once the budget is spent or a retry
    /// would be pointless
    pub state: GateState,
}

/// Run `produce` then `validate` up to `max_attempts` times.
///
/// Every attempt appends exactly one entry to `history`, tagged with its
/// attempt number, pass or fail. The loop exits when the verdict passes, when
/// it advises against retrying, or when the budget is exhausted, whichever
/// comes first. The budget bound is what guarantees termination against a
/// persistently failing producer.
pub async fn run_gated<T, V, P, Fut, C>(
    stage: &str,
    max_attempts: u32,
    history: &mut ValidationHistory,
    mut produce: P,
    mut validate: C,
) -> GateOutcome<T, V>
where
    P: FnMut(u32) -> Fut,
    Fut: Future<Output = T>,
    C: FnMut(&T) -> V,
    V: GateVerdict,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;

    loop {
        let artifact = produce(attempt).await;
        let verdict = validate(&artifact);

        let message = if verdict.passed() {
            format!("{stage} passed")
        } else {
            format!("{stage} failed: {}", verdict.issues().join("; "))
        };
        history.record(stage, verdict.passed(), message, verdict.issues().to_vec(), attempt);

        if verdict.passed() {
            return GateOutcome {
                artifact,
                verdict,
                attempts: attempt,
                state: GateState::Valid,
            };
        }

        if !verdict.retry_advised() || attempt >= max_attempts {
            warn!(
                stage,
                attempts = attempt,
                retry_advised = verdict.retry_advised(),
                "Quality gate closed without a valid artifact"
            );
            return GateOutcome {
                artifact,
                verdict,
                attempts: attempt,
                state: GateState::Invalid,
            };
        }

        warn!(stage, attempt, max_attempts, "Quality gate retry");
        attempt += 1;
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    struct TestVerdict {
        passed: bool,
        retry: bool,
    }

    impl GateVerdict for TestVerdict {
        fn passed(&self) -> bool {
            self.passed
        }
        fn retry_advised(&self) -> bool {
            self.retry
        }
        fn issues(&self) -> &[String] {
            &[]
        }
    }

    #[tokio::test]
    async fn passes_on_first_valid_attempt() {
        let mut history = ValidationHistory::new();
        let outcome = run_gated(
            "gate",
            3,
            &mut history,
            |attempt| async move { attempt },
            |_| TestVerdict { passed: true, retry: false },
        )
        .await;

        assert_eq!(outcome.state, GateState::Valid);
        assert_eq!(outcome.attempts, 1);
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn retries_until_the_budget_is_spent() {
        let mut history = ValidationHistory::new();
        let outcome = run_gated(
            "gate",
            3,
            &mut history,
            |attempt| async move { attempt },
            |_| TestVerdict { passed: false, retry: true },
        )
        .await;

        assert_eq!(outcome.state, GateState::Invalid);
        assert_eq!(outcome.attempts, 3);
        // One history entry per attempt, tagged 1..=3.
        assert_eq!(history.len(), 3);
        let attempts: Vec<u32> = history.entries().iter().map(|e| e.attempt).collect();
        assert_eq!(attempts, [1, 2, 3]);
    }

    #[tokio::test]
    async fn stops_early_when_retry_is_not_advised() {
        let mut history = ValidationHistory::new();
        let outcome = run_gated(
            "gate",
            3,
            &mut history,
            |attempt| async move { attempt },
            |_| TestVerdict { passed: false, retry: false },
        )
        .await;

        assert_eq!(outcome.state, GateState::Invalid);
        assert_eq!(outcome.attempts, 1);
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn recovery_mid_budget_is_valid() {
        let mut history = ValidationHistory::new();
        let outcome = run_gated(
            "gate",
            3,
            &mut history,
            |attempt| async move { attempt },
            |artifact| TestVerdict { passed: *artifact >= 2, retry: true },
        )
        .await;

        assert_eq!(outcome.state, GateState::Valid);
        assert_eq!(outcome.attempts, 2);
        assert!(!history.entries()[0].passed);
        assert!(history.entries()[1].passed);
    }
}
