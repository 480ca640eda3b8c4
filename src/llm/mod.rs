//! External text-generation capability.
//!
//! The narrative synthesizer depends only on the [`TextGenerator`] trait; the
//! concrete backend (Gemini over HTTP) is injected at startup. All failure
//! modes collapse into [`GenerationError`] so callers treat them identically:
//! fall back to deterministic text, never surface provider detail.

mod gemini;

pub use gemini::GeminiClient;

use async_trait::async_trait;
use thiserror::Error;

/// Failure of a text-generation call.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("generation quota exceeded")]
    QuotaExceeded,

    #[error("generation timed out after {0}s")]
    Timeout(u64),

    #[error("malformed generation response: {0}")]
    Malformed(String),
}

/// Capability to turn a prompt into insight text.
///
/// Implementations handle transport, authentication, and response parsing.
/// They do not retry: retrying is the pipeline coordinator's responsibility so
/// the prompt can be re-derived from updated context on a later attempt.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;

    /// Model identifier for provenance tagging.
    fn model_name(&self) -> &str;
}
