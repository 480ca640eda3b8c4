//! Narrative text produced by the synthesizer.

use serde::{Deserialize, Serialize};

/// How the narrative text was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NarrativeMode {
    /// Text returned by the external generation capability
    Generated,
    /// Deterministic templated text built from the numeric summary
    Fallback,
}

impl std::fmt::Display for NarrativeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Generated => write!(f, "generated"),
            Self::Fallback => write!(f, "fallback"),
        }
    }
}

/// Narrative insight text plus its provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Narrative {
    pub text: String,
    pub mode: NarrativeMode,
    /// Model identifier when the text was externally generated
    pub model: Option<String>,
}

impl Narrative {
    pub fn generated(text: String, model: impl Into<String>) -> Self {
        Self {
            text,
            mode: NarrativeMode::Generated,
            model: Some(model.into()),
        }
    }

    pub fn fallback(text: String) -> Self {
        Self {
            text,
            mode: NarrativeMode::Fallback,
            model: None,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.mode == NarrativeMode::Fallback
    }
}
