// detection/types.rs — Core types for authorship detection

use crate::stage::Details;
use serde::{Deserialize, Serialize};

/// Basis of a sentence's AI probability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AiSource {
    Remote,
    Heuristic,
    Fallback,
}

/// Authorship verdict for one text span
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorshipScore {
    /// Probability the text is AI-written (0.0 - 1.0)
    pub probability: f64,
    pub source: AiSource,
    pub details: Details,
}

pub const NEUTRAL_PROBABILITY: f64 = 0.5;

impl AuthorshipScore {
    /// Neutral verdict substituted when scoring fails
    pub fn neutral(reason: impl Into<String>) -> Self {
        let mut details = Details::new();
        details.insert("method".into(), "neutral_fallback".into());
        details.insert("reason".into(), reason.into().into());
        Self {
            probability: NEUTRAL_PROBABILITY,
            source: AiSource::Fallback,
            details,
        }
    }
}

/// Raw answer from a remote classifier
#[derive(Debug, Clone)]
pub struct RemoteVerdict {
    pub probability: f64,
    pub details: Details,
}

/// Scoring errors, always absorbed per sentence
#[derive(Debug, thiserror::Error)]
pub enum ScoringError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("Invalid response from classifier: {0}")]
    InvalidResponse(String),

    #[error("Timeout")]
    Timeout,

    #[error("Pattern error: {0}")]
    PatternError(String),

    #[error("Probability is not a finite number")]
    NonFinite,
}
