// detection/mod.rs — Per-sentence AI authorship scoring
//
// Preference order: remote classifier, then the local heuristic, then a
// neutral 0.5 verdict. Scoring never fails a job.

mod gptzero;
pub mod heuristic;
mod types;

pub use gptzero::GptZeroClassifier;
pub use types::{AiSource, AuthorshipScore, RemoteVerdict, ScoringError, NEUTRAL_PROBABILITY};

use async_trait::async_trait;
use std::time::Duration;
use tokio::time::timeout;

/// Remote authorship classifier
#[async_trait]
pub trait RemoteClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<RemoteVerdict, ScoringError>;

    fn name(&self) -> &str;
}

pub struct AuthorshipScorer {
    remote: Option<Box<dyn RemoteClassifier>>,
    remote_timeout: Duration,
}

impl AuthorshipScorer {
    pub fn new(remote: Option<Box<dyn RemoteClassifier>>, remote_timeout: Duration) -> Self {
        Self {
            remote,
            remote_timeout,
        }
    }

    pub fn heuristic_only() -> Self {
        Self::new(None, Duration::ZERO)
    }

    pub fn remote_name(&self) -> Option<&str> {
        self.remote.as_ref().map(|remote| remote.name())
    }

    /// Remote verdict if available and valid, otherwise the heuristic
    async fn try_score(&self, text: &str) -> Result<AuthorshipScore, ScoringError> {
        if let Some(remote) = &self.remote {
            match timeout(self.remote_timeout, remote.classify(text)).await {
                Ok(Ok(verdict)) if (0.0..=1.0).contains(&verdict.probability) => {
                    return Ok(AuthorshipScore {
                        probability: verdict.probability,
                        source: AiSource::Remote,
                        details: verdict.details,
                    });
                }
                Ok(Ok(verdict)) => {
                    tracing::warn!(
                        "{} returned out-of-range probability {}, using heuristic",
                        remote.name(),
                        verdict.probability
                    );
                }
                Ok(Err(e)) => {
                    tracing::warn!("{} failed: {}, using heuristic", remote.name(), e);
                }
                Err(_) => {
                    tracing::warn!(
                        "{} timed out after {:?}, using heuristic",
                        remote.name(),
                        self.remote_timeout
                    );
                }
            }
        }

        heuristic::score(text)
    }

    /// Total scoring: any failure yields the neutral verdict
    pub async fn score(&self, text: &str) -> AuthorshipScore {
        match self.try_score(text).await {
            Ok(score) => score,
            Err(e) => {
                tracing::warn!("Authorship scoring failed: {}", e);
                AuthorshipScore::neutral(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::Details;

    struct FixedClassifier(f64);

    #[async_trait]
    impl RemoteClassifier for FixedClassifier {
        async fn classify(&self, _text: &str) -> Result<RemoteVerdict, ScoringError> {
            Ok(RemoteVerdict {
                probability: self.0,
                details: Details::new(),
            })
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    struct FailingClassifier;

    #[async_trait]
    impl RemoteClassifier for FailingClassifier {
        async fn classify(&self, _text: &str) -> Result<RemoteVerdict, ScoringError> {
            Err(ScoringError::NetworkError("connection refused".to_string()))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    struct SlowClassifier;

    #[async_trait]
    impl RemoteClassifier for SlowClassifier {
        async fn classify(&self, _text: &str) -> Result<RemoteVerdict, ScoringError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(RemoteVerdict {
                probability: 0.9,
                details: Details::new(),
            })
        }

        fn name(&self) -> &str {
            "slow"
        }
    }

    fn scorer(remote: impl RemoteClassifier + 'static) -> AuthorshipScorer {
        AuthorshipScorer::new(Some(Box::new(remote)), Duration::from_millis(50))
    }

    #[tokio::test]
    async fn test_remote_verdict_preferred() {
        let score = scorer(FixedClassifier(0.73)).score("Anything at all.").await;
        assert_eq!(score.source, AiSource::Remote);
        assert_eq!(score.probability, 0.73);
    }

    #[tokio::test]
    async fn test_out_of_range_remote_uses_heuristic() {
        let score = scorer(FixedClassifier(1.7)).score("The meeting starts at noon.").await;
        assert_eq!(score.source, AiSource::Heuristic);
        assert!((score.probability - 0.3).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_remote_failure_uses_heuristic() {
        let score = scorer(FailingClassifier).score("Hey, this is awesome!").await;
        assert_eq!(score.source, AiSource::Heuristic);
    }

    #[tokio::test]
    async fn test_remote_timeout_uses_heuristic() {
        let score = scorer(SlowClassifier).score("Moreover, we optimize.").await;
        assert_eq!(score.source, AiSource::Heuristic);
    }

    #[tokio::test]
    async fn test_heuristic_only() {
        let scorer = AuthorshipScorer::heuristic_only();
        assert!(scorer.remote_name().is_none());
        let score = scorer.score("Furthermore, it is important to optimize.").await;
        assert_eq!(score.source, AiSource::Heuristic);
        assert!(score.probability > 0.5);
    }

    #[test]
    fn test_neutral_score() {
        let score = AuthorshipScore::neutral("boom");
        assert_eq!(score.probability, NEUTRAL_PROBABILITY);
        assert_eq!(score.source, AiSource::Fallback);
    }
}
