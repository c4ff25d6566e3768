//! Gateway in front of the external spam classifier.
//!
//! The model itself is an opaque collaborator. The gateway's job is the
//! fallback chain: full probability first, binary classification coerced to
//! 0.0/1.0 second, and only when both paths error does scoring surface as
//! unavailable. Callers must treat that failure as "no signal", never as
//! "flag by default".

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("classifier could not score the message")]
pub struct ScoringUnavailable;

/// Opaque scoring capability, usually backed by a trained model.
#[async_trait]
pub trait SpamScorer: Send + Sync {
    /// Probability in [0, 1] that the text is spam/phishing.
    async fn predict_proba(&self, text: &str) -> anyhow::Result<f64>;

    /// Binary fallback for scorers that cannot produce a distribution.
    async fn predict(&self, text: &str) -> anyhow::Result<bool>;

    fn name(&self) -> &str {
        "scorer"
    }
}

pub struct ClassifierGateway {
    scorer: Box<dyn SpamScorer>,
}

impl ClassifierGateway {
    pub fn new(scorer: Box<dyn SpamScorer>) -> Self {
        Self { scorer }
    }

    /// Score non-empty message text. Pure; the caller owns any logging of
    /// the returned probability.
    pub async fn score(&self, text: &str) -> Result<f64, ScoringUnavailable> {
        match self.scorer.predict_proba(text).await {
            Ok(probability) => Ok(probability.clamp(0.0, 1.0)),
            Err(e) => {
                log::debug!(
                    "scorer {} failed to produce a probability, trying binary fallback: {e}",
                    self.scorer.name()
                );
                match self.scorer.predict(text).await {
                    Ok(true) => Ok(1.0),
                    Ok(false) => Ok(0.0),
                    Err(e) => {
                        log::debug!("binary fallback failed too: {e}");
                        Err(ScoringUnavailable)
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    /// Scorer whose two paths can be independently broken.
    struct FakeScorer {
        proba: Option<f64>,
        binary: Option<bool>,
    }

    #[async_trait]
    impl SpamScorer for FakeScorer {
        async fn predict_proba(&self, _text: &str) -> anyhow::Result<f64> {
            self.proba.ok_or_else(|| anyhow!("no distribution"))
        }

        async fn predict(&self, _text: &str) -> anyhow::Result<bool> {
            self.binary.ok_or_else(|| anyhow!("model unavailable"))
        }
    }

    fn gateway(proba: Option<f64>, binary: Option<bool>) -> ClassifierGateway {
        ClassifierGateway::new(Box::new(FakeScorer { proba, binary }))
    }

    #[tokio::test]
    async fn test_probability_path_wins() {
        let score = gateway(Some(0.42), Some(true)).score("hello").await;
        assert_eq!(score, Ok(0.42));
    }

    #[tokio::test]
    async fn test_binary_fallback_coerces_to_extremes() {
        assert_eq!(gateway(None, Some(true)).score("x").await, Ok(1.0));
        assert_eq!(gateway(None, Some(false)).score("x").await, Ok(0.0));
    }

    #[tokio::test]
    async fn test_both_paths_failing_is_unavailable() {
        assert_eq!(gateway(None, None).score("x").await, Err(ScoringUnavailable));
    }

    #[tokio::test]
    async fn test_out_of_range_probability_clamped() {
        assert_eq!(gateway(Some(1.7), None).score("x").await, Ok(1.0));
        assert_eq!(gateway(Some(-0.3), None).score("x").await, Ok(0.0));
    }
}
