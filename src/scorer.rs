//! Built-in heuristic scorer.
//!
//! A lightweight stand-in for an external ML model: weighted pattern groups
//! summed into a pseudo-probability. Good enough to make the demo pipeline
//! and a fresh deployment useful before a real model is wired in.

use crate::classifier::SpamScorer;
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::RegexSet;

struct PatternGroup {
    label: &'static str,
    patterns: RegexSet,
    weight: f64,
}

fn group(label: &'static str, weight: f64, patterns: &[&str]) -> PatternGroup {
    PatternGroup {
        label,
        patterns: RegexSet::new(patterns).expect("built-in patterns compile"),
        weight,
    }
}

lazy_static! {
    static ref PATTERN_GROUPS: Vec<PatternGroup> = vec![
        group(
            "credential phishing",
            0.45,
            &[
                r"(?i)verify\s+your\s+(account|identity|wallet)",
                r"(?i)account\s+(has\s+been\s+)?(suspended|locked|compromised)",
                r"(?i)confirm\s+your\s+(password|credentials|details)",
                r"(?i)unusual\s+(activity|login)",
            ],
        ),
        group(
            "reward bait",
            0.4,
            &[
                r"(?i)you\s+(have\s+)?won",
                r"(?i)congratulations.*(prize|winner|selected)",
                r"(?i)claim\s+your\s+(prize|reward|gift)",
                r"(?i)lottery|jackpot",
                r"(?i)free\s+(money|gift|iphone|crypto)",
            ],
        ),
        group(
            "crypto/payment fraud",
            0.35,
            &[
                r"(?i)double\s+your\s+(bitcoin|btc|crypto|investment)",
                r"(?i)guaranteed\s+(profit|returns?|income)",
                r"(?i)send\s+(btc|bitcoin|eth|usdt)\s+to",
                r"(?i)investment\s+opportunity",
            ],
        ),
        group(
            "urgency pressure",
            0.2,
            &[
                r"(?i)\bact\s+now\b",
                r"(?i)urgent(ly)?",
                r"(?i)within\s+\d+\s+(hours?|minutes?)",
                r"(?i)(offer|account)\s+expires",
                r"(?i)last\s+chance",
            ],
        ),
        group(
            "suspicious links",
            0.25,
            &[
                r"(?i)(bit\.ly|tinyurl\.com|t\.co|goo\.gl)/\S+",
                r"(?i)click\s+(here|the\s+link|below)",
                r"(?i)https?://\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}",
            ],
        ),
    ];
}

/// Keyword/regex scorer producing a pseudo-probability in [0, 1].
#[derive(Default)]
pub struct HeuristicScorer;

impl HeuristicScorer {
    pub fn new() -> Self {
        Self
    }

    fn score_text(text: &str) -> f64 {
        let mut score = 0.0;
        for group in PATTERN_GROUPS.iter() {
            if group.patterns.is_match(text) {
                log::debug!("heuristic group matched: {}", group.label);
                score += group.weight;
            }
        }
        score.min(1.0)
    }
}

#[async_trait]
impl SpamScorer for HeuristicScorer {
    async fn predict_proba(&self, text: &str) -> anyhow::Result<f64> {
        Ok(Self::score_text(text))
    }

    async fn predict(&self, text: &str) -> anyhow::Result<bool> {
        Ok(Self::score_text(text) >= 0.5)
    }

    fn name(&self) -> &str {
        "heuristic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_obvious_phishing_scores_high() {
        let score = HeuristicScorer::score_text(
            "URGENT: your account has been suspended. Verify your account \
             within 24 hours: bit.ly/x8f2a click here",
        );
        assert!(score >= 0.9, "expected high score, got {score}");
    }

    #[test]
    fn test_ordinary_chat_scores_low() {
        let score = HeuristicScorer::score_text("are we still meeting for lunch tomorrow?");
        assert_eq!(score, 0.0);
    }

    #[test]
    fn test_single_group_scores_below_default_threshold() {
        // One weak signal alone must not cross the 0.9 default threshold.
        let score = HeuristicScorer::score_text("this is urgent, please reply");
        assert!(score < 0.9);
        assert!(score > 0.0);
    }

    #[test]
    fn test_score_is_clamped_to_one() {
        let score = HeuristicScorer::score_text(
            "You have won the lottery! Verify your account urgently, \
             guaranteed profit, send btc to this wallet, click here bit.ly/abc \
             act now, last chance, free money",
        );
        assert_eq!(score, 1.0);
    }
}
