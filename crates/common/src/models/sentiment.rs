use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A scored piece of text for a symbol. `score` is clamped to [-1, 1].
/// Absent entirely when the sentiment branch fails.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentScore {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub score: f64,
    /// Short excerpt of the text that produced the score, for the alert body.
    pub excerpt: String,
}

impl SentimentScore {
    pub fn new(symbol: impl Into<String>, score: f64, excerpt: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            timestamp: Utc::now(),
            score: score.clamp(-1.0, 1.0),
            excerpt: excerpt.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_is_clamped() {
        assert_eq!(SentimentScore::new("AAPL", 3.5, "").score, 1.0);
        assert_eq!(SentimentScore::new("AAPL", -3.5, "").score, -1.0);
        assert_eq!(SentimentScore::new("AAPL", 0.4, "").score, 0.4);
    }
}
