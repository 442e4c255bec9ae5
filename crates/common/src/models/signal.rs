use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::indicator::IndicatorSnapshot;
use super::sentiment::SentimentScore;

/// Which side of the alert threshold a composite score sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Zone {
    Bullish,
    Bearish,
    Neutral,
}

impl Zone {
    pub fn classify(composite: f64, threshold: f64) -> Zone {
        if composite >= threshold {
            Zone::Bullish
        } else if composite <= -threshold {
            Zone::Bearish
        } else {
            Zone::Neutral
        }
    }

    pub fn is_breach(&self) -> bool {
        !matches!(self, Zone::Neutral)
    }
}

impl std::fmt::Display for Zone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Zone::Bullish => "BULLISH",
            Zone::Bearish => "BEARISH",
            Zone::Neutral => "NEUTRAL",
        };
        write!(f, "{}", s)
    }
}

/// Deterministic bucketed representation of a composite score. Two signals
/// whose scores fall in the same zone and bucket are considered the same
/// condition, which keeps noise near a bucket edge from flapping alerts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    pub zone: Zone,
    pub bucket: i64,
}

impl Fingerprint {
    pub fn new(zone: Zone, composite: f64, bucket_size: f64) -> Self {
        Self {
            zone,
            bucket: (composite / bucket_size).round() as i64,
        }
    }

    /// Short stable digest for log lines and alert footers.
    pub fn digest(&self, symbol: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!("{}:{}:{}", symbol, self.zone, self.bucket).as_bytes());
        hex::encode(&hasher.finalize()[..8])
    }
}

/// Unified per-symbol snapshot for one aggregation cycle. Never mutated
/// after construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub indicators: IndicatorSnapshot,
    pub sentiment: Option<SentimentScore>,
    pub composite: f64,
}

impl Signal {
    /// Weighted combination of the indicator recommendation (-2..+2) and
    /// the sentiment scalar (-1..+1). With sentiment absent the weights
    /// renormalize to indicator-only, so the composite equals the
    /// recommendation score.
    pub fn compose(
        indicators: IndicatorSnapshot,
        sentiment: Option<SentimentScore>,
        weight_indicator: f64,
        weight_sentiment: f64,
    ) -> Self {
        let rec = indicators.recommendation.score();
        let composite = match &sentiment {
            Some(s) => {
                (weight_indicator * rec + weight_sentiment * s.score)
                    / (weight_indicator + weight_sentiment)
            }
            None => rec,
        };
        Self {
            symbol: indicators.symbol.clone(),
            timestamp: Utc::now(),
            indicators,
            sentiment,
            composite,
        }
    }
}
