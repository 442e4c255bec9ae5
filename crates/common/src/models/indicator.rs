use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Overall stance of the technical indicators, on the same five-step scale
/// analytics providers publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recommendation {
    StrongSell,
    Sell,
    Neutral,
    Buy,
    StrongBuy,
}

impl Recommendation {
    /// Numeric scale used by the composite: STRONG_SELL=-2 .. STRONG_BUY=+2.
    pub fn score(&self) -> f64 {
        match self {
            Recommendation::StrongSell => -2.0,
            Recommendation::Sell => -1.0,
            Recommendation::Neutral => 0.0,
            Recommendation::Buy => 1.0,
            Recommendation::StrongBuy => 2.0,
        }
    }

    /// Maps a per-indicator vote sum (each indicator votes -1/0/+1) onto
    /// the five-step scale.
    pub fn from_votes(sum: i32) -> Self {
        match sum {
            i32::MIN..=-3 => Recommendation::StrongSell,
            -2 | -1 => Recommendation::Sell,
            0 => Recommendation::Neutral,
            1 | 2 => Recommendation::Buy,
            3..=i32::MAX => Recommendation::StrongBuy,
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Recommendation::StrongSell => "STRONG_SELL",
            Recommendation::Sell => "SELL",
            Recommendation::Neutral => "NEUTRAL",
            Recommendation::Buy => "BUY",
            Recommendation::StrongBuy => "STRONG_BUY",
        };
        write!(f, "{}", s)
    }
}

/// One fetch of the technical picture for a symbol. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    /// Indicator name -> value, e.g. "RSI" -> 27.3, "SMA20" -> 182.4.
    pub values: BTreeMap<String, f64>,
    pub recommendation: Recommendation,
}

impl IndicatorSnapshot {
    pub fn new(
        symbol: impl Into<String>,
        values: BTreeMap<String, f64>,
        recommendation: Recommendation,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            timestamp: Utc::now(),
            values,
            recommendation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_scale() {
        assert_eq!(Recommendation::StrongSell.score(), -2.0);
        assert_eq!(Recommendation::Neutral.score(), 0.0);
        assert_eq!(Recommendation::StrongBuy.score(), 2.0);
    }

    #[test]
    fn vote_mapping() {
        assert_eq!(Recommendation::from_votes(-3), Recommendation::StrongSell);
        assert_eq!(Recommendation::from_votes(-1), Recommendation::Sell);
        assert_eq!(Recommendation::from_votes(0), Recommendation::Neutral);
        assert_eq!(Recommendation::from_votes(2), Recommendation::Buy);
        assert_eq!(Recommendation::from_votes(3), Recommendation::StrongBuy);
    }
}
