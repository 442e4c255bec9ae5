use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, warn};

use common::error::{AggregateError, SourceError};
use common::models::Signal;
use sources::{IndicatorSource, SentimentSource};

#[derive(Debug, Clone, Copy)]
pub struct Weights {
    pub indicator: f64,
    pub sentiment: f64,
}

/// Merges the indicator and sentiment branches into one Signal per cycle.
/// Both fetches run concurrently with independent timeouts; only the
/// indicator branch can fail the aggregation.
pub struct SignalAggregator {
    indicator: Arc<dyn IndicatorSource>,
    sentiment: Arc<dyn SentimentSource>,
    weights: Weights,
    indicator_timeout: Duration,
    sentiment_timeout: Duration,
}

impl SignalAggregator {
    pub fn new(
        indicator: Arc<dyn IndicatorSource>,
        sentiment: Arc<dyn SentimentSource>,
        weights: Weights,
        indicator_timeout: Duration,
        sentiment_timeout: Duration,
    ) -> Self {
        Self {
            indicator,
            sentiment,
            weights,
            indicator_timeout,
            sentiment_timeout,
        }
    }

    pub async fn aggregate(&self, symbol: &str) -> Result<Signal, AggregateError> {
        let (indicator_res, sentiment_res) = tokio::join!(
            timeout(self.indicator_timeout, self.indicator.fetch(symbol)),
            timeout(self.sentiment_timeout, self.sentiment.fetch(symbol)),
        );

        let snapshot = match indicator_res {
            Ok(Ok(snapshot)) => snapshot,
            Ok(Err(e)) => {
                return Err(AggregateError::Indicator {
                    symbol: symbol.to_string(),
                    source: e,
                });
            }
            Err(_) => {
                return Err(AggregateError::Indicator {
                    symbol: symbol.to_string(),
                    source: SourceError::SourceUnavailable("indicator fetch timed out".into()),
                });
            }
        };

        let sentiment = match sentiment_res {
            Ok(Ok(score)) => Some(score),
            Ok(Err(SourceError::NoContent)) => {
                debug!("{}: no sentiment content this cycle", symbol);
                None
            }
            Ok(Err(e)) => {
                warn!("{}: sentiment fetch failed, degrading: {}", symbol, e);
                None
            }
            Err(_) => {
                warn!(
                    "{}: sentiment fetch exceeded {:?}, degrading",
                    symbol, self.sentiment_timeout
                );
                None
            }
        };

        Ok(Signal::compose(
            snapshot,
            sentiment,
            self.weights.indicator,
            self.weights.sentiment,
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use async_trait::async_trait;
    use mockall::mock;

    use common::models::{IndicatorSnapshot, Recommendation, SentimentScore};

    use super::*;

    mock! {
        pub Indicator {}

        #[async_trait]
        impl IndicatorSource for Indicator {
            async fn fetch(&self, symbol: &str) -> Result<IndicatorSnapshot, SourceError>;
        }
    }

    mock! {
        pub Sentiment {}

        #[async_trait]
        impl SentimentSource for Sentiment {
            async fn fetch(&self, symbol: &str) -> Result<SentimentScore, SourceError>;
        }
    }

    fn snapshot(rec: Recommendation) -> IndicatorSnapshot {
        IndicatorSnapshot::new("TSLA", BTreeMap::new(), rec)
    }

    fn aggregator(
        indicator: MockIndicator,
        sentiment: MockSentiment,
    ) -> SignalAggregator {
        SignalAggregator::new(
            Arc::new(indicator),
            Arc::new(sentiment),
            Weights {
                indicator: 1.0,
                sentiment: 1.0,
            },
            Duration::from_secs(5),
            Duration::from_secs(20),
        )
    }

    #[tokio::test]
    async fn merges_both_branches() {
        let mut indicator = MockIndicator::new();
        indicator
            .expect_fetch()
            .returning(|_| Ok(snapshot(Recommendation::StrongBuy)));
        let mut sentiment = MockSentiment::new();
        sentiment
            .expect_fetch()
            .returning(|s| Ok(SentimentScore::new(s, 1.0, "record beat")));

        let signal = aggregator(indicator, sentiment).aggregate("TSLA").await.unwrap();
        assert!(signal.sentiment.is_some());
        assert_eq!(signal.composite, 1.5);
    }

    #[tokio::test]
    async fn sentiment_failure_degrades_to_indicator_only() {
        let mut indicator = MockIndicator::new();
        indicator
            .expect_fetch()
            .returning(|_| Ok(snapshot(Recommendation::StrongBuy)));
        let mut sentiment = MockSentiment::new();
        sentiment
            .expect_fetch()
            .returning(|_| Err(SourceError::ScrapeFailed("render error".into())));

        let signal = aggregator(indicator, sentiment).aggregate("TSLA").await.unwrap();
        assert!(signal.sentiment.is_none());
        assert_eq!(signal.composite, 2.0);
    }

    #[tokio::test]
    async fn indicator_failure_fails_aggregation() {
        let mut indicator = MockIndicator::new();
        indicator
            .expect_fetch()
            .returning(|s| Err(SourceError::InvalidSymbol(s.to_string())));
        let mut sentiment = MockSentiment::new();
        sentiment
            .expect_fetch()
            .returning(|s| Ok(SentimentScore::new(s, 0.5, "fine")));

        let err = aggregator(indicator, sentiment)
            .aggregate("XXXX")
            .await
            .unwrap_err();
        assert!(matches!(err.source_error(), SourceError::InvalidSymbol(_)));
    }

    struct SleepySentiment {
        delay: Duration,
    }

    #[async_trait]
    impl SentimentSource for SleepySentiment {
        async fn fetch(&self, symbol: &str) -> Result<SentimentScore, SourceError> {
            tokio::time::sleep(self.delay).await;
            Ok(SentimentScore::new(symbol, 0.9, "too late"))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_sentiment_is_timed_out_independently() {
        let mut indicator = MockIndicator::new();
        indicator
            .expect_fetch()
            .returning(|_| Ok(snapshot(Recommendation::Buy)));

        let aggregator = SignalAggregator::new(
            Arc::new(indicator),
            Arc::new(SleepySentiment {
                delay: Duration::from_secs(60),
            }),
            Weights {
                indicator: 1.0,
                sentiment: 1.0,
            },
            Duration::from_secs(5),
            Duration::from_secs(20),
        );

        let signal = aggregator.aggregate("TSLA").await.unwrap();
        assert!(signal.sentiment.is_none());
        assert_eq!(signal.composite, 1.0);
    }
}
