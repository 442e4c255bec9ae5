use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::debug;

use common::error::SourceError;
use common::models::IndicatorSnapshot;

use crate::indicator::analysis;
use crate::indicator::response::CandleBar;
use crate::traits::IndicatorSource;

/// Fetches daily candles from the analytics provider and computes the
/// indicator snapshot locally. One bounded request per fetch, no retries.
pub struct CandleIndicatorSource {
    client: Client,
    base_url: String,
    candle_limit: usize,
}

impl CandleIndicatorSource {
    pub fn new(base_url: impl Into<String>, timeout: Duration, candle_limit: usize) -> Self {
        Self {
            client: Client::builder()
                .user_agent("signalwatch/0.1.0")
                .timeout(timeout)
                .build()
                .expect("Failed to build HTTP client."),
            base_url: base_url.into(),
            candle_limit,
        }
    }
}

#[async_trait]
impl IndicatorSource for CandleIndicatorSource {
    async fn fetch(&self, symbol: &str) -> Result<IndicatorSnapshot, SourceError> {
        let url = format!("{}/api/v1/klines", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("symbol", symbol),
                ("interval", "1d"),
                ("limit", &self.candle_limit.to_string()),
            ])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SourceError::SourceUnavailable(format!("request timed out: {}", e))
                } else {
                    SourceError::SourceUnavailable(e.to_string())
                }
            })?;

        match response.status() {
            StatusCode::BAD_REQUEST | StatusCode::NOT_FOUND => {
                return Err(SourceError::InvalidSymbol(symbol.to_string()));
            }
            status if !status.is_success() => {
                return Err(SourceError::SourceUnavailable(format!("HTTP {}", status)));
            }
            _ => {}
        }

        let bars: Vec<CandleBar> = response
            .json()
            .await
            .map_err(|e| SourceError::SourceUnavailable(format!("bad payload: {}", e)))?;

        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let report = analysis::analyze_closes(&closes)?;
        debug!(
            "{}: {} over {} candles (RSI {:.1})",
            symbol,
            report.recommendation,
            closes.len(),
            report.values.get("RSI").copied().unwrap_or(f64::NAN)
        );

        Ok(IndicatorSnapshot::new(
            symbol,
            report.values,
            report.recommendation,
        ))
    }
}
