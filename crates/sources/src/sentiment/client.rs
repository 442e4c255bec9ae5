use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

use common::error::SourceError;
use common::models::SentimentScore;

use crate::sentiment::lexicon;
use crate::traits::SentimentSource;

const HEADLINE_LIMIT: usize = 20;
const EXCERPT_MAX_CHARS: usize = 120;

#[derive(Debug, Deserialize)]
struct Headline {
    title: String,
    #[serde(default)]
    summary: Option<String>,
}

/// Fetches recent headlines for a symbol and scores the combined text with
/// the valence lexicon. The page fetch is the slow, flaky branch of the
/// pipeline, so the client timeout here is independent of (and longer than)
/// the indicator one.
pub struct HeadlineSentimentSource {
    client: Client,
    base_url: String,
}

impl HeadlineSentimentSource {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .user_agent("signalwatch/0.1.0")
                .timeout(timeout)
                .build()
                .expect("Failed to build HTTP client."),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl SentimentSource for HeadlineSentimentSource {
    async fn fetch(&self, symbol: &str) -> Result<SentimentScore, SourceError> {
        let url = format!("{}/api/v1/news", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("symbol", symbol), ("limit", &HEADLINE_LIMIT.to_string())])
            .send()
            .await
            .map_err(|e| SourceError::ScrapeFailed(e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(SourceError::NoContent);
        }
        if !response.status().is_success() {
            return Err(SourceError::ScrapeFailed(format!(
                "HTTP {}",
                response.status()
            )));
        }

        let headlines: Vec<Headline> = response
            .json()
            .await
            .map_err(|e| SourceError::ScrapeFailed(format!("bad payload: {}", e)))?;
        if headlines.is_empty() {
            return Err(SourceError::NoContent);
        }

        let text = headlines
            .iter()
            .map(|h| match &h.summary {
                Some(summary) => format!("{} {}", h.title, summary),
                None => h.title.clone(),
            })
            .collect::<Vec<_>>()
            .join(" ");

        let score = lexicon::score_text(&text).ok_or(SourceError::NoContent)?;
        debug!("{}: sentiment {:+.2} over {} headlines", symbol, score, headlines.len());

        let excerpt: String = headlines[0].title.chars().take(EXCERPT_MAX_CHARS).collect();
        Ok(SentimentScore::new(symbol, score, excerpt))
    }
}
