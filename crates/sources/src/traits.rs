use async_trait::async_trait;

use common::error::SourceError;
use common::models::{IndicatorSnapshot, SentimentScore};

/// Capability seam for the technical-analysis provider. Implementations
/// apply their own bounded request timeout and never retry internally;
/// retry policy belongs to the caller.
#[async_trait]
pub trait IndicatorSource: Send + Sync {
    async fn fetch(&self, symbol: &str) -> Result<IndicatorSnapshot, SourceError>;
}

/// Capability seam for the sentiment provider. Slower and flakier than the
/// indicator path, so callers time-box it independently and treat failure
/// as an absent score.
#[async_trait]
pub trait SentimentSource: Send + Sync {
    async fn fetch(&self, symbol: &str) -> Result<SentimentScore, SourceError>;
}
