use thiserror::Error;

/// Failures of the external capabilities (indicator provider, sentiment
/// provider). `SourceUnavailable` is the only transient variant; callers
/// own the retry policy.
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    #[error("provider unavailable: {0}")]
    SourceUnavailable(String),
    #[error("symbol rejected by provider: {0}")]
    InvalidSymbol(String),
    #[error("scrape failed: {0}")]
    ScrapeFailed(String),
    #[error("no relevant content found")]
    NoContent,
}

impl SourceError {
    pub fn is_transient(&self) -> bool {
        matches!(self, SourceError::SourceUnavailable(_))
    }
}

/// Aggregation only fails when the indicator branch fails. Sentiment
/// failures degrade to an absent score instead.
#[derive(Debug, Clone, Error)]
pub enum AggregateError {
    #[error("aggregation failed for {symbol}: {source}")]
    Indicator {
        symbol: String,
        #[source]
        source: SourceError,
    },
}

impl AggregateError {
    pub fn source_error(&self) -> &SourceError {
        match self {
            AggregateError::Indicator { source, .. } => source,
        }
    }
}

/// Per-destination delivery failures. Transient variants are retried with
/// backoff by the dispatcher; permanent ones are surfaced immediately.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("rate limited by destination")]
    RateLimited,
    #[error("network error: {0}")]
    NetworkError(String),
    #[error("destination {0} does not exist")]
    DestinationInvalid(i64),
    #[error("destination {0} refused delivery")]
    Forbidden(i64),
}

impl DispatchError {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DispatchError::RateLimited | DispatchError::NetworkError(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(SourceError::SourceUnavailable("timeout".into()).is_transient());
        assert!(!SourceError::InvalidSymbol("XXXX".into()).is_transient());
        assert!(!SourceError::NoContent.is_transient());

        assert!(DispatchError::RateLimited.is_transient());
        assert!(DispatchError::NetworkError("reset".into()).is_transient());
        assert!(!DispatchError::DestinationInvalid(42).is_transient());
        assert!(!DispatchError::Forbidden(42).is_transient());
    }

    #[test]
    fn aggregate_error_exposes_cause() {
        let err = AggregateError::Indicator {
            symbol: "AAPL".into(),
            source: SourceError::InvalidSymbol("AAPL".into()),
        };
        assert!(matches!(
            err.source_error(),
            SourceError::InvalidSymbol(_)
        ));
    }
}
