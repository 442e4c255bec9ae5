use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::warn;

use common::error::SourceError;
use common::models::SentimentScore;

use crate::traits::SentimentSource;

struct BreakerState {
    consecutive_failures: u32,
    open_until: Option<Instant>,
}

/// Trips after a run of consecutive failures and fails fast for a fixed
/// window, so a wedged sentiment provider costs one cheap check per cycle
/// instead of a full timeout.
pub struct CircuitBreaker {
    failure_threshold: u32,
    open_for: Duration,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, open_for: Duration) -> Self {
        Self {
            failure_threshold,
            open_for,
            state: Mutex::new(BreakerState {
                consecutive_failures: 0,
                open_until: None,
            }),
        }
    }

    /// True when a call may proceed. Re-closes the circuit once the open
    /// window has elapsed.
    pub async fn allow(&self) -> bool {
        let mut state = self.state.lock().await;
        match state.open_until {
            Some(until) if Instant::now() < until => false,
            Some(_) => {
                state.open_until = None;
                state.consecutive_failures = 0;
                true
            }
            None => true,
        }
    }

    pub async fn record_success(&self) {
        let mut state = self.state.lock().await;
        state.consecutive_failures = 0;
    }

    pub async fn record_failure(&self) {
        let mut state = self.state.lock().await;
        state.consecutive_failures += 1;
        if state.consecutive_failures >= self.failure_threshold {
            state.open_until = Some(Instant::now() + self.open_for);
            warn!(
                "sentiment circuit opened for {:?} after {} consecutive failures",
                self.open_for, state.consecutive_failures
            );
        }
    }
}

/// Wraps any `SentimentSource` with the circuit breaker. `NoContent` is a
/// normal outcome, not a provider failure, and closes the circuit.
pub struct GuardedSentimentSource<S> {
    inner: S,
    breaker: CircuitBreaker,
}

impl<S> GuardedSentimentSource<S> {
    pub fn new(inner: S, failure_threshold: u32, open_for: Duration) -> Self {
        Self {
            inner,
            breaker: CircuitBreaker::new(failure_threshold, open_for),
        }
    }
}

#[async_trait]
impl<S: SentimentSource> SentimentSource for GuardedSentimentSource<S> {
    async fn fetch(&self, symbol: &str) -> Result<SentimentScore, SourceError> {
        if !self.breaker.allow().await {
            return Err(SourceError::ScrapeFailed("circuit open".to_string()));
        }
        match self.inner.fetch(symbol).await {
            Ok(score) => {
                self.breaker.record_success().await;
                Ok(score)
            }
            Err(SourceError::NoContent) => {
                self.breaker.record_success().await;
                Err(SourceError::NoContent)
            }
            Err(e) => {
                self.breaker.record_failure().await;
                Err(e)
            }
        }
    }
}
