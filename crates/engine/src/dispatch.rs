use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::join_all;
use tokio::time::sleep;
use tracing::{error, warn};

use common::error::DispatchError;
use common::models::Alert;

/// Transport seam so delivery logic stays testable; the production
/// implementation is the Telegram bot in the binary crate.
#[async_trait]
pub trait AlertTransport: Send + Sync {
    async fn deliver(&self, destination: i64, text: &str) -> Result<(), DispatchError>;
}

#[derive(Debug)]
pub struct DeliveryOutcome {
    pub destination: i64,
    pub attempts: u32,
    pub result: Result<(), DispatchError>,
}

#[derive(Debug)]
pub struct DeliveryResult {
    pub outcomes: Vec<DeliveryOutcome>,
}

impl DeliveryResult {
    pub fn any_delivered(&self) -> bool {
        self.outcomes.iter().any(|o| o.result.is_ok())
    }

    pub fn all_failed(&self) -> bool {
        !self.outcomes.is_empty() && !self.any_delivered()
    }

    pub fn failures(&self) -> impl Iterator<Item = &DeliveryOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_err())
    }
}

/// Delivers alerts to all destinations independently, retrying transient
/// failures with exponential backoff. Permanent failures are reported after
/// the first attempt.
pub struct Dispatcher {
    transport: Arc<dyn AlertTransport>,
    max_attempts: u32,
    base_backoff: Duration,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn AlertTransport>) -> Self {
        Self {
            transport,
            max_attempts: 3,
            base_backoff: Duration::from_secs(1),
        }
    }

    pub async fn send(&self, alert: &Alert, destinations: &[i64]) -> DeliveryResult {
        let sends = destinations
            .iter()
            .map(|&destination| self.send_one(destination, &alert.message));
        let outcomes = join_all(sends).await;
        DeliveryResult { outcomes }
    }

    async fn send_one(&self, destination: i64, text: &str) -> DeliveryOutcome {
        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.transport.deliver(destination, text).await {
                Ok(()) => {
                    return DeliveryOutcome {
                        destination,
                        attempts,
                        result: Ok(()),
                    };
                }
                Err(e) if e.is_transient() && attempts < self.max_attempts => {
                    let backoff = self.base_backoff * 2u32.pow(attempts - 1);
                    warn!(
                        "delivery to {} failed ({}), retrying in {:?} (attempt {}/{})",
                        destination, e, backoff, attempts, self.max_attempts
                    );
                    sleep(backoff).await;
                }
                Err(e) => {
                    if !e.is_transient() {
                        error!(
                            "permanent delivery failure for {}: {} - flagging for operator attention",
                            destination, e
                        );
                    } else {
                        error!(
                            "delivery to {} failed after {} attempts: {}",
                            destination, attempts, e
                        );
                    }
                    return DeliveryOutcome {
                        destination,
                        attempts,
                        result: Err(e),
                    };
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use chrono::Utc;
    use mockall::mock;

    use common::models::{Fingerprint, Severity, Zone};

    use super::*;

    mock! {
        pub Transport {}

        #[async_trait]
        impl AlertTransport for Transport {
            async fn deliver(&self, destination: i64, text: &str) -> Result<(), DispatchError>;
        }
    }

    fn alert() -> Alert {
        Alert {
            symbol: "TSLA".into(),
            timestamp: Utc::now(),
            severity: Severity::High,
            message: "[HIGH] TSLA BULLISH crossing".into(),
            fingerprint: Fingerprint::new(Zone::Bullish, 2.0, 0.25),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_are_retried_then_succeed() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_in_mock = calls.clone();
        let mut transport = MockTransport::new();
        transport.expect_deliver().returning(move |_, _| {
            let n = calls_in_mock.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(DispatchError::NetworkError("connection reset".into()))
            } else {
                Ok(())
            }
        });

        let dispatcher = Dispatcher::new(Arc::new(transport));
        let result = dispatcher.send(&alert(), &[100]).await;

        assert!(result.any_delivered());
        assert_eq!(result.outcomes[0].attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_in_mock = calls.clone();
        let mut transport = MockTransport::new();
        transport.expect_deliver().returning(move |_, _| {
            calls_in_mock.fetch_add(1, Ordering::SeqCst);
            Err(DispatchError::RateLimited)
        });

        let dispatcher = Dispatcher::new(Arc::new(transport));
        let result = dispatcher.send(&alert(), &[100]).await;

        assert!(result.all_failed());
        // No more than 3 attempts are made.
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_failures_are_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_in_mock = calls.clone();
        let mut transport = MockTransport::new();
        transport.expect_deliver().returning(move |dest, _| {
            calls_in_mock.fetch_add(1, Ordering::SeqCst);
            Err(DispatchError::Forbidden(dest))
        });

        let dispatcher = Dispatcher::new(Arc::new(transport));
        let result = dispatcher.send(&alert(), &[100]).await;

        assert!(result.all_failed());
        assert_eq!(result.outcomes[0].attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn destinations_are_independent() {
        let mut transport = MockTransport::new();
        transport
            .expect_deliver()
            .returning(|destination, _| match destination {
                100 => Err(DispatchError::DestinationInvalid(100)),
                _ => Ok(()),
            });

        let dispatcher = Dispatcher::new(Arc::new(transport));
        let result = dispatcher.send(&alert(), &[100, 200, 300]).await;

        assert!(result.any_delivered());
        assert!(!result.all_failed());
        let failed: Vec<i64> = result.failures().map(|o| o.destination).collect();
        assert_eq!(failed, vec![100]);
    }
}
