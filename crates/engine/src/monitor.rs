use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, RwLock, Semaphore, broadcast, mpsc};
use tokio::time;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use common::actors::{Actor, ActorType, ControlMessage};
use common::error::SourceError;

use crate::aggregator::SignalAggregator;
use crate::dispatch::Dispatcher;
use crate::policy::AlertPolicy;
use crate::state::StateStore;

/// Counters exposed to the command surface via /status.
#[derive(Debug, Default)]
pub struct MonitorStats {
    pub cycles_run: AtomicU64,
    pub skipped_overlaps: AtomicU64,
    pub alerts_fired: AtomicU64,
}

/// Everything a per-symbol cycle task needs, shared across tasks.
pub struct MonitorContext {
    pub aggregator: Arc<SignalAggregator>,
    pub policy: Arc<RwLock<AlertPolicy>>,
    pub store: Arc<StateStore>,
    pub dispatcher: Arc<Dispatcher>,
    pub destinations: Vec<i64>,
    pub watchlist: Arc<RwLock<BTreeSet<String>>>,
    pub stats: Arc<MonitorStats>,
    pub consume_cooldown_on_failed_delivery: bool,
}

/// The scheduling loop. One tick per poll interval; each due symbol runs as
/// its own task, bounded by the concurrency limiter. A symbol whose previous
/// cycle is still in flight is skipped for that tick (observable via
/// `MonitorStats::skipped_overlaps`), which also serializes policy
/// evaluation and state updates per symbol.
pub struct MonitorService {
    id: Uuid,
    ctx: Arc<MonitorContext>,
    poll_interval: Duration,
    limiter: Arc<Semaphore>,
    in_flight: Arc<StdMutex<HashSet<String>>>,
    failures: Arc<Mutex<HashMap<String, u64>>>,
    force_tx: broadcast::Sender<()>,
    state_file: PathBuf,
}

/// Releases a symbol's in-flight marker when the cycle task ends, including
/// on unwind; a marker that leaks would mute the symbol on every later tick.
struct InFlightGuard {
    set: Arc<StdMutex<HashSet<String>>>,
    symbol: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        lock_in_flight(&self.set).remove(&self.symbol);
    }
}

fn lock_in_flight(set: &StdMutex<HashSet<String>>) -> MutexGuard<'_, HashSet<String>> {
    set.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl Actor for MonitorService {
    fn id(&self) -> Uuid {
        self.id
    }

    fn name(&self) -> ActorType {
        ActorType::MonitorActor
    }

    async fn run(&mut self, supervisor_tx: mpsc::Sender<ControlMessage>) -> anyhow::Result<()> {
        let heartbeat_handle = self.spawn_heartbeat(supervisor_tx.clone());
        let mut force_rx = self.force_tx.subscribe();
        let mut interval = time::interval(self.poll_interval);

        info!(
            "Starting monitor: {} symbols, tick every {:?}",
            self.ctx.watchlist.read().await.len(),
            self.poll_interval
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.run_and_snapshot(&supervisor_tx).await?;
                }
                res = force_rx.recv() => {
                    match res {
                        Ok(()) => {
                            info!("Forced cycle requested");
                            // Persist here too: a forced cycle can fire
                            // alerts just like a scheduled one.
                            self.run_and_snapshot(&supervisor_tx).await?;
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!("Monitor missed {} force requests", n);
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            heartbeat_handle.abort();
                            anyhow::bail!("force channel closed unexpectedly");
                        }
                    }
                }
            }
        }
    }
}

impl MonitorService {
    pub fn new(
        ctx: Arc<MonitorContext>,
        poll_interval: Duration,
        max_concurrency: usize,
        state_file: PathBuf,
        force_tx: broadcast::Sender<()>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            ctx,
            poll_interval,
            limiter: Arc::new(Semaphore::new(max_concurrency)),
            in_flight: Arc::new(StdMutex::new(HashSet::new())),
            failures: Arc::new(Mutex::new(HashMap::new())),
            force_tx,
            state_file,
        }
    }

    async fn run_and_snapshot(
        &self,
        supervisor_tx: &mpsc::Sender<ControlMessage>,
    ) -> anyhow::Result<()> {
        self.run_cycle().await;
        if let Err(e) = self.ctx.store.save(&self.state_file).await {
            supervisor_tx
                .send(ControlMessage::Error(
                    self.id,
                    format!("state snapshot failed: {}", e),
                ))
                .await?;
        }
        Ok(())
    }

    /// One scheduling tick: spawn a cycle task per due symbol. The in-flight
    /// marker is set synchronously here, so the due-time check never races
    /// with its own spawned tasks; the concurrency permit is acquired inside
    /// the task, so a saturated pool cannot delay this loop.
    async fn run_cycle(&self) {
        let symbols: Vec<String> = {
            let watchlist = self.ctx.watchlist.read().await;
            watchlist.iter().cloned().collect()
        };

        for symbol in symbols {
            if !lock_in_flight(&self.in_flight).insert(symbol.clone()) {
                self.ctx.stats.skipped_overlaps.fetch_add(1, Ordering::Relaxed);
                warn!("{}: previous cycle still running, skipping this tick", symbol);
                continue;
            }

            let ctx = self.ctx.clone();
            let limiter = self.limiter.clone();
            let failures = self.failures.clone();
            let guard = InFlightGuard {
                set: self.in_flight.clone(),
                symbol: symbol.clone(),
            };
            tokio::spawn(async move {
                let _in_flight = guard;
                let _permit = match limiter.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return,
                };
                Self::process_symbol(&ctx, &failures, &symbol).await;
            });
        }

        self.ctx.stats.cycles_run.fetch_add(1, Ordering::Relaxed);
    }

    async fn process_symbol(
        ctx: &MonitorContext,
        failures: &Mutex<HashMap<String, u64>>,
        symbol: &str,
    ) {
        match ctx.aggregator.aggregate(symbol).await {
            Ok(signal) => {
                failures.lock().await.remove(symbol);
                debug!(
                    "{}: composite {:+.2} ({})",
                    symbol, signal.composite, signal.indicators.recommendation
                );

                let cell = ctx.store.entry(symbol).await;
                let fired = {
                    let mut state = cell.lock().await;
                    let before = state.clone();
                    let policy = ctx.policy.read().await;
                    policy
                        .evaluate(&signal, &mut state, Utc::now())
                        .map(|alert| (alert, before))
                };

                if let Some((alert, before)) = fired {
                    ctx.stats.alerts_fired.fetch_add(1, Ordering::Relaxed);
                    info!("{}", alert.message);

                    let result = ctx.dispatcher.send(&alert, &ctx.destinations).await;
                    for outcome in result.failures() {
                        error!(
                            "{}: delivery to {} failed after {} attempts",
                            symbol, outcome.destination, outcome.attempts
                        );
                    }
                    if result.all_failed() && !ctx.consume_cooldown_on_failed_delivery {
                        let mut state = cell.lock().await;
                        *state = before;
                        warn!(
                            "{}: no destination reached, alert state rolled back for re-fire",
                            symbol
                        );
                    }
                }
            }
            Err(e) => match e.source_error() {
                SourceError::InvalidSymbol(_) => {
                    error!(
                        "{}: rejected by provider, removing from watchlist (operator attention required)",
                        symbol
                    );
                    ctx.watchlist.write().await.remove(symbol);
                    failures.lock().await.remove(symbol);
                }
                other => {
                    let mut failures = failures.lock().await;
                    let count = failures.entry(symbol.to_string()).or_insert(0);
                    *count += 1;
                    // Warn on the first failure and every 10th after that,
                    // debug otherwise, to avoid per-cycle spam.
                    if *count == 1 || *count % 10 == 0 {
                        warn!(
                            "{}: aggregation failing ({} consecutive cycles): {}",
                            symbol, count, other
                        );
                    } else {
                        debug!("{}: aggregation failed: {}", symbol, other);
                    }
                }
            },
        }
    }
}
