use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use teloxide::dptree;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;
use tokio::sync::{RwLock, broadcast, mpsc};
use tracing::{info, warn};
use uuid::Uuid;

use common::actors::{Actor, ActorType, ControlMessage};
use engine::monitor::MonitorStats;
use engine::policy::AlertPolicy;
use engine::state::StateStore;

/// Handles shared with the monitor, so operator commands act on the same
/// watchlist, policy and counters the scheduling loop uses.
#[derive(Clone)]
pub struct SharedHandles {
    pub watchlist: Arc<RwLock<BTreeSet<String>>>,
    pub policy: Arc<RwLock<AlertPolicy>>,
    pub store: Arc<StateStore>,
    pub stats: Arc<MonitorStats>,
    pub force_tx: broadcast::Sender<()>,
    pub poll_interval: Duration,
}

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Supported commands:")]
enum Command {
    #[command(description = "show this help")]
    Help,
    #[command(description = "add a symbol to the watchlist")]
    Watch(String),
    #[command(description = "remove a symbol from the watchlist")]
    Unwatch(String),
    #[command(description = "list watched symbols")]
    Watchlist,
    #[command(description = "show monitor counters and per-symbol state")]
    Status,
    #[command(description = "trigger an immediate evaluation cycle")]
    Run,
    #[command(description = "set the alert threshold")]
    Threshold(f64),
}

/// Long-polling Telegram command loop. Restartable: the supervisor can
/// rebuild it from the bot handle and the shared state.
pub struct CommandService {
    id: Uuid,
    bot: Bot,
    handles: SharedHandles,
}

#[async_trait]
impl Actor for CommandService {
    fn id(&self) -> Uuid {
        self.id
    }

    fn name(&self) -> ActorType {
        ActorType::CommandActor
    }

    async fn run(&mut self, supervisor_tx: mpsc::Sender<ControlMessage>) -> anyhow::Result<()> {
        let heartbeat_handle = self.spawn_heartbeat(supervisor_tx);
        info!("Starting Telegram command service");

        let handler = Update::filter_message()
            .filter_command::<Command>()
            .endpoint(answer);

        Dispatcher::builder(self.bot.clone(), handler)
            .dependencies(dptree::deps![self.handles.clone()])
            .default_handler(|_| async {})
            .build()
            .dispatch()
            .await;

        heartbeat_handle.abort();
        anyhow::bail!("command dispatcher stopped unexpectedly")
    }
}

impl CommandService {
    pub fn new(bot: Bot, handles: SharedHandles) -> Self {
        Self {
            id: Uuid::new_v4(),
            bot,
            handles,
        }
    }
}

async fn answer(
    bot: Bot,
    msg: Message,
    cmd: Command,
    handles: SharedHandles,
) -> ResponseResult<()> {
    let reply = match cmd {
        Command::Help => Command::descriptions().to_string(),
        Command::Watch(symbol) => watch(&handles, &symbol).await,
        Command::Unwatch(symbol) => unwatch(&handles, &symbol).await,
        Command::Watchlist => watchlist(&handles).await,
        Command::Status => status(&handles).await,
        Command::Run => {
            // Errors only mean no monitor is subscribed right now.
            if handles.force_tx.send(()).is_err() {
                warn!("force-run requested but no monitor is listening");
                "Monitor is not running.".to_string()
            } else {
                "Evaluation cycle triggered.".to_string()
            }
        }
        Command::Threshold(value) => set_threshold(&handles, value).await,
    };

    bot.send_message(msg.chat.id, reply).await?;
    Ok(())
}

async fn watch(handles: &SharedHandles, symbol: &str) -> String {
    let symbol = symbol.trim().to_uppercase();
    if symbol.is_empty() {
        return "Usage: /watch <symbol>".to_string();
    }
    let inserted = handles.watchlist.write().await.insert(symbol.clone());
    if inserted {
        info!("watchlist: added {}", symbol);
        format!("Watching {}.", symbol)
    } else {
        format!("{} is already watched.", symbol)
    }
}

async fn unwatch(handles: &SharedHandles, symbol: &str) -> String {
    let symbol = symbol.trim().to_uppercase();
    if symbol.is_empty() {
        return "Usage: /unwatch <symbol>".to_string();
    }
    let removed = handles.watchlist.write().await.remove(&symbol);
    if removed {
        info!("watchlist: removed {}", symbol);
        format!("Stopped watching {}.", symbol)
    } else {
        format!("{} is not on the watchlist.", symbol)
    }
}

async fn watchlist(handles: &SharedHandles) -> String {
    let watchlist = handles.watchlist.read().await;
    if watchlist.is_empty() {
        "Watchlist is empty.".to_string()
    } else {
        let symbols: Vec<&str> = watchlist.iter().map(String::as_str).collect();
        format!("Watching: {}", symbols.join(", "))
    }
}

async fn status(handles: &SharedHandles) -> String {
    let threshold = handles.policy.read().await.threshold();
    let watched = handles.watchlist.read().await.len();
    let snapshot = handles.store.snapshot().await;

    let mut lines = vec![
        format!(
            "Monitoring {} symbols every {}s, threshold {:.2}",
            watched,
            handles.poll_interval.as_secs(),
            threshold
        ),
        format!(
            "cycles {} | overlaps skipped {} | alerts fired {}",
            handles.stats.cycles_run.load(Ordering::Relaxed),
            handles.stats.skipped_overlaps.load(Ordering::Relaxed),
            handles.stats.alerts_fired.load(Ordering::Relaxed)
        ),
    ];
    for (symbol, state) in snapshot {
        let last = state
            .last_alert_at
            .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
            .unwrap_or_else(|| "never".to_string());
        lines.push(format!("{}: last alert {}", symbol, last));
    }
    lines.join("\n")
}

async fn set_threshold(handles: &SharedHandles, value: f64) -> String {
    if !value.is_finite() || value <= 0.0 {
        return "Threshold must be a positive number.".to_string();
    }
    handles.policy.write().await.set_threshold(value);
    info!("threshold set to {:.2}", value);
    format!("Threshold set to {:.2}.", value)
}
