use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use dotenvy::dotenv;
use std::env;
use teloxide::Bot;
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, info};

use common::actors::ActorType;
use common::config::MonitorConfig;
use common::logger;
use engine::aggregator::{SignalAggregator, Weights};
use engine::dispatch::Dispatcher;
use engine::monitor::{MonitorContext, MonitorService, MonitorStats};
use engine::policy::AlertPolicy;
use engine::state::StateStore;
use sources::indicator::client::CandleIndicatorSource;
use sources::sentiment::circuit::GuardedSentimentSource;
use sources::sentiment::client::HeadlineSentimentSource;

use crate::services::{CommandService, SharedHandles, TelegramTransport};
use crate::supervisor::Supervisor;

mod services;
mod supervisor;

// The sentiment branch degrades gracefully, so the breaker can be patient.
const SENTIMENT_BREAKER_FAILURES: u32 = 5;
const SENTIMENT_BREAKER_OPEN: Duration = Duration::from_secs(600);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logger::setup_logger();
    dotenv().ok();
    debug!("System starting up...");

    let config = MonitorConfig::load_default()?;
    let token = env::var("TELEGRAM_BOT_TOKEN").context("TELEGRAM_BOT_TOKEN not set in .env")?;
    let bot = Bot::new(token);

    let indicator = Arc::new(CandleIndicatorSource::new(
        config.indicator_base_url.clone(),
        Duration::from_secs(config.indicator_timeout_seconds),
        config.candle_limit,
    ));
    let sentiment = Arc::new(GuardedSentimentSource::new(
        HeadlineSentimentSource::new(
            config.sentiment_base_url.clone(),
            Duration::from_secs(config.sentiment_timeout_seconds),
        ),
        SENTIMENT_BREAKER_FAILURES,
        SENTIMENT_BREAKER_OPEN,
    ));
    let aggregator = Arc::new(SignalAggregator::new(
        indicator,
        sentiment,
        Weights {
            indicator: config.weight_indicator,
            sentiment: config.weight_sentiment,
        },
        Duration::from_secs(config.indicator_timeout_seconds),
        Duration::from_secs(config.sentiment_timeout_seconds),
    ));

    let policy = Arc::new(RwLock::new(AlertPolicy::from_config(&config)));
    let store = Arc::new(StateStore::load(&config.state_file)?);
    let dispatcher = Arc::new(Dispatcher::new(Arc::new(TelegramTransport::new(
        bot.clone(),
    ))));

    let watchlist: BTreeSet<String> = config
        .symbols
        .iter()
        .map(|s| s.trim().to_uppercase())
        .collect();
    info!(
        "Watching {} symbols, delivering to {} destinations",
        watchlist.len(),
        config.destinations.len()
    );
    let watchlist = Arc::new(RwLock::new(watchlist));
    let stats = Arc::new(MonitorStats::default());
    let (force_tx, _) = broadcast::channel(8);

    let ctx = Arc::new(MonitorContext {
        aggregator,
        policy: policy.clone(),
        store: store.clone(),
        dispatcher,
        destinations: config.destinations.clone(),
        watchlist: watchlist.clone(),
        stats: stats.clone(),
        consume_cooldown_on_failed_delivery: config.consume_cooldown_on_failed_delivery,
    });

    let poll_interval = Duration::from_secs(config.poll_interval_seconds);
    let mut supervisor = Supervisor::new();

    let ctx_for_monitor = ctx.clone();
    let force_for_monitor = force_tx.clone();
    let state_file = config.state_file.clone();
    let max_concurrency = config.max_concurrency;
    supervisor.register_actor(
        ActorType::MonitorActor,
        Box::new(move || {
            Box::new(MonitorService::new(
                ctx_for_monitor.clone(),
                poll_interval,
                max_concurrency,
                state_file.clone(),
                force_for_monitor.clone(),
            ))
        }),
    );

    let handles = SharedHandles {
        watchlist,
        policy,
        store: store.clone(),
        stats,
        force_tx,
        poll_interval,
    };
    let bot_for_commands = bot.clone();
    supervisor.register_actor(
        ActorType::CommandActor,
        Box::new(move || {
            Box::new(CommandService::new(
                bot_for_commands.clone(),
                handles.clone(),
            ))
        }),
    );

    tokio::select! {
        _ = supervisor.start() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
    }

    store.save(&config.state_file).await?;
    info!("Alert state persisted, exiting");
    Ok(())
}
