use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};

pub const CONFIG_PATH_ENV: &str = "SIGNALWATCH_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config.json";

/// Runtime configuration, loaded from a JSON file. Every knob has a serde
/// default so a minimal file only needs `symbols` and `destinations`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Tickers to monitor. The Telegram command surface can grow/shrink
    /// this set at runtime.
    #[serde(default)]
    pub symbols: Vec<String>,
    /// Telegram chat ids to deliver alerts to.
    #[serde(default)]
    pub destinations: Vec<i64>,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    #[serde(default = "default_bucket_size")]
    pub bucket_size: f64,
    #[serde(default = "default_cooldown")]
    pub cooldown_seconds: u64,
    #[serde(default = "default_weight")]
    pub weight_indicator: f64,
    #[serde(default = "default_weight")]
    pub weight_sentiment: f64,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Fire on the very first evaluation of a symbol when the composite is
    /// already past threshold, instead of waiting for a fresh crossing.
    #[serde(default = "default_true")]
    pub fire_on_baseline: bool,
    /// When false, a delivery where every destination failed rolls the
    /// symbol's alert state back so the alert can fire again next cycle.
    #[serde(default = "default_true")]
    pub consume_cooldown_on_failed_delivery: bool,

    #[serde(default = "default_indicator_timeout")]
    pub indicator_timeout_seconds: u64,
    #[serde(default = "default_sentiment_timeout")]
    pub sentiment_timeout_seconds: u64,

    #[serde(default = "default_indicator_base_url")]
    pub indicator_base_url: String,
    #[serde(default = "default_sentiment_base_url")]
    pub sentiment_base_url: String,
    #[serde(default = "default_candle_limit")]
    pub candle_limit: usize,

    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
}

fn default_poll_interval() -> u64 {
    300
}
fn default_threshold() -> f64 {
    1.5
}
fn default_bucket_size() -> f64 {
    0.25
}
fn default_cooldown() -> u64 {
    3600
}
fn default_weight() -> f64 {
    1.0
}
fn default_max_concurrency() -> usize {
    4
}
fn default_true() -> bool {
    true
}
fn default_indicator_timeout() -> u64 {
    5
}
fn default_sentiment_timeout() -> u64 {
    20
}
fn default_indicator_base_url() -> String {
    "https://analytics.example.com".to_string()
}
fn default_sentiment_base_url() -> String {
    "https://news.example.com".to_string()
}
fn default_candle_limit() -> usize {
    60
}
fn default_state_file() -> PathBuf {
    PathBuf::from("signalwatch_state.json")
}

impl Default for MonitorConfig {
    fn default() -> Self {
        serde_json::from_str("{}").expect("empty config must deserialize via defaults")
    }
}

impl MonitorConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: MonitorConfig = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads from `SIGNALWATCH_CONFIG` if set, `config.json` otherwise.
    pub fn load_default() -> anyhow::Result<Self> {
        let path = env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load(Path::new(&path))
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.threshold <= 0.0 {
            bail!("threshold must be positive, got {}", self.threshold);
        }
        if self.bucket_size <= 0.0 {
            bail!("bucket_size must be positive, got {}", self.bucket_size);
        }
        if self.weight_indicator < 0.0 || self.weight_sentiment < 0.0 {
            bail!("weights must be non-negative");
        }
        if self.weight_indicator + self.weight_sentiment <= 0.0 {
            bail!("at least one weight must be positive");
        }
        if self.max_concurrency == 0 {
            bail!("max_concurrency must be at least 1");
        }
        if self.poll_interval_seconds == 0 {
            bail!("poll_interval_seconds must be at least 1");
        }
        Ok(())
    }
}
