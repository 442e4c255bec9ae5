use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use common::models::AlertState;

/// Per-symbol alert state, partitioned by symbol key: lookups take a short
/// read lock on the map, mutation happens under the symbol's own mutex so
/// unrelated symbols never contend.
pub struct StateStore {
    shards: RwLock<HashMap<String, Arc<Mutex<AlertState>>>>,
}

impl StateStore {
    pub fn new() -> Self {
        Self {
            shards: RwLock::new(HashMap::new()),
        }
    }

    /// Handle to the symbol's state cell, created with defaults on first
    /// access. Callers lock the cell for the duration of one
    /// evaluate-and-update step.
    pub async fn entry(&self, symbol: &str) -> Arc<Mutex<AlertState>> {
        {
            let shards = self.shards.read().await;
            if let Some(cell) = shards.get(symbol) {
                return cell.clone();
            }
        }
        let mut shards = self.shards.write().await;
        shards
            .entry(symbol.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(AlertState::default())))
            .clone()
    }

    pub async fn get(&self, symbol: &str) -> AlertState {
        let cell = self.entry(symbol).await;
        let state = cell.lock().await;
        state.clone()
    }

    pub async fn snapshot(&self) -> BTreeMap<String, AlertState> {
        let shards = self.shards.read().await;
        let mut out = BTreeMap::new();
        for (symbol, cell) in shards.iter() {
            out.insert(symbol.clone(), cell.lock().await.clone());
        }
        out
    }

    /// Loads the persisted key-value file. A missing file is an empty store.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            debug!("no state file at {}, starting empty", path.display());
            return Ok(Self::new());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read state file {}", path.display()))?;
        let map: BTreeMap<String, AlertState> = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse state file {}", path.display()))?;
        info!("loaded alert state for {} symbols from {}", map.len(), path.display());

        let shards = map
            .into_iter()
            .map(|(symbol, state)| (symbol, Arc::new(Mutex::new(state))))
            .collect();
        Ok(Self {
            shards: RwLock::new(shards),
        })
    }

    pub async fn save(&self, path: &Path) -> anyhow::Result<()> {
        let snapshot = self.snapshot().await;
        let raw = serde_json::to_string_pretty(&snapshot).context("failed to serialize state")?;
        std::fs::write(path, raw)
            .with_context(|| format!("failed to write state file {}", path.display()))?;
        debug!("saved alert state for {} symbols", snapshot.len());
        Ok(())
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}
