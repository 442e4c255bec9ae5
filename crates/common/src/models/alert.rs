use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::signal::Fingerprint;

/// How far past the threshold the composite landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Normal,
    High,
    Critical,
}

impl Severity {
    /// `distance` is |composite| - threshold at the moment of firing.
    pub fn from_distance(distance: f64) -> Self {
        if distance >= 1.0 {
            Severity::Critical
        } else if distance >= 0.5 {
            Severity::High
        } else {
            Severity::Normal
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Severity::Normal => "NORMAL",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        };
        write!(f, "{}", s)
    }
}

/// One fired alert, consumed by the dispatcher. Not retained after
/// successful delivery.
#[derive(Debug, Clone)]
pub struct Alert {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    pub message: String,
    pub fingerprint: Fingerprint,
}

/// Per-symbol dedup/cooldown record. Mutated only by the alert policy,
/// under the symbol's own lock. Field names match the persisted key-value
/// file format.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertState {
    #[serde(rename = "last_alert_timestamp", default)]
    pub last_alert_at: Option<DateTime<Utc>>,
    #[serde(rename = "fingerprint", default)]
    pub last_fingerprint: Option<Fingerprint>,
    #[serde(default)]
    pub cooldown_until: Option<DateTime<Utc>>,
}
