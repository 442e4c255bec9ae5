use chrono::{DateTime, Duration, Utc};

use common::config::MonitorConfig;
use common::models::{Alert, AlertState, Fingerprint, Severity, Signal, Zone};

/// Decides whether a signal warrants an alert, given the symbol's prior
/// state. Crossing semantics: an alert fires when the composite moves into
/// a different zone than the one recorded at the last alert, never because
/// it merely stays past the threshold.
#[derive(Debug, Clone)]
pub struct AlertPolicy {
    threshold: f64,
    bucket_size: f64,
    cooldown: Duration,
    fire_on_baseline: bool,
}

impl AlertPolicy {
    pub fn new(threshold: f64, bucket_size: f64, cooldown: Duration, fire_on_baseline: bool) -> Self {
        Self {
            threshold,
            bucket_size,
            cooldown,
            fire_on_baseline,
        }
    }

    pub fn from_config(config: &MonitorConfig) -> Self {
        Self::new(
            config.threshold,
            config.bucket_size,
            Duration::seconds(config.cooldown_seconds as i64),
            config.fire_on_baseline,
        )
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn set_threshold(&mut self, threshold: f64) {
        self.threshold = threshold;
    }

    /// Evaluates one signal against the symbol's state. On fire the state
    /// is updated in place: fingerprint, last alert time, and a new
    /// cooldown_until (always >= the previous one). When nothing fires the
    /// state is left untouched, so re-evaluating the same pair without
    /// advancing time is a no-op.
    pub fn evaluate(
        &self,
        signal: &Signal,
        state: &mut AlertState,
        now: DateTime<Utc>,
    ) -> Option<Alert> {
        let zone = Zone::classify(signal.composite, self.threshold);
        let fingerprint = Fingerprint::new(zone, signal.composite, self.bucket_size);

        match &state.last_fingerprint {
            None => {
                // First ever evaluation: establish a baseline. Only an
                // already-breached zone may fire, and only when enabled.
                if !zone.is_breach() || !self.fire_on_baseline {
                    state.last_fingerprint = Some(fingerprint);
                    return None;
                }
            }
            Some(previous) => {
                if previous.zone == zone {
                    return None;
                }
                if let Some(cooldown_until) = state.cooldown_until {
                    if now < cooldown_until {
                        return None;
                    }
                }
            }
        }

        let alert = self.build_alert(signal, zone, fingerprint.clone(), now);
        state.last_alert_at = Some(now);
        state.last_fingerprint = Some(fingerprint);
        state.cooldown_until = Some(now + self.cooldown);
        Some(alert)
    }

    fn build_alert(
        &self,
        signal: &Signal,
        zone: Zone,
        fingerprint: Fingerprint,
        now: DateTime<Utc>,
    ) -> Alert {
        let severity = if zone.is_breach() {
            Severity::from_distance(signal.composite.abs() - self.threshold)
        } else {
            Severity::Normal
        };

        let headline = if zone.is_breach() {
            format!("{} {} crossing", signal.symbol, zone)
        } else {
            format!("{} reverted to NEUTRAL", signal.symbol)
        };
        let mut parts = vec![
            headline,
            format!(
                "composite {:+.2} (threshold {:.2})",
                signal.composite, self.threshold
            ),
            format!("indicators {}", signal.indicators.recommendation),
        ];
        if let Some(rsi) = signal.indicators.values.get("RSI") {
            parts.push(format!("RSI {:.1}", rsi));
        }
        match &signal.sentiment {
            Some(s) => parts.push(format!("sentiment {:+.2} \"{}\"", s.score, s.excerpt)),
            None => parts.push("sentiment n/a".to_string()),
        }
        parts.push(format!("id {}", fingerprint.digest(&signal.symbol)));

        Alert {
            symbol: signal.symbol.clone(),
            timestamp: now,
            severity,
            message: format!("[{}] {}", severity, parts.join(" | ")),
            fingerprint,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::TimeZone;

    use common::models::{IndicatorSnapshot, Recommendation, SentimentScore};

    use super::*;

    fn policy() -> AlertPolicy {
        AlertPolicy::new(1.5, 0.25, Duration::seconds(3600), true)
    }

    fn signal_with_composite(composite: f64) -> Signal {
        // Build through compose() with a sentiment score chosen to land on
        // the requested composite: (2*w + s)/2 = c  =>  s = 2c - 2.
        let snapshot = IndicatorSnapshot::new("TSLA", BTreeMap::new(), Recommendation::StrongBuy);
        if (composite - 2.0).abs() < f64::EPSILON {
            return Signal::compose(snapshot, None, 1.0, 1.0);
        }
        let sentiment = 2.0 * composite - 2.0;
        assert!((-1.0..=1.0).contains(&sentiment), "unreachable composite {}", composite);
        Signal::compose(
            snapshot,
            Some(SentimentScore::new("TSLA", sentiment, "synthetic")),
            1.0,
            1.0,
        )
    }

    fn t(seconds: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap() + Duration::seconds(seconds)
    }

    #[test]
    fn baseline_fires_high_when_already_past_threshold() {
        // threshold 1.5, STRONG_BUY, sentiment absent -> composite 2.0.
        let signal = signal_with_composite(2.0);
        let mut state = AlertState::default();
        let alert = policy().evaluate(&signal, &mut state, t(0)).unwrap();
        assert_eq!(alert.severity, Severity::High);
        assert_eq!(state.cooldown_until, Some(t(3600)));
        assert!(state.last_fingerprint.is_some());
    }

    #[test]
    fn baseline_disabled_records_state_without_firing() {
        let signal = signal_with_composite(2.0);
        let mut state = AlertState::default();
        let policy = AlertPolicy::new(1.5, 0.25, Duration::seconds(3600), false);
        assert!(policy.evaluate(&signal, &mut state, t(0)).is_none());
        // Baseline recorded: a later drop to neutral is a crossing.
        let neutral = signal_with_composite(1.0);
        assert!(policy.evaluate(&neutral, &mut state, t(10)).is_some());
    }

    #[test]
    fn baseline_neutral_never_fires() {
        let signal = signal_with_composite(1.0);
        let mut state = AlertState::default();
        assert!(policy().evaluate(&signal, &mut state, t(0)).is_none());
        assert!(state.last_fingerprint.is_some());
        assert!(state.cooldown_until.is_none());
    }

    #[test]
    fn unchanged_signal_fires_at_most_once_per_cooldown() {
        let signal = signal_with_composite(2.0);
        let mut state = AlertState::default();
        let policy = policy();
        assert!(policy.evaluate(&signal, &mut state, t(0)).is_some());
        // Same score at t=1800: still within cooldown, same zone.
        assert!(policy.evaluate(&signal, &mut state, t(1800)).is_none());
        // Same score at t=3700: cooldown elapsed but no re-crossing.
        assert!(policy.evaluate(&signal, &mut state, t(3700)).is_none());
    }

    #[test]
    fn idempotent_without_advancing_time() {
        let signal = signal_with_composite(2.0);
        let mut state = AlertState::default();
        let policy = policy();
        assert!(policy.evaluate(&signal, &mut state, t(0)).is_some());
        let snapshot = state.clone();
        assert!(policy.evaluate(&signal, &mut state, t(0)).is_none());
        assert_eq!(state, snapshot);
    }

    #[test]
    fn one_alert_per_crossing() {
        let policy = policy();
        let mut state = AlertState::default();

        // Up: composite 2.0 crosses above 1.5.
        let up = signal_with_composite(2.0);
        assert!(policy.evaluate(&up, &mut state, t(0)).is_some());

        // Down: composite 1.0 back below threshold, cooldown elapsed.
        let down = signal_with_composite(1.0);
        let reverted = policy.evaluate(&down, &mut state, t(4000)).unwrap();
        assert_eq!(reverted.severity, Severity::Normal);
        assert!(reverted.message.contains("NEUTRAL"));

        // Up again after another cooldown window.
        assert!(policy.evaluate(&up, &mut state, t(8000)).is_some());
    }

    #[test]
    fn crossing_during_cooldown_is_deferred_not_lost() {
        let policy = policy();
        let mut state = AlertState::default();
        let up = signal_with_composite(2.0);
        let down = signal_with_composite(1.0);

        assert!(policy.evaluate(&up, &mut state, t(0)).is_some());
        // Zone changed but cooldown still active: suppressed...
        assert!(policy.evaluate(&down, &mut state, t(100)).is_none());
        // ...and fires once the cooldown elapses, since the crossing
        // happened after the last fired alert.
        assert!(policy.evaluate(&down, &mut state, t(3601)).is_some());
    }

    #[test]
    fn severity_scales_with_distance_past_threshold() {
        let policy = AlertPolicy::new(0.5, 0.25, Duration::seconds(3600), true);
        let mut state = AlertState::default();
        // composite 2.0, threshold 0.5 -> distance 1.5 -> CRITICAL.
        let alert = policy
            .evaluate(&signal_with_composite(2.0), &mut state, t(0))
            .unwrap();
        assert_eq!(alert.severity, Severity::Critical);
    }

    #[test]
    fn bearish_crossing_fires_too() {
        let snapshot =
            IndicatorSnapshot::new("TSLA", BTreeMap::new(), Recommendation::StrongSell);
        let signal = Signal::compose(snapshot, None, 1.0, 1.0);
        let mut state = AlertState::default();
        let alert = policy().evaluate(&signal, &mut state, t(0)).unwrap();
        assert!(alert.message.contains("BEARISH"));
        assert_eq!(alert.severity, Severity::High);
    }

    #[test]
    fn cooldown_until_is_monotonic() {
        let policy = policy();
        let mut state = AlertState::default();
        let up = signal_with_composite(2.0);
        let down = signal_with_composite(1.0);

        assert!(policy.evaluate(&up, &mut state, t(0)).is_some());
        let first = state.cooldown_until.unwrap();
        assert!(policy.evaluate(&down, &mut state, t(4000)).is_some());
        let second = state.cooldown_until.unwrap();
        assert!(second > first);
    }
}
