use serde::Deserialize;

/// One daily candle as returned by the analytics provider.
#[derive(Debug, Clone, Deserialize)]
pub struct CandleBar {
    pub open_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_provider_payload() {
        let raw = r#"[
            {"open_time": 1767225600000, "open": 181.0, "high": 184.2, "low": 180.1, "close": 183.5, "volume": 51200000.0},
            {"open_time": 1767312000000, "open": 183.5, "high": 186.0, "low": 182.9, "close": 185.1, "volume": 48900000.0}
        ]"#;
        let bars: Vec<CandleBar> = serde_json::from_str(raw).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[1].close, 185.1);
    }
}
