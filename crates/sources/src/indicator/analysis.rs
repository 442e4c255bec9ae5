use std::collections::BTreeMap;

use ta::Next;
use ta::indicators::{ExponentialMovingAverage, RelativeStrengthIndex, SimpleMovingAverage};

use common::error::SourceError;
use common::models::Recommendation;

/// Minimum daily closes needed before the slowest indicator (EMA26) has
/// anything meaningful to say.
pub const MIN_CLOSES: usize = 30;

const RSI_OVERSOLD: f64 = 30.0;
const RSI_OVERBOUGHT: f64 = 70.0;

#[derive(Debug)]
pub struct IndicatorReport {
    pub values: BTreeMap<String, f64>,
    pub recommendation: Recommendation,
}

/// Runs RSI(14), SMA(20) and the EMA(12/26) pair over the close series and
/// derives the overall recommendation as a vote:
///   - RSI oversold votes long, overbought votes short
///   - close above/below SMA20
///   - EMA12 above/below EMA26
pub fn analyze_closes(closes: &[f64]) -> Result<IndicatorReport, SourceError> {
    if closes.len() < MIN_CLOSES {
        return Err(SourceError::SourceUnavailable(format!(
            "insufficient candle history: got {}, need {}",
            closes.len(),
            MIN_CLOSES
        )));
    }

    let mut rsi = RelativeStrengthIndex::new(14).unwrap();
    let mut sma = SimpleMovingAverage::new(20).unwrap();
    let mut ema_fast = ExponentialMovingAverage::new(12).unwrap();
    let mut ema_slow = ExponentialMovingAverage::new(26).unwrap();

    let (mut rsi_val, mut sma_val, mut fast_val, mut slow_val) = (50.0, 0.0, 0.0, 0.0);
    for &close in closes {
        rsi_val = rsi.next(close);
        sma_val = sma.next(close);
        fast_val = ema_fast.next(close);
        slow_val = ema_slow.next(close);
    }
    let last_close = *closes.last().unwrap();

    let mut votes = 0;
    if rsi_val <= RSI_OVERSOLD {
        votes += 1;
    } else if rsi_val >= RSI_OVERBOUGHT {
        votes -= 1;
    }
    votes += if last_close > sma_val { 1 } else { -1 };
    votes += if fast_val > slow_val { 1 } else { -1 };

    let mut values = BTreeMap::new();
    values.insert("CLOSE".to_string(), last_close);
    values.insert("RSI".to_string(), rsi_val);
    values.insert("SMA20".to_string(), sma_val);
    values.insert("EMA12".to_string(), fast_val);
    values.insert("EMA26".to_string(), slow_val);

    Ok(IndicatorReport {
        values,
        recommendation: Recommendation::from_votes(votes),
    })
}
