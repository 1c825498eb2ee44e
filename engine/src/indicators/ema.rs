// Exponential Moving Average (EMA) indicator implementation
use super::{IndicatorCalculator, IndicatorSeries};
use serde_json::Value;
use shared::models::{Candle, TimePoint};

pub struct Ema {
    name: String,
    period: usize,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        Self {
            name: format!("EMA({})", period),
            period,
        }
    }

    pub fn period(&self) -> usize {
        self.period
    }
}

/// EMA over raw values, seeded with the simple average of the first `period` values.
/// Output index 0 corresponds to input index `period - 1`.
pub(crate) fn ema_values(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }
    let k = 2.0 / (period as f64 + 1.0);
    let seed = values[..period].iter().sum::<f64>() / period as f64;

    let mut out = Vec::with_capacity(values.len() - period + 1);
    out.push(seed);
    let mut previous = seed;
    for &value in &values[period..] {
        previous = value * k + previous * (1.0 - k);
        out.push(previous);
    }
    out
}

impl IndicatorCalculator for Ema {
    type Output = IndicatorSeries;

    fn name(&self) -> &str {
        &self.name
    }

    fn parameters(&self) -> Value {
        serde_json::json!({ "period": self.period })
    }

    fn warm_up(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn calculate(&self, data: &[Candle]) -> IndicatorSeries {
        let closes: Vec<f64> = data.iter().map(|c| c.close).collect();
        ema_values(&closes, self.period)
            .into_iter()
            .zip(data.iter().skip(self.warm_up()))
            .map(|(value, candle)| TimePoint::new(candle.time, value))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::test_support::{closes, wave};

    #[test]
    fn test_ema_calculation() {
        let candles = closes(&[10.0, 11.0, 12.0, 13.0, 14.0]);
        let results = Ema::new(3).calculate(&candles);
        // SMA seed (10+11+12)/3 = 11, then k = 0.5
        assert_eq!(results.len(), 3);
        assert_eq!(results[0], TimePoint::new(candles[2].time, 11.0));
        assert_eq!(results[1].value, 12.0);
        assert_eq!(results[2].value, 13.0);
        assert_eq!(results[2].time, candles[4].time);
    }

    #[test]
    fn test_ema_insufficient_data() {
        let candles = closes(&[1.0, 2.0]);
        assert!(Ema::new(3).calculate(&candles).is_empty());
        assert!(Ema::new(0).calculate(&candles).is_empty());
    }

    #[test]
    fn test_ema_is_pure() {
        let candles = wave(120);
        let ema = Ema::new(21);
        let first = ema.calculate(&candles);
        let second = ema.calculate(&candles);
        assert_eq!(first, second);
        assert_eq!(first.len(), candles.len() - 20);
    }
}
