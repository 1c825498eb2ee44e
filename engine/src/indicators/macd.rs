// MACD (Moving Average Convergence Divergence) indicator

use super::ema::ema_values;
use super::{IndicatorCalculator, IndicatorSeries};
use serde_json::Value;
use shared::models::{Candle, HistogramPoint, TimePoint};

pub const HISTOGRAM_POSITIVE_COLOR: &str = "#26a69a";
pub const HISTOGRAM_NEGATIVE_COLOR: &str = "#ef5350";

/// MACD line, signal line and histogram.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MacdSeries {
    pub macd: IndicatorSeries,
    pub signal: IndicatorSeries,
    pub histogram: Vec<HistogramPoint>,
}

impl MacdSeries {
    pub fn is_empty(&self) -> bool {
        self.macd.is_empty() && self.signal.is_empty() && self.histogram.is_empty()
    }
}

pub struct Macd {
    name: String,
    fast: usize,
    slow: usize,
    signal: usize,
}

impl Macd {
    pub fn new(fast: usize, slow: usize, signal: usize) -> Self {
        Self {
            name: format!("MACD({},{},{})", fast, slow, signal),
            fast,
            slow,
            signal,
        }
    }
}

impl Default for Macd {
    fn default() -> Self {
        Macd::new(12, 26, 9)
    }
}

fn histogram_color(value: f64) -> &'static str {
    if value >= 0.0 {
        HISTOGRAM_POSITIVE_COLOR
    } else {
        HISTOGRAM_NEGATIVE_COLOR
    }
}

impl IndicatorCalculator for Macd {
    type Output = MacdSeries;

    fn name(&self) -> &str {
        &self.name
    }

    fn parameters(&self) -> Value {
        serde_json::json!({ "fast": self.fast, "slow": self.slow, "signal": self.signal })
    }

    fn warm_up(&self) -> usize {
        self.slow.max(self.fast).saturating_sub(1)
    }

    fn calculate(&self, data: &[Candle]) -> MacdSeries {
        if self.fast == 0 || self.slow == 0 || self.signal == 0 || data.len() < self.slow + self.signal {
            return MacdSeries::default();
        }

        let closes: Vec<f64> = data.iter().map(|c| c.close).collect();
        let fast = ema_values(&closes, self.fast);
        let slow = ema_values(&closes, self.slow);

        // MACD starts where the slower EMA produces its first value.
        let start = self.warm_up();
        let macd: IndicatorSeries = (start..data.len())
            .map(|i| {
                let value = fast[i + 1 - self.fast] - slow[i + 1 - self.slow];
                TimePoint::new(data[i].time, value)
            })
            .collect();

        let macd_values: Vec<f64> = macd.iter().map(|p| p.value).collect();
        let signal_values = ema_values(&macd_values, self.signal);
        let offset = self.signal - 1;

        let signal: IndicatorSeries = signal_values
            .iter()
            .enumerate()
            .map(|(j, &value)| TimePoint::new(macd[j + offset].time, value))
            .collect();

        let histogram = signal
            .iter()
            .enumerate()
            .map(|(j, s)| {
                let value = macd[j + offset].value - s.value;
                HistogramPoint {
                    time: s.time,
                    value,
                    color: histogram_color(value).to_string(),
                }
            })
            .collect();

        MacdSeries { macd, signal, histogram }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::test_support::{closes, wave};
    use crate::indicators::Ema;

    #[test]
    fn empty_when_shorter_than_slow_plus_signal() {
        let candles = wave(34);
        assert!(Macd::default().calculate(&candles).is_empty());
        assert!(!Macd::default().calculate(&wave(35)).is_empty());
    }

    #[test]
    fn macd_line_is_fast_minus_slow_ema() {
        let candles = wave(80);
        let out = Macd::default().calculate(&candles);
        let fast = Ema::new(12).calculate(&candles);
        let slow = Ema::new(26).calculate(&candles);

        assert_eq!(out.macd.len(), candles.len() - 25);
        assert_eq!(out.macd[0].time, candles[25].time);
        for point in &out.macd {
            let f = fast.iter().find(|p| p.time == point.time).unwrap();
            let s = slow.iter().find(|p| p.time == point.time).unwrap();
            assert_eq!(point.value, f.value - s.value);
        }
    }

    #[test]
    fn signal_and_histogram_alignment() {
        let candles = wave(80);
        let out = Macd::default().calculate(&candles);
        assert_eq!(out.signal.len(), out.macd.len() - 8);
        assert_eq!(out.histogram.len(), out.signal.len());
        assert_eq!(out.signal[0].time, candles[33].time);
        for (h, s) in out.histogram.iter().zip(&out.signal) {
            let m = out.macd.iter().find(|p| p.time == s.time).unwrap();
            assert_eq!(h.time, s.time);
            assert_eq!(h.value, m.value - s.value);
            let expected = if h.value >= 0.0 { HISTOGRAM_POSITIVE_COLOR } else { HISTOGRAM_NEGATIVE_COLOR };
            assert_eq!(h.color, expected);
        }
    }

    #[test]
    fn flat_series_has_zero_macd() {
        let candles = closes(&[25.0; 40]);
        let out = Macd::default().calculate(&candles);
        assert!(out.macd.iter().all(|p| p.value.abs() < 1e-9));
        assert!(out.histogram.iter().all(|h| h.value.abs() < 1e-9));
    }

    #[test]
    fn macd_is_pure() {
        let candles = wave(150);
        let macd = Macd::default();
        assert_eq!(macd.calculate(&candles), macd.calculate(&candles));
    }
}
