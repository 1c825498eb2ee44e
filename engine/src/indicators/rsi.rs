// Relative Strength Index (RSI) indicator implementation, Wilder smoothing
use super::{IndicatorCalculator, IndicatorSeries};
use serde_json::Value;
use shared::models::{Candle, TimePoint};

pub const DEFAULT_RSI_PERIOD: usize = 14;

pub struct Rsi {
    name: String,
    period: usize,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        Self {
            name: format!("RSI({})", period),
            period,
        }
    }
}

impl Default for Rsi {
    fn default() -> Self {
        Rsi::new(DEFAULT_RSI_PERIOD)
    }
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}

impl IndicatorCalculator for Rsi {
    type Output = IndicatorSeries;

    fn name(&self) -> &str {
        &self.name
    }

    fn parameters(&self) -> Value {
        serde_json::json!({ "period": self.period })
    }

    fn warm_up(&self) -> usize {
        self.period
    }

    fn calculate(&self, data: &[Candle]) -> IndicatorSeries {
        if self.period == 0 || data.len() < self.period + 1 {
            return Vec::new();
        }
        let period = self.period as f64;

        let mut gains = 0.0;
        let mut losses = 0.0;
        for i in 1..=self.period {
            let change = data[i].close - data[i - 1].close;
            if change > 0.0 {
                gains += change;
            } else {
                losses -= change; // losses are positive values
            }
        }
        let mut avg_gain = gains / period;
        let mut avg_loss = losses / period;

        let mut results = Vec::with_capacity(data.len() - self.period);
        results.push(TimePoint::new(data[self.period].time, rsi_value(avg_gain, avg_loss)));

        for i in (self.period + 1)..data.len() {
            let change = data[i].close - data[i - 1].close;
            let (gain, loss) = if change > 0.0 { (change, 0.0) } else { (0.0, -change) };
            avg_gain = (avg_gain * (period - 1.0) + gain) / period;
            avg_loss = (avg_loss * (period - 1.0) + loss) / period;
            results.push(TimePoint::new(data[i].time, rsi_value(avg_gain, avg_loss)));
        }
        results
    }
}
