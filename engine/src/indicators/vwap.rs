// Volume-Weighted Average Price, accumulated per UTC calendar day
use super::{IndicatorCalculator, IndicatorSeries};
use serde_json::Value;
use shared::models::{Candle, TimePoint};
use shared::utils::utc_day;

#[derive(Default)]
pub struct Vwap;

impl Vwap {
    pub fn new() -> Self {
        Vwap
    }
}

impl IndicatorCalculator for Vwap {
    type Output = IndicatorSeries;

    fn name(&self) -> &str {
        "VWAP"
    }

    fn parameters(&self) -> Value {
        serde_json::json!({ "anchor": "utc_day" })
    }

    fn warm_up(&self) -> usize {
        0
    }

    fn calculate(&self, data: &[Candle]) -> IndicatorSeries {
        let mut results = Vec::with_capacity(data.len());
        let mut current_day = None;
        let mut cum_pv = 0.0;
        let mut cum_volume: u64 = 0;

        for candle in data {
            let day = utc_day(candle.time);
            if day != current_day {
                current_day = day;
                cum_pv = 0.0;
                cum_volume = 0;
            }
            cum_pv += candle.typical_price() * candle.volume as f64;
            cum_volume += candle.volume;

            // Nothing traded yet today: no value rather than a divide-by-zero sentinel.
            if cum_volume == 0 {
                continue;
            }
            results.push(TimePoint::new(candle.time, cum_pv / cum_volume as f64));
        }
        results
    }
}
