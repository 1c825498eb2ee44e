// Technical indicators computed over the drawn candle series.
//
// Every calculator is a pure function of its input: the series is recomputed
// in full on each update and no state survives between calls.
pub mod ema;
pub mod macd;
pub mod rsi;
pub mod vwap;

pub use ema::Ema;
pub use macd::{Macd, MacdSeries};
pub use rsi::Rsi;
pub use vwap::Vwap;

use serde_json::Value;
use shared::models::{Candle, TimePoint};

/// Line indicator output: a time-aligned subset of the candle series.
pub type IndicatorSeries = Vec<TimePoint>;

// Common trait for all indicators
pub trait IndicatorCalculator: Send + Sync {
    type Output;

    fn name(&self) -> &str;
    fn parameters(&self) -> Value; // Parameters used for this indicator instance
    /// Leading candles that produce no value.
    fn warm_up(&self) -> usize;
    fn calculate(&self, data: &[Candle]) -> Self::Output;
}
