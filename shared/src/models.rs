use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One OHLCV bucket. `time` is unix seconds; a series is strictly increasing in time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl Candle {
    pub fn new(time: i64, open: f64, high: f64, low: f64, close: f64, volume: u64) -> Self {
        Self { time, open, high, low, close, volume }
    }

    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }

    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.time, 0)
    }
}

/// A single value of a line series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimePoint {
    pub time: i64,
    pub value: f64,
}

impl TimePoint {
    pub fn new(time: i64, value: f64) -> Self {
        Self { time, value }
    }
}

/// A histogram bar, coloured by the sign of its value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramPoint {
    pub time: i64,
    pub value: f64,
    pub color: String,
}

/// A location on the price surface in chart coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub time: i64,
    pub price: f64,
}

impl ChartPoint {
    pub fn new(time: i64, price: f64) -> Self {
        Self { time, price }
    }
}

/// A user-drawn chart marking. Fibonacci levels are derived from the anchors when drawn.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Annotation {
    HorizontalLine { price: f64 },
    Trendline { p1: ChartPoint, p2: ChartPoint },
    Ray { p1: ChartPoint, p2: ChartPoint },
    FibRetracement { p1: ChartPoint, p2: ChartPoint },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum ChartType {
    #[default]
    Candle,
    Line,
    Area,
    Bar,
    HeikinAshi,
}

impl ChartType {
    /// Whether the primary series is drawn from OHLC values rather than closes.
    pub fn is_ohlc(&self) -> bool {
        matches!(self, ChartType::Candle | ChartType::Bar | ChartType::HeikinAshi)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndicatorKind {
    Ema,
    Vwap,
    Rsi,
    Macd,
}

impl IndicatorKind {
    /// RSI and MACD live in their own panes; EMA and VWAP overlay the price pane.
    pub fn has_own_pane(&self) -> bool {
        matches!(self, IndicatorKind::Rsi | IndicatorKind::Macd)
    }
}

impl fmt::Display for IndicatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IndicatorKind::Ema => "ema",
            IndicatorKind::Vwap => "vwap",
            IndicatorKind::Rsi => "rsi",
            IndicatorKind::Macd => "macd",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeframeKind {
    Minute,
    Range,
}

/// Visible window of a pane's time axis, in unix seconds (inclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibleRange {
    pub from: i64,
    pub to: i64,
}

impl VisibleRange {
    pub fn new(from: i64, to: i64) -> Self {
        Self { from, to }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteSnapshot {
    pub symbol: String,
    pub price: f64,
    pub change: f64,
    pub change_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentMatch {
    pub symbol: String,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typical_price_averages_high_low_close() {
        let candle = Candle::new(0, 1.0, 12.0, 6.0, 9.0, 10);
        assert_eq!(candle.typical_price(), 9.0);
    }

    #[test]
    fn pane_and_shape_classification() {
        assert!(IndicatorKind::Rsi.has_own_pane());
        assert!(IndicatorKind::Macd.has_own_pane());
        assert!(!IndicatorKind::Ema.has_own_pane());
        assert!(ChartType::HeikinAshi.is_ohlc());
        assert!(!ChartType::Area.is_ohlc());
    }

    #[test]
    fn datetime_converts_unix_seconds() {
        let candle = Candle::new(86_400, 1.0, 1.0, 1.0, 1.0, 0);
        assert_eq!(candle.datetime().map(|d| d.timestamp()), Some(86_400));
    }
}
