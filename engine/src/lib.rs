// Engine library root
// Charting and technical analysis for a single-instrument view: timeframes,
// candle transforms, indicators, the pane surface, drawing tools, snapshots
// and compare overlays, tied together by the chart session service.

pub mod chart;
pub mod config;
pub mod data;
pub mod error;
pub mod indicators;
pub mod services;
