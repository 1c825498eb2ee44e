// Second-instrument overlay anchored to the primary instrument's latest price
use shared::models::{Candle, TimePoint};

use super::surface::{ChartSurfaceController, PaneKind, SeriesData, SeriesId, SeriesStyle};

pub const COMPARE_COLOR: &str = "#ff6d00";

/// Rescales `compare` so its last value lands on the primary's last close.
///
/// `None` when either series is empty or the compare series' latest close is zero or not finite.
pub fn anchor_series(primary: &[Candle], compare: &[Candle]) -> Option<Vec<TimePoint>> {
    let primary_last = primary.last()?.close;
    let compare_last = compare.last()?.close;
    if compare_last == 0.0 || !compare_last.is_finite() || !primary_last.is_finite() {
        return None;
    }
    Some(
        compare
            .iter()
            .map(|c| TimePoint::new(c.time, primary_last * (c.close / compare_last)))
            .collect(),
    )
}

#[derive(Debug, Default)]
pub struct CompareOverlay {
    symbol: Option<String>,
    candles: Vec<Candle>,
    series: Option<SeriesId>,
}

impl CompareOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn symbol(&self) -> Option<&str> {
        self.symbol.as_deref()
    }

    pub fn is_active(&self) -> bool {
        self.symbol.is_some()
    }

    pub fn series_id(&self) -> Option<SeriesId> {
        self.series
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    /// Switches to a new compare symbol. Data arrives later through `set_candles`.
    pub fn start(&mut self, symbol: &str, surface: &mut ChartSurfaceController) {
        self.stop(surface);
        self.symbol = Some(symbol.to_string());
    }

    pub fn stop(&mut self, surface: &mut ChartSurfaceController) {
        self.remove_series(surface);
        self.candles.clear();
        if let Some(symbol) = self.symbol.take() {
            tracing::info!(compare = %symbol, "Compare overlay stopped");
        }
    }

    pub fn set_candles(&mut self, candles: Vec<Candle>, primary: &[Candle], surface: &mut ChartSurfaceController) {
        self.candles = candles;
        self.recompute(primary, surface);
    }

    /// Replaces the overlay series from scratch. Called whenever either side updates.
    pub fn recompute(&mut self, primary: &[Candle], surface: &mut ChartSurfaceController) {
        self.remove_series(surface);
        if self.symbol.is_none() {
            return;
        }
        match anchor_series(primary, &self.candles) {
            Some(points) => {
                tracing::debug!(compare = ?self.symbol, points = points.len(), "Compare overlay recomputed");
                self.series = surface.add_series(PaneKind::Main, SeriesStyle::Line, COMPARE_COLOR, SeriesData::Line(points));
            }
            None => {
                tracing::debug!(compare = ?self.symbol, "Compare overlay skipped: no anchor");
            }
        }
    }

    /// Clears the series and its candles but keeps the symbol, ahead of a refetch on
    /// another range or interval.
    pub fn reset_data(&mut self, surface: &mut ChartSurfaceController) {
        self.remove_series(surface);
        self.candles.clear();
    }

    fn remove_series(&mut self, surface: &mut ChartSurfaceController) {
        if let Some(id) = self.series.take() {
            surface.main_mut().remove_series(id);
        }
    }
}
