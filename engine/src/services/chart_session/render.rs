// Pushing candle-derived series onto the surface
use shared::models::{ChartType, IndicatorKind, TimePoint, VisibleRange};

use super::ChartSession;
use crate::chart::surface::{PaneKind, SeriesData, SeriesId, SeriesStyle};
use crate::chart::transform::{project_forward_timestamps, to_heikin_ashi};
use crate::chart::ChartSurfaceController;
use crate::data::DataFeed;
use crate::indicators::{Ema, IndicatorCalculator, Macd, Rsi, Vwap};

pub const PRIMARY_COLOR: &str = "#26a69a";
pub const EMA_COLORS: [&str; 4] = ["#f5c542", "#42a5f5", "#ab47bc", "#66bb6a"];
pub const VWAP_COLOR: &str = "#e91e63";
pub const RSI_COLOR: &str = "#7e57c2";
pub const RSI_OVERBOUGHT: f64 = 70.0;
pub const RSI_OVERSOLD: f64 = 30.0;
pub const MACD_LINE_COLOR: &str = "#2962ff";
pub const MACD_SIGNAL_COLOR: &str = "#ff9800";

/// Updates the series behind `slot` in place, or creates it when missing.
fn upsert(
    surface: &mut ChartSurfaceController,
    slot: &mut Option<SeriesId>,
    pane: PaneKind,
    style: SeriesStyle,
    color: &str,
    data: SeriesData,
) {
    if let Some(id) = *slot {
        if surface.pane_mut(pane).is_some_and(|p| p.set_series_data(id, data.clone())) {
            return;
        }
    }
    *slot = surface.add_series(pane, style, color, data);
}

fn remove(surface: &mut ChartSurfaceController, slot: &mut Option<SeriesId>, pane: PaneKind) {
    if let Some(id) = slot.take() {
        if let Some(p) = surface.pane_mut(pane) {
            p.remove_series(id);
        }
    }
}

fn closes(candles: &[shared::models::Candle]) -> Vec<TimePoint> {
    candles.iter().map(|c| TimePoint::new(c.time, c.close)).collect()
}

impl<F: DataFeed + Clone> ChartSession<F> {
    pub(crate) fn refresh_all_series(&mut self) {
        self.drawn = match self.chart_type {
            ChartType::HeikinAshi => to_heikin_ashi(&self.candles),
            _ => self.candles.clone(),
        };
        self.render_primary();
        self.render_overlays();
        self.render_indicator_panes();
    }

    fn primary_shape(&self) -> (SeriesStyle, SeriesData) {
        match self.chart_type {
            ChartType::Candle | ChartType::HeikinAshi => (SeriesStyle::Candlestick, SeriesData::Ohlc(self.drawn.clone())),
            ChartType::Bar => (SeriesStyle::Bar, SeriesData::Ohlc(self.drawn.clone())),
            ChartType::Line => (SeriesStyle::Line, SeriesData::Line(closes(&self.drawn))),
            ChartType::Area => (SeriesStyle::Area, SeriesData::Line(closes(&self.drawn))),
        }
    }

    pub(crate) fn render_primary(&mut self) {
        let (style, data) = self.primary_shape();
        upsert(&mut self.surface, &mut self.handles.primary, PaneKind::Main, style, PRIMARY_COLOR, data);
        if let Some(id) = self.handles.primary {
            self.surface.main_mut().set_axis_series(id);
        }

        let whitespace = match (self.drawn.last(), self.descriptor().effective_interval_seconds()) {
            (Some(last), Some(step)) => project_forward_timestamps(last.time, step),
            _ => Vec::new(),
        };
        self.surface.main_mut().set_whitespace(whitespace);
    }

    /// EMA and VWAP lines on the price pane.
    pub(crate) fn render_overlays(&mut self) {
        let surface = &mut self.surface;
        if self.indicators.contains(&IndicatorKind::Ema) {
            let periods = &self.settings.indicators.ema_periods;
            while self.handles.ema.len() > periods.len() {
                if let Some(id) = self.handles.ema.pop() {
                    surface.main_mut().remove_series(id);
                }
            }
            for (i, &period) in periods.iter().enumerate() {
                let data = SeriesData::Line(Ema::new(period).calculate(&self.candles));
                let mut slot = self.handles.ema.get(i).copied();
                upsert(surface, &mut slot, PaneKind::Main, SeriesStyle::Line, EMA_COLORS[i % EMA_COLORS.len()], data);
                match (slot, i < self.handles.ema.len()) {
                    (Some(id), true) => self.handles.ema[i] = id,
                    (Some(id), false) => self.handles.ema.push(id),
                    (None, _) => {}
                }
            }
        } else {
            for id in self.handles.ema.drain(..) {
                surface.main_mut().remove_series(id);
            }
        }

        if self.indicators.contains(&IndicatorKind::Vwap) {
            let data = SeriesData::Line(Vwap::new().calculate(&self.candles));
            upsert(surface, &mut self.handles.vwap, PaneKind::Main, SeriesStyle::Line, VWAP_COLOR, data);
        } else {
            remove(surface, &mut self.handles.vwap, PaneKind::Main);
        }
    }

    /// RSI and MACD series inside their own panes, when those panes exist.
    pub(crate) fn render_indicator_panes(&mut self) {
        let config = &self.settings.indicators;
        let surface = &mut self.surface;

        if self.indicators.contains(&IndicatorKind::Rsi) && surface.pane(PaneKind::Rsi).is_some() {
            let data = SeriesData::Line(Rsi::new(config.rsi_period).calculate(&self.candles));
            let fresh = self.handles.rsi.is_none();
            upsert(surface, &mut self.handles.rsi, PaneKind::Rsi, SeriesStyle::Line, RSI_COLOR, data);
            if fresh {
                surface.create_price_line(PaneKind::Rsi, RSI_OVERBOUGHT, "#787b86", "70");
                surface.create_price_line(PaneKind::Rsi, RSI_OVERSOLD, "#787b86", "30");
            }
        }

        if self.indicators.contains(&IndicatorKind::Macd) && surface.pane(PaneKind::Macd).is_some() {
            let macd = Macd::new(config.macd_fast, config.macd_slow, config.macd_signal).calculate(&self.candles);
            // The MACD line is added first so it spans the pane's time axis.
            upsert(surface, &mut self.handles.macd_line, PaneKind::Macd, SeriesStyle::Line, MACD_LINE_COLOR, SeriesData::Line(macd.macd));
            upsert(surface, &mut self.handles.macd_signal, PaneKind::Macd, SeriesStyle::Line, MACD_SIGNAL_COLOR, SeriesData::Line(macd.signal));
            upsert(
                surface,
                &mut self.handles.macd_histogram,
                PaneKind::Macd,
                SeriesStyle::Histogram,
                MACD_LINE_COLOR,
                SeriesData::Histogram(macd.histogram),
            );
        }
    }

    /// First data for a `(symbol, timeframe)` pair fits the view: the whole series for
    /// auto-fit timeframes, otherwise the last `visible_bar_count` bars. Later updates keep
    /// whatever range the user has panned to.
    pub(crate) fn apply_view_reset(&mut self) {
        let descriptor = self.descriptor();
        let (Some(first), Some(last)) = (self.drawn.first(), self.drawn.last()) else {
            return;
        };
        let key = (self.symbol.clone(), descriptor.label.to_string());
        if self.view_resets.contains(&key) {
            return;
        }
        let from = match descriptor.visible_bar_count {
            None => first.time,
            Some(bars) => self.drawn[self.drawn.len().saturating_sub(bars)].time,
        };
        let range = VisibleRange::new(from, last.time);
        for kind in self.surface.active_panes() {
            self.surface.set_range_silently(kind, range);
        }
        tracing::debug!(symbol = %key.0, timeframe = %key.1, from = range.from, to = range.to, "View reset");
        self.view_resets.insert(key);
    }
}
