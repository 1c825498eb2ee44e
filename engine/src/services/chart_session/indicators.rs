// Handlers for indicator toggles and chart type changes
use shared::models::{ChartType, IndicatorKind};

use super::ChartSession;
use crate::chart::surface::PaneKind;
use crate::data::DataFeed;

fn pane_for(kind: IndicatorKind) -> Option<PaneKind> {
    match kind {
        IndicatorKind::Rsi => Some(PaneKind::Rsi),
        IndicatorKind::Macd => Some(PaneKind::Macd),
        IndicatorKind::Ema | IndicatorKind::Vwap => None,
    }
}

impl<F: DataFeed + Clone> ChartSession<F> {
    /// Flips an indicator. RSI and MACD build or tear down their own pane.
    /// Returns whether the indicator is now shown.
    pub fn toggle_indicator(&mut self, kind: IndicatorKind) -> bool {
        if self.closed {
            return false;
        }
        let enabled = if self.indicators.remove(&kind) {
            false
        } else {
            self.indicators.insert(kind);
            true
        };
        tracing::info!(indicator = %kind, enabled, "Indicator toggled");

        match pane_for(kind) {
            Some(pane) => {
                match kind {
                    IndicatorKind::Rsi => self.handles.rsi = None,
                    _ => {
                        self.handles.macd_line = None;
                        self.handles.macd_signal = None;
                        self.handles.macd_histogram = None;
                    }
                }
                if enabled {
                    self.surface.create_indicator_pane(pane);
                    self.render_indicator_panes();
                } else {
                    self.surface.destroy_indicator_pane(pane);
                }
            }
            None => self.render_overlays(),
        }
        enabled
    }

    /// Changes how the primary series is drawn. Annotations are cleared because their
    /// handles belong to the previous primary series.
    pub fn set_chart_type(&mut self, chart_type: ChartType) {
        if self.closed || chart_type == self.chart_type {
            return;
        }
        tracing::info!(from = ?self.chart_type, to = ?chart_type, "Chart type changed");
        self.drawing.clear(&mut self.surface);
        if let Some(id) = self.handles.primary.take() {
            self.surface.main_mut().remove_series(id);
        }
        self.chart_type = chart_type;
        self.refresh_all_series();
    }
}
