// Handler for timeframe selection
use shared::models::TimeframeKind;

use super::ChartSession;
use crate::chart::timeframes::TimeframeSelection;
use crate::data::DataFeed;

impl<F: DataFeed + Clone> ChartSession<F> {
    /// Switches the active timeframe and refetches. Returns `false` for an index the
    /// catalog does not have, leaving the current timeframe in place.
    pub fn select_timeframe(&mut self, index: usize, kind: TimeframeKind) -> bool {
        if self.closed {
            return false;
        }
        let selection = TimeframeSelection::new(index, kind);
        let Some(descriptor) = self.catalog.get(selection) else {
            tracing::warn!(index, kind = ?kind, "Unknown timeframe selection ignored");
            return false;
        };
        tracing::info!(symbol = %self.symbol, timeframe = %descriptor.label, "Timeframe selected");

        if let Err(e) = self.preferences.record(&self.symbol, selection) {
            tracing::warn!(symbol = %self.symbol, error = %e, "Could not persist timeframe preference");
        }
        // A timeframe is a new view: annotations from the previous one do not carry over.
        self.drawing.clear(&mut self.surface);
        self.activate_timeframe(selection);
        true
    }

    pub(crate) fn activate_timeframe(&mut self, selection: TimeframeSelection) {
        self.selection = selection;
        let descriptor = self.descriptor();

        self.stop_poll();
        self.request_candles();
        if self.compare.is_active() {
            // Compare candles from the previous interval must not be re-anchored on the new axis.
            self.compare.reset_data(&mut self.surface);
            self.request_compare();
        }
        if descriptor.polls() {
            self.start_poll(descriptor.poll_interval_ms);
        }
    }
}
