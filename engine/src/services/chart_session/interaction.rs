// Handlers for pointer input, drawing tools, compare and snapshots
use shared::models::{InstrumentMatch, VisibleRange};

use super::ChartSession;
use crate::chart::drawing::{ClickOutcome, ClickTarget, DrawingTool};
use crate::chart::snapshot::{FrameGrabber, SelectionRect, SnapshotOutcome};
use crate::chart::surface::{PaneKind, ScreenPoint, Viewport};
use crate::data::DataFeed;
use crate::error::{EngineError, FeedError};

impl<F: DataFeed + Clone> ChartSession<F> {
    /// Arms `tool`, or disarms with `None`. Re-arming the armed tool also disarms it.
    pub fn arm_drawing_tool(&mut self, tool: Option<DrawingTool>) {
        if self.closed {
            return;
        }
        self.drawing.arm(tool, &mut self.surface);
    }

    pub fn clear_annotations(&mut self) {
        if self.closed {
            return;
        }
        self.drawing.clear(&mut self.surface);
    }

    pub fn click(&mut self, target: ClickTarget, point: ScreenPoint) -> ClickOutcome {
        if self.closed || self.snapshot.is_selecting() {
            return ClickOutcome::Ignored;
        }
        self.drawing.click(target, point, &mut self.surface, &self.drawn)
    }

    pub fn pointer_move(&mut self, point: ScreenPoint) {
        if self.closed {
            return;
        }
        if self.snapshot.is_selecting() {
            self.snapshot.drag(point);
            return;
        }
        self.drawing.pointer_move(point, &mut self.surface, &self.drawn);
    }

    /// A user pan or zoom on one pane; every other pane follows.
    pub fn pan_zoom(&mut self, pane: PaneKind, range: VisibleRange) {
        if self.closed {
            return;
        }
        self.surface.pan_zoom(pane, range);
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        if self.closed {
            return;
        }
        self.surface.set_viewport(viewport);
    }

    /// Overlays `symbol`, anchored to this instrument's latest price.
    pub fn start_compare(&mut self, symbol: &str) {
        if self.closed {
            return;
        }
        tracing::info!(symbol = %self.symbol, compare = %symbol, "Compare overlay started");
        self.compare.start(symbol, &mut self.surface);
        self.request_compare();
    }

    pub fn stop_compare(&mut self) {
        if self.closed {
            return;
        }
        self.cancel_compare_request();
        self.compare.stop(&mut self.surface);
    }

    /// Candidates for the compare picker.
    pub async fn search_instruments(&self, query: &str) -> Result<Vec<InstrumentMatch>, FeedError> {
        if self.closed {
            return Ok(Vec::new());
        }
        self.feed.search_instruments(query).await
    }

    /// Enters selection mode. Drawing is paused until the selection finishes.
    pub fn start_snapshot(&mut self) {
        if self.closed {
            return;
        }
        self.drawing.cancel(&mut self.surface);
        self.snapshot.start();
    }

    pub fn drag_snapshot(&mut self, point: ScreenPoint) {
        if self.closed {
            return;
        }
        self.snapshot.drag(point);
    }

    /// The rectangle dragged so far, if any.
    pub fn snapshot_selection(&self) -> Option<SelectionRect> {
        self.snapshot.selection()
    }

    /// Exports `rect` of the main pane. `Ok(None)` when the selection was an accidental tap.
    pub fn finish_snapshot(
        &mut self,
        rect: SelectionRect,
        grabber: &dyn FrameGrabber,
    ) -> Result<Option<SnapshotOutcome>, EngineError> {
        if self.closed {
            return Ok(None);
        }
        let logical = self.surface.main().viewport();
        let timeframe = self.descriptor().label;
        self.snapshot.finish(
            rect,
            grabber,
            logical,
            &self.symbol,
            timeframe,
            &mut *self.clipboard,
            &mut *self.downloads,
        )
    }
}
