// engine/src/services/chart_session/mod.rs
// One chart view of one instrument: the entry points a host UI drives, the
// state they act on, and the event loop that applies feed results.

use std::collections::HashSet;

use shared::models::{Candle, ChartType, IndicatorKind};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::chart::snapshot::{ClipboardSink, DirectoryDownloads, DownloadSink, NoClipboard, SnapshotExporter};
use crate::chart::surface::{ChartSurfaceController, SeriesId, Viewport};
use crate::chart::timeframes::{TimeframeCatalog, TimeframeDescriptor, TimeframeSelection};
use crate::chart::{CompareOverlay, DrawingToolController, TimeframePreferences};
use crate::config::EngineSettings;
use crate::data::DataFeed;
use crate::error::FeedError;

pub mod fetch;
pub mod indicators;
pub mod interaction;
pub mod render;
pub mod timeframe;

/// What an in-flight fetch is for. A newer fetch for the same purpose supersedes the older one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPurpose {
    Candles,
    Compare,
}

/// Results posted back by spawned fetch and poll tasks.
#[derive(Debug)]
pub(crate) enum FeedMessage {
    Candles {
        request_id: Uuid,
        result: Result<Vec<Candle>, FeedError>,
    },
    CompareCandles {
        request_id: Uuid,
        result: Result<Vec<Candle>, FeedError>,
    },
    PollTick {
        timer_id: Uuid,
    },
}

/// What applying one feed message did to the view.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    CandlesUpdated {
        symbol: String,
        timeframe: &'static str,
        candles: usize,
    },
    CompareUpdated {
        symbol: String,
        drawn: bool,
    },
    /// The prior series stays on screen and is marked stale.
    FetchFailed {
        purpose: FetchPurpose,
        error: FeedError,
    },
    StaleResponseDiscarded {
        purpose: FetchPurpose,
        request_id: Uuid,
    },
    PollTick {
        timeframe: &'static str,
    },
}

pub(crate) struct InFlight {
    pub(crate) id: Uuid,
    pub(crate) handle: JoinHandle<()>,
}

impl InFlight {
    fn abort(self) {
        self.handle.abort();
    }
}

/// Surface handles of the series the session draws from candle data.
#[derive(Debug, Default)]
pub(crate) struct SeriesHandles {
    pub(crate) primary: Option<SeriesId>,
    pub(crate) ema: Vec<SeriesId>,
    pub(crate) vwap: Option<SeriesId>,
    pub(crate) rsi: Option<SeriesId>,
    pub(crate) macd_line: Option<SeriesId>,
    pub(crate) macd_signal: Option<SeriesId>,
    pub(crate) macd_histogram: Option<SeriesId>,
}

pub struct ChartSession<F: DataFeed + Clone> {
    feed: F,
    settings: EngineSettings,
    catalog: TimeframeCatalog,
    symbol: String,
    selection: TimeframeSelection,
    chart_type: ChartType,
    indicators: HashSet<IndicatorKind>,

    /// Feed candles after aggregation; indicators and compare anchoring read these.
    candles: Vec<Candle>,
    /// `candles` in the shape of the current chart type.
    drawn: Vec<Candle>,
    stale: bool,

    surface: ChartSurfaceController,
    handles: SeriesHandles,
    drawing: DrawingToolController,
    compare: CompareOverlay,
    snapshot: SnapshotExporter,
    clipboard: Box<dyn ClipboardSink + Send>,
    downloads: Box<dyn DownloadSink + Send>,
    preferences: TimeframePreferences,
    /// `(symbol, timeframe label)` pairs whose first data already reset the view.
    view_resets: HashSet<(String, String)>,

    candles_request: Option<InFlight>,
    compare_request: Option<InFlight>,
    poll: Option<InFlight>,
    tx: mpsc::UnboundedSender<FeedMessage>,
    rx: mpsc::UnboundedReceiver<FeedMessage>,
    closed: bool,
}

impl<F: DataFeed + Clone> ChartSession<F> {
    /// Opens a view of `symbol` on its remembered timeframe, or the catalog default,
    /// and starts the first fetch. Must be called inside a tokio runtime.
    pub fn open(feed: F, settings: &EngineSettings, symbol: &str, preferences: TimeframePreferences) -> Self {
        let catalog = TimeframeCatalog::for_asset_class(settings.asset_class);
        let selection = preferences
            .get(symbol)
            .filter(|s| catalog.get(*s).is_some())
            .unwrap_or_else(|| catalog.default_selection());
        let viewport = Viewport {
            width: settings.viewport.width,
            height: settings.viewport.height,
        };
        let (tx, rx) = mpsc::unbounded_channel();

        let mut session = ChartSession {
            feed,
            settings: settings.clone(),
            catalog,
            symbol: symbol.to_string(),
            selection,
            chart_type: ChartType::default(),
            indicators: HashSet::new(),
            candles: Vec::new(),
            drawn: Vec::new(),
            stale: false,
            surface: ChartSurfaceController::new(viewport),
            handles: SeriesHandles::default(),
            drawing: DrawingToolController::new(),
            compare: CompareOverlay::new(),
            snapshot: SnapshotExporter::new(&settings.snapshot.watermark, settings.snapshot.footer_height),
            clipboard: Box::new(NoClipboard),
            downloads: Box::new(DirectoryDownloads::new(settings.snapshot.downloads_dir.clone())),
            preferences,
            view_resets: HashSet::new(),
            candles_request: None,
            compare_request: None,
            poll: None,
            tx,
            rx,
            closed: false,
        };
        tracing::info!(symbol = %session.symbol, timeframe = %session.descriptor().label, "Chart session opened");
        session.activate_timeframe(selection);
        session
    }

    /// Replaces where snapshots go.
    pub fn with_snapshot_sinks(
        mut self,
        clipboard: Box<dyn ClipboardSink + Send>,
        downloads: Box<dyn DownloadSink + Send>,
    ) -> Self {
        self.clipboard = clipboard;
        self.downloads = downloads;
        self
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn selection(&self) -> TimeframeSelection {
        self.selection
    }

    pub fn descriptor(&self) -> &'static TimeframeDescriptor {
        // `selection` is only ever set to entries the catalog resolved.
        self.catalog
            .get(self.selection)
            .unwrap_or_else(|| &self.catalog.entries(self.selection.kind())[0])
    }

    pub fn catalog(&self) -> &TimeframeCatalog {
        &self.catalog
    }

    pub fn chart_type(&self) -> ChartType {
        self.chart_type
    }

    pub fn is_indicator_enabled(&self, kind: IndicatorKind) -> bool {
        self.indicators.contains(&kind)
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn drawn_candles(&self) -> &[Candle] {
        &self.drawn
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn surface(&self) -> &ChartSurfaceController {
        &self.surface
    }

    pub fn drawing(&self) -> &DrawingToolController {
        &self.drawing
    }

    pub fn compare(&self) -> &CompareOverlay {
        &self.compare
    }

    pub fn preferences(&self) -> &TimeframePreferences {
        &self.preferences
    }

    pub fn primary_series(&self) -> Option<SeriesId> {
        self.handles.primary
    }

    pub fn is_polling(&self) -> bool {
        self.poll.is_some()
    }

    /// Waits for the next feed result and applies it. `None` once the session is closed.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        if self.closed {
            return None;
        }
        let message = self.rx.recv().await?;
        Some(self.apply(message))
    }

    /// Applies every feed result already queued, without waiting.
    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while !self.closed {
            match self.rx.try_recv() {
                Ok(message) => events.push(self.apply(message)),
                Err(_) => break,
            }
        }
        events
    }

    /// Tears the view down. Pending fetches and timers are aborted and every later call is a no-op.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.drawing.clear(&mut self.surface);
        self.compare.stop(&mut self.surface);
        self.snapshot.cancel();
        self.stop_poll();
        for request in [self.candles_request.take(), self.compare_request.take()].into_iter().flatten() {
            request.abort();
        }
        self.surface.destroy_indicator_pane(crate::chart::PaneKind::Rsi);
        self.surface.destroy_indicator_pane(crate::chart::PaneKind::Macd);
        let main = self.surface.main_mut();
        for id in main.series_ids() {
            main.remove_series(id);
        }
        main.set_whitespace(Vec::new());
        self.handles = SeriesHandles::default();
        self.rx.close();
        self.closed = true;
        tracing::info!(symbol = %self.symbol, "Chart session closed");
    }
}

impl<F: DataFeed + Clone> Drop for ChartSession<F> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests;
