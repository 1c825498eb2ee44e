use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use shared::models::{Annotation, Candle, InstrumentMatch, QuoteSnapshot, TimeframeKind};
use tempfile::tempdir;
use tokio::sync::RwLock;

use super::*;
use crate::chart::drawing::{ClickOutcome, ClickTarget, DrawingTool};
use crate::chart::snapshot::{FrameGrabber, Raster, SelectionRect, SnapshotOutcome};
use crate::chart::surface::{PaneKind, PaneLayout, ScreenPoint, Series, SeriesData};
use crate::config::settings::RetrySettings;
use crate::data::{LocalFeed, MarketDataStore};
use crate::error::EngineError;
use shared::models::VisibleRange;

// 2024-01-02 14:30:00 UTC
const SESSION_OPEN: i64 = 1_704_205_800;

/// A local feed with per-interval latency and a failure switch.
#[derive(Clone)]
struct ScriptedFeed {
    inner: LocalFeed,
    delays_ms: Arc<Mutex<HashMap<String, u64>>>,
    failing: Arc<AtomicBool>,
    candle_calls: Arc<AtomicUsize>,
}

impl ScriptedFeed {
    fn new(store: MarketDataStore) -> Self {
        ScriptedFeed {
            inner: LocalFeed::new(Arc::new(RwLock::new(store))),
            delays_ms: Arc::new(Mutex::new(HashMap::new())),
            failing: Arc::new(AtomicBool::new(false)),
            candle_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn delay(&self, interval: &str, ms: u64) {
        self.delays_ms.lock().unwrap().insert(interval.to_string(), ms);
    }
}

impl DataFeed for ScriptedFeed {
    async fn fetch_candles(
        &self,
        symbol: &str,
        range: &str,
        interval: &str,
        include_extended_hours: bool,
    ) -> Result<Vec<Candle>, FeedError> {
        self.candle_calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.delays_ms.lock().unwrap().get(interval).copied();
        if let Some(ms) = delay {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(FeedError::Unreachable("connection reset".to_string()));
        }
        self.inner.fetch_candles(symbol, range, interval, include_extended_hours).await
    }

    async fn fetch_quote_snapshot(&self, symbol: &str) -> Result<QuoteSnapshot, FeedError> {
        self.inner.fetch_quote_snapshot(symbol).await
    }

    async fn search_instruments(&self, query: &str) -> Result<Vec<InstrumentMatch>, FeedError> {
        self.inner.search_instruments(query).await
    }
}

fn series(n: usize, step: i64, base: f64) -> Vec<Candle> {
    (0..n)
        .map(|i| {
            let p = base + (i as f64 * 0.7).sin() * 2.0 + i as f64 * 0.1;
            Candle::new(SESSION_OPEN + i as i64 * step, p - 0.2, p + 0.8, p - 0.9, p, 1_000 + i as u64)
        })
        .collect()
}

fn settings() -> EngineSettings {
    EngineSettings {
        retry: RetrySettings { max_attempts: 1, base_delay_ms: 1, max_delay_ms: 1 },
        ..EngineSettings::default()
    }
}

fn store_with(entries: &[(&str, &str, Vec<Candle>)]) -> MarketDataStore {
    let mut store = MarketDataStore::new();
    for (symbol, interval, candles) in entries {
        store.add_candles(symbol, interval, candles.clone());
    }
    store
}

fn main_series(session: &ChartSession<ScriptedFeed>) -> Vec<(SeriesId, Series)> {
    let main = session.surface().main();
    main.series_ids()
        .into_iter()
        .filter_map(|id| main.series(id).map(|s| (id, s.clone())))
        .collect()
}

async fn open_aapl(feed: ScriptedFeed) -> ChartSession<ScriptedFeed> {
    let mut session = ChartSession::open(feed, &settings(), "AAPL", TimeframePreferences::in_memory());
    match session.next_event().await {
        Some(SessionEvent::CandlesUpdated { .. }) => session,
        other => panic!("expected initial candles, got {other:?}"),
    }
}

#[tokio::test]
async fn toggling_rsi_then_macd_then_off_restores_main_pane() {
    let feed = ScriptedFeed::new(store_with(&[("AAPL", "5m", series(30, 300, 187.0))]));
    let mut session = open_aapl(feed).await;
    assert_eq!(session.descriptor().label, "5m");
    assert_eq!(session.candles().len(), 30);

    let before_series = main_series(&session);
    let before_range = session.surface().main().visible_range();
    assert!(before_range.is_some());

    assert!(session.toggle_indicator(IndicatorKind::Rsi));
    assert_eq!(session.surface().layout(), PaneLayout::OneIndicatorPane);
    let rsi_pane = session.surface().pane(PaneKind::Rsi).unwrap();
    assert_eq!(rsi_pane.visible_range(), before_range);
    let rsi_id = session.handles.rsi.unwrap();
    assert_eq!(rsi_pane.series(rsi_id).unwrap().data.len(), 30 - 14);

    assert!(session.toggle_indicator(IndicatorKind::Macd));
    assert_eq!(session.surface().layout(), PaneLayout::TwoIndicatorPanes);
    // 30 candles are too few for MACD(12,26,9); the pane exists with empty series.
    let macd_pane = session.surface().pane(PaneKind::Macd).unwrap();
    assert!(macd_pane.series_ids().iter().all(|id| macd_pane.series(*id).unwrap().data.is_empty()));

    assert!(!session.toggle_indicator(IndicatorKind::Rsi));
    assert!(!session.toggle_indicator(IndicatorKind::Macd));
    assert_eq!(session.surface().layout(), PaneLayout::NoIndicatorPanes);

    assert_eq!(main_series(&session), before_series);
    assert_eq!(session.surface().main().visible_range(), before_range);
}

#[tokio::test]
async fn view_resets_once_per_symbol_and_timeframe() {
    let five = series(200, 300, 100.0);
    let hourly = series(100, 3_600, 100.0);
    let feed = ScriptedFeed::new(store_with(&[("AAPL", "5m", five.clone()), ("AAPL", "60m", hourly.clone())]));
    let mut session = open_aapl(feed).await;

    assert_eq!(
        session.surface().main().visible_range(),
        Some(VisibleRange::new(five[100].time, five[199].time))
    );
    let panned = VisibleRange::new(five[10].time, five[50].time);
    session.pan_zoom(PaneKind::Main, panned);

    assert!(session.select_timeframe(1, TimeframeKind::Minute));
    assert!(matches!(session.next_event().await, Some(SessionEvent::CandlesUpdated { timeframe: "5m", .. })));
    assert_eq!(session.surface().main().visible_range(), Some(panned));

    // 4h merges four hourly candles into one.
    assert!(session.select_timeframe(5, TimeframeKind::Minute));
    assert!(matches!(
        session.next_event().await,
        Some(SessionEvent::CandlesUpdated { timeframe: "4h", candles: 25, .. })
    ));
    assert_eq!(
        session.surface().main().visible_range(),
        Some(VisibleRange::new(hourly[0].time, hourly[96].time))
    );
    assert_eq!(session.surface().main().whitespace().len(), 30);
    assert_eq!(session.surface().main().whitespace()[0], hourly[96].time + 4 * 3_600);
}

#[tokio::test]
async fn slow_superseded_fetch_never_overwrites_newer_selection() {
    let feed = ScriptedFeed::new(store_with(&[
        ("AAPL", "5m", series(50, 300, 100.0)),
        ("AAPL", "60m", series(40, 3_600, 300.0)),
    ]));
    feed.delay("5m", 300);
    let mut session = ChartSession::open(feed, &settings(), "AAPL", TimeframePreferences::in_memory());

    assert!(session.select_timeframe(4, TimeframeKind::Minute));
    assert!(matches!(session.next_event().await, Some(SessionEvent::CandlesUpdated { timeframe: "1h", .. })));

    tokio::time::sleep(Duration::from_millis(400)).await;
    let late = session.drain_events();
    assert!(late.iter().all(|e| !matches!(e, SessionEvent::CandlesUpdated { .. })));
    assert_eq!(session.candles().len(), 40);
    assert_eq!(session.descriptor().label, "1h");
}

#[tokio::test]
async fn response_with_unknown_request_id_is_discarded() {
    let feed = ScriptedFeed::new(store_with(&[("AAPL", "5m", series(30, 300, 100.0))]));
    let mut session = open_aapl(feed).await;
    let before = session.candles().to_vec();

    let request_id = Uuid::new_v4();
    session
        .tx
        .send(FeedMessage::Candles { request_id, result: Ok(Vec::new()) })
        .unwrap();
    assert_eq!(
        session.next_event().await,
        Some(SessionEvent::StaleResponseDiscarded { purpose: FetchPurpose::Candles, request_id })
    );
    assert_eq!(session.candles(), before.as_slice());
}

#[tokio::test]
async fn transport_error_keeps_prior_series_and_marks_stale() {
    let feed = ScriptedFeed::new(store_with(&[("AAPL", "5m", series(30, 300, 100.0))]));
    let failing = feed.failing.clone();
    let mut session = open_aapl(feed).await;
    let before = main_series(&session);

    failing.store(true, Ordering::SeqCst);
    session.select_timeframe(1, TimeframeKind::Minute);
    assert!(matches!(
        session.next_event().await,
        Some(SessionEvent::FetchFailed { purpose: FetchPurpose::Candles, .. })
    ));
    assert!(session.is_stale());
    assert_eq!(main_series(&session), before);

    failing.store(false, Ordering::SeqCst);
    session.select_timeframe(1, TimeframeKind::Minute);
    assert!(matches!(session.next_event().await, Some(SessionEvent::CandlesUpdated { .. })));
    assert!(!session.is_stale());
}

#[tokio::test]
async fn chart_type_change_clears_annotations_and_reshapes_primary() {
    let feed = ScriptedFeed::new(store_with(&[("AAPL", "5m", series(30, 300, 100.0))]));
    let mut session = open_aapl(feed).await;
    let first_primary = session.primary_series().unwrap();

    session.arm_drawing_tool(Some(DrawingTool::HorizontalLine));
    let outcome = session.click(ClickTarget::PriceSurface, ScreenPoint::new(320.0, 270.0));
    assert!(matches!(outcome, ClickOutcome::Committed(Annotation::HorizontalLine { .. })));
    assert_eq!(session.drawing().annotations().len(), 1);

    session.set_chart_type(ChartType::HeikinAshi);
    assert!(session.drawing().annotations().is_empty());
    assert_eq!(session.surface().main().price_lines().count(), 0);
    let primary = session.primary_series().unwrap();
    assert_ne!(primary, first_primary);
    assert_eq!(session.drawn_candles()[0].open, (session.candles()[0].open + session.candles()[0].close) / 2.0);

    session.set_chart_type(ChartType::Line);
    let line = session.surface().main().series(session.primary_series().unwrap()).unwrap();
    assert!(matches!(&line.data, SeriesData::Line(points) if points.len() == 30));
}

#[tokio::test]
async fn compare_overlay_ends_on_primary_close() {
    let mut store = store_with(&[
        ("AAPL", "5m", series(30, 300, 187.0)),
        ("MSFT", "5m", series(30, 300, 410.0)),
    ]);
    store.set_name("AAPL", "Apple Inc.");
    store.set_name("MSFT", "Microsoft Corporation");
    let mut session = open_aapl(ScriptedFeed::new(store)).await;

    session.start_compare("MSFT");
    assert_eq!(
        session.next_event().await,
        Some(SessionEvent::CompareUpdated { symbol: "MSFT".to_string(), drawn: true })
    );
    let id = session.compare().series_id().unwrap();
    let SeriesData::Line(points) = &session.surface().main().series(id).unwrap().data else {
        panic!("compare overlay must be a line");
    };
    assert_eq!(points.last().unwrap().value, session.candles().last().unwrap().close);

    session.stop_compare();
    assert!(session.surface().main().series(id).is_none());
    assert!(!session.compare().is_active());

    let found = session.search_instruments("microsoft").await.unwrap();
    assert_eq!(found[0].symbol, "MSFT");
}

fn compare_points(session: &ChartSession<ScriptedFeed>) -> Option<Vec<shared::models::TimePoint>> {
    let id = session.compare().series_id()?;
    match &session.surface().main().series(id)?.data {
        SeriesData::Line(points) => Some(points.clone()),
        _ => None,
    }
}

#[tokio::test]
async fn compare_follows_timeframe_switch_to_new_interval() {
    let mut session = open_aapl(ScriptedFeed::new(store_with(&[
        ("AAPL", "5m", series(30, 300, 187.0)),
        ("AAPL", "60m", series(40, 3_600, 190.0)),
        ("MSFT", "5m", series(30, 300, 410.0)),
        ("MSFT", "60m", series(40, 3_600, 405.0)),
    ])))
    .await;
    session.start_compare("MSFT");
    assert!(matches!(session.next_event().await, Some(SessionEvent::CompareUpdated { drawn: true, .. })));

    assert!(session.select_timeframe(4, TimeframeKind::Minute));
    assert!(compare_points(&session).is_none());
    assert!(session.compare().candles().is_empty());
    assert!(session.compare().is_active());

    let (mut primary_done, mut compare_done) = (false, false);
    while !(primary_done && compare_done) {
        match session.next_event().await {
            Some(SessionEvent::CandlesUpdated { timeframe, .. }) => {
                assert_eq!(timeframe, "1h");
                primary_done = true;
            }
            Some(SessionEvent::CompareUpdated { .. }) => compare_done = true,
            other => panic!("unexpected {other:?}"),
        }
        // Whatever is on screen at each step is spaced like the hourly primary.
        if let Some(points) = compare_points(&session) {
            assert_eq!(points[1].time - points[0].time, 3_600);
        }
    }

    let points = compare_points(&session).unwrap();
    assert_eq!(points.len(), 40);
    assert_eq!(points.last().unwrap().value, session.candles().last().unwrap().close);
}

#[tokio::test]
async fn failed_compare_refetch_leaves_no_overlay_from_old_interval() {
    let mut session = open_aapl(ScriptedFeed::new(store_with(&[
        ("AAPL", "5m", series(30, 300, 187.0)),
        ("AAPL", "60m", series(40, 3_600, 190.0)),
        ("MSFT", "5m", series(30, 300, 410.0)),
    ])))
    .await;
    session.start_compare("MSFT");
    assert!(matches!(session.next_event().await, Some(SessionEvent::CompareUpdated { drawn: true, .. })));

    assert!(session.select_timeframe(4, TimeframeKind::Minute));
    let (mut primary_done, mut compare_failed) = (false, false);
    while !(primary_done && compare_failed) {
        match session.next_event().await {
            Some(SessionEvent::CandlesUpdated { .. }) => primary_done = true,
            Some(SessionEvent::FetchFailed { purpose: FetchPurpose::Compare, .. }) => compare_failed = true,
            other => panic!("unexpected {other:?}"),
        }
    }
    assert!(compare_points(&session).is_none());
    assert_eq!(session.compare().symbol(), Some("MSFT"));
}

struct SolidGrabber;

impl FrameGrabber for SolidGrabber {
    fn grab(&self) -> Result<Raster, EngineError> {
        Ok(Raster::filled(400, 200, [255, 255, 255, 255]))
    }
}

#[tokio::test]
async fn snapshot_ignores_taps_and_downloads_without_clipboard() {
    let dir = tempdir().unwrap();
    let mut config = settings();
    config.snapshot.downloads_dir = dir.path().to_path_buf();
    let feed = ScriptedFeed::new(store_with(&[("AAPL", "5m", series(30, 300, 100.0))]));
    let mut session = ChartSession::open(feed, &config, "AAPL", TimeframePreferences::in_memory());
    session.next_event().await;
    session.set_viewport(Viewport { width: 200.0, height: 100.0 });

    session.start_snapshot();
    session.pointer_move(ScreenPoint::new(10.0, 10.0));
    session.pointer_move(ScreenPoint::new(15.0, 15.0));
    let tap = session.snapshot_selection().unwrap();
    assert_eq!(session.finish_snapshot(tap, &SolidGrabber).unwrap(), None);

    session.start_snapshot();
    let rect = SelectionRect { x: 20.0, y: 20.0, width: 50.0, height: 30.0 };
    let outcome = session.finish_snapshot(rect, &SolidGrabber).unwrap();
    let Some(SnapshotOutcome::Downloaded(path)) = outcome else {
        panic!("expected a download, got {outcome:?}");
    };
    assert!(path.starts_with(dir.path()));
    assert!(path.file_name().unwrap().to_string_lossy().starts_with("AAPL_5m_"));
    let bytes = std::fs::read(path).unwrap();
    assert!(bytes.starts_with(b"P6\n100 124\n255\n"));
}

#[tokio::test]
async fn poll_tick_from_current_timer_refetches() {
    let feed = ScriptedFeed::new(store_with(&[("AAPL", "5m", series(30, 300, 100.0))]));
    let calls = feed.candle_calls.clone();
    let mut session = open_aapl(feed).await;
    assert!(session.is_polling());

    session.start_poll(20);
    loop {
        match session.next_event().await {
            Some(SessionEvent::CandlesUpdated { .. }) => break,
            Some(SessionEvent::PollTick { timeframe }) => assert_eq!(timeframe, "5m"),
            other => panic!("unexpected {other:?}"),
        }
    }
    assert!(calls.load(Ordering::SeqCst) >= 2);

    session.stop_poll();
    if let Some(pending) = session.candles_request.take() {
        pending.abort();
    }
    session.drain_events();

    // A tick from a replaced timer triggers nothing.
    session
        .tx
        .send(FeedMessage::PollTick { timer_id: Uuid::new_v4() })
        .unwrap();
    assert!(matches!(session.next_event().await, Some(SessionEvent::PollTick { .. })));
    assert!(session.candles_request.is_none());
}

#[tokio::test]
async fn range_timeframes_do_not_poll() {
    let feed = ScriptedFeed::new(store_with(&[("AAPL", "5m", series(30, 300, 100.0))]));
    let mut session = open_aapl(feed).await;
    assert!(session.select_timeframe(0, TimeframeKind::Range));
    assert!(!session.is_polling());
    assert!(!session.select_timeframe(99, TimeframeKind::Range));
    assert_eq!(session.descriptor().label, "1D");
}

#[tokio::test]
async fn remembered_timeframe_is_used_on_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("prefs.json");
    let feed = ScriptedFeed::new(store_with(&[("AAPL", "5m", series(30, 300, 100.0))]));

    let mut first = ChartSession::open(feed.clone(), &settings(), "AAPL", TimeframePreferences::load(&path));
    assert!(first.select_timeframe(2, TimeframeKind::Range));
    first.close();

    let second = ChartSession::open(feed, &settings(), "AAPL", TimeframePreferences::load(&path));
    assert_eq!(second.selection(), TimeframeSelection::Range(2));
    assert_eq!(second.descriptor().label, "1M");
}

#[tokio::test]
async fn closed_session_ignores_everything() {
    let feed = ScriptedFeed::new(store_with(&[("AAPL", "5m", series(30, 300, 100.0))]));
    let mut session = open_aapl(feed).await;
    session.toggle_indicator(IndicatorKind::Rsi);
    session.arm_drawing_tool(Some(DrawingTool::Trendline));
    session.click(ClickTarget::PriceSurface, ScreenPoint::new(100.0, 100.0));
    assert!(session.drawing().has_preview());

    session.close();
    assert!(session.is_closed());
    assert!(!session.is_polling());
    assert!(!session.drawing().has_preview());
    assert_eq!(session.surface().layout(), PaneLayout::NoIndicatorPanes);
    assert_eq!(session.surface().main().series_count(), 0);

    assert!(!session.select_timeframe(0, TimeframeKind::Minute));
    assert!(!session.toggle_indicator(IndicatorKind::Macd));
    session.start_compare("MSFT");
    assert!(!session.compare().is_active());
    assert_eq!(session.click(ClickTarget::PriceSurface, ScreenPoint::new(10.0, 10.0)), ClickOutcome::Ignored);
    assert_eq!(session.next_event().await, None);
    assert!(session.drain_events().is_empty());
}
