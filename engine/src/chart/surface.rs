// Rendering panes and their time-axis synchronization
// The controller owns up to three headless panes (main, RSI, MACD). Each pane
// keeps its own series, price lines and visible time range; a host renderer
// draws them. When a user pans or zooms any pane, the new range is pushed to
// every other active pane. Applying a range to a pane raises that pane's own
// "range changed" notification, so propagation is guarded by a single
// `syncing` flag that short-circuits the nested notifications.

use shared::models::{Candle, HistogramPoint, TimePoint, VisibleRange};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PaneKind {
    Main,
    Rsi,
    Macd,
}

/// Pane set state, driven by the RSI/MACD toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaneLayout {
    NoIndicatorPanes,
    OneIndicatorPane,
    TwoIndicatorPanes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SeriesId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PriceLineId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesStyle {
    Candlestick,
    Bar,
    Line,
    Area,
    Histogram,
    /// Point markers without a connecting line.
    Markers,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SeriesData {
    Ohlc(Vec<Candle>),
    Line(Vec<TimePoint>),
    Histogram(Vec<HistogramPoint>),
}

impl SeriesData {
    pub fn len(&self) -> usize {
        match self {
            SeriesData::Ohlc(v) => v.len(),
            SeriesData::Line(v) => v.len(),
            SeriesData::Histogram(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn times(&self) -> Vec<i64> {
        match self {
            SeriesData::Ohlc(v) => v.iter().map(|c| c.time).collect(),
            SeriesData::Line(v) => v.iter().map(|p| p.time).collect(),
            SeriesData::Histogram(v) => v.iter().map(|p| p.time).collect(),
        }
    }

    /// Lowest and highest value with a timestamp inside `[from, to]`.
    fn extent(&self, from: i64, to: i64) -> Option<(f64, f64)> {
        let within = |t: i64| t >= from && t <= to;
        let values: Vec<(f64, f64)> = match self {
            SeriesData::Ohlc(v) => v.iter().filter(|c| within(c.time)).map(|c| (c.low, c.high)).collect(),
            SeriesData::Line(v) => v.iter().filter(|p| within(p.time)).map(|p| (p.value, p.value)).collect(),
            SeriesData::Histogram(v) => v.iter().filter(|p| within(p.time)).map(|p| (p.value, p.value)).collect(),
        };
        values
            .into_iter()
            .reduce(|(lo, hi), (l, h)| (lo.min(l), hi.max(h)))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub style: SeriesStyle,
    pub color: String,
    pub data: SeriesData,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PriceLine {
    pub price: f64,
    pub color: String,
    pub title: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceScale {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

impl ScreenPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Logical positions closer than this to a bar centre count as landing on the bar.
const BAR_HIT_TOLERANCE: f64 = 0.05;

#[derive(Debug)]
pub struct Pane {
    kind: PaneKind,
    generation: u64,
    viewport: Viewport,
    series: BTreeMap<SeriesId, Series>,
    price_lines: BTreeMap<PriceLineId, PriceLine>,
    /// Series whose timestamps define the bar positions of the time axis.
    axis_series: Option<SeriesId>,
    whitespace: Vec<i64>,
    visible_range: Option<VisibleRange>,
}

impl Pane {
    fn new(kind: PaneKind, generation: u64, viewport: Viewport) -> Self {
        Pane {
            kind,
            generation,
            viewport,
            series: BTreeMap::new(),
            price_lines: BTreeMap::new(),
            axis_series: None,
            whitespace: Vec::new(),
            visible_range: None,
        }
    }

    pub fn kind(&self) -> PaneKind {
        self.kind
    }

    /// Bumped every time a pane of this kind is recreated.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn series(&self, id: SeriesId) -> Option<&Series> {
        self.series.get(&id)
    }

    pub fn series_ids(&self) -> Vec<SeriesId> {
        self.series.keys().copied().collect()
    }

    pub fn series_count(&self) -> usize {
        self.series.len()
    }

    pub fn price_line(&self, id: PriceLineId) -> Option<&PriceLine> {
        self.price_lines.get(&id)
    }

    pub fn price_lines(&self) -> impl Iterator<Item = (&PriceLineId, &PriceLine)> {
        self.price_lines.iter()
    }

    pub fn visible_range(&self) -> Option<VisibleRange> {
        self.visible_range
    }

    pub fn whitespace(&self) -> &[i64] {
        &self.whitespace
    }

    pub fn set_whitespace(&mut self, times: Vec<i64>) {
        self.whitespace = times;
    }

    pub fn set_axis_series(&mut self, id: SeriesId) {
        self.axis_series = Some(id);
    }

    pub fn set_series_data(&mut self, id: SeriesId, data: SeriesData) -> bool {
        match self.series.get_mut(&id) {
            Some(series) => {
                series.data = data;
                true
            }
            None => false,
        }
    }

    pub fn remove_series(&mut self, id: SeriesId) -> bool {
        if self.axis_series == Some(id) {
            self.axis_series = None;
        }
        self.series.remove(&id).is_some()
    }

    pub fn remove_price_line(&mut self, id: PriceLineId) -> bool {
        self.price_lines.remove(&id).is_some()
    }

    /// Sets the range and reports whether it differed, which is when the surface raises a change.
    fn apply_visible_range(&mut self, range: VisibleRange) -> bool {
        if self.visible_range == Some(range) {
            return false;
        }
        self.visible_range = Some(range);
        true
    }

    /// Sorted bar timestamps of the axis series followed by whitespace bars.
    pub fn axis_times(&self) -> Vec<i64> {
        let mut times = self
            .axis_series
            .and_then(|id| self.series.get(&id))
            .map(|s| s.data.times())
            .unwrap_or_default();
        let last = times.last().copied();
        times.extend(self.whitespace.iter().filter(|&&t| last.map_or(true, |l| t > l)));
        times
    }

    fn visible_span(&self, axis: &[i64]) -> Option<(usize, usize)> {
        if axis.is_empty() {
            return None;
        }
        let Some(range) = self.visible_range else {
            return Some((0, axis.len() - 1));
        };
        let from = axis.partition_point(|&t| t < range.from).min(axis.len() - 1);
        let to = axis.partition_point(|&t| t <= range.to).saturating_sub(1).max(from);
        Some((from, to))
    }

    fn bar_spacing(&self, span: (usize, usize)) -> f64 {
        self.viewport.width / (span.1 - span.0 + 1) as f64
    }

    /// Fractional bar index under an x coordinate.
    pub fn coordinate_to_logical(&self, x: f64) -> Option<f64> {
        let axis = self.axis_times();
        let span = self.visible_span(&axis)?;
        Some(span.0 as f64 + x / self.bar_spacing(span) - 0.5)
    }

    /// Timestamp of the bar under `x`, only when `x` lands on a bar.
    pub fn coordinate_to_time(&self, x: f64) -> Option<i64> {
        let axis = self.axis_times();
        let logical = self.coordinate_to_logical(x)?;
        let nearest = logical.round();
        if (logical - nearest).abs() > BAR_HIT_TOLERANCE || nearest < 0.0 {
            return None;
        }
        axis.get(nearest as usize).copied()
    }

    pub fn time_to_coordinate(&self, time: i64) -> Option<f64> {
        let axis = self.axis_times();
        let index = axis.binary_search(&time).ok()?;
        let span = self.visible_span(&axis)?;
        Some((index as f64 - span.0 as f64 + 0.5) * self.bar_spacing(span))
    }

    /// Extent of every series' values inside the visible range.
    pub fn price_scale(&self) -> Option<PriceScale> {
        let axis = self.axis_times();
        let (from, to) = match self.visible_range {
            Some(range) => (range.from, range.to),
            None => (*axis.first()?, *axis.last()?),
        };
        let (min, max) = self
            .series
            .values()
            .filter_map(|s| s.data.extent(from, to))
            .reduce(|(lo, hi), (l, h)| (lo.min(l), hi.max(h)))?;
        if min == max {
            return Some(PriceScale { min: min - 1.0, max: max + 1.0 });
        }
        Some(PriceScale { min, max })
    }

    pub fn coordinate_to_price(&self, y: f64) -> Option<f64> {
        let scale = self.price_scale()?;
        Some(scale.max - (y / self.viewport.height) * (scale.max - scale.min))
    }

    pub fn price_to_coordinate(&self, price: f64) -> Option<f64> {
        let scale = self.price_scale()?;
        Some((scale.max - price) / (scale.max - scale.min) * self.viewport.height)
    }
}

#[derive(Debug)]
pub struct ChartSurfaceController {
    main: Pane,
    rsi: Option<Pane>,
    macd: Option<Pane>,
    syncing: bool,
    sync_passes: u64,
    suppressed_notifications: u64,
    next_id: u64,
    next_generation: u64,
}

impl ChartSurfaceController {
    pub fn new(viewport: Viewport) -> Self {
        let main = Pane::new(PaneKind::Main, 0, viewport);
        ChartSurfaceController {
            main,
            rsi: None,
            macd: None,
            syncing: false,
            sync_passes: 0,
            suppressed_notifications: 0,
            next_id: 1,
            next_generation: 1,
        }
    }

    pub fn main(&self) -> &Pane {
        &self.main
    }

    pub fn main_mut(&mut self) -> &mut Pane {
        &mut self.main
    }

    pub fn pane(&self, kind: PaneKind) -> Option<&Pane> {
        match kind {
            PaneKind::Main => Some(&self.main),
            PaneKind::Rsi => self.rsi.as_ref(),
            PaneKind::Macd => self.macd.as_ref(),
        }
    }

    pub fn pane_mut(&mut self, kind: PaneKind) -> Option<&mut Pane> {
        match kind {
            PaneKind::Main => Some(&mut self.main),
            PaneKind::Rsi => self.rsi.as_mut(),
            PaneKind::Macd => self.macd.as_mut(),
        }
    }

    pub fn active_panes(&self) -> Vec<PaneKind> {
        [PaneKind::Main, PaneKind::Rsi, PaneKind::Macd]
            .into_iter()
            .filter(|k| self.pane(*k).is_some())
            .collect()
    }

    pub fn layout(&self) -> PaneLayout {
        match (self.rsi.is_some(), self.macd.is_some()) {
            (false, false) => PaneLayout::NoIndicatorPanes,
            (true, true) => PaneLayout::TwoIndicatorPanes,
            _ => PaneLayout::OneIndicatorPane,
        }
    }

    /// Resizes every pane. New indicator panes inherit the main pane's size.
    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.main.viewport = viewport;
        for pane in [self.rsi.as_mut(), self.macd.as_mut()].into_iter().flatten() {
            pane.viewport = viewport;
        }
    }

    /// Completed propagation passes; one per user range change.
    pub fn sync_passes(&self) -> u64 {
        self.sync_passes
    }

    /// Notifications dropped because a propagation pass was already running.
    pub fn suppressed_notifications(&self) -> u64 {
        self.suppressed_notifications
    }

    fn allocate(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Builds a fresh indicator pane, replacing any existing one of that kind.
    /// The main pane's current range seeds the new pane's range.
    pub fn create_indicator_pane(&mut self, kind: PaneKind) -> Option<&mut Pane> {
        if kind == PaneKind::Main {
            return None;
        }
        self.destroy_indicator_pane(kind);

        let generation = self.next_generation;
        self.next_generation += 1;
        let mut pane = Pane::new(kind, generation, self.main.viewport);
        pane.visible_range = self.main.visible_range;
        tracing::info!(pane = ?kind, generation, "Indicator pane created");

        let slot = match kind {
            PaneKind::Rsi => &mut self.rsi,
            PaneKind::Macd => &mut self.macd,
            PaneKind::Main => return None,
        };
        *slot = Some(pane);
        slot.as_mut()
    }

    /// Drops the pane with its series. It no longer takes part in range sync.
    pub fn destroy_indicator_pane(&mut self, kind: PaneKind) -> bool {
        let slot = match kind {
            PaneKind::Rsi => &mut self.rsi,
            PaneKind::Macd => &mut self.macd,
            PaneKind::Main => return false,
        };
        match slot.take() {
            Some(pane) => {
                tracing::info!(pane = ?kind, generation = pane.generation, "Indicator pane torn down");
                true
            }
            None => false,
        }
    }

    pub fn add_series(&mut self, kind: PaneKind, style: SeriesStyle, color: &str, data: SeriesData) -> Option<SeriesId> {
        let id = SeriesId(self.allocate());
        let pane = self.pane_mut(kind)?;
        pane.series.insert(
            id,
            Series {
                style,
                color: color.to_string(),
                data,
            },
        );
        if pane.axis_series.is_none() {
            pane.axis_series = Some(id);
        }
        Some(id)
    }

    pub fn create_price_line(&mut self, kind: PaneKind, price: f64, color: &str, title: &str) -> Option<PriceLineId> {
        let id = PriceLineId(self.allocate());
        let pane = self.pane_mut(kind)?;
        pane.price_lines.insert(
            id,
            PriceLine {
                price,
                color: color.to_string(),
                title: title.to_string(),
            },
        );
        Some(id)
    }

    /// Applies a range without notifying anyone: view resets before panes are linked.
    pub fn set_range_silently(&mut self, kind: PaneKind, range: VisibleRange) {
        if let Some(pane) = self.pane_mut(kind) {
            pane.visible_range = Some(range);
        }
    }

    /// A user pan/zoom on `kind`. The pane takes the range and raises its change notification.
    pub fn pan_zoom(&mut self, kind: PaneKind, range: VisibleRange) {
        let changed = match self.pane_mut(kind) {
            Some(pane) => pane.apply_visible_range(range),
            None => return,
        };
        if changed {
            self.on_visible_range_changed(kind, range);
        }
    }

    fn on_visible_range_changed(&mut self, source: PaneKind, range: VisibleRange) {
        if self.syncing {
            self.suppressed_notifications += 1;
            return;
        }
        self.syncing = true;
        self.sync_passes += 1;
        for target in self.active_panes() {
            if target == source {
                continue;
            }
            let changed = self
                .pane_mut(target)
                .is_some_and(|pane| pane.apply_visible_range(range));
            if changed {
                // The target surface reports its own change; the guard swallows it.
                self.on_visible_range_changed(target, range);
            }
        }
        self.syncing = false;
        tracing::debug!(source = ?source, from = range.from, to = range.to, "Visible range synchronized");
    }
}
