// Click-driven annotation tools
// A horizontal line commits on one click. Trendline, ray and Fibonacci
// retracement take two clicks: the first caches an anchor and attaches a
// live preview that follows the pointer, the second commits the annotation.
// The in-progress anchor and its preview are one `DrawSession`, and every
// exit path (tool switch, cancel, clear, view close) goes through `cancel`.

use shared::models::{Annotation, Candle, ChartPoint, TimePoint};

use super::surface::{
    ChartSurfaceController, Pane, PaneKind, PriceLineId, ScreenPoint, SeriesData, SeriesId, SeriesStyle,
};

/// Retracement levels and their fixed colours.
pub const FIB_LEVELS: [(f64, &str); 7] = [
    (0.0, "#787b86"),
    (0.236, "#f23645"),
    (0.382, "#ff9800"),
    (0.5, "#4caf50"),
    (0.618, "#089981"),
    (0.786, "#2962ff"),
    (1.0, "#787b86"),
];

pub const HORIZONTAL_LINE_COLOR: &str = "#ff9800";
pub const TRENDLINE_COLOR: &str = "#2962ff";
pub const PREVIEW_COLOR: &str = "#2962ff80";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DrawingTool {
    HorizontalLine,
    Trendline,
    Ray,
    Fib,
}

impl DrawingTool {
    pub fn name(&self) -> &'static str {
        match self {
            DrawingTool::HorizontalLine => "hline",
            DrawingTool::Trendline => "trendline",
            DrawingTool::Ray => "ray",
            DrawingTool::Fib => "fib",
        }
    }

    pub fn is_two_click(&self) -> bool {
        !matches!(self, DrawingTool::HorizontalLine)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ToolState {
    Idle,
    ArmedSingleClick,
    ArmedAwaitingSecondPoint {
        tool: DrawingTool,
        first_point: Option<ChartPoint>,
    },
}

/// Where a click landed. Only clicks on the price surface place anchors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickTarget {
    PriceSurface,
    ToolSelector,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClickOutcome {
    Ignored,
    AnchorPlaced(ChartPoint),
    Committed(Annotation),
    /// The second point could not form a valid annotation; the tool went back to idle.
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementHandle {
    PriceLine(PriceLineId),
    Series(SeriesId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommittedAnnotation {
    pub annotation: Annotation,
    pub elements: Vec<ElementHandle>,
}

#[derive(Debug)]
struct DrawSession {
    tool: DrawingTool,
    anchor: ChartPoint,
    preview_line: SeriesId,
    preview_markers: SeriesId,
}

#[derive(Debug, Default)]
pub struct DrawingToolController {
    armed: Option<DrawingTool>,
    session: Option<DrawSession>,
    annotations: Vec<CommittedAnnotation>,
}

/// Converts a click on the main pane into chart coordinates. Clicks between bars
/// take the timestamp of the nearest data index so every anchor has a real time.
pub fn screen_to_chart(pane: &Pane, candles: &[Candle], point: ScreenPoint) -> Option<ChartPoint> {
    let price = pane.coordinate_to_price(point.y)?;
    let time = match pane.coordinate_to_time(point.x) {
        Some(time) => time,
        None => {
            let last = candles.len().checked_sub(1)?;
            let logical = pane.coordinate_to_logical(point.x)?;
            candles[(logical.round().max(0.0) as usize).min(last)].time
        }
    };
    Some(ChartPoint::new(time, price))
}

/// Anchor pair ordered left to right.
fn ordered(a: ChartPoint, b: ChartPoint) -> (ChartPoint, ChartPoint) {
    if a.time <= b.time {
        (a, b)
    } else {
        (b, a)
    }
}

fn segment(a: ChartPoint, b: ChartPoint) -> Vec<TimePoint> {
    let (left, right) = ordered(a, b);
    if left.time == right.time {
        return vec![TimePoint::new(right.time, right.price)];
    }
    vec![TimePoint::new(left.time, left.price), TimePoint::new(right.time, right.price)]
}

/// Ray points: both anchors, then one extrapolated point at every later candle timestamp.
/// Returns `None` when the anchors share a timestamp.
pub fn ray_points(p1: ChartPoint, p2: ChartPoint, candles: &[Candle]) -> Option<Vec<TimePoint>> {
    let (left, right) = ordered(p1, p2);
    if left.time == right.time {
        return None;
    }
    let slope = (right.price - left.price) / (right.time - left.time) as f64;
    let mut points = vec![TimePoint::new(left.time, left.price), TimePoint::new(right.time, right.price)];
    points.extend(
        candles
            .iter()
            .filter(|c| c.time > right.time)
            .map(|c| TimePoint::new(c.time, right.price + slope * (c.time - right.time) as f64)),
    );
    Some(points)
}

/// Level prices between the anchors' high and low, 0% at the high.
pub fn fib_level_prices(p1: ChartPoint, p2: ChartPoint) -> Vec<(f64, f64)> {
    let high = p1.price.max(p2.price);
    let low = p1.price.min(p2.price);
    FIB_LEVELS
        .iter()
        .map(|(level, _)| (*level, high - (high - low) * level))
        .collect()
}

impl DrawingToolController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ToolState {
        match self.armed {
            None => ToolState::Idle,
            Some(DrawingTool::HorizontalLine) => ToolState::ArmedSingleClick,
            Some(tool) => ToolState::ArmedAwaitingSecondPoint {
                tool,
                first_point: self.session.as_ref().map(|s| s.anchor),
            },
        }
    }

    pub fn armed_tool(&self) -> Option<DrawingTool> {
        self.armed
    }

    pub fn has_preview(&self) -> bool {
        self.session.is_some()
    }

    pub fn annotations(&self) -> Vec<Annotation> {
        self.annotations.iter().map(|a| a.annotation).collect()
    }

    pub fn committed(&self) -> &[CommittedAnnotation] {
        &self.annotations
    }

    /// Arms `tool`. Re-selecting the armed tool, or passing `None`, returns to idle.
    pub fn arm(&mut self, tool: Option<DrawingTool>, surface: &mut ChartSurfaceController) {
        let toggled_off = tool.is_some() && tool == self.armed;
        self.cancel(surface);
        if !toggled_off {
            self.armed = tool;
        }
        tracing::debug!(tool = tool.map(|t| t.name()), armed = self.armed.is_some(), "Drawing tool selection");
    }

    /// Tears down any in-progress drawing and disarms the tool.
    pub fn cancel(&mut self, surface: &mut ChartSurfaceController) {
        if let Some(session) = self.session.take() {
            let main = surface.main_mut();
            main.remove_series(session.preview_line);
            main.remove_series(session.preview_markers);
            tracing::debug!(tool = session.tool.name(), "In-progress drawing cancelled");
        }
        self.armed = None;
    }

    /// Cancels any tool in progress, then removes every committed annotation from the surface.
    pub fn clear(&mut self, surface: &mut ChartSurfaceController) {
        self.cancel(surface);
        let main = surface.main_mut();
        for committed in self.annotations.drain(..) {
            for element in committed.elements {
                match element {
                    ElementHandle::PriceLine(id) => {
                        main.remove_price_line(id);
                    }
                    ElementHandle::Series(id) => {
                        main.remove_series(id);
                    }
                }
            }
        }
    }

    pub fn click(
        &mut self,
        target: ClickTarget,
        point: ScreenPoint,
        surface: &mut ChartSurfaceController,
        candles: &[Candle],
    ) -> ClickOutcome {
        if target != ClickTarget::PriceSurface || self.armed.is_none() {
            return ClickOutcome::Ignored;
        }
        match screen_to_chart(surface.main(), candles, point) {
            Some(chart_point) => self.click_point(chart_point, surface, candles),
            None => ClickOutcome::Ignored,
        }
    }

    /// A price-surface click already converted to chart coordinates.
    pub fn click_point(
        &mut self,
        point: ChartPoint,
        surface: &mut ChartSurfaceController,
        candles: &[Candle],
    ) -> ClickOutcome {
        let Some(tool) = self.armed else {
            return ClickOutcome::Ignored;
        };

        if tool == DrawingTool::HorizontalLine {
            let annotation = Annotation::HorizontalLine { price: point.price };
            let elements = surface
                .create_price_line(PaneKind::Main, point.price, HORIZONTAL_LINE_COLOR, "")
                .map(ElementHandle::PriceLine)
                .into_iter()
                .collect();
            self.commit(annotation, elements);
            self.armed = None;
            return ClickOutcome::Committed(annotation);
        }

        let Some(session) = self.session.as_ref() else {
            return self.place_anchor(tool, point, surface);
        };
        let anchor = session.anchor;
        let outcome = self.finalize(tool, anchor, point, surface, candles);
        self.cancel(surface);
        outcome
    }

    fn place_anchor(&mut self, tool: DrawingTool, anchor: ChartPoint, surface: &mut ChartSurfaceController) -> ClickOutcome {
        let start = vec![TimePoint::new(anchor.time, anchor.price)];
        let line = surface.add_series(PaneKind::Main, SeriesStyle::Line, PREVIEW_COLOR, SeriesData::Line(start.clone()));
        let markers = surface.add_series(PaneKind::Main, SeriesStyle::Markers, PREVIEW_COLOR, SeriesData::Line(start));
        let (Some(preview_line), Some(preview_markers)) = (line, markers) else {
            return ClickOutcome::Ignored;
        };
        self.session = Some(DrawSession {
            tool,
            anchor,
            preview_line,
            preview_markers,
        });
        tracing::debug!(tool = tool.name(), time = anchor.time, price = anchor.price, "First anchor placed");
        ClickOutcome::AnchorPlaced(anchor)
    }

    fn finalize(
        &mut self,
        tool: DrawingTool,
        p1: ChartPoint,
        p2: ChartPoint,
        surface: &mut ChartSurfaceController,
        candles: &[Candle],
    ) -> ClickOutcome {
        let (annotation, elements) = match tool {
            DrawingTool::Fib => {
                let elements = fib_level_prices(p1, p2)
                    .into_iter()
                    .zip(FIB_LEVELS.iter())
                    .filter_map(|((level, price), (_, color))| {
                        let title = format!("{:.1}%", level * 100.0);
                        surface.create_price_line(PaneKind::Main, price, color, &title)
                    })
                    .map(ElementHandle::PriceLine)
                    .collect();
                (Annotation::FibRetracement { p1, p2 }, elements)
            }
            DrawingTool::Trendline => {
                if p1.time == p2.time {
                    tracing::debug!(time = p1.time, "Trendline rejected: anchors share a timestamp");
                    return ClickOutcome::Rejected;
                }
                let data = SeriesData::Line(segment(p1, p2));
                let elements = surface
                    .add_series(PaneKind::Main, SeriesStyle::Line, TRENDLINE_COLOR, data)
                    .map(ElementHandle::Series)
                    .into_iter()
                    .collect();
                (Annotation::Trendline { p1, p2 }, elements)
            }
            DrawingTool::Ray => {
                let Some(points) = ray_points(p1, p2, candles) else {
                    tracing::debug!(time = p1.time, "Ray rejected: anchors share a timestamp");
                    return ClickOutcome::Rejected;
                };
                let elements = surface
                    .add_series(PaneKind::Main, SeriesStyle::Line, TRENDLINE_COLOR, SeriesData::Line(points))
                    .map(ElementHandle::Series)
                    .into_iter()
                    .collect();
                (Annotation::Ray { p1, p2 }, elements)
            }
            DrawingTool::HorizontalLine => return ClickOutcome::Ignored,
        };
        self.commit(annotation, elements);
        ClickOutcome::Committed(annotation)
    }

    fn commit(&mut self, annotation: Annotation, elements: Vec<ElementHandle>) {
        tracing::info!(annotation = ?annotation, elements = elements.len(), "Annotation committed");
        self.annotations.push(CommittedAnnotation { annotation, elements });
    }

    pub fn pointer_move(
        &mut self,
        point: ScreenPoint,
        surface: &mut ChartSurfaceController,
        candles: &[Candle],
    ) {
        if self.session.is_none() {
            return;
        }
        if let Some(chart_point) = screen_to_chart(surface.main(), candles, point) {
            self.pointer_move_point(chart_point, surface);
        }
    }

    /// Moves the live preview so it runs from the cached anchor to `point`.
    pub fn pointer_move_point(&mut self, point: ChartPoint, surface: &mut ChartSurfaceController) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let points = segment(session.anchor, point);
        let main = surface.main_mut();
        main.set_series_data(session.preview_line, SeriesData::Line(points.clone()));
        main.set_series_data(session.preview_markers, SeriesData::Line(points));
    }
}
