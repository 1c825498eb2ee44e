// Static registry of selectable timeframes

use serde::{Deserialize, Serialize};
use shared::models::TimeframeKind;

use crate::config::AssetClass;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeframeDescriptor {
    pub label: &'static str,
    pub source_range: &'static str,
    pub source_interval: &'static str,
    /// Zero disables polling.
    pub poll_interval_ms: u64,
    /// `None` fits the whole series on the first view.
    pub visible_bar_count: Option<usize>,
    pub aggregation_factor: Option<usize>,
}

/// How far back a source range reaches from the latest candle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeWindow {
    Seconds(i64),
    YearToDate,
    Max,
}

const DAY: i64 = 86_400;

impl TimeframeDescriptor {
    const fn minute(
        label: &'static str,
        source_range: &'static str,
        source_interval: &'static str,
        poll_interval_ms: u64,
        visible_bar_count: usize,
        aggregation_factor: Option<usize>,
    ) -> Self {
        TimeframeDescriptor {
            label,
            source_range,
            source_interval,
            poll_interval_ms,
            visible_bar_count: Some(visible_bar_count),
            aggregation_factor,
        }
    }

    const fn range(label: &'static str, source_range: &'static str, source_interval: &'static str) -> Self {
        TimeframeDescriptor {
            label,
            source_range,
            source_interval,
            poll_interval_ms: 0,
            visible_bar_count: None,
            aggregation_factor: None,
        }
    }

    pub fn polls(&self) -> bool {
        self.poll_interval_ms > 0
    }

    pub fn factor(&self) -> usize {
        self.aggregation_factor.unwrap_or(1)
    }

    pub fn interval_seconds(&self) -> Option<i64> {
        parse_interval_seconds(self.source_interval)
    }

    /// Spacing of drawn candles once aggregation is applied.
    pub fn effective_interval_seconds(&self) -> Option<i64> {
        self.interval_seconds().map(|s| s * self.factor() as i64)
    }

    pub fn range_window(&self) -> Option<RangeWindow> {
        parse_range_window(self.source_range)
    }
}

pub fn parse_interval_seconds(interval: &str) -> Option<i64> {
    let seconds = match interval {
        "1m" => 60,
        "2m" => 120,
        "5m" => 300,
        "15m" => 900,
        "30m" => 1_800,
        "60m" | "1h" => 3_600,
        "90m" => 5_400,
        "1d" => DAY,
        "5d" => 5 * DAY,
        "1wk" => 7 * DAY,
        "1mo" => 30 * DAY,
        "3mo" => 91 * DAY,
        _ => return None,
    };
    Some(seconds)
}

pub fn parse_range_window(range: &str) -> Option<RangeWindow> {
    let window = match range {
        "1d" => RangeWindow::Seconds(DAY),
        "5d" => RangeWindow::Seconds(5 * DAY),
        "1mo" => RangeWindow::Seconds(30 * DAY),
        "3mo" => RangeWindow::Seconds(91 * DAY),
        "6mo" => RangeWindow::Seconds(182 * DAY),
        "1y" => RangeWindow::Seconds(365 * DAY),
        "2y" => RangeWindow::Seconds(730 * DAY),
        "5y" => RangeWindow::Seconds(1_826 * DAY),
        "ytd" => RangeWindow::YearToDate,
        "max" => RangeWindow::Max,
        _ => return None,
    };
    Some(window)
}

const CONVENTIONAL_MINUTE: &[TimeframeDescriptor] = &[
    TimeframeDescriptor::minute("1m", "1d", "1m", 10_000, 120, None),
    TimeframeDescriptor::minute("5m", "5d", "5m", 15_000, 100, None),
    TimeframeDescriptor::minute("15m", "5d", "15m", 30_000, 100, None),
    TimeframeDescriptor::minute("30m", "1mo", "30m", 60_000, 90, None),
    TimeframeDescriptor::minute("1h", "1mo", "60m", 60_000, 80, None),
    TimeframeDescriptor::minute("4h", "3mo", "60m", 120_000, 60, Some(4)),
];

const ALWAYS_ON_MINUTE: &[TimeframeDescriptor] = &[
    TimeframeDescriptor::minute("1m", "1d", "1m", 10_000, 120, None),
    TimeframeDescriptor::minute("3m", "1d", "1m", 15_000, 120, Some(3)),
    TimeframeDescriptor::minute("5m", "5d", "5m", 15_000, 100, None),
    TimeframeDescriptor::minute("15m", "5d", "15m", 30_000, 100, None),
    TimeframeDescriptor::minute("30m", "1mo", "30m", 60_000, 90, None),
    TimeframeDescriptor::minute("1h", "1mo", "60m", 60_000, 80, None),
    TimeframeDescriptor::minute("4h", "3mo", "60m", 120_000, 60, Some(4)),
    TimeframeDescriptor::minute("12h", "3mo", "60m", 300_000, 60, Some(12)),
];

const CONVENTIONAL_RANGE: &[TimeframeDescriptor] = &[
    TimeframeDescriptor::range("1D", "1d", "5m"),
    TimeframeDescriptor::range("5D", "5d", "15m"),
    TimeframeDescriptor::range("1M", "1mo", "60m"),
    TimeframeDescriptor::range("3M", "3mo", "1d"),
    TimeframeDescriptor::range("6M", "6mo", "1d"),
    TimeframeDescriptor::range("YTD", "ytd", "1d"),
    TimeframeDescriptor::range("1Y", "1y", "1d"),
    TimeframeDescriptor::range("5Y", "5y", "1wk"),
    TimeframeDescriptor::range("MAX", "max", "1mo"),
];

const ALWAYS_ON_RANGE: &[TimeframeDescriptor] = &[
    TimeframeDescriptor::range("1D", "1d", "5m"),
    TimeframeDescriptor::range("5D", "5d", "15m"),
    TimeframeDescriptor::range("1M", "1mo", "60m"),
    TimeframeDescriptor::range("3M", "3mo", "1d"),
    TimeframeDescriptor::range("6M", "6mo", "1d"),
    TimeframeDescriptor::range("1Y", "1y", "1d"),
    TimeframeDescriptor::range("5Y", "5y", "1wk"),
    TimeframeDescriptor::range("MAX", "max", "1mo"),
];

/// A position in one of the catalog's two lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeframeSelection {
    #[serde(rename = "minuteTimeframeIndex")]
    Minute(usize),
    #[serde(rename = "rangeTimeframeIndex")]
    Range(usize),
}

impl TimeframeSelection {
    pub fn new(index: usize, kind: TimeframeKind) -> Self {
        match kind {
            TimeframeKind::Minute => TimeframeSelection::Minute(index),
            TimeframeKind::Range => TimeframeSelection::Range(index),
        }
    }

    pub fn kind(&self) -> TimeframeKind {
        match self {
            TimeframeSelection::Minute(_) => TimeframeKind::Minute,
            TimeframeSelection::Range(_) => TimeframeKind::Range,
        }
    }

    pub fn index(&self) -> usize {
        match self {
            TimeframeSelection::Minute(i) | TimeframeSelection::Range(i) => *i,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeframeCatalog {
    minute: &'static [TimeframeDescriptor],
    range: &'static [TimeframeDescriptor],
    session_aware: bool,
}

impl TimeframeCatalog {
    pub fn conventional() -> Self {
        TimeframeCatalog {
            minute: CONVENTIONAL_MINUTE,
            range: CONVENTIONAL_RANGE,
            session_aware: true,
        }
    }

    pub fn always_on() -> Self {
        TimeframeCatalog {
            minute: ALWAYS_ON_MINUTE,
            range: ALWAYS_ON_RANGE,
            session_aware: false,
        }
    }

    pub fn for_asset_class(asset_class: AssetClass) -> Self {
        match asset_class {
            AssetClass::Conventional => Self::conventional(),
            AssetClass::AlwaysOn => Self::always_on(),
        }
    }

    /// Conventional instruments request extended-hours candles; always-on ones have no sessions.
    pub fn include_extended_hours(&self) -> bool {
        self.session_aware
    }

    pub fn entries(&self, kind: TimeframeKind) -> &'static [TimeframeDescriptor] {
        match kind {
            TimeframeKind::Minute => self.minute,
            TimeframeKind::Range => self.range,
        }
    }

    pub fn get(&self, selection: TimeframeSelection) -> Option<&'static TimeframeDescriptor> {
        self.entries(selection.kind()).get(selection.index())
    }

    /// First view of an instrument: the 5-minute entry when present, otherwise the first one.
    pub fn default_selection(&self) -> TimeframeSelection {
        let index = self.minute.iter().position(|d| d.label == "5m").unwrap_or(0);
        TimeframeSelection::Minute(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_entries_never_poll_and_auto_fit() {
        for catalog in [TimeframeCatalog::conventional(), TimeframeCatalog::always_on()] {
            for entry in catalog.entries(TimeframeKind::Range) {
                assert!(!entry.polls(), "{} should not poll", entry.label);
                assert_eq!(entry.visible_bar_count, None);
                assert!(entry.range_window().is_some(), "{} has unknown range", entry.label);
            }
        }
    }

    #[test]
    fn minute_entries_have_parseable_intervals() {
        for catalog in [TimeframeCatalog::conventional(), TimeframeCatalog::always_on()] {
            for entry in catalog.entries(TimeframeKind::Minute) {
                assert!(entry.polls());
                assert!(entry.interval_seconds().is_some(), "{}", entry.label);
            }
        }
    }

    #[test]
    fn aggregated_entries_report_effective_interval() {
        let catalog = TimeframeCatalog::conventional();
        let four_hour = catalog
            .entries(TimeframeKind::Minute)
            .iter()
            .find(|d| d.label == "4h")
            .unwrap();
        assert_eq!(four_hour.factor(), 4);
        assert_eq!(four_hour.effective_interval_seconds(), Some(4 * 3_600));
    }

    #[test]
    fn catalogs_differ_in_offering_and_session_awareness() {
        let conventional = TimeframeCatalog::conventional();
        let always_on = TimeframeCatalog::always_on();
        assert!(conventional.include_extended_hours());
        assert!(!always_on.include_extended_hours());
        assert!(conventional.entries(TimeframeKind::Range).iter().any(|d| d.label == "YTD"));
        assert!(!always_on.entries(TimeframeKind::Range).iter().any(|d| d.label == "YTD"));
        assert!(always_on.entries(TimeframeKind::Minute).iter().any(|d| d.label == "3m"));
    }

    #[test]
    fn default_selection_points_at_five_minutes() {
        let catalog = TimeframeCatalog::conventional();
        let selected = catalog.get(catalog.default_selection()).unwrap();
        assert_eq!(selected.label, "5m");
    }

    #[test]
    fn out_of_range_selection_is_none() {
        let catalog = TimeframeCatalog::conventional();
        assert!(catalog.get(TimeframeSelection::Range(99)).is_none());
    }
}
