// In-memory candle store and the data feed backed by it
use shared::models::{Candle, InstrumentMatch, QuoteSnapshot};
use shared::utils::start_of_utc_year;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::feed::DataFeed;
use super::search::rank_instruments;
use crate::chart::timeframes::{parse_range_window, RangeWindow};
use crate::error::FeedError;

#[derive(Debug, Clone)]
struct Instrument {
    name: String,
    // Candles per source interval ("1m", "1d", ...)
    series: HashMap<String, Vec<Candle>>,
}

pub struct MarketDataStore {
    instruments: HashMap<String, Instrument>,
}

impl MarketDataStore {
    pub fn new() -> Self {
        MarketDataStore {
            instruments: HashMap::new(),
        }
    }

    /// Merges `new_candles` into the series, keeping it sorted with one candle per timestamp.
    /// A later candle for an existing timestamp replaces the stored one. Returns the series length.
    pub fn add_candles(&mut self, symbol: &str, interval: &str, new_candles: Vec<Candle>) -> usize {
        let instrument = self
            .instruments
            .entry(symbol.to_string())
            .or_insert_with(|| Instrument {
                name: symbol.to_string(),
                series: HashMap::new(),
            });
        let series = instrument.series.entry(interval.to_string()).or_default();

        // New candles go first so dedup keeps them over stored ones with the same time.
        let mut merged = new_candles;
        merged.append(series);
        merged.sort_by_key(|c| c.time);
        merged.dedup_by_key(|c| c.time);
        *series = merged;

        tracing::debug!(symbol, interval, len = series.len(), "Candles stored");
        series.len()
    }

    pub fn set_name(&mut self, symbol: &str, name: &str) {
        if let Some(instrument) = self.instruments.get_mut(symbol) {
            instrument.name = name.to_string();
        }
    }

    /// Candles inside the look-back `window`, measured back from the newest candle.
    pub fn get_candles(&self, symbol: &str, interval: &str, window: RangeWindow) -> Option<Vec<Candle>> {
        let candles = self.instruments.get(symbol)?.series.get(interval)?;
        let Some(last) = candles.last() else {
            return Some(Vec::new());
        };
        let from = match window {
            RangeWindow::Seconds(secs) => Some(last.time.saturating_sub(secs)),
            RangeWindow::YearToDate => start_of_utc_year(last.time),
            RangeWindow::Max => None,
        };
        Some(match from {
            Some(from) => {
                let start = candles.partition_point(|c| c.time < from);
                candles[start..].to_vec()
            }
            None => candles.clone(),
        })
    }

    /// Latest price and change against the previous close, from the finest series held.
    pub fn quote(&self, symbol: &str) -> Option<QuoteSnapshot> {
        let instrument = self.instruments.get(symbol)?;
        let candles = instrument
            .series
            .values()
            .filter(|s| !s.is_empty())
            .max_by_key(|s| s.last().map(|c| c.time))?;
        let last = candles.last()?;
        let previous = candles.len().checked_sub(2).map_or(last.open, |i| candles[i].close);
        let change = last.close - previous;
        let change_percent = if previous != 0.0 { change / previous * 100.0 } else { 0.0 };
        Some(QuoteSnapshot {
            symbol: symbol.to_string(),
            price: last.close,
            change,
            change_percent,
        })
    }

    pub fn instruments(&self) -> Vec<InstrumentMatch> {
        self.instruments
            .iter()
            .map(|(symbol, instrument)| InstrumentMatch {
                symbol: symbol.clone(),
                name: instrument.name.clone(),
            })
            .collect()
    }
}

impl Default for MarketDataStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Serves a shared [`MarketDataStore`] through the [`DataFeed`] interface.
#[derive(Clone)]
pub struct LocalFeed {
    store: Arc<RwLock<MarketDataStore>>,
}

impl LocalFeed {
    pub fn new(store: Arc<RwLock<MarketDataStore>>) -> Self {
        LocalFeed { store }
    }
}

impl DataFeed for LocalFeed {
    async fn fetch_candles(
        &self,
        symbol: &str,
        range: &str,
        interval: &str,
        include_extended_hours: bool,
    ) -> Result<Vec<Candle>, FeedError> {
        let window = parse_range_window(range).ok_or_else(|| FeedError::Status {
            code: 400,
            message: format!("Unsupported range '{}'", range),
        })?;
        let store = self.store.read().await;
        // Stored candles carry no session tags, so the extended-hours flag only shows up in the log.
        tracing::debug!(symbol, range, interval, include_extended_hours, "Serving candles from local store");
        store
            .get_candles(symbol, interval, window)
            .ok_or_else(|| FeedError::UnknownSymbol(symbol.to_string()))
    }

    async fn fetch_quote_snapshot(&self, symbol: &str) -> Result<QuoteSnapshot, FeedError> {
        let store = self.store.read().await;
        store.quote(symbol).ok_or_else(|| FeedError::UnknownSymbol(symbol.to_string()))
    }

    async fn search_instruments(&self, query: &str) -> Result<Vec<InstrumentMatch>, FeedError> {
        let store = self.store.read().await;
        Ok(rank_instruments(query, &store.instruments()))
    }
}
