// Market data collaborator consumed by chart sessions
use std::future::Future;

use shared::models::{Candle, InstrumentMatch, QuoteSnapshot};

use crate::error::FeedError;

/// Source of candles, quotes and instrument lookups.
///
/// Futures are `Send` so sessions can run fetches on spawned tasks.
pub trait DataFeed: Send + Sync + 'static {
    /// Ordered candles for `symbol` covering `range` at `interval`
    /// (for example `"5d"` at `"5m"`).
    fn fetch_candles(
        &self,
        symbol: &str,
        range: &str,
        interval: &str,
        include_extended_hours: bool,
    ) -> impl Future<Output = Result<Vec<Candle>, FeedError>> + Send;

    fn fetch_quote_snapshot(&self, symbol: &str) -> impl Future<Output = Result<QuoteSnapshot, FeedError>> + Send;

    fn search_instruments(&self, query: &str) -> impl Future<Output = Result<Vec<InstrumentMatch>, FeedError>> + Send;
}
