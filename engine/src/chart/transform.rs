// Candle transforms applied between the raw feed and the drawn series.
use shared::models::Candle;
use std::borrow::Cow;

/// Whitespace bars appended past the last real candle.
pub const FORWARD_PROJECTION_BARS: usize = 30;

/// Merges consecutive chunks of `factor` candles into one. The last chunk may be shorter.
/// A factor of one or less hands the input back untouched.
pub fn aggregate(candles: &[Candle], factor: usize) -> Cow<'_, [Candle]> {
    if factor <= 1 {
        return Cow::Borrowed(candles);
    }

    let merged = candles
        .chunks(factor)
        .filter_map(|chunk| {
            let first = chunk.first()?;
            let last = chunk.last()?;
            Some(chunk.iter().skip(1).fold(
                Candle {
                    time: first.time,
                    open: first.open,
                    high: first.high,
                    low: first.low,
                    close: last.close,
                    volume: first.volume,
                },
                |mut acc, c| {
                    acc.high = acc.high.max(c.high);
                    acc.low = acc.low.min(c.low);
                    acc.volume = acc.volume.saturating_add(c.volume);
                    acc
                },
            ))
        })
        .collect();
    Cow::Owned(merged)
}

/// Heikin-Ashi smoothing. Each output depends on the previous output, so this is a single forward pass.
pub fn to_heikin_ashi(candles: &[Candle]) -> Vec<Candle> {
    let mut out: Vec<Candle> = Vec::with_capacity(candles.len());
    let mut prev: Option<(f64, f64)> = None;

    for c in candles {
        // The first candle seeds the "previous" open/close from its own raw values.
        let (prev_open, prev_close) = prev.unwrap_or((c.open, c.close));
        let close = (c.open + c.high + c.low + c.close) / 4.0;
        let open = (prev_open + prev_close) / 2.0;
        out.push(Candle {
            time: c.time,
            open,
            high: c.high.max(open).max(close),
            low: c.low.min(open).min(close),
            close,
            volume: c.volume,
        });
        prev = Some((open, close));
    }
    out
}

/// Timestamps for whitespace bars after `last_time`. They carry no prices and only widen the time axis.
pub fn project_forward_timestamps(last_time: i64, interval_seconds: i64) -> Vec<i64> {
    if interval_seconds <= 0 {
        return Vec::new();
    }
    (1..=FORWARD_PROJECTION_BARS as i64)
        .map(|step| last_time + step * interval_seconds)
        .collect()
}
