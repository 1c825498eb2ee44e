// Spawned feed fetches, poll timers and applying their results
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_stream::wrappers::IntervalStream;
use tokio_stream::StreamExt;
use uuid::Uuid;

use super::{ChartSession, FeedMessage, FetchPurpose, InFlight, SessionEvent};
use crate::chart::transform::aggregate;
use crate::data::retry::fetch_with_backoff;
use crate::data::DataFeed;

impl<F: DataFeed + Clone> ChartSession<F> {
    /// Starts a candle fetch for the current timeframe, superseding any fetch still running.
    pub(crate) fn request_candles(&mut self) {
        if let Some(previous) = self.candles_request.take() {
            tracing::debug!(request_id = %previous.id, "Superseding in-flight candle fetch");
            previous.abort();
        }
        let request_id = Uuid::new_v4();
        let descriptor = self.descriptor();
        let (range, interval) = (descriptor.source_range, descriptor.source_interval);
        let include_extended_hours = self.catalog.include_extended_hours();
        let symbol = self.symbol.clone();
        let feed = self.feed.clone();
        let retry = self.settings.retry.clone();
        let tx = self.tx.clone();

        tracing::debug!(symbol = %symbol, range, interval, request_id = %request_id, "Fetching candles");
        let handle = tokio::spawn(async move {
            let result = fetch_with_backoff(&retry, "candles", || {
                feed.fetch_candles(&symbol, range, interval, include_extended_hours)
            })
            .await;
            // The receiver is gone once the session closed.
            let _ = tx.send(FeedMessage::Candles { request_id, result });
        });
        self.candles_request = Some(InFlight { id: request_id, handle });
    }

    /// Fetches the compare symbol over the same range and interval as the primary.
    pub(crate) fn request_compare(&mut self) {
        if let Some(previous) = self.compare_request.take() {
            tracing::debug!(request_id = %previous.id, "Superseding in-flight compare fetch");
            previous.abort();
        }
        let Some(symbol) = self.compare.symbol().map(str::to_string) else {
            return;
        };
        let request_id = Uuid::new_v4();
        let descriptor = self.descriptor();
        let (range, interval) = (descriptor.source_range, descriptor.source_interval);
        let include_extended_hours = self.catalog.include_extended_hours();
        let feed = self.feed.clone();
        let retry = self.settings.retry.clone();
        let tx = self.tx.clone();

        tracing::debug!(compare = %symbol, range, interval, request_id = %request_id, "Fetching compare candles");
        let handle = tokio::spawn(async move {
            let result = fetch_with_backoff(&retry, "compare", || {
                feed.fetch_candles(&symbol, range, interval, include_extended_hours)
            })
            .await;
            let _ = tx.send(FeedMessage::CompareCandles { request_id, result });
        });
        self.compare_request = Some(InFlight { id: request_id, handle });
    }

    pub(crate) fn cancel_compare_request(&mut self) {
        if let Some(previous) = self.compare_request.take() {
            previous.abort();
        }
    }

    /// Replaces the poll timer. The old timer is stopped before the new one starts.
    pub(crate) fn start_poll(&mut self, every_ms: u64) {
        self.stop_poll();
        let timer_id = Uuid::new_v4();
        let tx = self.tx.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(every_ms));
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut ticks = IntervalStream::new(interval);
            // The first tick completes immediately; polling starts one period later.
            ticks.next().await;
            while ticks.next().await.is_some() {
                if tx.send(FeedMessage::PollTick { timer_id }).is_err() {
                    break;
                }
            }
        });
        tracing::debug!(every_ms, timer_id = %timer_id, "Poll timer started");
        self.poll = Some(InFlight { id: timer_id, handle });
    }

    pub(crate) fn stop_poll(&mut self) {
        if let Some(timer) = self.poll.take() {
            tracing::debug!(timer_id = %timer.id, "Poll timer stopped");
            timer.abort();
        }
    }

    fn take_if_current(slot: &mut Option<InFlight>, id: Uuid) -> bool {
        if slot.as_ref().is_some_and(|r| r.id == id) {
            slot.take();
            true
        } else {
            false
        }
    }

    pub(crate) fn apply(&mut self, message: FeedMessage) -> SessionEvent {
        match message {
            FeedMessage::Candles { request_id, result } => {
                if !Self::take_if_current(&mut self.candles_request, request_id) {
                    tracing::debug!(request_id = %request_id, "Discarding stale candle response");
                    return SessionEvent::StaleResponseDiscarded {
                        purpose: FetchPurpose::Candles,
                        request_id,
                    };
                }
                match result {
                    Ok(raw) => {
                        self.stale = false;
                        self.candles = aggregate(&raw, self.descriptor().factor()).into_owned();
                        self.refresh_all_series();
                        self.apply_view_reset();
                        self.compare.recompute(&self.candles, &mut self.surface);
                        tracing::info!(
                            symbol = %self.symbol,
                            timeframe = %self.descriptor().label,
                            candles = self.candles.len(),
                            "Candles updated"
                        );
                        SessionEvent::CandlesUpdated {
                            symbol: self.symbol.clone(),
                            timeframe: self.descriptor().label,
                            candles: self.candles.len(),
                        }
                    }
                    Err(error) => {
                        self.stale = true;
                        tracing::warn!(symbol = %self.symbol, error = %error, "Candle fetch failed, keeping prior series");
                        SessionEvent::FetchFailed {
                            purpose: FetchPurpose::Candles,
                            error,
                        }
                    }
                }
            }
            FeedMessage::CompareCandles { request_id, result } => {
                if !Self::take_if_current(&mut self.compare_request, request_id) {
                    tracing::debug!(request_id = %request_id, "Discarding stale compare response");
                    return SessionEvent::StaleResponseDiscarded {
                        purpose: FetchPurpose::Compare,
                        request_id,
                    };
                }
                let symbol = self.compare.symbol().unwrap_or_default().to_string();
                match result {
                    Ok(raw) => {
                        let candles = aggregate(&raw, self.descriptor().factor()).into_owned();
                        self.compare.set_candles(candles, &self.candles, &mut self.surface);
                        SessionEvent::CompareUpdated {
                            drawn: self.compare.series_id().is_some(),
                            symbol,
                        }
                    }
                    Err(error) => {
                        tracing::warn!(compare = %symbol, error = %error, "Compare fetch failed");
                        SessionEvent::FetchFailed {
                            purpose: FetchPurpose::Compare,
                            error,
                        }
                    }
                }
            }
            FeedMessage::PollTick { timer_id } => {
                if self.poll.as_ref().is_some_and(|t| t.id == timer_id) {
                    self.request_candles();
                    if self.compare.is_active() {
                        self.request_compare();
                    }
                }
                SessionEvent::PollTick {
                    timeframe: self.descriptor().label,
                }
            }
        }
    }
}
