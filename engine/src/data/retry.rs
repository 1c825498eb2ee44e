// Bounded exponential backoff around feed calls
use std::future::Future;
use std::time::Duration;

use backon::{BackoffBuilder, ExponentialBuilder};

use crate::config::settings::RetrySettings;
use crate::error::FeedError;

/// Delays between attempts: doubling from the base delay up to the cap, one per retry.
pub fn backoff_schedule(settings: &RetrySettings) -> impl Iterator<Item = Duration> {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(settings.base_delay_ms))
        .with_max_delay(Duration::from_millis(settings.max_delay_ms))
        .with_max_times(settings.max_attempts.saturating_sub(1) as usize)
        .build()
}

/// Runs `call` until it succeeds, fails with a non-retriable error, or
/// `max_attempts` calls have been made.
pub async fn fetch_with_backoff<T, F, Fut>(settings: &RetrySettings, what: &str, mut call: F) -> Result<T, FeedError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FeedError>>,
{
    let mut backoff = backoff_schedule(settings);
    let mut attempt = 1;
    loop {
        let error = match call().await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };
        let delay = match backoff.next() {
            Some(delay) if error.is_retriable() => delay,
            _ => {
                tracing::debug!(what, attempt, error = %error, "Feed call failed, giving up");
                return Err(error);
            }
        };
        tracing::warn!(what, attempt, delay_ms = delay.as_millis() as u64, error = %error, "Feed call failed, retrying");
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
