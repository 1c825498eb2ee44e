// Engine main entry point
use anyhow::Context;
use engine::chart::TimeframePreferences;
use engine::config::EngineSettings;
use engine::data::csv_parser::CsvCandleLoader;
use engine::data::{LocalFeed, MarketDataStore};
use engine::services::{ChartSession, SessionEvent};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    info!("Starting chart engine...");
    let settings = EngineSettings::load_from_env().context("Failed to load engine settings")?;

    let mut store = MarketDataStore::new();
    for seed in &settings.seed_files {
        let loader = CsvCandleLoader::new(seed.delimiter)?;
        let candles = loader
            .load_candles_from_csv(&seed.path)
            .with_context(|| format!("Failed to load candles for {}", seed.symbol))?;
        let stored = store.add_candles(&seed.symbol, &seed.interval, candles);
        if let Some(name) = &seed.name {
            store.set_name(&seed.symbol, name);
        }
        info!(symbol = %seed.symbol, interval = %seed.interval, candles = stored, "Seed file loaded");
    }
    if settings.seed_files.is_empty() {
        warn!("No seed files configured; the chart will stay empty");
    }

    let feed = LocalFeed::new(Arc::new(RwLock::new(store)));
    let preferences = TimeframePreferences::load(&settings.preferences_path);
    let mut session = ChartSession::open(feed, &settings, &settings.default_symbol, preferences);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown requested");
                break;
            }
            event = session.next_event() => match event {
                Some(SessionEvent::CandlesUpdated { symbol, timeframe, candles }) => {
                    info!(%symbol, timeframe, candles, "Chart refreshed");
                }
                Some(SessionEvent::FetchFailed { purpose, error }) => {
                    warn!(?purpose, %error, "Showing stale data");
                }
                Some(other) => tracing::debug!(event = ?other, "Session event"),
                None => break,
            },
        }
    }

    session.close();
    Ok(())
}
