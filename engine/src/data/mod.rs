pub mod csv_parser;
pub mod feed;
pub mod market_data;
pub mod retry;
pub mod search;

pub use feed::DataFeed;
pub use market_data::{LocalFeed, MarketDataStore};
