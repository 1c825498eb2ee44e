use thiserror::Error;

/// Failures reported by the data-feed collaborator.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FeedError {
    #[error("Feed unreachable: {0}")]
    Unreachable(String),

    #[error("Feed returned status {code}: {message}")]
    Status { code: u16, message: String },

    #[error("Unknown symbol '{0}'")]
    UnknownSymbol(String),
}

impl FeedError {
    /// 429 and 5xx responses and unreachable hosts are worth another attempt; other 4xx are not.
    pub fn is_retriable(&self) -> bool {
        match self {
            FeedError::Unreachable(_) => true,
            FeedError::Status { code, .. } => *code == 429 || (500..=599).contains(code),
            FeedError::UnknownSymbol(_) => false,
        }
    }
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("CSV parsing system error: {source}")]
    CsvSystemError {
        #[from]
        source: csv::Error,
    },

    #[error("I/O error: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },

    #[error("JSON error: {source}")]
    JsonError {
        #[from]
        source: serde_json::Error,
    },

    #[error("Transport error: {0}")]
    Transport(#[from] FeedError),

    #[error("Preference store error: {0}")]
    PreferenceError(String),

    #[error("Snapshot error: {0}")]
    SnapshotError(String),

    #[error(transparent)]
    AnyhowError(#[from] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retriable_statuses() {
        assert!(FeedError::Status { code: 429, message: "slow down".into() }.is_retriable());
        assert!(FeedError::Status { code: 503, message: "unavailable".into() }.is_retriable());
        assert!(FeedError::Unreachable("dns".into()).is_retriable());
        assert!(!FeedError::Status { code: 404, message: "missing".into() }.is_retriable());
        assert!(!FeedError::UnknownSymbol("ZZZ".into()).is_retriable());
    }

    #[test]
    fn feed_error_converts_into_transport() {
        let err: EngineError = FeedError::Unreachable("offline".into()).into();
        assert!(err.to_string().starts_with("Transport error"));
    }
}
