// Engine settings, loaded from a JSON file with every field optional.
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::EngineError;

pub const CONFIG_ENV_VAR: &str = "CHART_ENGINE_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "chart-engine.json";

/// Which timeframe catalog an instrument uses.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AssetClass {
    /// Exchange-traded instruments with regular and extended sessions.
    #[default]
    Conventional,
    /// Instruments that trade around the clock (crypto).
    AlwaysOn,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SeedFile {
    pub symbol: String,
    #[serde(default)]
    pub name: Option<String>,
    pub interval: String,
    pub path: PathBuf,
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
}

fn default_delimiter() -> char {
    ','
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct IndicatorSettings {
    pub ema_periods: Vec<usize>,
    pub rsi_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
}

impl Default for IndicatorSettings {
    fn default() -> Self {
        IndicatorSettings {
            ema_periods: vec![9, 21],
            rsi_period: 14,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ViewportSettings {
    pub width: f64,
    pub height: f64,
    pub pixel_ratio: f64,
}

impl Default for ViewportSettings {
    fn default() -> Self {
        ViewportSettings {
            width: 960.0,
            height: 540.0,
            pixel_ratio: 2.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct SnapshotSettings {
    pub watermark: String,
    pub footer_height: f64,
    pub downloads_dir: PathBuf,
}

impl Default for SnapshotSettings {
    fn default() -> Self {
        SnapshotSettings {
            watermark: "chart-desk".to_string(),
            footer_height: 32.0,
            downloads_dir: PathBuf::from("downloads"),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        RetrySettings {
            max_attempts: 3,
            base_delay_ms: 200,
            max_delay_ms: 2_000,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct EngineSettings {
    pub default_symbol: String,
    pub asset_class: AssetClass,
    pub seed_files: Vec<SeedFile>,
    pub preferences_path: PathBuf,
    pub viewport: ViewportSettings,
    pub indicators: IndicatorSettings,
    pub snapshot: SnapshotSettings,
    pub retry: RetrySettings,
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings {
            default_symbol: "AAPL".to_string(),
            asset_class: AssetClass::Conventional,
            seed_files: Vec::new(),
            preferences_path: PathBuf::from("timeframe-preferences.json"),
            viewport: ViewportSettings::default(),
            indicators: IndicatorSettings::default(),
            snapshot: SnapshotSettings::default(),
            retry: RetrySettings::default(),
        }
    }
}

impl EngineSettings {
    /// Reads settings from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "No settings file found, using defaults");
            return Ok(EngineSettings::default());
        }
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw).map_err(|e| {
            EngineError::ConfigError(format!("Invalid settings file '{}': {}", path.display(), e))
        })
    }

    /// Resolves the settings path from the environment, falling back to the working directory.
    pub fn load_from_env() -> Result<Self, EngineError> {
        let path = std::env::var_os(CONFIG_ENV_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
        Self::load(&path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn missing_file_yields_defaults() {
        let settings = EngineSettings::load(Path::new("/nonexistent/chart-engine.json")).unwrap();
        assert_eq!(settings, EngineSettings::default());
        assert_eq!(settings.indicators.ema_periods, vec![9, 21]);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"default_symbol": "BTC-USD", "asset_class": "always_on", "indicators": {{"rsi_period": 7}}}}"#
        )
        .unwrap();
        let settings = EngineSettings::load(file.path()).unwrap();
        assert_eq!(settings.default_symbol, "BTC-USD");
        assert_eq!(settings.asset_class, AssetClass::AlwaysOn);
        assert_eq!(settings.indicators.rsi_period, 7);
        assert_eq!(settings.indicators.macd_slow, 26);
        assert_eq!(settings.retry.max_attempts, 3);
    }

    #[test]
    fn malformed_file_is_config_error() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        let err = EngineSettings::load(file.path()).unwrap_err();
        assert!(matches!(err, EngineError::ConfigError(_)));
    }
}
