// Per-symbol timeframe preferences, bounded with first-inserted eviction
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::timeframes::TimeframeSelection;
use crate::error::EngineError;

pub const MAX_PREFERENCES: usize = 50;

#[derive(Debug, Serialize, Deserialize)]
struct StoredPreference {
    symbol: String,
    #[serde(flatten)]
    selection: TimeframeSelection,
}

/// Remembers the last timeframe chosen per symbol.
///
/// Holds at most [`MAX_PREFERENCES`] symbols. When full, the symbol that was
/// inserted first is evicted; rewriting a symbol keeps its original position,
/// so reading or updating an entry does not protect it from eviction.
#[derive(Debug, Default)]
pub struct TimeframePreferences {
    order: VecDeque<String>,
    entries: HashMap<String, TimeframeSelection>,
    path: Option<PathBuf>,
}

impl TimeframePreferences {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Loads the store backed by `path`. A missing or unreadable file starts empty.
    pub fn load(path: &Path) -> Self {
        let mut prefs = TimeframePreferences {
            path: Some(path.to_path_buf()),
            ..Default::default()
        };
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return prefs,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Could not read timeframe preferences, starting empty");
                return prefs;
            }
        };
        match serde_json::from_str::<Vec<StoredPreference>>(&raw) {
            Ok(stored) => {
                for entry in stored {
                    prefs.insert(entry.symbol, entry.selection);
                }
                tracing::debug!(path = %path.display(), symbols = prefs.len(), "Timeframe preferences loaded");
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Corrupted timeframe preferences ignored");
            }
        }
        prefs
    }

    pub fn get(&self, symbol: &str) -> Option<TimeframeSelection> {
        self.entries.get(symbol).copied()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Symbols from oldest to newest insertion.
    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Stores `selection` for `symbol`, returning the evicted symbol if the store was full.
    pub fn insert(&mut self, symbol: String, selection: TimeframeSelection) -> Option<String> {
        if let Some(existing) = self.entries.get_mut(&symbol) {
            *existing = selection;
            return None;
        }
        let evicted = if self.order.len() >= MAX_PREFERENCES {
            self.order.pop_front()
        } else {
            None
        };
        if let Some(oldest) = &evicted {
            self.entries.remove(oldest);
        }
        self.order.push_back(symbol.clone());
        self.entries.insert(symbol, selection);
        evicted
    }

    /// Inserts and writes the store back to its file, when it has one.
    pub fn record(&mut self, symbol: &str, selection: TimeframeSelection) -> Result<(), EngineError> {
        if let Some(evicted) = self.insert(symbol.to_string(), selection) {
            tracing::debug!(evicted = %evicted, "Timeframe preference evicted");
        }
        self.save()
    }

    pub fn save(&self) -> Result<(), EngineError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let stored: Vec<StoredPreference> = self
            .order
            .iter()
            .filter_map(|symbol| {
                self.entries.get(symbol).map(|&selection| StoredPreference {
                    symbol: symbol.clone(),
                    selection,
                })
            })
            .collect();
        let json = serde_json::to_string_pretty(&stored)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, json).map_err(|e| {
            EngineError::PreferenceError(format!("Failed to write '{}': {}", path.display(), e))
        })
    }
}
