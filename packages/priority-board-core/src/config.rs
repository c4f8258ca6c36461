/// Board runtime configuration.
/// Read from a JSON file; every field is optional and falls back to its default.
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::order::renormalize::{
    RenormalizePolicy, DEFAULT_MAX_GAP, DEFAULT_MIN_GAP, DEFAULT_SPACING,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardConfig {
    /// Spacing between keys after renormalization.
    #[serde(default = "default_spacing")]
    pub renormalize_spacing: f64,
    /// Largest adjacent gap tolerated before renormalizing.
    #[serde(default = "default_max_gap")]
    pub max_gap: f64,
    /// Smallest adjacent gap tolerated before renormalizing.
    #[serde(default = "default_min_gap")]
    pub min_gap: f64,
    /// Window in which bursts of snapshots are coalesced.
    #[serde(default = "default_debounce_ms")]
    pub snapshot_debounce_ms: u64,
    /// Populate the default cards when the first snapshot is empty.
    #[serde(default = "default_true")]
    pub seed_on_empty: bool,
}

fn default_spacing() -> f64 {
    DEFAULT_SPACING
}

fn default_max_gap() -> f64 {
    DEFAULT_MAX_GAP
}

fn default_min_gap() -> f64 {
    DEFAULT_MIN_GAP
}

fn default_debounce_ms() -> u64 {
    100
}

fn default_true() -> bool {
    true
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            renormalize_spacing: default_spacing(),
            max_gap: default_max_gap(),
            min_gap: default_min_gap(),
            snapshot_debounce_ms: default_debounce_ms(),
            seed_on_empty: default_true(),
        }
    }
}

impl BoardConfig {
    pub fn renormalize_policy(&self) -> RenormalizePolicy {
        RenormalizePolicy {
            spacing: self.renormalize_spacing,
            max_gap: self.max_gap,
            min_gap: self.min_gap,
        }
    }

    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.snapshot_debounce_ms)
    }
}

/// Load config from path. Returns defaults if the file is missing or invalid.
pub fn load_config(path: &Path) -> BoardConfig {
    match fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
            log::warn!("[board.config] Failed to parse config {}: {}", path.display(), e);
            BoardConfig::default()
        }),
        Err(_) => {
            log::info!("[board.config] No config at {}, using defaults", path.display());
            BoardConfig::default()
        }
    }
}
