//! Assistant configuration backed by a RON file.
//!
//! Holds the assistant display name, store tunables, and external service
//! URLs. Loaded from `config/assistant.ron`; missing file or fields fall
//! back to defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Top-level assistant configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    pub assistant_name: String,
    /// How long a loaded snapshot is served from cache before re-reading disk
    #[serde(default = "default_cache_staleness_secs")]
    pub cache_staleness_secs: u64,
    /// Delay before the single retry of a failed persist
    #[serde(default = "default_save_retry_delay_ms")]
    pub save_retry_delay_ms: u64,
    #[serde(default)]
    pub services: ServicesConfig,
}

/// External service URLs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServicesConfig {
    #[serde(default)]
    pub geocode_server_url: Option<String>,
    #[serde(default)]
    pub weather_server_url: Option<String>,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            geocode_server_url: None,
            weather_server_url: None,
        }
    }
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            assistant_name: "Hearth".to_string(),
            cache_staleness_secs: default_cache_staleness_secs(),
            save_retry_delay_ms: default_save_retry_delay_ms(),
            services: ServicesConfig::default(),
        }
    }
}

impl AssistantConfig {
    /// Load from a RON file, falling back to defaults if the file is missing
    /// or malformed.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match ron::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    log::warn!(
                        "[CONFIG] failed to parse {}, using defaults: {}",
                        path.display(),
                        e
                    );
                    Self::default()
                }
            },
            Err(_) => {
                log::info!(
                    "[CONFIG] no config file at {}, using defaults",
                    path.display()
                );
                Self::default()
            }
        }
    }
}

fn default_cache_staleness_secs() -> u64 {
    crate::config::defaults::CACHE_STALENESS_SECS
}

fn default_save_retry_delay_ms() -> u64 {
    crate::config::defaults::SAVE_RETRY_DELAY_MS
}
