use std::env;
use std::path::PathBuf;

/// Environment variable names - single source of truth
pub mod env_vars {
    pub const DATA_DIR: &str = "HEARTH_DATA_DIR";
    pub const CONFIG_PATH: &str = "HEARTH_CONFIG_PATH";
    /// Set to "1" or "true" to keep all notes in memory (nothing written to disk).
    pub const EPHEMERAL: &str = "HEARTH_EPHEMERAL";
}

/// Default values
pub mod defaults {
    pub const DATA_DIR: &str = ".data";
    pub const NOTES_DOCUMENT: &str = "notes.json";
    pub const CONFIG_PATH: &str = "config/assistant.ron";
    pub const CACHE_STALENESS_SECS: u64 = 3;
    pub const SAVE_RETRY_DELAY_MS: u64 = 250;
}

/// Returns the absolute path to the hearth-backend directory.
/// Uses CARGO_MANIFEST_DIR at compile time, so it always resolves
/// to hearth-backend/ regardless of the working directory at runtime.
pub fn backend_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

/// Get the data directory (holds the persisted notes document)
pub fn data_dir() -> PathBuf {
    match env::var(env_vars::DATA_DIR) {
        Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => backend_dir().join(defaults::DATA_DIR),
    }
}

/// Get the path of the persisted notes document
pub fn notes_document_path() -> PathBuf {
    data_dir().join(defaults::NOTES_DOCUMENT)
}

/// Get the path of the assistant RON config file
pub fn assistant_config_path() -> PathBuf {
    match env::var(env_vars::CONFIG_PATH) {
        Ok(path) if !path.is_empty() => PathBuf::from(path),
        _ => backend_dir().join(defaults::CONFIG_PATH),
    }
}

/// Whether the store should run without durable storage
pub fn is_ephemeral() -> bool {
    matches!(
        env::var(env_vars::EPHEMERAL).as_deref(),
        Ok("1") | Ok("true")
    )
}
