//! Configuration file parser for feedmill.toml.
//!
//! The config file is optional — a missing file yields `Config::default()`.
//! Unknown keys are silently ignored by serde, though we log a warning
//! when the file contains potential typos.
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be
/// specified. Missing keys fall back to `Default::default()`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path of the SQLite database file.
    pub database_path: String,

    /// Per-source fetch timeout in seconds.
    pub fetch_timeout_secs: u64,

    /// Maximum accepted feed document size in bytes.
    pub max_feed_size_bytes: usize,

    /// Minimum minutes between ingestion runs. 0 = no gating.
    pub min_fetch_interval_minutes: u64,

    /// Whether rendered pages are cached on disk (purged when new items
    /// arrive).
    pub page_cache_enabled: bool,

    /// Directory holding cached rendered pages.
    pub page_cache_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: "feedmill.db".to_string(),
            fetch_timeout_secs: 30,
            max_feed_size_bytes: 10 * 1024 * 1024,
            min_fetch_interval_minutes: 4,
            page_cache_enabled: false,
            page_cache_dir: "cache".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as a warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "config file is empty, using defaults");
            return Ok(Self::default());
        }

        // Parse as a raw table first to flag probable typos
        if let Ok(raw) = content.parse::<toml::Table>() {
            let known_keys = [
                "database_path",
                "fetch_timeout_secs",
                "max_feed_size_bytes",
                "min_fetch_interval_minutes",
                "page_cache_enabled",
                "page_cache_dir",
            ];
            for key in raw.keys() {
                if !known_keys.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(path = %path.display(), db = %config.database_path, "loaded configuration");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.database_path, "feedmill.db");
        assert_eq!(config.fetch_timeout_secs, 30);
        assert_eq!(config.max_feed_size_bytes, 10 * 1024 * 1024);
        assert_eq!(config.min_fetch_interval_minutes, 4);
        assert!(!config.page_cache_enabled);
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/feedmill_test_nonexistent_config.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config.database_path, "feedmill.db");
    }

    #[test]
    fn test_partial_config_uses_defaults_for_missing() {
        let dir = std::env::temp_dir().join("feedmill_config_test_partial");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "fetch_timeout_secs = 5\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.fetch_timeout_secs, 5);
        assert_eq!(config.database_path, "feedmill.db"); // default

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_full_config() {
        let dir = std::env::temp_dir().join("feedmill_config_test_full");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");

        let content = r#"
database_path = "/var/lib/feedmill/news.db"
fetch_timeout_secs = 10
max_feed_size_bytes = 1048576
min_fetch_interval_minutes = 15
page_cache_enabled = true
page_cache_dir = "/var/cache/feedmill"
"#;
        std::fs::write(&path, content).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.database_path, "/var/lib/feedmill/news.db");
        assert_eq!(config.fetch_timeout_secs, 10);
        assert_eq!(config.max_feed_size_bytes, 1_048_576);
        assert_eq!(config.min_fetch_interval_minutes, 15);
        assert!(config.page_cache_enabled);
        assert_eq!(config.page_cache_dir, "/var/cache/feedmill");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let dir = std::env::temp_dir().join("feedmill_config_test_invalid");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "this is not [valid toml").unwrap();

        let result = Config::load(&path);
        assert!(matches!(result, Err(ConfigError::Parse(_))));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let dir = std::env::temp_dir().join("feedmill_config_test_unknown");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "totally_fake_key = 1\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.database_path, "feedmill.db");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_wrong_type_returns_error() {
        let dir = std::env::temp_dir().join("feedmill_config_test_wrongtype");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "fetch_timeout_secs = \"fast\"\n").unwrap();

        assert!(Config::load(&path).is_err());

        std::fs::remove_dir_all(&dir).ok();
    }
}
