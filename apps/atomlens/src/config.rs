//! # Configuration
//!
//! `atomlens.toml`, then environment overrides, then validation.
//!
//! ```toml
//! [index]
//! endpoint = "http://localhost:8080/v1/graphql"
//! timeout_secs = 10
//!
//! [queue]
//! max_items = 50
//! deduplicate = true
//! database = "atomlens.db"
//!
//! [search]
//! cache_timeout_secs = 300
//! max_cache_size = 100
//!
//! [server]
//! host = "127.0.0.1"
//! port = 8787
//! cors_origins = []
//! rate_limit = 100
//! ```
//!
//! ## Environment Overrides
//!
//! - `ATOMLENS_INDEX_URL`: index endpoint
//! - `ATOMLENS_DATABASE`: queue database path
//! - `ATOMLENS_API_KEY`: bearer key required by the HTTP API (unset = open)
//! - `ATOMLENS_CORS_ORIGINS`: comma-separated origins, or `*`
//! - `ATOMLENS_RATE_LIMIT`: requests per second, `0` disables

use crate::error::AppError;
use crate::search::SearchConfig;
use atomlens_core::QueueConfig;
use atomlens_core::primitives::{
    DEFAULT_CACHE_TIMEOUT_SECS, DEFAULT_DEDUPLICATE, DEFAULT_MAX_CACHE_SIZE, DEFAULT_MAX_ITEMS,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "atomlens.toml";

// =============================================================================
// SECTIONS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub endpoint: String,
    pub timeout_secs: u64,
    /// Bearer token sent to the index, if it requires one.
    pub api_key: Option<String>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8080/v1/graphql".to_string(),
            timeout_secs: 10,
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSection {
    pub max_items: usize,
    pub deduplicate: bool,
    pub database: PathBuf,
}

impl Default for QueueSection {
    fn default() -> Self {
        Self {
            max_items: DEFAULT_MAX_ITEMS,
            deduplicate: DEFAULT_DEDUPLICATE,
            database: PathBuf::from("atomlens.db"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSection {
    pub cache_timeout_secs: u64,
    pub max_cache_size: usize,
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            cache_timeout_secs: DEFAULT_CACHE_TIMEOUT_SECS,
            max_cache_size: DEFAULT_MAX_CACHE_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Allowed origins. Empty means localhost only; `["*"]` allows all.
    pub cors_origins: Vec<String>,
    /// Requests per second, `0` disables rate limiting.
    pub rate_limit: u32,
    /// Never read from the file; only `ATOMLENS_API_KEY` sets it.
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8787,
            cors_origins: Vec::new(),
            rate_limit: 100,
            api_key: None,
        }
    }
}

impl ServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// =============================================================================
// ROOT CONFIG
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub index: IndexConfig,
    pub queue: QueueSection,
    pub search: SearchSection,
    pub server: ServerConfig,
}

impl Config {
    /// Load configuration.
    ///
    /// An explicit `path` must exist. Without one, `atomlens.toml` in the
    /// working directory is used if present, defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, AppError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self, AppError> {
        toml::from_str(raw).map_err(|e| AppError::Config(e.to_string()))
    }

    /// Apply `ATOMLENS_*` overrides from `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_empty("ATOMLENS_INDEX_URL") {
            self.index.endpoint = url;
        }
        if let Some(db) = non_empty("ATOMLENS_DATABASE") {
            self.queue.database = PathBuf::from(db);
        }
        if let Some(key) = non_empty("ATOMLENS_API_KEY") {
            self.server.api_key = Some(key);
        }
        if let Some(origins) = non_empty("ATOMLENS_CORS_ORIGINS") {
            self.server.cors_origins = origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Some(limit) = non_empty("ATOMLENS_RATE_LIMIT") {
            match limit.trim().parse() {
                Ok(rps) => self.server.rate_limit = rps,
                Err(_) => tracing::warn!(value = %limit, "ignoring invalid ATOMLENS_RATE_LIMIT"),
            }
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.index.endpoint.trim().is_empty() {
            return Err(AppError::Config("index.endpoint must be non-empty".to_string()));
        }
        if self.search.max_cache_size == 0 {
            return Err(AppError::Config(
                "search.max_cache_size must be greater than 0".to_string(),
            ));
        }
        if self.search.cache_timeout_secs == 0 {
            return Err(AppError::Config(
                "search.cache_timeout_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn queue_config(&self) -> QueueConfig {
        QueueConfig {
            max_items: self.queue.max_items,
            deduplicate: self.queue.deduplicate,
        }
    }

    pub fn search_config(&self) -> SearchConfig {
        SearchConfig {
            cache_timeout: Duration::from_secs(self.search.cache_timeout_secs),
            max_cache_size: self.search.max_cache_size,
        }
    }

    pub fn index_timeout(&self) -> Duration {
        Duration::from_secs(self.index.timeout_secs)
    }

    /// Render as TOML, for `atomlens init`.
    pub fn to_toml(&self) -> Result<String, AppError> {
        toml::to_string_pretty(self).map_err(|e| AppError::Config(e.to_string()))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn partial_file_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            [queue]
            max_items = 5

            [server]
            port = 9000
            "#,
        )
        .expect("parse");
        assert_eq!(config.queue.max_items, 5);
        assert!(config.queue.deduplicate);
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.search.max_cache_size, DEFAULT_MAX_CACHE_SIZE);
    }

    #[test]
    fn env_overrides_win() {
        let env: BTreeMap<&str, &str> = [
            ("ATOMLENS_INDEX_URL", "https://index.example/graphql"),
            ("ATOMLENS_CORS_ORIGINS", "https://a.example, https://b.example"),
            ("ATOMLENS_RATE_LIMIT", "0"),
            ("ATOMLENS_API_KEY", "secret"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|k| env.get(k).map(|v| (*v).to_string()));

        assert_eq!(config.index.endpoint, "https://index.example/graphql");
        assert_eq!(
            config.server.cors_origins,
            vec!["https://a.example", "https://b.example"]
        );
        assert_eq!(config.server.rate_limit, 0);
        assert_eq!(config.server.api_key.as_deref(), Some("secret"));
    }

    #[test]
    fn invalid_rate_limit_ignored() {
        let mut config = Config::default();
        config.apply_overrides(|k| (k == "ATOMLENS_RATE_LIMIT").then(|| "fast".to_string()));
        assert_eq!(config.server.rate_limit, 100);
    }

    #[test]
    fn validation_rejects_zero_cache() {
        let mut config = Config::default();
        config.search.max_cache_size = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.index.endpoint = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rendered_config_parses_back() {
        let config = Config::default();
        let rendered = config.to_toml().expect("render");
        assert_eq!(Config::from_toml(&rendered).expect("parse"), config);
    }

    #[test]
    fn malformed_file_is_config_error() {
        assert!(matches!(
            Config::from_toml("[queue\nmax_items = "),
            Err(AppError::Config(_))
        ));
    }
}
