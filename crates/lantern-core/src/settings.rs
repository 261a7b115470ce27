//! TOML settings file
//!
//! ```toml
//! [query]
//! timeout_secs = 1800
//!
//! [catalog]
//! refresh_interval_minutes = 2
//! loader_timeout_secs = 60
//! excluded_catalogs = ["system"]
//! ```
//!
//! Every field has a default, so an empty file is a valid configuration.

use crate::{LanternError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default wall-clock budget for interactive queries
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(60 * 30);
/// Default wall-clock budget for background metadata loads
pub const DEFAULT_LOADER_TIMEOUT: Duration = Duration::from_secs(60);
/// Default time after a successful load before an entry is refreshed
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(2 * 60);
pub const DEFAULT_BOOTSTRAP_QUERY: &str = "SHOW CATALOGS";

/// Top-level settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub query: QuerySettings,
    pub catalog: CatalogSettings,
}

/// Settings for interactive query execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuerySettings {
    pub timeout_secs: u64,
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_QUERY_TIMEOUT.as_secs(),
        }
    }
}

impl QuerySettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Settings for the catalog metadata cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogSettings {
    pub refresh_interval_minutes: u64,
    pub loader_timeout_secs: u64,
    /// Catalog names dropped from every cache entry
    pub excluded_catalogs: Vec<String>,
    pub bootstrap_query: String,
    /// Worker threads in the background refresh pool
    pub worker_threads: usize,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            refresh_interval_minutes: DEFAULT_REFRESH_INTERVAL.as_secs() / 60,
            loader_timeout_secs: DEFAULT_LOADER_TIMEOUT.as_secs(),
            excluded_catalogs: vec!["system".to_string()],
            bootstrap_query: DEFAULT_BOOTSTRAP_QUERY.to_string(),
            worker_threads: 2,
        }
    }
}

impl CatalogSettings {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_minutes.saturating_mul(60))
    }

    pub fn loader_timeout(&self) -> Duration {
        Duration::from_secs(self.loader_timeout_secs)
    }
}

impl Settings {
    /// Parse settings from TOML text and validate them
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(content)
            .map_err(|e| LanternError::Configuration(format!("invalid settings: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "loading settings");
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Reject values that would disable timeouts or the refresh pool
    pub fn validate(&self) -> Result<()> {
        if self.query.timeout_secs == 0 {
            return Err(LanternError::Configuration(
                "query.timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.catalog.loader_timeout_secs == 0 {
            return Err(LanternError::Configuration(
                "catalog.loader_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.catalog.refresh_interval_minutes == 0 {
            return Err(LanternError::Configuration(
                "catalog.refresh_interval_minutes must be greater than zero".to_string(),
            ));
        }
        if self.catalog.worker_threads == 0 {
            return Err(LanternError::Configuration(
                "catalog.worker_threads must be greater than zero".to_string(),
            ));
        }
        if self.catalog.bootstrap_query.trim().is_empty() {
            return Err(LanternError::Configuration(
                "catalog.bootstrap_query must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_empty_file_uses_defaults() {
        let settings = Settings::from_toml_str("").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.query.timeout(), DEFAULT_QUERY_TIMEOUT);
        assert_eq!(settings.catalog.loader_timeout(), DEFAULT_LOADER_TIMEOUT);
        assert_eq!(settings.catalog.refresh_interval(), DEFAULT_REFRESH_INTERVAL);
        assert_eq!(settings.catalog.excluded_catalogs, vec!["system".to_string()]);
    }

    #[test]
    fn test_loader_timeout_tighter_than_query_timeout() {
        let settings = Settings::default();
        assert!(settings.catalog.loader_timeout() < settings.query.timeout());
    }

    #[test]
    fn test_partial_override() {
        let settings = Settings::from_toml_str(
            r#"
            [catalog]
            refresh_interval_minutes = 5
            excluded_catalogs = ["system", "jmx"]
            "#,
        )
        .unwrap();

        assert_eq!(settings.catalog.refresh_interval(), Duration::from_secs(300));
        assert_eq!(settings.catalog.excluded_catalogs, vec!["system", "jmx"]);
        assert_eq!(settings.catalog.loader_timeout_secs, 60);
        assert_eq!(settings.query, QuerySettings::default());
    }

    #[test]
    fn test_huge_refresh_interval_saturates() {
        let settings = Settings::from_toml_str(
            "[catalog]\nrefresh_interval_minutes = 9223372036854775807\n",
        )
        .unwrap();

        assert_eq!(settings.catalog.refresh_interval(), Duration::from_secs(u64::MAX));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err = Settings::from_toml_str("[query]\ntimeout_secs = 0\n").unwrap_err();
        assert!(matches!(err, LanternError::Configuration(_)));
    }

    #[test]
    fn test_zero_workers_rejected() {
        let err = Settings::from_toml_str("[catalog]\nworker_threads = 0\n").unwrap_err();
        assert!(err.to_string().contains("worker_threads"));
    }

    #[test]
    fn test_malformed_toml_rejected() {
        let err = Settings::from_toml_str("[catalog\n").unwrap_err();
        assert!(matches!(err, LanternError::Configuration(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[query]\ntimeout_secs = 90").unwrap();

        let settings = Settings::load(file.path()).unwrap();
        assert_eq!(settings.query.timeout(), Duration::from_secs(90));
    }

    #[test]
    fn test_load_missing_file() {
        let err = Settings::load("/nonexistent/lantern.toml").unwrap_err();
        assert!(matches!(err, LanternError::Io(_)));
    }
}
