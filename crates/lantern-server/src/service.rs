//! Application wiring for the catalog cache

use std::path::Path;
use std::sync::Arc;

use axum::Router;
use lantern_catalog::{CATALOGS_KEY, CatalogCache, CatalogCacheConfig};
use lantern_core::{Result, Settings, StatementClientFactory};
use lantern_query::QueryExecutor;

use crate::routes::create_catalog_router;

/// Owns the catalog cache for the lifetime of the process.
///
/// Starting the service creates the cache and its refresh pool and schedules
/// the first catalog load. Shutting it down (or dropping it) stops the pool.
pub struct CatalogService {
    settings: Settings,
    factory: Arc<dyn StatementClientFactory>,
    cache: Arc<CatalogCache>,
}

impl CatalogService {
    pub fn start(settings: Settings, factory: Arc<dyn StatementClientFactory>) -> Result<Self> {
        settings.validate()?;

        let config = CatalogCacheConfig::from(&settings.catalog);
        let cache = Arc::new(CatalogCache::new(Arc::clone(&factory), config)?);
        cache.populate(CATALOGS_KEY);

        tracing::info!(
            query_timeout_secs = settings.query.timeout_secs,
            "catalog service started"
        );

        Ok(Self {
            settings,
            factory,
            cache,
        })
    }

    /// Start from a TOML settings file
    pub fn from_config_file(
        path: impl AsRef<Path>,
        factory: Arc<dyn StatementClientFactory>,
    ) -> Result<Self> {
        let settings = Settings::load(path)?;
        Self::start(settings, factory)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn cache(&self) -> &Arc<CatalogCache> {
        &self.cache
    }

    /// Executor for an interactive query, bounded by the configured query timeout
    pub fn query_executor(&self, query: impl Into<String>) -> QueryExecutor {
        QueryExecutor::with_timeout(
            Arc::clone(&self.factory),
            self.settings.query.timeout(),
            query,
        )
    }

    pub fn router(&self) -> Router {
        create_catalog_router(Arc::clone(&self.cache))
    }

    /// Stop the refresh pool, abandoning loads in flight
    pub fn shutdown(&self) {
        tracing::info!("catalog service shutting down");
        self.cache.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lantern_core::LanternError;
    use lantern_test_support::{Script, ScriptedFactory};
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use std::time::{Duration, Instant};

    fn factory() -> Arc<ScriptedFactory> {
        Arc::new(ScriptedFactory::new(Script::names(&["hive", "system"])))
    }

    #[test]
    fn test_start_populates_catalogs() {
        let factory = factory();
        let service = CatalogService::start(Settings::default(), factory.clone()).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while service.cache().entry(CATALOGS_KEY).get().is_none() {
            assert!(Instant::now() < deadline, "catalogs never loaded");
            std::thread::sleep(Duration::from_millis(5));
        }

        let snapshot = service.cache().snapshot();
        assert_eq!(
            snapshot.get(CATALOGS_KEY).map(|names| names.to_vec()),
            Some(vec!["hive".to_string()])
        );
        assert_eq!(factory.starts(), 1);
        service.shutdown();
        assert!(service.cache().is_closed());
    }

    #[test]
    fn test_start_rejects_invalid_settings() {
        let mut settings = Settings::default();
        settings.catalog.worker_threads = 0;

        let err = CatalogService::start(settings, factory()).err();

        assert!(matches!(err, Some(LanternError::Configuration(_))));
    }

    #[test]
    fn test_settings_flow_into_executor_and_cache() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[query]\ntimeout_secs = 90\n\n[catalog]\nloader_timeout_secs = 5\nexcluded_catalogs = [\"system\", \"jmx\"]"
        )
        .unwrap();

        let service = CatalogService::from_config_file(file.path(), factory()).unwrap();

        let executor = service.query_executor("SELECT 1");
        assert_eq!(executor.timeout(), Duration::from_secs(90));
        let config = service.cache().config();
        assert_eq!(config.loader_timeout, Duration::from_secs(5));
        assert!(config.is_excluded("jmx"));
        service.shutdown();
    }
}
