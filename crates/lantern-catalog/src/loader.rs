//! Background loader that lists catalogs on the remote engine

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lantern_core::{LanternError, Result, Row, StatementClientFactory, first_column_str};
use lantern_query::QueryExecutor;

use crate::config::CatalogCacheConfig;
use crate::refresh::CacheLoader;

/// Catalog names from the first column of `rows`, in order, without the
/// excluded ones. Rows whose first value is not a string are skipped.
pub fn filter_catalog_names(rows: &[Row], excluded: &HashSet<String>) -> Vec<String> {
    rows.iter()
        .filter_map(first_column_str)
        .filter(|name| !excluded.contains(*name))
        .map(str::to_string)
        .collect()
}

/// Runs the bootstrap query with a fresh executor for every load
pub struct CatalogLoader {
    factory: Arc<dyn StatementClientFactory>,
    bootstrap_query: String,
    timeout: Duration,
    excluded: HashSet<String>,
}

impl CatalogLoader {
    pub fn new(factory: Arc<dyn StatementClientFactory>, config: &CatalogCacheConfig) -> Self {
        Self {
            factory,
            bootstrap_query: config.bootstrap_query.clone(),
            timeout: config.loader_timeout,
            excluded: config.excluded_catalogs.clone(),
        }
    }

    pub fn bootstrap_query(&self) -> &str {
        &self.bootstrap_query
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl CacheLoader for CatalogLoader {
    type Value = Vec<String>;

    async fn load(&self, key: &str) -> Result<Vec<String>> {
        let executor = QueryExecutor::with_timeout(
            Arc::clone(&self.factory),
            self.timeout,
            self.bootstrap_query.as_str(),
        );

        let mut names = Vec::new();
        let outcome = executor
            .execute_with(|client| {
                names.extend(filter_catalog_names(client.current().rows(), &self.excluded));
            })
            .await;

        match outcome {
            Ok(_) => {
                tracing::info!(key = %key, catalogs = names.len(), "loaded catalog list");
                Ok(names)
            }
            Err(e) if e.is_timeout() => {
                tracing::warn!(
                    key = %key,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "catalog listing timed out"
                );
                Err(LanternError::BackgroundLoad(e.to_string()))
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "catalog listing failed");
                Err(LanternError::BackgroundLoad(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lantern_test_support::{Script, ScriptedFactory, name_rows};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn excluded() -> HashSet<String> {
        HashSet::from(["system".to_string()])
    }

    #[test]
    fn test_filter_drops_excluded_and_keeps_order() {
        let rows = name_rows(&["hive", "system", "memory"]);
        assert_eq!(
            filter_catalog_names(&rows, &excluded()),
            vec!["hive".to_string(), "memory".to_string()]
        );
    }

    #[test]
    fn test_filter_skips_non_string_values() {
        let rows = vec![vec![json!("tpch")], vec![json!(42)], vec![], vec![json!(null)]];
        assert_eq!(filter_catalog_names(&rows, &excluded()), vec!["tpch".to_string()]);
    }

    #[tokio::test]
    async fn test_load_collects_names_across_snapshots() {
        let factory = Arc::new(ScriptedFactory::new(Script::names(&[
            "hive", "system", "memory",
        ])));
        let loader = CatalogLoader::new(factory.clone(), &CatalogCacheConfig::default());

        let names = loader.load("catalogs").await.unwrap();

        assert_eq!(names, vec!["hive".to_string(), "memory".to_string()]);
        assert_eq!(factory.queries(), vec!["SHOW CATALOGS".to_string()]);
        assert_eq!(factory.active(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_timeout_becomes_background_error() {
        let factory = Arc::new(ScriptedFactory::new(
            Script::names(&["hive"]).with_advance_delay(Duration::from_secs(40)),
        ));
        let config = CatalogCacheConfig::default().with_loader_timeout(Duration::from_secs(60));
        let loader = CatalogLoader::new(factory.clone(), &config);

        let err = loader.load("catalogs").await.unwrap_err();

        assert!(matches!(err, LanternError::BackgroundLoad(_)));
        assert_eq!(factory.active(), 0);
    }

    #[tokio::test]
    async fn test_load_failure_becomes_background_error() {
        let factory = Arc::new(ScriptedFactory::new(
            Script::names(&["hive"]).failing_start("connection refused"),
        ));
        let loader = CatalogLoader::new(factory, &CatalogCacheConfig::default());

        let err = loader.load("catalogs").await.unwrap_err();

        match err {
            LanternError::BackgroundLoad(message) => assert!(message.contains("connection refused")),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
