//! HTTP routes over the catalog cache

use std::sync::Arc;

use axum::{Json, Router, extract::State, routing::get};
use lantern_catalog::{CatalogCache, CatalogSnapshot};
use serde::{Deserialize, Serialize};

/// One catalog name as served by `GET /api/catalog`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogRecord {
    pub catalog: String,
}

/// Flatten every cached list into one record per name, in key order
pub fn catalog_records(snapshot: &CatalogSnapshot) -> Vec<CatalogRecord> {
    snapshot
        .values()
        .flat_map(|names| names.iter())
        .map(|name| CatalogRecord {
            catalog: name.clone(),
        })
        .collect()
}

pub fn create_catalog_router(cache: Arc<CatalogCache>) -> Router {
    Router::new()
        .route("/api/catalog", get(list_catalogs))
        .with_state(cache)
}

/// Always answers 200; keys that have not loaded yet are left out
pub async fn list_catalogs(State(cache): State<Arc<CatalogCache>>) -> Json<Vec<CatalogRecord>> {
    let records = catalog_records(&cache.snapshot());
    tracing::debug!(records = records.len(), "serving catalog list");
    Json(records)
}
