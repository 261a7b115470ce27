//! HTTP surface for the Lantern catalog cache
//!
//! [`CatalogService`] builds the cache from [`lantern_core::Settings`] and
//! hands out an axum [`axum::Router`] serving `GET /api/catalog`.

pub mod logging;
pub mod routes;

mod service;

pub use routes::{CatalogRecord, catalog_records, create_catalog_router, list_catalogs};
pub use service::CatalogService;
