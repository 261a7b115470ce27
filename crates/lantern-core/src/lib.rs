//! Lantern Core - Core abstractions shared by the Lantern crates
//!
//! This crate defines:
//!
//! - `StatementClient` / `StatementClientFactory` - the remote engine's polling protocol
//! - `QueryResults` and friends - snapshots delivered by that protocol
//! - `LanternError` - the error type used throughout the workspace
//! - `Settings` - TOML configuration

mod error;
pub mod settings;
mod statement;
mod types;

pub use error::*;
pub use settings::{CatalogSettings, QuerySettings, Settings};
pub use statement::*;
pub use types::*;
