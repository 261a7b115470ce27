//! Lantern Query - Polling query execution
//!
//! This crate runs statements against the remote engine through the
//! incremental `StatementClient` protocol, enforcing a wall-clock budget and
//! capturing the final result set.

mod executor;

pub use executor::QueryExecutor;
pub use tokio_util::sync::CancellationToken;
