//! Statement client traits
//!
//! A statement client is a handle on one statement running inside the remote
//! engine. The engine hands results back incrementally: the client exposes the
//! latest snapshot through [`StatementClient::current`] and fetches the next
//! one with [`StatementClient::advance`]. Transport and authentication live
//! behind these traits.

use crate::{QueryResults, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Handle on one statement executing in the remote engine.
///
/// Clients must be released with [`StatementClient::close`] once the caller is
/// done with them, whatever the outcome. `close` is synchronous so it can run
/// from a drop guard; implementations that need network I/O to release
/// server-side resources should fire it off without waiting.
#[async_trait]
pub trait StatementClient: Send + Sync {
    /// Whether the statement can still produce snapshots
    fn is_valid(&self) -> bool;

    /// Fetch the next snapshot from the engine.
    ///
    /// Returns `Ok(false)` when there is nothing further to fetch. This is the
    /// only operation that may wait on the network.
    async fn advance(&mut self) -> Result<bool>;

    /// The snapshot most recently received
    fn current(&self) -> &QueryResults;

    /// The terminal snapshot once the statement has completed
    fn final_results(&self) -> Option<QueryResults>;

    /// Release the statement. Idempotent.
    fn close(&mut self);

    /// Whether [`StatementClient::close`] has been called
    fn is_closed(&self) -> bool;
}

/// Factory for starting statements against the remote engine
#[async_trait]
pub trait StatementClientFactory: Send + Sync + 'static {
    /// Submit `query` and return a handle positioned on its first snapshot
    async fn start_query(&self, query: &str) -> Result<Box<dyn StatementClient>>;
}

#[async_trait]
impl<T: StatementClientFactory> StatementClientFactory for Arc<T> {
    async fn start_query(&self, query: &str) -> Result<Box<dyn StatementClient>> {
        (**self).start_query(query).await
    }
}
