//! Polling query executor
//!
//! Drives one statement to completion by alternating between applying a
//! visitor to the current snapshot and advancing the statement handle. The
//! wall-clock budget is checked before every visit, so a slow engine can
//! overshoot it by at most one round-trip.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::Duration;

use lantern_core::settings::DEFAULT_QUERY_TIMEOUT;
use lantern_core::{LanternError, QueryResults, Result, StatementClient, StatementClientFactory};
use once_cell::sync::OnceCell;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Releases the wrapped statement when dropped, whichever way the polling
/// loop exits (including the executing future being dropped mid-advance).
struct StatementGuard {
    client: Box<dyn StatementClient>,
}

impl Deref for StatementGuard {
    type Target = dyn StatementClient;

    fn deref(&self) -> &Self::Target {
        &*self.client
    }
}

impl DerefMut for StatementGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.client
    }
}

impl Drop for StatementGuard {
    fn drop(&mut self) {
        self.client.close();
    }
}

/// Runs a single query against the remote engine.
///
/// An executor is built for one query and thrown away afterwards. The final
/// result set is captured once, on successful completion, and can be read
/// from any thread through [`QueryExecutor::final_results`].
pub struct QueryExecutor {
    factory: Arc<dyn StatementClientFactory>,
    timeout: Duration,
    query: String,
    cancel: CancellationToken,
    final_results: OnceCell<QueryResults>,
}

impl QueryExecutor {
    /// Create an executor with the interactive default timeout (30 minutes)
    pub fn new(factory: Arc<dyn StatementClientFactory>, query: impl Into<String>) -> Self {
        Self::with_timeout(factory, DEFAULT_QUERY_TIMEOUT, query)
    }

    /// Create an executor with an explicit wall-clock budget
    pub fn with_timeout(
        factory: Arc<dyn StatementClientFactory>,
        timeout: Duration,
        query: impl Into<String>,
    ) -> Self {
        Self {
            factory,
            timeout,
            query: query.into(),
            cancel: CancellationToken::new(),
            final_results: OnceCell::new(),
        }
    }

    /// Stop polling once `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that stops the polling loop at its next iteration
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Terminal result set, once an execution has completed successfully
    pub fn final_results(&self) -> Option<&QueryResults> {
        self.final_results.get()
    }

    /// Execute the query, applying `visitor` to every snapshot.
    ///
    /// Returns the value produced by the last visitor call, or `None` if the
    /// statement never produced a snapshot. Fails with
    /// [`LanternError::QueryTimeout`] once the budget is exceeded; failures
    /// from the statement handle are returned as-is. The handle is released
    /// before this returns in every case.
    #[tracing::instrument(
        skip(self, visitor),
        fields(query = %self.query.chars().take(100).collect::<String>())
    )]
    pub async fn execute_with<T, F>(&self, mut visitor: F) -> Result<Option<T>>
    where
        F: FnMut(&dyn StatementClient) -> T,
    {
        let started = Instant::now();
        tracing::info!(timeout_ms = self.timeout.as_millis() as u64, "query started");

        let result = self.poll(&mut visitor, started).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match &result {
            Ok(_) => {
                tracing::info!(
                    elapsed_ms,
                    final_rows = self.final_results().map(|r| r.row_count()),
                    "query finished"
                );
            }
            Err(e) => {
                tracing::info!(elapsed_ms, error = %e, "query failed");
            }
        }
        result
    }

    async fn poll<T, F>(&self, visitor: &mut F, started: Instant) -> Result<Option<T>>
    where
        F: FnMut(&dyn StatementClient) -> T,
    {
        let mut client = StatementGuard {
            client: self.factory.start_query(&self.query).await?,
        };
        let mut latest = None;

        while client.is_valid() && !self.cancel.is_cancelled() {
            let elapsed = started.elapsed();
            if elapsed > self.timeout {
                return Err(LanternError::QueryTimeout {
                    elapsed_ms: elapsed.as_millis() as u64,
                });
            }

            latest = Some(visitor(&*client));
            client.advance().await?;
        }

        if self.cancel.is_cancelled() {
            tracing::debug!("polling stopped by cancellation");
        }

        if let Some(results) = client.final_results() {
            if self.final_results.set(results).is_err() {
                tracing::warn!("final results already captured, executor was reused");
            }
        }

        Ok(latest)
    }
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
