//! Scripted statement clients for tests
//!
//! `ScriptedFactory` plays back pre-recorded snapshots instead of talking to a
//! remote engine. Scripts control per-advance latency and failure injection,
//! and an optional gate holds `start_query` open until the test releases it.
//! Counters record how many statements were started, closed and running at
//! once so tests can assert on single-flight behaviour.

use async_trait::async_trait;
use lantern_core::{
    Column, LanternError, QueryResults, QueryState, Result, Row, StatementClient,
    StatementClientFactory,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Semaphore;

/// Build rows holding a single string column
pub fn name_rows(names: &[&str]) -> Vec<Row> {
    names
        .iter()
        .map(|name| vec![serde_json::Value::String(name.to_string())])
        .collect()
}

/// Playback script for one statement
#[derive(Debug, Clone, Default)]
pub struct Script {
    pages: Vec<QueryResults>,
    advance_delay: Duration,
    start_failure: Option<String>,
    advance_failure: Option<(usize, String)>,
}

impl Script {
    /// Play back the given snapshots in order
    pub fn pages(pages: Vec<QueryResults>) -> Self {
        Self {
            pages,
            ..Self::default()
        }
    }

    /// A `n`-page statement whose snapshots carry no rows
    pub fn empty_pages(n: usize) -> Self {
        let pages = (0..n)
            .map(|i| QueryResults::new("scripted").with_state(state_for(i, n)))
            .collect();
        Self::pages(pages)
    }

    /// A statement returning `rows` in a single snapshot between a queued
    /// snapshot and a finished one
    pub fn rows(rows: Vec<Row>) -> Self {
        let columns = vec![Column::new("Catalog", "varchar")];
        Self::pages(vec![
            QueryResults::new("scripted").with_state(QueryState::Queued),
            QueryResults::new("scripted")
                .with_columns(columns.clone())
                .with_rows(rows)
                .with_state(QueryState::Running),
            QueryResults::new("scripted")
                .with_columns(columns)
                .with_state(QueryState::Finished),
        ])
    }

    /// Shorthand for [`Script::rows`] over single-column names
    pub fn names(names: &[&str]) -> Self {
        Self::rows(name_rows(names))
    }

    /// Sleep this long inside every `advance`
    pub fn with_advance_delay(mut self, delay: Duration) -> Self {
        self.advance_delay = delay;
        self
    }

    /// Fail `start_query` with a protocol error
    pub fn failing_start(mut self, message: impl Into<String>) -> Self {
        self.start_failure = Some(message.into());
        self
    }

    /// Fail the `n`th advance (0-based) with a protocol error
    pub fn failing_advance(mut self, n: usize, message: impl Into<String>) -> Self {
        self.advance_failure = Some((n, message.into()));
        self
    }
}

fn state_for(index: usize, total: usize) -> QueryState {
    if index + 1 == total {
        QueryState::Finished
    } else if index == 0 {
        QueryState::Queued
    } else {
        QueryState::Running
    }
}

#[derive(Debug, Default)]
struct Counters {
    starts: AtomicUsize,
    closes: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl Counters {
    fn enter(&self) {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Statement factory replaying [`Script`]s.
///
/// The `n`th started statement uses the `n`th script; once the scripts run out
/// the last one is repeated.
pub struct ScriptedFactory {
    scripts: Vec<Script>,
    counters: Arc<Counters>,
    gate: Option<Arc<Semaphore>>,
    queries: Mutex<Vec<String>>,
}

impl ScriptedFactory {
    pub fn new(script: Script) -> Self {
        Self {
            scripts: vec![script],
            counters: Arc::new(Counters::default()),
            gate: None,
            queries: Mutex::new(Vec::new()),
        }
    }

    /// Append a script for the next started statement
    pub fn then(mut self, script: Script) -> Self {
        self.scripts.push(script);
        self
    }

    /// Hold every `start_query` until a permit is added to `gate`
    pub fn with_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Statements started so far
    pub fn starts(&self) -> usize {
        self.counters.starts.load(Ordering::SeqCst)
    }

    /// Statements released so far
    pub fn closes(&self) -> usize {
        self.counters.closes.load(Ordering::SeqCst)
    }

    /// Statements currently started and not yet released
    pub fn active(&self) -> usize {
        self.counters.active.load(Ordering::SeqCst)
    }

    /// Highest number of statements that were ever active at once
    pub fn max_active(&self) -> usize {
        self.counters.max_active.load(Ordering::SeqCst)
    }

    /// Query texts submitted so far
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().clone()
    }

    fn script_for(&self, n: usize) -> Script {
        let index = n.min(self.scripts.len().saturating_sub(1));
        self.scripts.get(index).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl StatementClientFactory for ScriptedFactory {
    async fn start_query(&self, query: &str) -> Result<Box<dyn StatementClient>> {
        let n = self.counters.starts.fetch_add(1, Ordering::SeqCst);
        self.queries.lock().push(query.to_string());
        self.counters.enter();

        if let Some(gate) = &self.gate {
            match gate.acquire().await {
                Ok(permit) => permit.forget(),
                Err(_) => {
                    self.counters.exit();
                    return Err(LanternError::Protocol("gate closed".into()));
                }
            }
        }

        let script = self.script_for(n);
        if let Some(message) = script.start_failure {
            self.counters.exit();
            return Err(LanternError::Protocol(message));
        }

        Ok(Box::new(ScriptedClient {
            pages: script.pages,
            index: 0,
            advance_delay: script.advance_delay,
            advance_failure: script.advance_failure,
            advances: 0,
            closed: false,
            counters: Arc::clone(&self.counters),
            placeholder: QueryResults::new("scripted"),
        }))
    }
}

/// Client handed out by [`ScriptedFactory`]
pub struct ScriptedClient {
    pages: Vec<QueryResults>,
    index: usize,
    advance_delay: Duration,
    advance_failure: Option<(usize, String)>,
    advances: usize,
    closed: bool,
    counters: Arc<Counters>,
    placeholder: QueryResults,
}

#[async_trait]
impl StatementClient for ScriptedClient {
    fn is_valid(&self) -> bool {
        !self.closed && self.index < self.pages.len()
    }

    async fn advance(&mut self) -> Result<bool> {
        if !self.advance_delay.is_zero() {
            tokio::time::sleep(self.advance_delay).await;
        }
        let attempt = self.advances;
        self.advances += 1;
        if let Some((n, message)) = &self.advance_failure {
            if *n == attempt {
                return Err(LanternError::Protocol(message.clone()));
            }
        }
        self.index += 1;
        Ok(self.index < self.pages.len())
    }

    fn current(&self) -> &QueryResults {
        let last = self.pages.len().saturating_sub(1);
        self.pages.get(self.index.min(last)).unwrap_or(&self.placeholder)
    }

    fn final_results(&self) -> Option<QueryResults> {
        if self.index < self.pages.len() {
            return None;
        }
        self.pages
            .last()
            .cloned()
            .map(|page| page.with_state(QueryState::Finished))
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.counters.closes.fetch_add(1, Ordering::SeqCst);
            self.counters.exit();
        }
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

/// Initialize test logging once per process
pub fn init_test_logging() {
    use std::sync::Once;
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .finish();

        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}
