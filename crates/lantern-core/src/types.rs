//! Protocol data types exchanged with the remote statement engine

use serde::{Deserialize, Serialize};

/// A single result row as delivered by the engine
pub type Row = Vec<serde_json::Value>;

/// Execution state reported by the engine for a statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryState {
    #[default]
    Queued,
    Planning,
    Starting,
    Running,
    Finishing,
    Finished,
    Failed,
}

impl QueryState {
    /// Whether the engine will report no further progress for the statement
    pub fn is_done(&self) -> bool {
        matches!(self, QueryState::Finished | QueryState::Failed)
    }
}

/// Column metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
}

impl Column {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

/// Progress counters reported with every snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StatementStats {
    pub state: QueryState,
    pub processed_rows: u64,
    pub processed_bytes: u64,
    pub elapsed_time_millis: u64,
}

/// Error reported by the engine inside a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryError {
    pub message: String,
    #[serde(default)]
    pub error_code: i32,
    #[serde(default)]
    pub error_name: Option<String>,
}

/// One intermediate or final snapshot of a running statement.
///
/// `data` only carries the rows delivered with this snapshot, so a consumer
/// that wants the whole result set has to visit every snapshot in turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResults {
    pub id: String,
    #[serde(default)]
    pub columns: Vec<Column>,
    #[serde(default)]
    pub data: Option<Vec<Row>>,
    #[serde(default)]
    pub stats: StatementStats,
    #[serde(default)]
    pub error: Option<QueryError>,
    #[serde(default)]
    pub next_uri: Option<String>,
}

impl QueryResults {
    /// Create an empty snapshot for a statement id
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn with_columns(mut self, columns: Vec<Column>) -> Self {
        self.columns = columns;
        self
    }

    pub fn with_rows(mut self, rows: Vec<Row>) -> Self {
        self.stats.processed_rows += rows.len() as u64;
        self.data = Some(rows);
        self
    }

    pub fn with_state(mut self, state: QueryState) -> Self {
        self.stats.state = state;
        self
    }

    pub fn with_error(mut self, error: QueryError) -> Self {
        self.stats.state = QueryState::Failed;
        self.error = Some(error);
        self
    }

    /// Rows delivered with this snapshot (empty when the engine sent none)
    pub fn rows(&self) -> &[Row] {
        self.data.as_deref().unwrap_or(&[])
    }

    pub fn row_count(&self) -> usize {
        self.rows().len()
    }

    pub fn state(&self) -> QueryState {
        self.stats.state
    }
}

/// Extract the first column of a row as a string, if it is one
pub fn first_column_str(row: &Row) -> Option<&str> {
    row.first().and_then(serde_json::Value::as_str)
}
