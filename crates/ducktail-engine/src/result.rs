//! Run results and timing breakdowns.

use ducktail_types::{PipelineName, WatermarkValue};
use serde::Serialize;

/// One result row, column name to JSON value.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Elapsed seconds per stage. Skipped stages stay at zero.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExecutionMetrics {
    pub count_secs: f64,
    pub sample_secs: f64,
    pub summary_secs: f64,
    pub write_secs: f64,
    pub total_secs: f64,
}

/// Outcome of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    pub pipeline: PipelineName,
    /// Rows in the (filtered) source; `None` when counting is disabled.
    pub rows: Option<u64>,
    pub sample: Option<Vec<Row>>,
    pub summary: Option<Vec<Row>>,
    /// The exact write statement that was committed.
    pub write_statement: String,
    /// ADD COLUMN statements issued during schema sync, in order.
    pub schema_statements: Vec<String>,
    /// Watermark the run filtered on.
    pub previous_watermark: Option<WatermarkValue>,
    /// Highest incremental key value in this batch.
    pub watermark: Option<WatermarkValue>,
    /// Whether `watermark` reached the store.
    pub watermark_persisted: bool,
    pub metrics: ExecutionMetrics,
}

/// Connectivity status for one side of a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckStatus {
    pub ok: bool,
    pub message: String,
    pub hint: Option<String>,
}

impl CheckStatus {
    #[must_use]
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
            hint: None,
        }
    }

    #[must_use]
    pub fn failed(message: impl Into<String>, hint: Option<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
            hint,
        }
    }
}

/// Result of [`check_pipeline`](crate::check::check_pipeline).
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub source: CheckStatus,
    pub target: CheckStatus,
}

impl CheckResult {
    #[must_use]
    pub fn all_ok(&self) -> bool {
        self.source.ok && self.target.ok
    }
}
