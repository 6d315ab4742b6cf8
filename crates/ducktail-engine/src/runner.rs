//! Pipeline runner.
//!
//! Drives one run through its lifecycle: build adapters, open a session,
//! attach, reconcile schema, resolve the incremental filter, run the
//! optional profiling stages, write inside a transaction, then advance the
//! watermark. Every statement is issued from the calling thread, one at a
//! time.

use std::sync::Arc;
use std::time::Instant;

use ducktail_state::WatermarkStore;
use ducktail_types::{PipelineName, RuntimeOptions, SourceSpec, TargetSpec, WatermarkValue};

use crate::adapter::{self, SourceAdapter};
use crate::checkpoint::{load_watermark, persist_watermark};
use crate::errors::{PipelineError, PipelineExecutionError};
use crate::execution::{RunState, Stage};
use crate::result::{ExecutionMetrics, ExecutionResult, Row};
use crate::session::{SessionFactory, SqlSession};

/// Everything needed to run one named pipeline.
pub struct PipelineRunner {
    name: PipelineName,
    source: SourceSpec,
    target: TargetSpec,
    options: RuntimeOptions,
    sessions: Arc<dyn SessionFactory>,
    store: Arc<dyn WatermarkStore>,
}

impl PipelineRunner {
    #[must_use]
    pub fn new(
        name: impl Into<PipelineName>,
        source: SourceSpec,
        target: TargetSpec,
        options: RuntimeOptions,
        sessions: Arc<dyn SessionFactory>,
        store: Arc<dyn WatermarkStore>,
    ) -> Self {
        Self {
            name: name.into(),
            source,
            target,
            options,
            sessions,
            store,
        }
    }

    /// Execute the pipeline once.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineExecutionError`] wrapping the first failure and the
    /// last state reached. No partial result is returned; the watermark is
    /// untouched unless the write committed.
    pub fn run(&self) -> Result<ExecutionResult, PipelineExecutionError> {
        let started = Instant::now();
        tracing::info!(
            pipeline = %self.name,
            source = %self.source.kind,
            target = %self.target.kind,
            mode = %self.target.mode,
            "Starting pipeline run"
        );

        let mut state = RunState::Init;
        match self.execute(&mut state, started) {
            Ok(result) => {
                tracing::info!(
                    pipeline = %self.name,
                    rows = ?result.rows,
                    watermark = ?result.watermark,
                    duration_secs = result.metrics.total_secs,
                    "Pipeline run completed"
                );
                Ok(result)
            }
            Err(source) => {
                tracing::error!(
                    pipeline = %self.name,
                    state = %state,
                    error = %source,
                    "Pipeline run failed"
                );
                Err(PipelineExecutionError {
                    pipeline: self.name.clone(),
                    state,
                    source,
                })
            }
        }
    }

    fn advance(&self, state: &mut RunState, next: RunState) {
        tracing::debug!(pipeline = %self.name, from = %state, to = %next, "State transition");
        *state = next;
    }

    fn execute(
        &self,
        state: &mut RunState,
        started: Instant,
    ) -> Result<ExecutionResult, PipelineError> {
        self.options.validate()?;
        let source = adapter::source_adapter(&self.source)?;
        let target = adapter::target_adapter(&self.target)?;
        self.advance(state, RunState::AdaptersReady);

        let session = self.sessions.open(&self.options)?;
        let session = session.as_ref();
        source.attach(session)?;
        target.attach(session)?;
        self.advance(state, RunState::Attached);

        let base = source.relation_expression();
        tracing::debug!(pipeline = %self.name, relation = %base, "Resolved source relation");
        let schema_statements =
            target.sync_schema(session, &base, self.options.schema_evolution)?;
        self.advance(state, RunState::SchemaSynced);

        let previous_watermark = if self.options.skips_watermark() {
            tracing::info!(pipeline = %self.name, "Bypassing stored watermark");
            None
        } else if source.incremental_key().is_some() {
            load_watermark(self.store.as_ref(), &self.name)
        } else {
            None
        };
        let filtered = source.incremental_expression(&base, previous_watermark.as_ref());
        self.advance(state, RunState::FilterResolved);

        let mut metrics = ExecutionMetrics::default();
        let rows = if self.options.compute_counts {
            Some(timed(&mut metrics.count_secs, || count_rows(session, &filtered))?)
        } else {
            None
        };
        let sample = if self.options.sample_data {
            let sql = format!("SELECT * FROM {filtered} LIMIT {}", self.options.sample_rows);
            Some(timed(&mut metrics.sample_secs, || {
                run_stage(session, Stage::Sample, &sql)
            })?)
        } else {
            None
        };
        let summary = if self.options.compute_summary {
            let sql = format!("SUMMARIZE SELECT * FROM {filtered}");
            Some(timed(&mut metrics.summary_secs, || {
                run_stage(session, Stage::Summary, &sql)
            })?)
        } else {
            None
        };
        let watermark = self.max_watermark(source.as_ref(), session, &filtered);
        self.advance(state, RunState::StagesExecuted);

        let write_statement = target.build_write_statement(&filtered)?;
        timed(&mut metrics.write_secs, || {
            write_in_transaction(session, &write_statement)
        })?;
        self.advance(state, RunState::WriteCommitted);

        let watermark_persisted = match &watermark {
            Some(value) => persist_watermark(self.store.as_ref(), &self.name, value),
            None => false,
        };
        self.advance(state, RunState::WatermarkPersisted);

        metrics.total_secs = started.elapsed().as_secs_f64();
        self.advance(state, RunState::Done);

        Ok(ExecutionResult {
            pipeline: self.name.clone(),
            rows,
            sample,
            summary,
            write_statement,
            schema_statements,
            previous_watermark,
            watermark,
            watermark_persisted,
            metrics,
        })
    }

    /// `MAX(key)` over `filtered`; failures are logged and yield `None`.
    fn max_watermark(
        &self,
        source: &dyn SourceAdapter,
        session: &dyn SqlSession,
        filtered: &str,
    ) -> Option<WatermarkValue> {
        let key = source.incremental_key()?;
        match session.query_scalar(&format!("SELECT MAX({key}) FROM {filtered}")) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(pipeline = %self.name, key, error = %e, "Could not compute new watermark");
                None
            }
        }
    }
}

fn timed<T>(
    slot: &mut f64,
    f: impl FnOnce() -> Result<T, PipelineError>,
) -> Result<T, PipelineError> {
    let start = Instant::now();
    let out = f();
    *slot = start.elapsed().as_secs_f64();
    out
}

fn count_rows(session: &dyn SqlSession, filtered: &str) -> Result<u64, PipelineError> {
    let stage_err = |message: String| PipelineError::Stage {
        stage: Stage::Count,
        source: crate::errors::SessionError::new(message),
    };
    let value = session
        .query_scalar(&format!("SELECT COUNT(*) FROM {filtered}"))
        .map_err(|source| PipelineError::Stage {
            stage: Stage::Count,
            source,
        })?;
    match value {
        Some(WatermarkValue::Int(n)) => {
            u64::try_from(n).map_err(|_| stage_err(format!("negative row count {n}")))
        }
        None => Ok(0),
        Some(other) => Err(stage_err(format!("unexpected row count value {other}"))),
    }
}

fn run_stage(session: &dyn SqlSession, stage: Stage, sql: &str) -> Result<Vec<Row>, PipelineError> {
    session
        .query(sql)
        .map_err(|source| PipelineError::Stage { stage, source })
}

/// Run `statement` in its own transaction, rolling back on any failure.
fn write_in_transaction(session: &dyn SqlSession, statement: &str) -> Result<(), PipelineError> {
    session
        .begin()
        .map_err(|source| PipelineError::Write { source })?;

    let outcome = session.execute(statement).and_then(|()| session.commit());
    if let Err(source) = outcome {
        if let Err(rollback) = session.rollback() {
            tracing::warn!(error = %rollback, "Rollback after failed write also failed");
        }
        return Err(PipelineError::Write { source });
    }
    Ok(())
}
