//! DuckDB-backed pipeline engine for ducktail.

#![warn(clippy::pedantic)]

pub mod adapter;
pub mod check;
pub(crate) mod checkpoint;
pub mod config;
pub mod errors;
pub mod execution;
pub mod result;
pub mod runner;
pub mod session;

// Re-export public API for convenience
pub use check::check_pipeline;
pub use errors::{AttachError, AttachErrorKind, PipelineError, PipelineExecutionError, SessionError};
pub use execution::{RunState, Stage};
pub use result::{CheckResult, CheckStatus, ExecutionMetrics, ExecutionResult, Row};
pub use runner::PipelineRunner;
pub use session::{DuckDbSessionFactory, EngineSession, EngineSettings, SessionFactory, SqlSession};
