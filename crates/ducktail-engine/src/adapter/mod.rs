//! Source and target adapters.
//!
//! Each backend family implements [`SourceAdapter`] and/or
//! [`TargetAdapter`]; [`source_adapter`] and [`target_adapter`] pick the
//! variant from the spec's type tag. Adapters validate their spec on
//! construction and hold nothing but that spec, so they are cheap to
//! rebuild for every run.

pub mod attached;
pub mod file;
pub mod schema;
pub mod sql;

use ducktail_types::{ConfigError, SchemaEvolution, SourceSpec, TargetSpec, WatermarkValue};

use crate::errors::PipelineError;
use crate::session::SqlSession;

pub use attached::{AttachedSource, AttachedTarget};
pub use file::{FileSource, FileTarget};

/// Read side of a pipeline.
pub trait SourceAdapter {
    fn spec(&self) -> &SourceSpec;

    /// Make the source visible in `session`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Attach`] when the backend cannot be reached.
    fn attach(&self, session: &dyn SqlSession) -> Result<(), PipelineError>;

    /// Relation expression covering the whole source.
    fn relation_expression(&self) -> String;

    /// Sanitized incremental key column, if configured.
    fn incremental_key(&self) -> Option<&str> {
        self.spec().incremental_key.as_deref()
    }

    /// Narrow `base` to rows past `watermark`.
    ///
    /// Returns `base` unchanged when no key is configured or there is no
    /// watermark yet.
    fn incremental_expression(&self, base: &str, watermark: Option<&WatermarkValue>) -> String {
        match (self.incremental_key(), watermark) {
            (Some(key), Some(value)) => format!(
                "(SELECT * FROM {base} WHERE {key} > {})",
                sql::watermark_literal(value)
            ),
            _ => base.to_string(),
        }
    }
}

/// Write side of a pipeline.
pub trait TargetAdapter {
    fn spec(&self) -> &TargetSpec;

    /// Make the target visible in `session`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Attach`] when the backend cannot be reached.
    fn attach(&self, session: &dyn SqlSession) -> Result<(), PipelineError>;

    /// Reconcile the target's columns with `relation` before writing.
    ///
    /// `evolution` overrides the spec's policy when set. Returns the
    /// schema statements that were executed.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::TargetMissing`],
    /// [`PipelineError::SchemaMismatch`], or
    /// [`PipelineError::SchemaEvolutionFailed`].
    fn sync_schema(
        &self,
        session: &dyn SqlSession,
        relation: &str,
        evolution: Option<SchemaEvolution>,
    ) -> Result<Vec<String>, PipelineError>;

    /// Statement text that writes `relation` into the target.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingUniqueKey`] for upsert without a key.
    fn build_write_statement(&self, relation: &str) -> Result<String, ConfigError>;
}

/// Build the source adapter for `spec.kind`.
///
/// # Errors
///
/// Returns the spec's first [`ConfigError`].
pub fn source_adapter(spec: &SourceSpec) -> Result<Box<dyn SourceAdapter>, ConfigError> {
    if spec.kind.file_format().is_some() {
        Ok(Box::new(FileSource::new(spec.clone())?))
    } else {
        Ok(Box::new(AttachedSource::new(spec.clone())?))
    }
}

/// Build the target adapter for `spec.kind`.
///
/// # Errors
///
/// Returns the spec's first [`ConfigError`].
pub fn target_adapter(spec: &TargetSpec) -> Result<Box<dyn TargetAdapter>, ConfigError> {
    if spec.kind.file_format().is_some() {
        Ok(Box::new(FileTarget::new(spec.clone())?))
    } else {
        Ok(Box::new(AttachedTarget::new(spec.clone())?))
    }
}
