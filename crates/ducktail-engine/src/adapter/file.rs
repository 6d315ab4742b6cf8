//! File-backed sources and targets (Parquet, CSV).
//!
//! Files need no attachment and have no schema to reconcile. A file
//! target always materializes the current batch as the whole file.

use ducktail_types::{
    ConfigError, FileFormat, SchemaEvolution, SourceSpec, TargetSpec, WriteMode,
};

use crate::adapter::sql::quote_literal;
use crate::adapter::{SourceAdapter, TargetAdapter};
use crate::errors::PipelineError;
use crate::session::SqlSession;

fn format_of(kind: ducktail_types::BackendKind, owner: &'static str) -> Result<FileFormat, ConfigError> {
    kind.file_format().ok_or_else(|| ConfigError::Unsupported {
        owner,
        type_tag: kind.as_str().into(),
        what: "file access".into(),
    })
}

/// Source reading a Parquet or CSV path (globs and remote URLs included).
#[derive(Debug, Clone)]
pub struct FileSource {
    spec: SourceSpec,
    format: FileFormat,
    path: String,
}

impl FileSource {
    /// # Errors
    ///
    /// Returns the spec's first [`ConfigError`].
    pub fn new(spec: SourceSpec) -> Result<Self, ConfigError> {
        spec.validate()?;
        let format = format_of(spec.kind, "source")?;
        let path = spec
            .path
            .clone()
            .ok_or_else(|| ConfigError::missing("source", spec.kind.as_str(), "path"))?;
        Ok(Self { spec, format, path })
    }
}

impl SourceAdapter for FileSource {
    fn spec(&self) -> &SourceSpec {
        &self.spec
    }

    fn attach(&self, _session: &dyn SqlSession) -> Result<(), PipelineError> {
        Ok(())
    }

    fn relation_expression(&self) -> String {
        let path = quote_literal(&self.path);
        match self.format {
            FileFormat::Parquet => format!("read_parquet({path})"),
            FileFormat::Csv => format!("read_csv_auto({path})"),
        }
    }
}

/// Target writing a single Parquet or CSV file.
#[derive(Debug, Clone)]
pub struct FileTarget {
    spec: TargetSpec,
    format: FileFormat,
    path: String,
}

impl FileTarget {
    /// # Errors
    ///
    /// Returns the spec's first [`ConfigError`]; upsert is rejected.
    pub fn new(spec: TargetSpec) -> Result<Self, ConfigError> {
        spec.validate()?;
        let format = format_of(spec.kind, "target")?;
        let path = spec
            .path
            .clone()
            .ok_or_else(|| ConfigError::missing("target", spec.kind.as_str(), "path"))?;
        if spec.mode == WriteMode::Append {
            tracing::debug!(path = %path, "File targets are rewritten with each batch");
        }
        Ok(Self { spec, format, path })
    }
}

impl TargetAdapter for FileTarget {
    fn spec(&self) -> &TargetSpec {
        &self.spec
    }

    fn attach(&self, _session: &dyn SqlSession) -> Result<(), PipelineError> {
        Ok(())
    }

    fn sync_schema(
        &self,
        _session: &dyn SqlSession,
        _relation: &str,
        evolution: Option<SchemaEvolution>,
    ) -> Result<Vec<String>, PipelineError> {
        if evolution.unwrap_or(self.spec.schema_evolution) == SchemaEvolution::Evolve {
            tracing::debug!("Schema evolution does not apply to file targets");
        }
        Ok(Vec::new())
    }

    fn build_write_statement(&self, relation: &str) -> Result<String, ConfigError> {
        let path = quote_literal(&self.path);
        Ok(match self.format {
            FileFormat::Parquet => format!(
                "COPY (SELECT * FROM {relation}) TO {path} (FORMAT parquet, COMPRESSION {})",
                self.spec.parquet_compression()?.as_str()
            ),
            FileFormat::Csv => {
                format!("COPY (SELECT * FROM {relation}) TO {path} (HEADER, DELIMITER ',')")
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use ducktail_types::BackendKind;

    use super::*;

    #[test]
    fn relation_uses_format_reader() {
        let src = FileSource::new(SourceSpec::file(BackendKind::Parquet, "s3://bucket/*.parquet")).unwrap();
        assert_eq!(src.relation_expression(), "read_parquet('s3://bucket/*.parquet')");
    }

    #[test]
    fn path_quotes_are_escaped() {
        let src = FileSource::new(SourceSpec::file(BackendKind::Csv, "it's.csv")).unwrap();
        assert_eq!(src.relation_expression(), "read_csv_auto('it''s.csv')");
    }

    #[test]
    fn parquet_write_defaults_to_zstd() {
        let tgt = FileTarget::new(TargetSpec::file(BackendKind::Parquet, "out.parquet")).unwrap();
        assert_eq!(
            tgt.build_write_statement("read_csv_auto('in.csv')").unwrap(),
            "COPY (SELECT * FROM read_csv_auto('in.csv')) TO 'out.parquet' (FORMAT parquet, COMPRESSION zstd)"
        );
    }

    #[test]
    fn parquet_write_honours_codec() {
        let mut spec = TargetSpec::file(BackendKind::Parquet, "out.parquet");
        spec.compression = Some("snappy".into());
        let tgt = FileTarget::new(spec).unwrap();
        assert!(tgt
            .build_write_statement("x")
            .unwrap()
            .ends_with("(FORMAT parquet, COMPRESSION snappy)"));
    }

    #[test]
    fn csv_write_has_header() {
        let tgt = FileTarget::new(TargetSpec::file(BackendKind::Csv, "out.csv")).unwrap();
        assert_eq!(
            tgt.build_write_statement("(SELECT 1)").unwrap(),
            "COPY (SELECT * FROM (SELECT 1)) TO 'out.csv' (HEADER, DELIMITER ',')"
        );
    }

    #[test]
    fn schema_sync_is_a_no_op() {
        struct Untouchable;
        impl SqlSession for Untouchable {
            fn execute(&self, sql: &str) -> Result<(), crate::errors::SessionError> {
                panic!("unexpected statement: {sql}")
            }
            fn query(&self, sql: &str) -> Result<Vec<crate::result::Row>, crate::errors::SessionError> {
                panic!("unexpected query: {sql}")
            }
            fn query_scalar(
                &self,
                sql: &str,
            ) -> Result<Option<ducktail_types::WatermarkValue>, crate::errors::SessionError> {
                panic!("unexpected query: {sql}")
            }
        }
        let tgt = FileTarget::new(TargetSpec::file(BackendKind::Csv, "out.csv")).unwrap();
        let issued = tgt
            .sync_schema(&Untouchable, "x", Some(SchemaEvolution::Evolve))
            .unwrap();
        assert!(issued.is_empty());
        tgt.attach(&Untouchable).unwrap();
    }
}
