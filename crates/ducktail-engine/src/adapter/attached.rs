//! Attached-database sources and targets (Postgres, Snowflake, DuckDB).
//!
//! The external database is registered in the session under a sanitized
//! attachment name and then addressed as `<attachment>.<object>`.

use ducktail_types::{
    split_key_list, ConfigError, DbFlavor, SchemaEvolution, SourceSpec, TargetSpec, WriteMode,
};

use crate::adapter::schema;
use crate::adapter::sql::quote_literal;
use crate::adapter::{SourceAdapter, TargetAdapter};
use crate::errors::{AttachError, PipelineError};
use crate::session::SqlSession;

/// Validated pieces every attached adapter needs.
#[derive(Debug, Clone)]
struct Attachment {
    flavor: DbFlavor,
    name: String,
    connection: String,
}

impl Attachment {
    fn new(
        kind: ducktail_types::BackendKind,
        owner: &'static str,
        name: Option<&str>,
        connection: Option<&String>,
    ) -> Result<Self, ConfigError> {
        let flavor = kind.db_flavor().ok_or_else(|| ConfigError::Unsupported {
            owner,
            type_tag: kind.as_str().into(),
            what: "attachment".into(),
        })?;
        let name = name.ok_or_else(|| ConfigError::missing(owner, kind.as_str(), "attachment_name"))?;
        let connection = connection
            .cloned()
            .ok_or_else(|| ConfigError::missing(owner, kind.as_str(), "connection"))?;
        Ok(Self {
            flavor,
            name: name.to_string(),
            connection,
        })
    }

    fn statement(&self) -> String {
        let conn = quote_literal(&self.connection);
        match self.flavor.attach_type() {
            Some(ty) => format!("ATTACH {conn} AS {} (TYPE {ty})", self.name),
            None => format!("ATTACH {conn} AS {}", self.name),
        }
    }

    fn attach(&self, session: &dyn SqlSession) -> Result<(), PipelineError> {
        tracing::info!(attachment = %self.name, flavor = ?self.flavor, "Attaching database");
        session.execute(&self.statement()).map_err(|e| {
            let err = AttachError::from_session(&self.name, &self.connection, &e);
            tracing::error!(attachment = %self.name, kind = %err.kind, "Attach failed");
            PipelineError::Attach(err)
        })
    }
}

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

/// Source reading a table/view or a verbatim query from an attached database.
#[derive(Debug, Clone)]
pub struct AttachedSource {
    spec: SourceSpec,
    attachment: Attachment,
}

impl AttachedSource {
    /// # Errors
    ///
    /// Returns the spec's first [`ConfigError`].
    pub fn new(spec: SourceSpec) -> Result<Self, ConfigError> {
        spec.validate()?;
        let attachment = Attachment::new(
            spec.kind,
            "source",
            spec.attachment_name(),
            spec.connection.as_ref(),
        )?;
        Ok(Self { spec, attachment })
    }
}

impl SourceAdapter for AttachedSource {
    fn spec(&self) -> &SourceSpec {
        &self.spec
    }

    fn attach(&self, session: &dyn SqlSession) -> Result<(), PipelineError> {
        self.attachment.attach(session)
    }

    fn relation_expression(&self) -> String {
        match (&self.spec.object, &self.spec.query) {
            (Some(object), _) => format!("{}.{object}", self.attachment.name),
            (None, Some(query)) => format!("({query})"),
            // validate() guarantees one of the two
            (None, None) => self.attachment.name.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Target
// ---------------------------------------------------------------------------

/// Target table inside an attached database.
#[derive(Debug, Clone)]
pub struct AttachedTarget {
    spec: TargetSpec,
    attachment: Attachment,
    table: String,
}

impl AttachedTarget {
    /// # Errors
    ///
    /// Returns the spec's first [`ConfigError`].
    pub fn new(spec: TargetSpec) -> Result<Self, ConfigError> {
        spec.validate()?;
        let attachment = Attachment::new(
            spec.kind,
            "target",
            spec.attachment_name(),
            spec.connection.as_ref(),
        )?;
        let table = spec
            .table
            .clone()
            .ok_or_else(|| ConfigError::missing("target", spec.kind.as_str(), "table"))?;
        Ok(Self {
            spec,
            attachment,
            table,
        })
    }

    /// `<attachment>.<table>`.
    #[must_use]
    pub fn qualified_table(&self) -> String {
        format!("{}.{}", self.attachment.name, self.table)
    }

    /// Last dotted segment of the table name, used to correlate upserts.
    fn table_ref(&self) -> &str {
        self.table.rsplit('.').next().unwrap_or(&self.table)
    }

    fn upsert_statement(&self, target: &str, relation: &str) -> Result<String, ConfigError> {
        let keys = self
            .spec
            .unique_key
            .as_deref()
            .ok_or(ConfigError::MissingUniqueKey)?;
        let table_ref = self.table_ref();
        let predicate = split_key_list(keys)?
            .iter()
            .map(|k| format!("__src.{k} = {table_ref}.{k}"))
            .collect::<Vec<_>>()
            .join(" AND ");
        Ok(format!(
            "DELETE FROM {target} WHERE EXISTS (SELECT 1 FROM {relation} AS __src WHERE {predicate});\n\
             INSERT INTO {target} BY NAME SELECT * FROM {relation};"
        ))
    }
}

impl TargetAdapter for AttachedTarget {
    fn spec(&self) -> &TargetSpec {
        &self.spec
    }

    fn attach(&self, session: &dyn SqlSession) -> Result<(), PipelineError> {
        self.attachment.attach(session)
    }

    fn sync_schema(
        &self,
        session: &dyn SqlSession,
        relation: &str,
        evolution: Option<SchemaEvolution>,
    ) -> Result<Vec<String>, PipelineError> {
        let target = self.qualified_table();
        let target_columns = match session.describe(&target) {
            Ok(cols) => cols,
            Err(e) if self.spec.mode.requires_existing_target() => {
                tracing::debug!(table = %target, error = %e, "Target describe failed");
                return Err(PipelineError::TargetMissing {
                    table: target,
                    mode: self.spec.mode,
                });
            }
            Err(_) => {
                tracing::debug!(table = %target, "Target absent; overwrite will create it");
                return Ok(Vec::new());
            }
        };

        if self.spec.mode == WriteMode::Overwrite {
            tracing::debug!(table = %target, "Overwrite rebuilds the table; skipping column reconciliation");
            return Ok(Vec::new());
        }

        let source_columns = session
            .describe(&format!("SELECT * FROM {relation} LIMIT 0"))
            .map_err(|source| PipelineError::SchemaProbe {
                table: target.clone(),
                source,
            })?;
        let missing = schema::missing_columns(&source_columns, &target_columns);
        let policy = evolution.unwrap_or(self.spec.schema_evolution);
        schema::apply_policy(session, &target, &missing, policy)
    }

    fn build_write_statement(&self, relation: &str) -> Result<String, ConfigError> {
        let target = self.qualified_table();
        match self.spec.mode {
            WriteMode::Overwrite => Ok(format!(
                "DROP TABLE IF EXISTS {target};\nCREATE TABLE {target} AS SELECT * FROM {relation};"
            )),
            WriteMode::Append => Ok(format!(
                "INSERT INTO {target} BY NAME SELECT * FROM {relation};"
            )),
            WriteMode::Upsert => self.upsert_statement(&target, relation),
        }
    }
}
