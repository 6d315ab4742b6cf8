//! Schema reconciliation between a source relation and a target table.

use std::collections::HashSet;

use ducktail_types::SchemaEvolution;

use crate::adapter::sql::quote_ident;
use crate::errors::PipelineError;
use crate::session::{ColumnInfo, SqlSession};

/// Source columns absent from the target, in source order.
///
/// Names compare case-insensitively, matching how the engine binds them.
#[must_use]
pub fn missing_columns(source: &[ColumnInfo], target: &[ColumnInfo]) -> Vec<ColumnInfo> {
    let existing: HashSet<String> = target.iter().map(|c| c.name.to_lowercase()).collect();
    source
        .iter()
        .filter(|c| !existing.contains(&c.name.to_lowercase()))
        .cloned()
        .collect()
}

#[must_use]
pub fn add_column_statement(qualified_table: &str, column: &ColumnInfo) -> String {
    format!(
        "ALTER TABLE {qualified_table} ADD COLUMN {} {}",
        quote_ident(&column.name),
        column.data_type
    )
}

/// Apply `policy` to the columns `missing` from `qualified_table`.
///
/// Returns the ADD COLUMN statements issued. Stops at the first failing
/// statement.
///
/// # Errors
///
/// [`PipelineError::SchemaMismatch`] for `fail` and `ignore` when anything
/// is missing; [`PipelineError::SchemaEvolutionFailed`] when an ADD COLUMN
/// is rejected.
pub fn apply_policy(
    session: &dyn SqlSession,
    qualified_table: &str,
    missing: &[ColumnInfo],
    policy: SchemaEvolution,
) -> Result<Vec<String>, PipelineError> {
    if missing.is_empty() {
        return Ok(Vec::new());
    }
    let names = || missing.iter().map(|c| c.name.clone()).collect::<Vec<_>>();

    match policy {
        SchemaEvolution::Fail => Err(PipelineError::SchemaMismatch {
            table: qualified_table.to_string(),
            missing: names(),
            hint: "schema_evolution is 'fail'".to_string(),
        }),
        SchemaEvolution::Ignore => Err(PipelineError::SchemaMismatch {
            table: qualified_table.to_string(),
            missing: names(),
            hint: "set schema_evolution to 'evolve' to add them, or use mode 'overwrite' to rebuild the table"
                .to_string(),
        }),
        SchemaEvolution::Evolve => {
            let mut issued = Vec::with_capacity(missing.len());
            for column in missing {
                let stmt = add_column_statement(qualified_table, column);
                tracing::info!(
                    table = qualified_table,
                    column = %column.name,
                    data_type = %column.data_type,
                    "Schema evolution: adding column"
                );
                session
                    .execute(&stmt)
                    .map_err(|source| PipelineError::SchemaEvolutionFailed {
                        table: qualified_table.to_string(),
                        column: column.name.clone(),
                        source,
                    })?;
                issued.push(stmt);
            }
            Ok(issued)
        }
    }
}
