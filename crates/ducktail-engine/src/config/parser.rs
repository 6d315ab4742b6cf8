//! Config YAML parsing with environment variable substitution.

use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;

use crate::config::types::ConfigFile;

static ENV_VAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid env var regex"));

/// Replace every `${VAR}` with its environment value.
///
/// Values are spliced into the raw text before YAML parsing, so a
/// connection string can come from the environment without being written
/// to disk.
///
/// # Errors
///
/// Returns an error listing every referenced variable that is not set.
pub fn substitute_env_vars(input: &str) -> Result<String> {
    let mut missing: Vec<String> = Vec::new();
    let result = ENV_VAR_RE.replace_all(input, |cap: &regex::Captures<'_>| {
        let name = cap.get(1).map_or("", |m| m.as_str());
        if let Ok(value) = std::env::var(name) {
            value
        } else {
            if !missing.iter().any(|m| m == name) {
                missing.push(name.to_string());
            }
            String::new()
        }
    });

    if !missing.is_empty() {
        anyhow::bail!("Missing environment variable(s): {}", missing.join(", "));
    }
    Ok(result.into_owned())
}

/// Parse a config document (after env var substitution).
///
/// # Errors
///
/// Returns an error if substitution fails or the YAML does not match the
/// schema.
pub fn parse_config_str(yaml_str: &str) -> Result<ConfigFile> {
    let substituted = substitute_env_vars(yaml_str)?;
    let config: ConfigFile =
        serde_yaml::from_str(&substituted).context("Failed to parse config YAML")?;
    Ok(config)
}

/// Parse a config file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or does not parse.
pub fn parse_config(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config_str(&content).with_context(|| format!("Invalid config: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use ducktail_types::{BackendKind, SchemaEvolution, WriteMode};

    use super::*;
    use crate::config::types::StateBackend;

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("DT_TEST_HOST", "db.example.com");
        let input = "connection: host=${DT_TEST_HOST} port=5432";
        let result = substitute_env_vars(input).unwrap();
        assert_eq!(result, "connection: host=db.example.com port=5432");
        std::env::remove_var("DT_TEST_HOST");
    }

    #[test]
    fn test_no_env_vars_passthrough() {
        let input = "path: data/orders.parquet";
        assert_eq!(substitute_env_vars(input).unwrap(), input);
    }

    #[test]
    fn test_all_missing_vars_reported_once() {
        let input = "${DT_MISSING_X} ${DT_MISSING_Y} ${DT_MISSING_X}";
        let err = substitute_env_vars(input).unwrap_err().to_string();
        assert!(err.contains("DT_MISSING_X"));
        assert!(err.contains("DT_MISSING_Y"));
        assert_eq!(err.matches("DT_MISSING_X").count(), 1);
    }

    #[test]
    fn test_mixed_set_and_unset_reports_only_unset() {
        std::env::set_var("DT_TEST_MIXED_SET", "present");
        let input = "a: ${DT_TEST_MIXED_SET}\nb: ${DT_TEST_MIXED_UNSET}";
        let err = substitute_env_vars(input).unwrap_err().to_string();
        std::env::remove_var("DT_TEST_MIXED_SET");
        assert!(err.contains("DT_TEST_MIXED_UNSET"));
        assert!(!err.contains("DT_TEST_MIXED_SET"));
        assert!(!err.contains("present"));
    }

    #[test]
    fn test_substituted_value_is_not_rescanned() {
        std::env::set_var("DT_TEST_NESTED", "${DT_NOT_SET_NESTED}");
        let result = substitute_env_vars("a: ${DT_TEST_NESTED}").unwrap();
        assert_eq!(result, "a: ${DT_NOT_SET_NESTED}");
        std::env::remove_var("DT_TEST_NESTED");
    }

    #[test]
    fn test_parse_full_document() {
        std::env::set_var("DT_TEST_PG", "host=localhost dbname=app");
        let yaml = r#"
version: "1.0"
state:
  backend: sqlite
  path: state/wm.db
engine:
  required_extensions: [postgres]
pipelines:
  users_to_lake:
    source:
      type: postgres
      connection: ${DT_TEST_PG}
      object: public.users
      incremental_key: updated_at
    target:
      type: parquet
      path: lake/users.parquet
      compression: snappy
    options:
      threads: 2
      sample_rows: 10
  orders:
    source:
      type: csv
      path: data/orders.csv
    target:
      type: duckdb
      connection: warehouse.duckdb
      table: main.orders
      mode: upsert
      unique_key: id
      schema_evolution: evolve
"#;
        let config = parse_config_str(yaml).unwrap();
        std::env::remove_var("DT_TEST_PG");

        assert_eq!(config.state.backend, StateBackend::Sqlite);
        assert_eq!(config.engine.required_extensions, vec!["postgres"]);
        assert!(config.engine.optional_extensions.contains(&"snowflake".to_string()));

        let users = config.pipeline("users_to_lake").unwrap();
        assert_eq!(users.source.kind, BackendKind::Postgres);
        assert_eq!(users.source.connection.as_deref(), Some("host=localhost dbname=app"));
        assert_eq!(users.options.threads, 2);
        assert_eq!(users.options.memory_limit, "2GB");

        let orders = config.pipeline("orders").unwrap();
        assert_eq!(orders.target.mode, WriteMode::Upsert);
        assert_eq!(orders.target.schema_evolution, SchemaEvolution::Evolve);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let yaml = r#"
version: "1.0"
pipelines:
  p:
    source: { type: csv, path: a.csv, bogus: 1 }
    target: { type: csv, path: b.csv }
"#;
        assert!(parse_config_str(yaml).is_err());
    }

    #[test]
    fn test_unknown_pipeline_lists_known() {
        let config = parse_config_str("version: \"1.0\"\npipelines: {}\n").unwrap();
        let err = config.pipeline("x").unwrap_err().to_string();
        assert!(err.contains("'x'"));
        assert!(err.contains("none"));
    }

    #[test]
    fn test_parse_invalid_yaml_errors() {
        assert!(parse_config_str("this is not: [valid: yaml: {{{}}}").is_err());
    }
}
