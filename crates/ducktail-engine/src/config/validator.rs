//! Semantic validation for a parsed configuration.

use anyhow::{bail, Result};
use ducktail_types::sanitize;

use crate::config::types::{ConfigFile, PipelineConfig};

fn validate_pipeline(name: &str, pipeline: &PipelineConfig, errors: &mut Vec<String>) {
    if let Err(e) = sanitize(name) {
        errors.push(format!("Pipeline name '{name}': {e}"));
    }
    if let Err(e) = pipeline.source.validate() {
        errors.push(format!("Pipeline '{name}' source: {e}"));
    }
    if let Err(e) = pipeline.target.validate() {
        errors.push(format!("Pipeline '{name}' target: {e}"));
    }
    if let Err(e) = pipeline.options.validate() {
        errors.push(format!("Pipeline '{name}' options: {e}"));
    }

    if let (Some(src), Some(tgt)) = (
        pipeline.source.attachment_name(),
        pipeline.target.attachment_name(),
    ) {
        if src.eq_ignore_ascii_case(tgt) {
            errors.push(format!(
                "Pipeline '{name}': source and target both attach as '{src}'; set a distinct attachment_name"
            ));
        }
    }
}

/// Validate every pipeline in `config`.
///
/// # Errors
///
/// Returns one error listing every problem found.
pub fn validate_config(config: &ConfigFile) -> Result<()> {
    let mut errors = Vec::new();

    if config.version != "1.0" {
        errors.push(format!(
            "Unsupported config version '{}', expected '1.0'",
            config.version
        ));
    }

    if config.pipelines.is_empty() {
        errors.push("Config must define at least one pipeline".to_string());
    }

    for extension in config
        .engine
        .required_extensions
        .iter()
        .chain(&config.engine.optional_extensions)
    {
        if let Err(e) = sanitize(extension) {
            errors.push(format!("Engine extension '{extension}': {e}"));
        }
    }

    for (name, pipeline) in &config.pipelines {
        validate_pipeline(name, pipeline, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        bail!("Pipeline validation failed:\n  - {}", errors.join("\n  - "));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parser::parse_config_str;

    fn valid_yaml() -> &'static str {
        r#"
version: "1.0"
pipelines:
  orders:
    source:
      type: csv
      path: data/orders.csv
      incremental_key: id
    target:
      type: duckdb
      connection: warehouse.duckdb
      table: orders
      mode: append
"#
    }

    #[test]
    fn test_valid_config_passes() {
        let config = parse_config_str(valid_yaml()).unwrap();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_wrong_version_fails() {
        let yaml = valid_yaml().replace("\"1.0\"", "\"2.0\"");
        let config = parse_config_str(&yaml).unwrap();
        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("Unsupported config version"));
    }

    #[test]
    fn test_upsert_without_key_fails() {
        let yaml = valid_yaml().replace("mode: append", "mode: upsert");
        let config = parse_config_str(&yaml).unwrap();
        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("unique_key"));
    }

    #[test]
    fn test_bad_pipeline_name_fails() {
        let yaml = valid_yaml().replace("  orders:", "  \"orders; drop\":");
        let config = parse_config_str(&yaml).unwrap();
        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("Pipeline name"));
    }

    #[test]
    fn test_attachment_clash_fails() {
        let yaml = r#"
version: "1.0"
pipelines:
  copy:
    source: { type: duckdb, connection: a.duckdb, object: t, attachment_name: shared }
    target: { type: duckdb, connection: b.duckdb, table: t, attachment_name: shared }
"#;
        let config = parse_config_str(yaml).unwrap();
        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("both attach as 'shared'"));
    }

    #[test]
    fn test_all_errors_collected() {
        let yaml = r#"
version: "1.0"
pipelines:
  a:
    source: { type: csv }
    target: { type: csv, path: out.csv }
  b:
    source: { type: csv, path: in.csv }
    target: { type: csv, path: out.csv }
    options: { threads: 0 }
"#;
        let config = parse_config_str(yaml).unwrap();
        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("Pipeline 'a' source"));
        assert!(err.contains("Pipeline 'b' options"));
    }

    #[test]
    fn test_empty_pipelines_fail() {
        let config = parse_config_str("version: \"1.0\"\n").unwrap();
        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("at least one pipeline"));
    }
}
