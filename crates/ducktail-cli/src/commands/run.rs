use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use ducktail_engine::{ExecutionResult, PipelineRunner};
use ducktail_types::{RuntimeOptions, SchemaEvolution};

use super::{load_config, session_factory};

/// Command-line adjustments to a pipeline's configured options.
pub struct Overrides {
    pub full_refresh: bool,
    pub ignore_watermark: bool,
    pub schema_evolution: Option<SchemaEvolution>,
    pub sample_rows: Option<u32>,
    pub summary: bool,
}

impl Overrides {
    fn apply(&self, options: &mut RuntimeOptions) {
        options.full_refresh |= self.full_refresh;
        options.ignore_watermark |= self.ignore_watermark;
        options.compute_summary |= self.summary;
        if let Some(policy) = self.schema_evolution {
            options.schema_evolution = Some(policy);
        }
        if let Some(n) = self.sample_rows {
            options.sample_rows = n;
        }
    }
}

/// Execute the `run` command: parse, validate, and run one pipeline.
pub async fn execute(
    config_path: &Path,
    pipeline: &str,
    overrides: Overrides,
    json: bool,
) -> Result<()> {
    let config = load_config(config_path)?;
    let pipeline_config = config.pipeline(pipeline)?;

    let mut options = pipeline_config.options.clone();
    overrides.apply(&mut options);

    tracing::info!(
        pipeline,
        source = %pipeline_config.source.kind,
        target = %pipeline_config.target.kind,
        "Pipeline validated"
    );

    let store = config.state.open_store()?;
    let runner = PipelineRunner::new(
        pipeline,
        pipeline_config.source.clone(),
        pipeline_config.target.clone(),
        options,
        session_factory(&config),
        Arc::clone(&store),
    );

    let result = tokio::task::spawn_blocking(move || runner.run())
        .await
        .context("Pipeline task panicked")??;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result);
    }
    Ok(())
}

pub(crate) fn print_result(result: &ExecutionResult) {
    println!("Pipeline '{}' completed successfully.", result.pipeline);
    match result.rows {
        Some(rows) => println!("  Rows:            {rows}"),
        None => println!("  Rows:            (not counted)"),
    }
    for stmt in &result.schema_statements {
        println!("  Schema change:   {stmt}");
    }
    if let Some(prev) = &result.previous_watermark {
        println!("  From watermark:  {prev}");
    }
    match (&result.watermark, result.watermark_persisted) {
        (Some(wm), true) => println!("  New watermark:   {wm}"),
        (Some(wm), false) => println!("  New watermark:   {wm} (NOT persisted)"),
        (None, _) => {}
    }
    if let Some(sample) = &result.sample {
        println!("  Sample rows:     {}", sample.len());
    }
    if let Some(summary) = &result.summary {
        println!("  Summary:");
        for row in summary {
            let column = row.get("column_name").and_then(|v| v.as_str()).unwrap_or("?");
            let column_type = row.get("column_type").and_then(|v| v.as_str()).unwrap_or("?");
            println!("    {column:24} {column_type}");
        }
    }
    let m = &result.metrics;
    println!("  Duration:        {:.2}s", m.total_secs);
    println!("    Count:         {:.3}s", m.count_secs);
    println!("    Sample:        {:.3}s", m.sample_secs);
    println!("    Summary:       {:.3}s", m.summary_secs);
    println!("    Write:         {:.3}s", m.write_secs);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overrides() -> Overrides {
        Overrides {
            full_refresh: false,
            ignore_watermark: false,
            schema_evolution: None,
            sample_rows: None,
            summary: false,
        }
    }

    #[test]
    fn unset_overrides_keep_configured_options() {
        let mut options = RuntimeOptions {
            sample_rows: 7,
            compute_summary: true,
            ..RuntimeOptions::default()
        };
        overrides().apply(&mut options);
        assert_eq!(options.sample_rows, 7);
        assert!(options.compute_summary);
        assert!(!options.skips_watermark());
    }

    #[test]
    fn flags_override_options() {
        let mut options = RuntimeOptions::default();
        Overrides {
            full_refresh: true,
            schema_evolution: Some(SchemaEvolution::Evolve),
            sample_rows: Some(3),
            ..overrides()
        }
        .apply(&mut options);
        assert!(options.full_refresh);
        assert_eq!(options.schema_evolution, Some(SchemaEvolution::Evolve));
        assert_eq!(options.sample_rows, 3);
    }
}
