use std::path::Path;

use anyhow::Result;
use ducktail_engine::config::PipelineConfig;

use super::load_config;

/// Execute the `list` command.
pub fn execute(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    for (name, pipeline) in &config.pipelines {
        println!("{}", describe(name, pipeline));
    }
    Ok(())
}

fn describe(name: &str, pipeline: &PipelineConfig) -> String {
    let source = &pipeline.source;
    let target = &pipeline.target;
    let from = source
        .object
        .as_deref()
        .or(source.path.as_deref())
        .unwrap_or("(query)");
    let to = target
        .table
        .as_deref()
        .or(target.path.as_deref())
        .unwrap_or("?");
    let incremental = source
        .incremental_key
        .as_deref()
        .map(|k| format!(" incremental on {k}"))
        .unwrap_or_default();
    format!(
        "{name:24} {}:{from} -> {}:{to} [{}]{incremental}",
        source.kind, target.kind, target.mode
    )
}
