use std::path::Path;

use anyhow::Result;
use chrono::DateTime;
use ducktail_types::PipelineName;

use super::load_config;

/// Execute `state show`.
pub fn show(config_path: &Path, only: Option<&str>) -> Result<()> {
    let config = load_config(config_path)?;
    let store = config.state.open_store()?;

    let records: Vec<_> = store
        .records()?
        .into_iter()
        .filter(|r| only.map_or(true, |name| r.pipeline.as_str() == name))
        .collect();

    if records.is_empty() {
        println!("No stored watermarks.");
        return Ok(());
    }
    for record in records {
        let when = DateTime::from_timestamp(record.last_run, 0)
            .map_or_else(|| record.last_run.to_string(), |t| t.to_rfc3339());
        println!(
            "{:24} {:40} ({}) last run {when}",
            record.pipeline.as_str(),
            record.value.to_string(),
            record.value.kind(),
        );
    }
    Ok(())
}

/// Execute `state reset`.
pub fn reset(config_path: &Path, pipeline: &str) -> Result<()> {
    let config = load_config(config_path)?;
    config.pipeline(pipeline)?;
    let store = config.state.open_store()?;

    if store.clear(&PipelineName::new(pipeline))? {
        tracing::info!(pipeline, "Watermark cleared");
        println!("Cleared watermark for '{pipeline}'.");
    } else {
        println!("No watermark stored for '{pipeline}'.");
    }
    Ok(())
}
