use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use ducktail_engine::PipelineRunner;

use super::run::print_result;
use super::{load_config, session_factory};

/// Execute the `run-all` command: every pipeline on its own blocking task.
///
/// Each task opens its own engine session. Watermark writes for different
/// pipelines touch different keys of the shared store.
pub async fn execute(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let store = config.state.open_store()?;
    let sessions = session_factory(&config);

    tracing::info!(pipelines = config.pipelines.len(), "Starting all pipelines");

    let handles: Vec<_> = config
        .pipelines
        .iter()
        .map(|(name, pipeline)| {
            let runner = PipelineRunner::new(
                name.as_str(),
                pipeline.source.clone(),
                pipeline.target.clone(),
                pipeline.options.clone(),
                Arc::clone(&sessions),
                Arc::clone(&store),
            );
            (name.clone(), tokio::task::spawn_blocking(move || runner.run()))
        })
        .collect();

    let mut failed = Vec::new();
    for (name, handle) in handles {
        match handle.await {
            Ok(Ok(result)) => print_result(&result),
            Ok(Err(e)) => {
                println!("Pipeline '{name}' FAILED: {e}");
                failed.push(name);
            }
            Err(e) => {
                println!("Pipeline '{name}' FAILED: task panicked: {e}");
                failed.push(name);
            }
        }
    }

    if failed.is_empty() {
        println!("\nAll pipelines completed.");
        Ok(())
    } else {
        anyhow::bail!("{} pipeline(s) failed: {}", failed.len(), failed.join(", "))
    }
}
