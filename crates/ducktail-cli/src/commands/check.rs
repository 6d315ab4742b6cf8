use std::path::Path;

use anyhow::Result;
use ducktail_engine::config::StateConfig;
use ducktail_engine::{check_pipeline, CheckStatus};

use super::{load_config, session_factory};

/// Execute the `check` command: validate config, state store, and
/// connectivity of each selected pipeline.
pub async fn execute(config_path: &Path, only: Option<&str>) -> Result<()> {
    let config = load_config(config_path)?;
    println!("Config structure:  OK");

    let selected: Vec<String> = match only {
        Some(name) => {
            config.pipeline(name)?;
            vec![name.to_string()]
        }
        None => config.pipelines.keys().cloned().collect(),
    };

    let state_ok = match count_watermarks(&config.state) {
        Ok(count) => {
            println!("State backend:     OK ({count} watermark(s))");
            true
        }
        Err(e) => {
            println!("State backend:     FAILED");
            println!("  {e:#}");
            false
        }
    };

    let sessions = session_factory(&config);
    let mut all_ok = state_ok;
    for name in selected {
        let pipeline = config.pipeline(&name)?.clone();
        let sessions = sessions.clone();
        let result = tokio::task::spawn_blocking(move || {
            check_pipeline(
                &pipeline.source,
                &pipeline.target,
                sessions.as_ref(),
                &pipeline.options,
            )
        })
        .await?;

        println!("\nPipeline '{name}':");
        match result {
            Ok(check) => {
                print_status("Source", &check.source);
                print_status("Target", &check.target);
                all_ok &= check.all_ok();
            }
            Err(e) => {
                println!("{:18} FAILED", "Engine:");
                println!("  {e}");
                all_ok = false;
            }
        }
    }

    if all_ok {
        println!("\nAll checks passed.");
        Ok(())
    } else {
        anyhow::bail!("One or more checks failed")
    }
}

fn count_watermarks(state: &StateConfig) -> Result<usize> {
    let store = state.open_store()?;
    Ok(store.records()?.len())
}

fn print_status(label: &str, status: &CheckStatus) {
    let word = if status.ok { "OK" } else { "FAILED" };
    println!("{:18} {}", format!("{label}:"), word);
    if !status.message.is_empty() {
        println!("  {}", status.message);
    }
    if let Some(hint) = &status.hint {
        println!("  hint: {hint}");
    }
}
