pub mod check;
pub mod list;
pub mod run;
pub mod run_all;
pub mod state;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use ducktail_engine::config::{parse_config, validate_config, ConfigFile};
use ducktail_engine::{DuckDbSessionFactory, SessionFactory};

/// Parse and validate a config file.
pub(crate) fn load_config(config_path: &Path) -> Result<ConfigFile> {
    let config = parse_config(config_path)
        .with_context(|| format!("Failed to parse config: {}", config_path.display()))?;
    validate_config(&config)?;
    Ok(config)
}

pub(crate) fn session_factory(config: &ConfigFile) -> Arc<dyn SessionFactory> {
    Arc::new(DuckDbSessionFactory::new(config.engine.clone()))
}
