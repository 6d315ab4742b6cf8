//! Configuration file schema.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use ducktail_state::{JsonFileWatermarkStore, SqliteWatermarkStore, WatermarkStore};
use ducktail_types::{RuntimeOptions, SourceSpec, TargetSpec};
use serde::{Deserialize, Serialize};

use crate::session::EngineSettings;

/// Top-level configuration document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub state: StateConfig,
    #[serde(default)]
    pub engine: EngineSettings,
    #[serde(default)]
    pub pipelines: BTreeMap<String, PipelineConfig>,
}

impl ConfigFile {
    /// Look up a pipeline by name.
    ///
    /// # Errors
    ///
    /// Returns an error naming the known pipelines when `name` is absent.
    pub fn pipeline(&self, name: &str) -> Result<&PipelineConfig> {
        self.pipelines.get(name).with_context(|| {
            let known: Vec<&str> = self.pipelines.keys().map(String::as_str).collect();
            format!(
                "Unknown pipeline '{name}' (configured: {})",
                if known.is_empty() {
                    "none".to_string()
                } else {
                    known.join(", ")
                }
            )
        })
    }
}

/// One named pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    pub source: SourceSpec,
    pub target: TargetSpec,
    #[serde(default)]
    pub options: RuntimeOptions,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateBackend {
    #[default]
    Json,
    Sqlite,
}

/// Where watermarks live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StateConfig {
    pub backend: StateBackend,
    pub path: PathBuf,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            backend: StateBackend::Json,
            path: PathBuf::from(".ducktail/watermarks.json"),
        }
    }
}

impl StateConfig {
    /// Open the configured watermark store.
    ///
    /// # Errors
    ///
    /// Returns an error if the `SQLite` database cannot be opened.
    pub fn open_store(&self) -> Result<Arc<dyn WatermarkStore>> {
        match self.backend {
            StateBackend::Json => Ok(Arc::new(JsonFileWatermarkStore::new(&self.path))),
            StateBackend::Sqlite => {
                if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent).with_context(|| {
                        format!("Failed to create state directory: {}", parent.display())
                    })?;
                }
                let store = SqliteWatermarkStore::open(&self.path).with_context(|| {
                    format!("Failed to open state database: {}", self.path.display())
                })?;
                Ok(Arc::new(store))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use ducktail_types::{PipelineName, WatermarkValue};

    use super::*;

    #[test]
    fn state_defaults_to_json_file() {
        let state = StateConfig::default();
        assert_eq!(state.backend, StateBackend::Json);
        assert_eq!(state.path, PathBuf::from(".ducktail/watermarks.json"));
    }

    #[test]
    fn sqlite_store_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let state = StateConfig {
            backend: StateBackend::Sqlite,
            path: dir.path().join("nested/state.db"),
        };
        let store = state.open_store().unwrap();
        let name = PipelineName::new("p");
        store.set(&name, &WatermarkValue::Int(3), 10).unwrap();
        assert_eq!(store.get(&name).unwrap(), Some(WatermarkValue::Int(3)));
    }
}
