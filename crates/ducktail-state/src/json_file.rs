//! Shared JSON document store.
//!
//! One file holds every pipeline's watermark:
//!
//! ```json
//! { "orders": { "watermark": 200, "watermark_type": "int", "last_run": 1717171717 } }
//! ```
//!
//! Each access reads the whole document and each write rewrites it. A
//! missing or unparsable document is treated as empty and logged. Entries
//! this store cannot decode are left in place when the file is rewritten.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use ducktail_types::{PipelineName, WatermarkKind, WatermarkRecord, WatermarkValue};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::backend::WatermarkStore;
use crate::error::{self, StateError};

type Document = Map<String, Value>;

#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    watermark: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    watermark_type: Option<WatermarkKind>,
    #[serde(default)]
    last_run: i64,
}

impl StoredEntry {
    fn decode(pipeline: &str, raw: &Value) -> Option<(WatermarkValue, i64)> {
        let entry: StoredEntry = match serde_json::from_value(raw.clone()) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(pipeline, error = %e, "Ignoring malformed watermark entry");
                return None;
            }
        };
        let value = WatermarkValue::from_json(&entry.watermark, entry.watermark_type)?;
        Some((value, entry.last_run))
    }
}

/// Watermark store backed by a single JSON file.
pub struct JsonFileWatermarkStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileWatermarkStore {
    /// Use the document at `path`. The file is created on first write.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn guard(&self) -> error::Result<MutexGuard<'_, ()>> {
        self.lock.lock().map_err(|_| StateError::LockPoisoned)
    }

    fn load(&self) -> error::Result<Document> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "No watermark document yet");
                return Ok(Document::new());
            }
            Err(e) => return Err(StateError::io(&self.path, e)),
        };
        if raw.trim().is_empty() {
            return Ok(Document::new());
        }
        match serde_json::from_str::<Document>(&raw) {
            Ok(doc) => Ok(doc),
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Watermark document is corrupt; treating as empty"
                );
                Ok(Document::new())
            }
        }
    }

    /// Write to a sibling temp file, then rename over the document.
    fn save(&self, doc: &Document) -> error::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| StateError::io(parent, e))?;
        }
        let body = serde_json::to_string_pretty(doc)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, body).map_err(|e| StateError::io(&tmp, e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| StateError::io(&self.path, e))?;
        Ok(())
    }
}

impl WatermarkStore for JsonFileWatermarkStore {
    fn get(&self, pipeline: &PipelineName) -> error::Result<Option<WatermarkValue>> {
        let _guard = self.guard()?;
        let doc = self.load()?;
        Ok(doc
            .get(pipeline.as_str())
            .and_then(|raw| StoredEntry::decode(pipeline.as_str(), raw))
            .map(|(value, _)| value))
    }

    fn set(
        &self,
        pipeline: &PipelineName,
        value: &WatermarkValue,
        last_run: i64,
    ) -> error::Result<()> {
        let _guard = self.guard()?;
        let mut doc = self.load()?;
        let entry = StoredEntry {
            watermark: value.to_json(),
            watermark_type: Some(value.kind()),
            last_run,
        };
        doc.insert(pipeline.as_str().to_string(), serde_json::to_value(entry)?);
        self.save(&doc)
    }

    fn records(&self) -> error::Result<Vec<WatermarkRecord>> {
        let _guard = self.guard()?;
        let doc = self.load()?;
        let mut records: Vec<WatermarkRecord> = doc
            .iter()
            .filter_map(|(name, raw)| {
                StoredEntry::decode(name, raw).map(|(value, last_run)| WatermarkRecord {
                    pipeline: PipelineName::new(name.as_str()),
                    value,
                    last_run,
                })
            })
            .collect();
        records.sort_by(|a, b| a.pipeline.cmp(&b.pipeline));
        Ok(records)
    }

    fn clear(&self, pipeline: &PipelineName) -> error::Result<bool> {
        let _guard = self.guard()?;
        let mut doc = self.load()?;
        if doc.remove(pipeline.as_str()).is_none() {
            return Ok(false);
        }
        self.save(&doc)?;
        Ok(true)
    }
}
