//! In-process watermark store.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use ducktail_types::{PipelineName, WatermarkRecord, WatermarkValue};

use crate::backend::WatermarkStore;
use crate::error::{self, StateError};

/// Watermarks kept in a map for the lifetime of the process.
#[derive(Default)]
pub struct MemoryWatermarkStore {
    entries: Mutex<BTreeMap<PipelineName, (WatermarkValue, i64)>>,
}

impl MemoryWatermarkStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> error::Result<MutexGuard<'_, BTreeMap<PipelineName, (WatermarkValue, i64)>>> {
        self.entries.lock().map_err(|_| StateError::LockPoisoned)
    }
}

impl WatermarkStore for MemoryWatermarkStore {
    fn get(&self, pipeline: &PipelineName) -> error::Result<Option<WatermarkValue>> {
        Ok(self.lock()?.get(pipeline).map(|(value, _)| value.clone()))
    }

    fn set(
        &self,
        pipeline: &PipelineName,
        value: &WatermarkValue,
        last_run: i64,
    ) -> error::Result<()> {
        self.lock()?
            .insert(pipeline.clone(), (value.clone(), last_run));
        Ok(())
    }

    fn records(&self) -> error::Result<Vec<WatermarkRecord>> {
        Ok(self
            .lock()?
            .iter()
            .map(|(pipeline, (value, last_run))| WatermarkRecord {
                pipeline: pipeline.clone(),
                value: value.clone(),
                last_run: *last_run,
            })
            .collect())
    }

    fn clear(&self, pipeline: &PipelineName) -> error::Result<bool> {
        Ok(self.lock()?.remove(pipeline).is_some())
    }
}
