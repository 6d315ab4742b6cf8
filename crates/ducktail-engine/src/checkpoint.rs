//! Watermark reads and writes around a run.
//!
//! Both directions are best-effort: a store failure is logged and the run
//! carries on as if no watermark existed or as if nothing was stored.

use chrono::Utc;
use ducktail_state::WatermarkStore;
use ducktail_types::{PipelineName, WatermarkValue};

/// Stored watermark for `pipeline`, or `None` on any store failure.
pub(crate) fn load_watermark(
    store: &dyn WatermarkStore,
    pipeline: &PipelineName,
) -> Option<WatermarkValue> {
    match store.get(pipeline) {
        Ok(value) => {
            tracing::debug!(pipeline = %pipeline, watermark = ?value, "Loaded watermark");
            value
        }
        Err(e) => {
            tracing::warn!(pipeline = %pipeline, error = %e, "Watermark read failed; treating as empty");
            None
        }
    }
}

/// Store `value` for `pipeline`. Only call after the write has committed.
///
/// Returns whether the value was stored.
pub(crate) fn persist_watermark(
    store: &dyn WatermarkStore,
    pipeline: &PipelineName,
    value: &WatermarkValue,
) -> bool {
    match store.set(pipeline, value, Utc::now().timestamp()) {
        Ok(()) => {
            tracing::info!(pipeline = %pipeline, watermark = %value, "Watermark advanced");
            true
        }
        Err(e) => {
            tracing::warn!(
                pipeline = %pipeline,
                watermark = %value,
                error = %e,
                "Watermark write failed; the next run will reprocess this batch"
            );
            false
        }
    }
}
