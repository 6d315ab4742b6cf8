//! Watermark store trait definition.
//!
//! The runner only ever talks to `dyn WatermarkStore`, so the medium can be
//! swapped without touching execution code. Model types live in
//! [`ducktail_types::watermark`].

use ducktail_types::{PipelineName, WatermarkRecord, WatermarkValue};

use crate::error;

/// Storage contract for per-pipeline watermarks.
///
/// Implementations must be `Send + Sync` for use behind `Arc<dyn WatermarkStore>`.
pub trait WatermarkStore: Send + Sync {
    /// Read the stored watermark for `pipeline`.
    ///
    /// Returns `Ok(None)` when nothing has been stored yet or the stored
    /// entry is unreadable.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`](crate::error::StateError) on storage failure.
    fn get(&self, pipeline: &PipelineName) -> error::Result<Option<WatermarkValue>>;

    /// Replace the watermark for `pipeline`.
    ///
    /// `last_run` is the Unix epoch second of the run that produced `value`.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`](crate::error::StateError) on storage failure.
    fn set(
        &self,
        pipeline: &PipelineName,
        value: &WatermarkValue,
        last_run: i64,
    ) -> error::Result<()>;

    /// All stored watermarks, ordered by pipeline name.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`](crate::error::StateError) on storage failure.
    fn records(&self) -> error::Result<Vec<WatermarkRecord>>;

    /// Forget the watermark for `pipeline`. Returns whether one existed.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`](crate::error::StateError) on storage failure.
    fn clear(&self, pipeline: &PipelineName) -> error::Result<bool>;
}
