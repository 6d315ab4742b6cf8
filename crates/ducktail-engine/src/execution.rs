//! Run lifecycle states and profiling stages.

use std::fmt;

/// Position of a run in its lifecycle.
///
/// States advance strictly in declaration order. There is no failed state:
/// a failure is carried by [`PipelineExecutionError`], whose `state` is the
/// last state the run reached before the error.
///
/// [`PipelineExecutionError`]: crate::PipelineExecutionError
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RunState {
    Init,
    AdaptersReady,
    Attached,
    SchemaSynced,
    FilterResolved,
    StagesExecuted,
    WriteCommitted,
    WatermarkPersisted,
    Done,
}

impl RunState {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::AdaptersReady => "adapters_ready",
            Self::Attached => "attached",
            Self::SchemaSynced => "schema_synced",
            Self::FilterResolved => "filter_resolved",
            Self::StagesExecuted => "stages_executed",
            Self::WriteCommitted => "write_committed",
            Self::WatermarkPersisted => "watermark_persisted",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Independently timed read stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Count,
    Sample,
    Summary,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Count => "count",
            Self::Sample => "sample",
            Self::Summary => "summary",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn states_are_ordered() {
        assert!(RunState::Init < RunState::AdaptersReady);
        assert!(RunState::WriteCommitted < RunState::WatermarkPersisted);
        assert!(RunState::WatermarkPersisted < RunState::Done);
    }

    #[test]
    fn display_is_snake_case() {
        assert_eq!(RunState::SchemaSynced.to_string(), "schema_synced");
        assert_eq!(Stage::Summary.to_string(), "summary");
    }
}
