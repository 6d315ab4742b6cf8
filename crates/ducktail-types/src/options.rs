//! Per-run execution options.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::spec::SchemaEvolution;

/// Upper bound on engine worker threads.
pub const MAX_THREADS: u32 = 64;
/// Upper bound on sampled rows.
pub const MAX_SAMPLE_ROWS: u32 = 100_000;

static MEMORY_LIMIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+[KMGT]B$").expect("valid memory-limit regex"));

/// Runtime knobs for one pipeline run.
///
/// Deserialized from the `options:` block of a pipeline and then adjusted by
/// command-line overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeOptions {
    pub threads: u32,
    /// Engine memory ceiling such as `"2GB"`.
    pub memory_limit: String,
    pub compute_counts: bool,
    pub sample_data: bool,
    pub sample_rows: u32,
    pub compute_summary: bool,
    /// Reprocess every row instead of only rows past the stored watermark.
    pub full_refresh: bool,
    /// Do not read the stored watermark for this run.
    pub ignore_watermark: bool,
    /// Overrides the target's `schema_evolution` for this run.
    pub schema_evolution: Option<SchemaEvolution>,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            threads: 4,
            memory_limit: "2GB".to_string(),
            compute_counts: true,
            sample_data: true,
            sample_rows: 50,
            compute_summary: false,
            full_refresh: false,
            ignore_watermark: false,
            schema_evolution: None,
        }
    }
}

impl RuntimeOptions {
    /// Whether the stored watermark should be bypassed this run.
    #[must_use]
    pub fn skips_watermark(&self) -> bool {
        self.full_refresh || self.ignore_watermark
    }

    /// Check option bounds.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOption`] naming the first bad option.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_THREADS).contains(&self.threads) {
            return Err(ConfigError::option(
                "threads",
                format!("must be between 1 and {MAX_THREADS}, got {}", self.threads),
            ));
        }
        if !MEMORY_LIMIT_RE.is_match(&self.memory_limit) {
            return Err(ConfigError::option(
                "memory_limit",
                format!(
                    "'{}' must be a whole number followed by KB, MB, GB, or TB",
                    self.memory_limit
                ),
            ));
        }
        if !(1..=MAX_SAMPLE_ROWS).contains(&self.sample_rows) {
            return Err(ConfigError::option(
                "sample_rows",
                format!(
                    "must be between 1 and {MAX_SAMPLE_ROWS}, got {}",
                    self.sample_rows
                ),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let opts = RuntimeOptions::default();
        assert_eq!(opts.threads, 4);
        assert_eq!(opts.memory_limit, "2GB");
        assert_eq!(opts.sample_rows, 50);
        assert!(opts.compute_counts && opts.sample_data && !opts.compute_summary);
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn partial_block_fills_defaults() {
        let opts: RuntimeOptions =
            serde_json::from_str(r#"{"threads": 8, "compute_summary": true}"#).unwrap();
        assert_eq!(opts.threads, 8);
        assert!(opts.compute_summary);
        assert_eq!(opts.memory_limit, "2GB");
    }

    #[test]
    fn thread_bounds() {
        let mut opts = RuntimeOptions {
            threads: 0,
            ..RuntimeOptions::default()
        };
        assert!(matches!(
            opts.validate(),
            Err(ConfigError::InvalidOption { option: "threads", .. })
        ));
        opts.threads = 65;
        assert!(opts.validate().is_err());
        opts.threads = 64;
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn memory_limit_pattern() {
        for ok in ["512MB", "2GB", "1TB", "64KB"] {
            let opts = RuntimeOptions {
                memory_limit: ok.into(),
                ..RuntimeOptions::default()
            };
            assert!(opts.validate().is_ok(), "{ok} should be accepted");
        }
        for bad in ["2G", "2 GB", "two GB", "2gb", "'; DROP", ""] {
            let opts = RuntimeOptions {
                memory_limit: bad.into(),
                ..RuntimeOptions::default()
            };
            assert!(opts.validate().is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn sample_rows_bounds() {
        let opts = RuntimeOptions {
            sample_rows: 100_001,
            ..RuntimeOptions::default()
        };
        assert!(opts.validate().is_err());
    }

    #[test]
    fn either_flag_skips_watermark() {
        let mut opts = RuntimeOptions::default();
        assert!(!opts.skips_watermark());
        opts.ignore_watermark = true;
        assert!(opts.skips_watermark());
        opts.ignore_watermark = false;
        opts.full_refresh = true;
        assert!(opts.skips_watermark());
    }
}
