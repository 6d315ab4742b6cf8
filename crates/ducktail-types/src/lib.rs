//! Shared ducktail model types.
//!
//! Pipeline source/target specifications, runtime options, typed
//! watermarks, the identifier sanitizer, and the configuration error model.
//! Nothing in this crate touches the engine or the file system, so every
//! other crate can depend on it.

#![warn(clippy::pedantic)]

pub mod error;
pub mod identifier;
pub mod options;
pub mod spec;
pub mod watermark;

pub use error::ConfigError;
pub use identifier::{sanitize, sanitize_target, split_key_list};
pub use options::RuntimeOptions;
pub use spec::{
    BackendKind, DbFlavor, FileFormat, ParquetCompression, SchemaEvolution, SourceSpec,
    TargetSpec, WriteMode,
};
pub use watermark::{PipelineName, WatermarkKind, WatermarkRecord, WatermarkValue};
