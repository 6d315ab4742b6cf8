//! Watermark persistence for ducktail pipelines.
//!
//! Provides the [`WatermarkStore`] trait and three interchangeable media:
//! a shared JSON document ([`JsonFileWatermarkStore`]), a `SQLite` table
//! ([`SqliteWatermarkStore`]), and an in-process map
//! ([`MemoryWatermarkStore`]).
//!
//! Stores serialize access within one process only. Two processes running
//! the same pipeline name race and the last writer wins; callers wanting
//! more must hold an external lock keyed by pipeline name.

#![warn(clippy::pedantic)]

pub mod backend;
pub mod error;
pub mod json_file;
pub mod memory;
pub mod sqlite;

pub use backend::WatermarkStore;
pub use error::StateError;
pub use json_file::JsonFileWatermarkStore;
pub use memory::MemoryWatermarkStore;
pub use sqlite::SqliteWatermarkStore;
