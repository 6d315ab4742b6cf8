//! YAML configuration: types, parsing, and validation.

pub mod parser;
pub mod types;
pub mod validator;

pub use parser::{parse_config, parse_config_str, substitute_env_vars};
pub use types::{ConfigFile, PipelineConfig, StateBackend, StateConfig};
pub use validator::validate_config;
