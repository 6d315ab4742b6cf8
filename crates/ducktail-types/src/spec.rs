//! Source and target specifications.
//!
//! Specs are plain deserialized configuration. [`SourceSpec::validate`] and
//! [`TargetSpec::validate`] are the single place where field combinations
//! and identifiers are checked; adapters call them at construction.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::identifier::{sanitize, split_key_list};

// ---------------------------------------------------------------------------
// Backend kinds
// ---------------------------------------------------------------------------

/// Declared `type` tag of a source or target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Parquet,
    Csv,
    Postgres,
    Snowflake,
    #[serde(rename = "duckdb")]
    DuckDb,
}

/// On-disk format of a file-family backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileFormat {
    Parquet,
    Csv,
}

/// Attached-database flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DbFlavor {
    Postgres,
    Snowflake,
    /// Another DuckDB database file attached into the session.
    DuckDb,
}

impl BackendKind {
    /// Wire-format tag as written in configuration.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Parquet => "parquet",
            Self::Csv => "csv",
            Self::Postgres => "postgres",
            Self::Snowflake => "snowflake",
            Self::DuckDb => "duckdb",
        }
    }

    #[must_use]
    pub fn file_format(&self) -> Option<FileFormat> {
        match self {
            Self::Parquet => Some(FileFormat::Parquet),
            Self::Csv => Some(FileFormat::Csv),
            _ => None,
        }
    }

    #[must_use]
    pub fn db_flavor(&self) -> Option<DbFlavor> {
        match self {
            Self::Postgres => Some(DbFlavor::Postgres),
            Self::Snowflake => Some(DbFlavor::Snowflake),
            Self::DuckDb => Some(DbFlavor::DuckDb),
            _ => None,
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl DbFlavor {
    /// Storage type passed to `ATTACH ... (TYPE x)`; `None` for native files.
    #[must_use]
    pub fn attach_type(&self) -> Option<&'static str> {
        match self {
            Self::Postgres => Some("postgres"),
            Self::Snowflake => Some("snowflake"),
            Self::DuckDb => None,
        }
    }

    #[must_use]
    pub fn default_source_attachment(&self) -> &'static str {
        match self {
            Self::Postgres => "pgsrc",
            Self::Snowflake => "sfsrc",
            Self::DuckDb => "ddbsrc",
        }
    }

    #[must_use]
    pub fn default_target_attachment(&self) -> &'static str {
        match self {
            Self::Postgres => "pgtgt",
            Self::Snowflake => "sftgt",
            Self::DuckDb => "ddbtgt",
        }
    }
}

// ---------------------------------------------------------------------------
// Write behaviour
// ---------------------------------------------------------------------------

/// How the target receives the batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    Overwrite,
    #[default]
    Append,
    Upsert,
}

impl WriteMode {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Overwrite => "overwrite",
            Self::Append => "append",
            Self::Upsert => "upsert",
        }
    }

    /// Whether the target table must already exist before writing.
    #[must_use]
    pub fn requires_existing_target(&self) -> bool {
        matches!(self, Self::Append | Self::Upsert)
    }
}

impl fmt::Display for WriteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Policy for source columns the target table does not have.
///
/// `Ignore` is strict: a non-empty difference fails the run with a hint to
/// switch to `Evolve` or `Overwrite`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaEvolution {
    #[default]
    Ignore,
    Fail,
    Evolve,
}

impl SchemaEvolution {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ignore => "ignore",
            Self::Fail => "fail",
            Self::Evolve => "evolve",
        }
    }
}

impl fmt::Display for SchemaEvolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SchemaEvolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ignore" => Ok(Self::Ignore),
            "fail" => Ok(Self::Fail),
            "evolve" => Ok(Self::Evolve),
            other => Err(format!(
                "unknown schema evolution '{other}' (expected ignore, fail, or evolve)"
            )),
        }
    }
}

/// Parquet compression codec for file targets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ParquetCompression {
    #[default]
    Zstd,
    Snappy,
    Gzip,
    Lz4,
    Uncompressed,
}

impl ParquetCompression {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Zstd => "zstd",
            Self::Snappy => "snappy",
            Self::Gzip => "gzip",
            Self::Lz4 => "lz4",
            Self::Uncompressed => "uncompressed",
        }
    }

    /// Parse a codec name case-insensitively.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "zstd" => Some(Self::Zstd),
            "snappy" => Some(Self::Snappy),
            "gzip" => Some(Self::Gzip),
            "lz4" => Some(Self::Lz4),
            "uncompressed" | "none" => Some(Self::Uncompressed),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Specs
// ---------------------------------------------------------------------------

/// Where a pipeline reads from.
///
/// `connection` is an already-resolved connection string and is treated as
/// a secret. `query` is spliced verbatim and must come from a trusted
/// author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceSpec {
    #[serde(rename = "type")]
    pub kind: BackendKind,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub connection: Option<String>,
    #[serde(default)]
    pub attachment_name: Option<String>,
    #[serde(default)]
    pub object: Option<String>,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub incremental_key: Option<String>,
}

impl SourceSpec {
    /// A file source reading `path`.
    #[must_use]
    pub fn file(kind: BackendKind, path: impl Into<String>) -> Self {
        Self {
            kind,
            path: Some(path.into()),
            connection: None,
            attachment_name: None,
            object: None,
            query: None,
            incremental_key: None,
        }
    }

    /// An attached-database source reading `object`.
    #[must_use]
    pub fn attached(
        kind: BackendKind,
        connection: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            path: None,
            connection: Some(connection.into()),
            attachment_name: None,
            object: Some(object.into()),
            query: None,
            incremental_key: None,
        }
    }

    #[must_use]
    pub fn with_incremental_key(mut self, key: impl Into<String>) -> Self {
        self.incremental_key = Some(key.into());
        self
    }

    /// Explicit attachment name, or the flavor default. `None` for files.
    #[must_use]
    pub fn attachment_name(&self) -> Option<&str> {
        let flavor = self.kind.db_flavor()?;
        Some(
            self.attachment_name
                .as_deref()
                .unwrap_or_else(|| flavor.default_source_attachment()),
        )
    }

    /// Check field combinations and every identifier.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        const OWNER: &str = "source";
        let tag = self.kind.as_str();

        if self.kind.file_format().is_some() {
            if self.path.as_deref().map_or(true, str::is_empty) {
                return Err(ConfigError::missing(OWNER, tag, "path"));
            }
            if self.object.is_some() || self.query.is_some() {
                return Err(ConfigError::Conflict {
                    owner: OWNER,
                    type_tag: tag.into(),
                    message: "file sources take 'path', not 'object' or 'query'".into(),
                });
            }
        } else {
            if self.connection.as_deref().map_or(true, str::is_empty) {
                return Err(ConfigError::missing(OWNER, tag, "connection"));
            }
            match (&self.object, &self.query) {
                (Some(_), Some(_)) | (None, None) => {
                    return Err(ConfigError::Conflict {
                        owner: OWNER,
                        type_tag: tag.into(),
                        message: "exactly one of 'object' or 'query' is required".into(),
                    });
                }
                (Some(object), None) => {
                    sanitize(object)?;
                }
                (None, Some(query)) => {
                    if query.trim().is_empty() {
                        return Err(ConfigError::missing(OWNER, tag, "query"));
                    }
                }
            }
            if let Some(name) = self.attachment_name() {
                sanitize(name)?;
            }
        }

        if let Some(key) = &self.incremental_key {
            sanitize(key)?;
        }
        Ok(())
    }
}

/// Where a pipeline writes to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetSpec {
    #[serde(rename = "type")]
    pub kind: BackendKind,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub connection: Option<String>,
    #[serde(default)]
    pub attachment_name: Option<String>,
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub mode: WriteMode,
    #[serde(default)]
    pub unique_key: Option<String>,
    #[serde(default)]
    pub schema_evolution: SchemaEvolution,
    #[serde(default)]
    pub compression: Option<String>,
}

impl TargetSpec {
    /// A file target written to `path`.
    #[must_use]
    pub fn file(kind: BackendKind, path: impl Into<String>) -> Self {
        Self {
            kind,
            path: Some(path.into()),
            connection: None,
            attachment_name: None,
            table: None,
            mode: WriteMode::Overwrite,
            unique_key: None,
            schema_evolution: SchemaEvolution::default(),
            compression: None,
        }
    }

    /// An attached-database target writing `table`.
    #[must_use]
    pub fn attached(
        kind: BackendKind,
        connection: impl Into<String>,
        table: impl Into<String>,
        mode: WriteMode,
    ) -> Self {
        Self {
            kind,
            path: None,
            connection: Some(connection.into()),
            attachment_name: None,
            table: Some(table.into()),
            mode,
            unique_key: None,
            schema_evolution: SchemaEvolution::default(),
            compression: None,
        }
    }

    #[must_use]
    pub fn with_unique_key(mut self, key: impl Into<String>) -> Self {
        self.unique_key = Some(key.into());
        self
    }

    #[must_use]
    pub fn with_schema_evolution(mut self, evolution: SchemaEvolution) -> Self {
        self.schema_evolution = evolution;
        self
    }

    /// Explicit attachment name, or the flavor default. `None` for files.
    #[must_use]
    pub fn attachment_name(&self) -> Option<&str> {
        let flavor = self.kind.db_flavor()?;
        Some(
            self.attachment_name
                .as_deref()
                .unwrap_or_else(|| flavor.default_target_attachment()),
        )
    }

    /// Parquet codec, defaulting to zstd.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOption`] for an unknown codec name.
    pub fn parquet_compression(&self) -> Result<ParquetCompression, ConfigError> {
        match &self.compression {
            None => Ok(ParquetCompression::default()),
            Some(name) => ParquetCompression::parse(name).ok_or_else(|| {
                ConfigError::option(
                    "compression",
                    format!("unknown codec '{name}' (expected zstd, snappy, gzip, lz4, or uncompressed)"),
                )
            }),
        }
    }

    /// Check field combinations and every identifier.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found. Upsert without a key is
    /// reported before anything else.
    pub fn validate(&self) -> Result<(), ConfigError> {
        const OWNER: &str = "target";
        let tag = self.kind.as_str();

        if self.mode == WriteMode::Upsert && self.unique_key.is_none() {
            return Err(ConfigError::MissingUniqueKey);
        }

        match self.kind.file_format() {
            Some(format) => {
                if self.path.as_deref().map_or(true, str::is_empty) {
                    return Err(ConfigError::missing(OWNER, tag, "path"));
                }
                if self.mode == WriteMode::Upsert {
                    return Err(ConfigError::Unsupported {
                        owner: OWNER,
                        type_tag: tag.into(),
                        what: "mode 'upsert'".into(),
                    });
                }
                match format {
                    FileFormat::Parquet => {
                        self.parquet_compression()?;
                    }
                    FileFormat::Csv if self.compression.is_some() => {
                        return Err(ConfigError::Unsupported {
                            owner: OWNER,
                            type_tag: tag.into(),
                            what: "'compression'".into(),
                        });
                    }
                    FileFormat::Csv => {}
                }
            }
            None => {
                if self.connection.as_deref().map_or(true, str::is_empty) {
                    return Err(ConfigError::missing(OWNER, tag, "connection"));
                }
                let table = self
                    .table
                    .as_deref()
                    .ok_or_else(|| ConfigError::missing(OWNER, tag, "table"))?;
                sanitize(table)?;
                if let Some(name) = self.attachment_name() {
                    sanitize(name)?;
                }
                if self.compression.is_some() {
                    return Err(ConfigError::Unsupported {
                        owner: OWNER,
                        type_tag: tag.into(),
                        what: "'compression'".into(),
                    });
                }
            }
        }

        if let Some(keys) = &self.unique_key {
            split_key_list(keys)?;
        }
        Ok(())
    }
}
