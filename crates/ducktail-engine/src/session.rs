//! Execution engine session.
//!
//! [`SqlSession`] is the narrow set of engine primitives adapters and the
//! runner need. [`EngineSession`] implements it over one DuckDB connection
//! owned for the length of a run; dropping the session closes the
//! connection on every exit path. [`SessionFactory`] is how the runner
//! acquires a session, so tests can substitute their own.

use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use duckdb::arrow::datatypes::DataType;
use duckdb::types::{TimeUnit, Value};
use duckdb::{Connection, Statement};
use ducktail_types::{sanitize, RuntimeOptions, WatermarkValue};
use serde::{Deserialize, Serialize};

use crate::adapter::sql::quote_literal;
use crate::errors::{PipelineError, SessionError};
use crate::result::Row;

/// One column of a described relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    /// Engine type name as reported by `DESCRIBE`, e.g. `BIGINT`.
    pub data_type: String,
}

/// Engine primitives consumed by adapters and the runner.
pub trait SqlSession {
    /// Execute one or more statements, discarding results.
    ///
    /// # Errors
    ///
    /// Returns the engine's error for the first failing statement.
    fn execute(&self, sql: &str) -> Result<(), SessionError>;

    /// Run a query and collect every row as a JSON object.
    ///
    /// # Errors
    ///
    /// Returns the engine's error if the query fails.
    fn query(&self, sql: &str) -> Result<Vec<Row>, SessionError>;

    /// First column of the first row as a typed scalar; `None` for SQL NULL
    /// or an empty result.
    ///
    /// # Errors
    ///
    /// Returns the engine's error if the query fails.
    fn query_scalar(&self, sql: &str) -> Result<Option<WatermarkValue>, SessionError>;

    /// Column names and types of a table name or a query.
    ///
    /// # Errors
    ///
    /// Fails when the relation does not exist or cannot be bound.
    fn describe(&self, relation: &str) -> Result<Vec<ColumnInfo>, SessionError> {
        let rows = self.query(&format!("DESCRIBE {relation}"))?;
        rows.iter()
            .map(|row| {
                let text = |key: &str| {
                    row.get(key)
                        .and_then(serde_json::Value::as_str)
                        .map(str::to_string)
                        .ok_or_else(|| SessionError::new(format!("DESCRIBE returned no '{key}'")))
                };
                Ok(ColumnInfo {
                    name: text("column_name")?,
                    data_type: text("column_type")?,
                })
            })
            .collect()
    }

    fn begin(&self) -> Result<(), SessionError> {
        self.execute("BEGIN TRANSACTION")
    }

    fn commit(&self) -> Result<(), SessionError> {
        self.execute("COMMIT")
    }

    fn rollback(&self) -> Result<(), SessionError> {
        self.execute("ROLLBACK")
    }
}

/// Opens a fresh session for each run.
pub trait SessionFactory: Send + Sync {
    /// # Errors
    ///
    /// Returns [`PipelineError::EngineInit`] when the engine cannot be
    /// brought up with the required capabilities.
    fn open(&self, options: &RuntimeOptions) -> Result<Box<dyn SqlSession>, PipelineError>;
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Process-level engine configuration (the `engine:` block).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineSettings {
    /// Persisted database file; in-memory when `None`.
    pub database: Option<PathBuf>,
    /// Extensions that must load or the run fails.
    pub required_extensions: Vec<String>,
    /// Extensions loaded best-effort.
    pub optional_extensions: Vec<String>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            database: None,
            required_extensions: vec!["postgres".into(), "httpfs".into()],
            optional_extensions: vec!["snowflake".into()],
        }
    }
}

impl EngineSettings {
    /// In-memory engine that loads no extensions. Enough for file sources
    /// and attached DuckDB databases.
    #[must_use]
    pub fn local() -> Self {
        Self {
            database: None,
            required_extensions: Vec::new(),
            optional_extensions: Vec::new(),
        }
    }
}

/// Object-storage credentials taken from the process environment.
#[derive(Clone, PartialEq, Eq)]
pub struct ObjectStoreCredentials {
    pub region: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

impl std::fmt::Debug for ObjectStoreCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStoreCredentials")
            .field("region", &self.region)
            .field("access_key_id", &self.access_key_id.as_ref().map(|_| "<set>"))
            .field("secret_access_key", &self.secret_access_key.as_ref().map(|_| "<set>"))
            .finish()
    }
}

impl ObjectStoreCredentials {
    pub const DEFAULT_REGION: &'static str = "us-east-1";

    /// Read `AWS_REGION`, `AWS_ACCESS_KEY_ID`, and `AWS_SECRET_ACCESS_KEY`.
    #[must_use]
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        Self {
            region: var("AWS_REGION").unwrap_or_else(|| Self::DEFAULT_REGION.to_string()),
            access_key_id: var("AWS_ACCESS_KEY_ID"),
            secret_access_key: var("AWS_SECRET_ACCESS_KEY"),
        }
    }

    /// Whether explicit keys are present; otherwise ambient role credentials
    /// are left to the storage extension.
    #[must_use]
    pub fn has_keys(&self) -> bool {
        self.access_key_id.is_some() && self.secret_access_key.is_some()
    }

    /// `SET` statements applying these credentials.
    #[must_use]
    pub fn statements(&self) -> Vec<String> {
        let mut stmts = vec![format!("SET s3_region = {}", quote_literal(&self.region))];
        if let (Some(key), Some(secret)) = (&self.access_key_id, &self.secret_access_key) {
            stmts.push(format!("SET s3_access_key_id = {}", quote_literal(key)));
            stmts.push(format!("SET s3_secret_access_key = {}", quote_literal(secret)));
        }
        stmts
    }
}

// ---------------------------------------------------------------------------
// DuckDB session
// ---------------------------------------------------------------------------

/// A configured DuckDB connection.
pub struct EngineSession {
    conn: Connection,
}

impl EngineSession {
    /// Open and configure a session.
    ///
    /// Required extensions that fail to install or load are fatal; optional
    /// ones only log a warning. Object-storage settings are applied when
    /// `httpfs` is loaded. Thread and memory limits come from `options`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Config`] for an unsafe extension name and
    /// [`PipelineError::EngineInit`] for anything the engine rejects.
    pub fn open(settings: &EngineSettings, options: &RuntimeOptions) -> Result<Self, PipelineError> {
        tracing::info!(
            threads = options.threads,
            memory_limit = %options.memory_limit,
            persisted = settings.database.is_some(),
            "Initializing engine session"
        );

        let conn = match &settings.database {
            Some(path) => Connection::open(path),
            None => Connection::open_in_memory(),
        }
        .map_err(|e| PipelineError::engine_init("failed to open database", Some(e.into())))?;
        let session = Self { conn };

        let mut loaded = Vec::new();
        for ext in &settings.required_extensions {
            session.load_extension(ext).map_err(|e| match e {
                LoadFailure::Config(c) => PipelineError::Config(c),
                LoadFailure::Engine(e) => PipelineError::engine_init(
                    format!("required extension '{ext}' failed to load"),
                    Some(e),
                ),
            })?;
            loaded.push(ext.as_str());
        }
        for ext in &settings.optional_extensions {
            match session.load_extension(ext) {
                Ok(()) => loaded.push(ext.as_str()),
                Err(LoadFailure::Config(c)) => return Err(c.into()),
                Err(LoadFailure::Engine(e)) => {
                    tracing::warn!(extension = %ext, error = %e, "Optional extension not loaded");
                }
            }
        }

        if loaded.contains(&"httpfs") {
            session.configure_object_store(&ObjectStoreCredentials::from_env());
        }

        session
            .execute(&format!(
                "SET threads = {}; SET memory_limit = {};",
                options.threads,
                quote_literal(&options.memory_limit)
            ))
            .map_err(|e| PipelineError::engine_init("failed to apply session limits", Some(e)))?;

        Ok(session)
    }

    fn load_extension(&self, name: &str) -> Result<(), LoadFailure> {
        let name = sanitize(name).map_err(LoadFailure::Config)?;
        self.execute(&format!("INSTALL {name}; LOAD {name};"))
            .map_err(LoadFailure::Engine)?;
        tracing::debug!(extension = name, "Loaded extension");
        Ok(())
    }

    fn configure_object_store(&self, creds: &ObjectStoreCredentials) {
        for stmt in creds.statements() {
            if let Err(e) = self.execute(&stmt) {
                tracing::warn!(error = %e, "Object storage configuration failed; S3 access may not work");
                return;
            }
        }
        if creds.has_keys() {
            tracing::info!(region = %creds.region, "Configured object storage with access keys");
        } else {
            tracing::info!(
                region = %creds.region,
                "No object storage keys in environment; relying on ambient role credentials"
            );
        }
    }
}

enum LoadFailure {
    Config(ducktail_types::ConfigError),
    Engine(SessionError),
}

impl Drop for EngineSession {
    fn drop(&mut self) {
        tracing::debug!("Engine session closed");
    }
}

impl SqlSession for EngineSession {
    fn execute(&self, sql: &str) -> Result<(), SessionError> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    fn query(&self, sql: &str) -> Result<Vec<Row>, SessionError> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query([])?;
        let names = rows.as_ref().map(|s| s.column_names()).unwrap_or_default();
        let zoned: Vec<bool> = (0..names.len())
            .map(|idx| rows.as_ref().is_some_and(|s| is_zoned(s, idx)))
            .collect();

        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut record = Row::new();
            for (idx, name) in names.iter().enumerate() {
                let value: Value = row.get(idx)?;
                record.insert(name.clone(), json_value(value, zoned[idx]));
            }
            out.push(record);
        }
        Ok(out)
    }

    fn query_scalar(&self, sql: &str) -> Result<Option<WatermarkValue>, SessionError> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query([])?;
        let zoned = rows.as_ref().is_some_and(|s| is_zoned(s, 0));
        match rows.next()? {
            Some(row) => scalar_value(row.get::<_, Value>(0)?, zoned).map_err(|other| {
                SessionError::new(format!(
                    "{} values have no comparable literal form",
                    other.data_type()
                ))
            }),
            None => Ok(None),
        }
    }
}

/// Opens an [`EngineSession`] per run from fixed settings.
#[derive(Debug, Clone)]
pub struct DuckDbSessionFactory {
    settings: EngineSettings,
}

impl DuckDbSessionFactory {
    #[must_use]
    pub fn new(settings: EngineSettings) -> Self {
        Self { settings }
    }

}

impl SessionFactory for DuckDbSessionFactory {
    fn open(&self, options: &RuntimeOptions) -> Result<Box<dyn SqlSession>, PipelineError> {
        Ok(Box::new(EngineSession::open(&self.settings, options)?))
    }
}

// ---------------------------------------------------------------------------
// Value conversion
// ---------------------------------------------------------------------------

/// Whether result column `idx` is a time-zone aware timestamp.
fn is_zoned(stmt: &Statement<'_>, idx: usize) -> bool {
    idx < stmt.column_count() && matches!(stmt.column_type(idx), DataType::Timestamp(_, Some(_)))
}

fn nanos(unit: TimeUnit, value: i64) -> i64 {
    match unit {
        TimeUnit::Second => value.saturating_mul(1_000_000_000),
        TimeUnit::Millisecond => value.saturating_mul(1_000_000),
        TimeUnit::Microsecond => value.saturating_mul(1_000),
        TimeUnit::Nanosecond => value,
    }
}

fn timestamp(unit: TimeUnit, value: i64) -> Option<DateTime<Utc>> {
    match unit {
        TimeUnit::Second => DateTime::from_timestamp(value, 0),
        TimeUnit::Millisecond => DateTime::from_timestamp_millis(value),
        TimeUnit::Microsecond => DateTime::from_timestamp_micros(value),
        TimeUnit::Nanosecond => Some(DateTime::from_timestamp_nanos(value)),
    }
}

/// `%.f` prints as many fractional digits (3, 6 or 9) as the value needs,
/// so nanosecond timestamps keep full precision.
fn timestamp_text(unit: TimeUnit, value: i64) -> String {
    timestamp(unit, value).map_or_else(
        || value.to_string(),
        |ts| ts.naive_utc().format("%Y-%m-%d %H:%M:%S%.f").to_string(),
    )
}

fn time_text(unit: TimeUnit, value: i64) -> String {
    let total = nanos(unit, value);
    let secs = u32::try_from(total.div_euclid(1_000_000_000)).ok();
    let frac = u32::try_from(total.rem_euclid(1_000_000_000)).ok();
    secs.zip(frac)
        .and_then(|(secs, frac)| NaiveTime::from_num_seconds_from_midnight_opt(secs, frac))
        .map_or_else(|| value.to_string(), |t| t.format("%H:%M:%S%.f").to_string())
}

/// Days between 0001-01-01 and 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

fn date_text(days: i32) -> String {
    days.checked_add(UNIX_EPOCH_DAYS_FROM_CE)
        .and_then(NaiveDate::from_num_days_from_ce_opt)
        .map_or_else(|| days.to_string(), |d| d.format("%Y-%m-%d").to_string())
}

fn int_or_decimal<T>(v: T) -> WatermarkValue
where
    T: Copy + ToString + TryInto<i64>,
{
    v.try_into()
        .map_or_else(|_| WatermarkValue::Decimal(v.to_string()), WatermarkValue::Int)
}

/// Map an engine value to a typed scalar. NULL maps to `Ok(None)`.
///
/// `zoned` marks a `TIMESTAMPTZ` column; its instant is rendered in UTC
/// with an explicit `+00`. Values with no literal form that compares
/// correctly against their column (intervals, blobs, nested types) are
/// handed back as `Err`.
pub(crate) fn scalar_value(value: Value, zoned: bool) -> Result<Option<WatermarkValue>, Value> {
    Ok(Some(match value {
        Value::Null => return Ok(None),
        Value::TinyInt(v) => WatermarkValue::Int(v.into()),
        Value::SmallInt(v) => WatermarkValue::Int(v.into()),
        Value::Int(v) => WatermarkValue::Int(v.into()),
        Value::BigInt(v) => WatermarkValue::Int(v),
        Value::UTinyInt(v) => WatermarkValue::Int(v.into()),
        Value::USmallInt(v) => WatermarkValue::Int(v.into()),
        Value::UInt(v) => WatermarkValue::Int(v.into()),
        Value::UBigInt(v) => int_or_decimal(v),
        Value::HugeInt(v) => int_or_decimal(v),
        Value::Float(v) => WatermarkValue::Float(v.into()),
        Value::Double(v) => WatermarkValue::Float(v),
        Value::Decimal(v) => WatermarkValue::Decimal(v.to_string()),
        Value::Text(v) | Value::Enum(v) => WatermarkValue::Text(v),
        Value::Boolean(v) => WatermarkValue::Text(v.to_string()),
        Value::Date32(days) => WatermarkValue::Date(date_text(days)),
        Value::Time64(unit, v) => WatermarkValue::Time(time_text(unit, v)),
        Value::Timestamp(unit, v) if zoned => {
            WatermarkValue::TimestampTz(format!("{}+00", timestamp_text(unit, v)))
        }
        Value::Timestamp(TimeUnit::Nanosecond, v) => {
            WatermarkValue::TimestampNs(timestamp_text(TimeUnit::Nanosecond, v))
        }
        Value::Timestamp(unit, v) => WatermarkValue::Timestamp(timestamp_text(unit, v)),
        other => return Err(other),
    }))
}

/// Display form of one result cell.
fn json_value(value: Value, zoned: bool) -> serde_json::Value {
    use serde_json::Value as J;

    match value {
        Value::Boolean(v) => J::Bool(v),
        Value::List(items) => J::Array(items.into_iter().map(|v| json_value(v, false)).collect()),
        other => match scalar_value(other, zoned) {
            Ok(None) => J::Null,
            Ok(Some(WatermarkValue::Int(v))) => J::from(v),
            Ok(Some(WatermarkValue::Float(v))) => {
                serde_json::Number::from_f64(v).map_or_else(|| J::String(v.to_string()), J::Number)
            }
            Ok(Some(other)) => J::String(other.as_text().unwrap_or_default().to_string()),
            Err(other) => J::String(format!("{other:?}")),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_match_remote_backends() {
        let s = EngineSettings::default();
        assert_eq!(s.required_extensions, ["postgres", "httpfs"]);
        assert_eq!(s.optional_extensions, ["snowflake"]);
        assert!(s.database.is_none());
        assert!(EngineSettings::local().required_extensions.is_empty());
    }

    #[test]
    fn credentials_emit_keys_only_when_both_present() {
        let creds = ObjectStoreCredentials {
            region: "eu-west-1".into(),
            access_key_id: Some("AKIA".into()),
            secret_access_key: None,
        };
        assert!(!creds.has_keys());
        assert_eq!(creds.statements(), ["SET s3_region = 'eu-west-1'"]);

        let creds = ObjectStoreCredentials {
            secret_access_key: Some("s'cret".into()),
            ..creds
        };
        let stmts = creds.statements();
        assert_eq!(stmts.len(), 3);
        assert_eq!(stmts[2], "SET s3_secret_access_key = 's''cret'");
    }

    #[test]
    fn credentials_debug_hides_secrets() {
        let creds = ObjectStoreCredentials {
            region: "us-east-1".into(),
            access_key_id: Some("AKIAXYZ".into()),
            secret_access_key: Some("topsecret".into()),
        };
        let dbg = format!("{creds:?}");
        assert!(!dbg.contains("topsecret") && !dbg.contains("AKIAXYZ"), "{dbg}");
    }

    #[test]
    fn local_session_applies_limits_and_queries() {
        let opts = RuntimeOptions::default();
        let session = EngineSession::open(&EngineSettings::local(), &opts).unwrap();
        let threads = session
            .query_scalar("SELECT CAST(current_setting('threads') AS BIGINT)")
            .unwrap();
        assert_eq!(threads, Some(WatermarkValue::Int(4)));

        session
            .execute("CREATE TABLE t (id INTEGER, name VARCHAR, d DATE); INSERT INTO t VALUES (1, 'a', DATE '2024-03-05'), (2, NULL, NULL);")
            .unwrap();
        let rows = session.query("SELECT * FROM t ORDER BY id").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["id"], serde_json::json!(1));
        assert_eq!(rows[0]["d"], serde_json::json!("2024-03-05"));
        assert_eq!(rows[1]["name"], serde_json::Value::Null);

        let cols = session.describe("t").unwrap();
        assert_eq!(cols[0].name, "id");
        assert_eq!(cols[0].data_type, "INTEGER");
        assert_eq!(cols[2].data_type, "DATE");
    }

    #[test]
    fn scalar_types_are_preserved() {
        let session =
            EngineSession::open(&EngineSettings::local(), &RuntimeOptions::default()).unwrap();
        assert_eq!(
            session.query_scalar("SELECT MAX(x) FROM (VALUES (1), (7)) v(x)").unwrap(),
            Some(WatermarkValue::Int(7))
        );
        assert_eq!(
            session.query_scalar("SELECT TIMESTAMP '2024-05-01 12:30:00'").unwrap(),
            Some(WatermarkValue::Timestamp("2024-05-01 12:30:00".into()))
        );
        assert_eq!(
            session.query_scalar("SELECT DATE '1999-12-31'").unwrap(),
            Some(WatermarkValue::Date("1999-12-31".into()))
        );
        assert_eq!(session.query_scalar("SELECT NULL").unwrap(), None);
    }

    #[test]
    fn precise_temporal_scalars_keep_type_and_precision() {
        let session =
            EngineSession::open(&EngineSettings::local(), &RuntimeOptions::default()).unwrap();
        assert_eq!(
            session.query_scalar("SELECT TIME '08:15:30.25'").unwrap(),
            Some(WatermarkValue::Time("08:15:30.250".into()))
        );
        assert_eq!(
            session
                .query_scalar("SELECT CAST('2024-05-01 12:30:00.123456789' AS TIMESTAMP_NS)")
                .unwrap(),
            Some(WatermarkValue::TimestampNs("2024-05-01 12:30:00.123456789".into()))
        );
        assert_eq!(
            session
                .query_scalar("SELECT TIMESTAMPTZ '2024-05-01 12:30:00+00'")
                .unwrap(),
            Some(WatermarkValue::TimestampTz("2024-05-01 12:30:00+00".into()))
        );
    }

    #[test]
    fn interval_scalar_is_rejected() {
        let session =
            EngineSession::open(&EngineSettings::local(), &RuntimeOptions::default()).unwrap();
        let err = session.query_scalar("SELECT INTERVAL 3 DAY").unwrap_err();
        assert!(err.message().contains("no comparable literal"), "{err}");
    }

    #[test]
    fn time_text_handles_units() {
        assert_eq!(time_text(TimeUnit::Microsecond, 1_500_000), "00:00:01.500");
        assert_eq!(time_text(TimeUnit::Nanosecond, 3_600_000_000_007), "01:00:00.000000007");
        assert_eq!(
            timestamp_text(TimeUnit::Nanosecond, 1_000_000_001),
            "1970-01-01 00:00:01.000000001"
        );
        assert_eq!(timestamp_text(TimeUnit::Second, 86_400), "1970-01-02 00:00:00");
    }

    #[test]
    fn unsafe_extension_name_is_config_error() {
        let settings = EngineSettings {
            required_extensions: vec!["httpfs; DROP".into()],
            ..EngineSettings::local()
        };
        let err = EngineSession::open(&settings, &RuntimeOptions::default())
            .err()
            .unwrap();
        assert!(err.is_config(), "got: {err}");
    }
}
