//! Watermark model types.
//!
//! A watermark is the highest value of a pipeline's incremental key seen by
//! the last successful run. Values keep their engine type so that the next
//! run can compare against a correctly typed literal.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Pipeline name
// ---------------------------------------------------------------------------

/// Name a pipeline is registered under; the watermark key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PipelineName(String);

impl PipelineName {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PipelineName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PipelineName {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for PipelineName {
    fn from(value: String) -> Self {
        Self(value)
    }
}

// ---------------------------------------------------------------------------
// Typed values
// ---------------------------------------------------------------------------

/// Logical type of a [`WatermarkValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatermarkKind {
    Int,
    Float,
    Decimal,
    Text,
    Date,
    Time,
    Timestamp,
    TimestampNs,
    TimestampTz,
}

impl WatermarkKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Float => "float",
            Self::Decimal => "decimal",
            Self::Text => "text",
            Self::Date => "date",
            Self::Time => "time",
            Self::Timestamp => "timestamp",
            Self::TimestampNs => "timestamp_ns",
            Self::TimestampTz => "timestamp_tz",
        }
    }
}

impl fmt::Display for WatermarkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed watermark position.
///
/// Temporal values are stored in the engine's canonical text form
/// (`2024-05-01`, `2024-05-01 12:30:00.250`) so they can be replayed as
/// typed literals. Nanosecond timestamps keep all nine fractional digits
/// and zoned timestamps are normalised to UTC with an explicit `+00`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum WatermarkValue {
    Int(i64),
    Float(f64),
    /// Exact decimal kept as text to avoid rounding.
    Decimal(String),
    Text(String),
    Date(String),
    Time(String),
    Timestamp(String),
    TimestampNs(String),
    TimestampTz(String),
}

impl WatermarkValue {
    #[must_use]
    pub fn kind(&self) -> WatermarkKind {
        match self {
            Self::Int(_) => WatermarkKind::Int,
            Self::Float(_) => WatermarkKind::Float,
            Self::Decimal(_) => WatermarkKind::Decimal,
            Self::Text(_) => WatermarkKind::Text,
            Self::Date(_) => WatermarkKind::Date,
            Self::Time(_) => WatermarkKind::Time,
            Self::Timestamp(_) => WatermarkKind::Timestamp,
            Self::TimestampNs(_) => WatermarkKind::TimestampNs,
            Self::TimestampTz(_) => WatermarkKind::TimestampTz,
        }
    }

    /// The text form of every non-numeric value.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Int(_) | Self::Float(_) => None,
            Self::Decimal(v)
            | Self::Text(v)
            | Self::Date(v)
            | Self::Time(v)
            | Self::Timestamp(v)
            | Self::TimestampNs(v)
            | Self::TimestampTz(v) => Some(v),
        }
    }

    /// Plain JSON scalar for the persisted document.
    ///
    /// JSON has no NaN or infinity, so non-finite floats are written as the
    /// strings `NaN`, `inf` and `-inf`.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as J;

        match self {
            Self::Int(v) => J::from(*v),
            Self::Float(v) => {
                serde_json::Number::from_f64(*v).map_or_else(|| J::from(v.to_string()), J::Number)
            }
            other => J::from(other.as_text().unwrap_or_default()),
        }
    }

    /// Rebuild a value from a persisted JSON scalar.
    ///
    /// When `kind` is absent (older documents hold only the scalar) the type
    /// is inferred: integers, floats, and otherwise text. Returns `None` for
    /// nulls, containers, and scalars that do not fit `kind`.
    #[must_use]
    pub fn from_json(value: &serde_json::Value, kind: Option<WatermarkKind>) -> Option<Self> {
        use serde_json::Value as J;

        match (kind, value) {
            (_, J::Null | J::Array(_) | J::Object(_) | J::Bool(_)) => None,
            (Some(WatermarkKind::Int) | None, J::Number(n)) if n.is_i64() => n.as_i64().map(Self::Int),
            (Some(WatermarkKind::Int), J::String(s)) => s.parse().ok().map(Self::Int),
            (Some(WatermarkKind::Int), J::Number(_)) => None,
            (Some(WatermarkKind::Float) | None, J::Number(n)) => n.as_f64().map(Self::Float),
            (Some(WatermarkKind::Float), J::String(s)) => s.parse().ok().map(Self::Float),
            (Some(WatermarkKind::Decimal), J::Number(n)) => Some(Self::Decimal(n.to_string())),
            (Some(WatermarkKind::Decimal), J::String(s)) => Some(Self::Decimal(s.clone())),
            (Some(WatermarkKind::Text) | None, J::String(s)) => Some(Self::Text(s.clone())),
            (Some(WatermarkKind::Date), J::String(s)) => Some(Self::Date(s.clone())),
            (Some(WatermarkKind::Time), J::String(s)) => Some(Self::Time(s.clone())),
            (Some(WatermarkKind::Timestamp), J::String(s)) => Some(Self::Timestamp(s.clone())),
            (Some(WatermarkKind::TimestampNs), J::String(s)) => Some(Self::TimestampNs(s.clone())),
            (Some(WatermarkKind::TimestampTz), J::String(s)) => Some(Self::TimestampTz(s.clone())),
            (
                Some(
                    WatermarkKind::Text
                    | WatermarkKind::Date
                    | WatermarkKind::Time
                    | WatermarkKind::Timestamp
                    | WatermarkKind::TimestampNs
                    | WatermarkKind::TimestampTz,
                ),
                J::Number(n),
            ) => Some(Self::Text(n.to_string())),
        }
    }
}

impl fmt::Display for WatermarkValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            other => f.write_str(other.as_text().unwrap_or_default()),
        }
    }
}

/// Stored watermark for one pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatermarkRecord {
    pub pipeline: PipelineName,
    pub value: WatermarkValue,
    /// Unix epoch seconds of the run that stored the value.
    pub last_run: i64,
}
