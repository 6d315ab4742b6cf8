//! Statement-building helpers.
//!
//! Only values that passed the identifier sanitizer are spliced bare.
//! Paths, connection strings, and watermark text go through
//! [`quote_literal`]; engine-reported column names go through
//! [`quote_ident`].

use std::borrow::Cow;
use std::sync::LazyLock;

use ducktail_types::WatermarkValue;
use regex::Regex;

static NUMERIC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?\d+(\.\d+)?$").expect("valid numeric regex"));

/// Single-quoted SQL string literal with embedded quotes doubled.
#[must_use]
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Double-quote an identifier when it needs it.
#[must_use]
pub fn quote_ident(name: &str) -> Cow<'_, str> {
    pg_escape::quote_identifier(name)
}

/// SQL literal for a watermark, typed by its kind.
#[must_use]
pub fn watermark_literal(value: &WatermarkValue) -> String {
    match value {
        WatermarkValue::Int(v) => v.to_string(),
        WatermarkValue::Float(v) if v.is_finite() => format!("{v:?}"),
        WatermarkValue::Float(v) => format!("CAST({} AS DOUBLE)", quote_literal(&v.to_string())),
        WatermarkValue::Decimal(v) if NUMERIC_RE.is_match(v) => v.clone(),
        WatermarkValue::Decimal(v) | WatermarkValue::Text(v) => quote_literal(v),
        WatermarkValue::Date(v) => format!("DATE {}", quote_literal(v)),
        WatermarkValue::Time(v) => format!("TIME {}", quote_literal(v)),
        WatermarkValue::Timestamp(v) => format!("TIMESTAMP {}", quote_literal(v)),
        WatermarkValue::TimestampNs(v) => format!("TIMESTAMP_NS {}", quote_literal(v)),
        WatermarkValue::TimestampTz(v) => format!("TIMESTAMPTZ {}", quote_literal(v)),
    }
}
