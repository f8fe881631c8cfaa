//! Tabular result types for sqlsheet.
//!
//! Defines the structures used to carry a query result from the database to
//! the exporters.

use crate::error::{Result, SqlSheetError};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use std::collections::HashSet;
use std::fmt;
use tracing::warn;

/// An ordered set of column names plus positionally aligned rows.
///
/// Every row holds exactly `columns.len()` values. Zero rows is valid and
/// still exports a header.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TabularResult {
    /// Column names, unique within the result.
    pub columns: Vec<String>,

    /// Rows of data.
    pub rows: Vec<Row>,
}

impl TabularResult {
    /// Creates an empty result with the given columns.
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Creates a result with the given columns and rows.
    pub fn with_rows(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    /// Returns true if the result has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Checks that every row is aligned with the column list.
    pub fn validate(&self) -> Result<()> {
        let expected = self.columns.len();
        for (index, row) in self.rows.iter().enumerate() {
            if row.len() != expected {
                return Err(SqlSheetError::export(format!(
                    "row {} has {} values, expected {}",
                    index + 1,
                    row.len(),
                    expected
                )));
            }
        }
        Ok(())
    }
}

/// Makes column names unique by appending `_2`, `_3`, ... to repeats.
///
/// Servers happily return `SELECT 1 AS a, 2 AS a`; a header with two `a`
/// columns is ambiguous once it reaches a spreadsheet filter.
pub fn unique_column_names(names: Vec<String>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::with_capacity(names.len());
    let mut unique = Vec::with_capacity(names.len());

    for name in names {
        let mut candidate = name.clone();
        let mut n = 2;
        while seen.contains(&candidate) {
            candidate = format!("{name}_{n}");
            n += 1;
        }
        if candidate != name {
            warn!("Duplicate column '{}' renamed to '{}'", name, candidate);
        }
        seen.insert(candidate.clone());
        unique.push(candidate);
    }

    unique
}

/// A row of data from a query result.
pub type Row = Vec<Value>;

/// A single cell value, tagged by the kind of serialization it needs.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    /// NULL value.
    #[default]
    Null,

    Bool(bool),

    /// Signed integer (up to i64).
    Int(i64),

    /// Binary floating point number.
    Float(f64),

    /// Exact decimal in the server's canonical text form (`.` separator, no grouping).
    Numeric(String),

    /// Text, and any server type exported through its own text representation.
    Text(String),

    Date(NaiveDate),

    Time(NaiveTime),

    /// Timestamp without time zone.
    Timestamp(NaiveDateTime),

    /// Timestamp with time zone, normalized to UTC.
    TimestampTz(DateTime<Utc>),

    /// Binary data.
    Bytes(Vec<u8>),
}

impl Value {
    /// Renders the value in a locale-independent form. NULL becomes the
    /// empty string.
    pub fn to_invariant_string(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => format_float(*f),
            Value::Numeric(s) | Value::Text(s) => s.clone(),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
            Value::Time(t) => t.format("%H:%M:%S%.f").to_string(),
            Value::Timestamp(ts) => ts.format("%Y-%m-%d %H:%M:%S%.f").to_string(),
            Value::TimestampTz(ts) => ts.format("%Y-%m-%d %H:%M:%S%.f%:z").to_string(),
            Value::Bytes(b) => format!("0x{}", hex::encode_upper(b)),
        }
    }
}

fn format_float(f: f64) -> String {
    if f.is_nan() {
        "NaN".to_string()
    } else if f.is_infinite() {
        if f.is_sign_positive() {
            "Infinity".to_string()
        } else {
            "-Infinity".to_string()
        }
    } else {
        // Display never groups digits and always uses '.'.
        f.to_string()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_invariant_string())
    }
}

// Conversion implementations for common types
impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::Timestamp(v)
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => Value::Null,
        }
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}
