//! Purpose: Define the closed set of scalar kinds a column can hold.
//! Exports: `ColumnType`, `Value`, `Scalar`, built-in parsers and formatters.
//! Role: Single dispatch point between typed columns and the untyped `Value`.
//! Invariants: Built-in parsers are locale independent; blank input is absent.
//! Invariants: Default formatters round-trip exactly through the built-in parsers.
use std::fmt;

use time::Date;
use time::macros::format_description;

use crate::core::column::{Column, ValueColumn};

const ISO_DATE_LEN: usize = 10;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ColumnType {
    Text,
    Float64,
    Date,
}

impl ColumnType {
    pub fn as_str(self) -> &'static str {
        match self {
            ColumnType::Text => "text",
            ColumnType::Float64 => "double",
            ColumnType::Date => "date",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One present cell value. Absence is expressed as `Option<Value>::None`.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Text(String),
    Float64(f64),
    Date(Date),
}

impl Value {
    pub fn column_type(&self) -> ColumnType {
        match self {
            Value::Text(_) => ColumnType::Text,
            Value::Float64(_) => ColumnType::Float64,
            Value::Date(_) => ColumnType::Date,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float64(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<Date> {
        match self {
            Value::Date(value) => Some(*value),
            _ => None,
        }
    }
}

/// A scalar that a `ValueColumn` can store.
///
/// Implemented for `f64` and `time::Date` only; the set is closed so that
/// `Column` can dispatch on an explicit tag.
pub trait Scalar: Copy + fmt::Debug + PartialEq + Send + Sync + 'static {
    const TYPE: ColumnType;

    fn parse_text(raw: &str) -> Result<Option<Self>, String>;

    fn format_text(&self) -> String;

    fn into_value(self) -> Value;

    fn from_value(value: &Value) -> Option<Self>;

    fn wrap(column: ValueColumn<Self>) -> Column;

    fn column_ref(column: &Column) -> Option<&ValueColumn<Self>>;

    fn column_mut(column: &mut Column) -> Option<&mut ValueColumn<Self>>;
}

impl Scalar for f64 {
    const TYPE: ColumnType = ColumnType::Float64;

    fn parse_text(raw: &str) -> Result<Option<Self>, String> {
        parse_double(raw)
    }

    fn format_text(&self) -> String {
        format_double(*self)
    }

    fn into_value(self) -> Value {
        Value::Float64(self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_f64()
    }

    fn wrap(column: ValueColumn<Self>) -> Column {
        Column::Float64(column)
    }

    fn column_ref(column: &Column) -> Option<&ValueColumn<Self>> {
        match column {
            Column::Float64(column) => Some(column),
            _ => None,
        }
    }

    fn column_mut(column: &mut Column) -> Option<&mut ValueColumn<Self>> {
        match column {
            Column::Float64(column) => Some(column),
            _ => None,
        }
    }
}

impl Scalar for Date {
    const TYPE: ColumnType = ColumnType::Date;

    fn parse_text(raw: &str) -> Result<Option<Self>, String> {
        parse_date(raw)
    }

    fn format_text(&self) -> String {
        format_date(*self)
    }

    fn into_value(self) -> Value {
        Value::Date(self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_date()
    }

    fn wrap(column: ValueColumn<Self>) -> Column {
        Column::Date(column)
    }

    fn column_ref(column: &Column) -> Option<&ValueColumn<Self>> {
        match column {
            Column::Date(column) => Some(column),
            _ => None,
        }
    }

    fn column_mut(column: &mut Column) -> Option<&mut ValueColumn<Self>> {
        match column {
            Column::Date(column) => Some(column),
            _ => None,
        }
    }
}

pub fn parse_double(raw: &str) -> Result<Option<f64>, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse::<f64>()
        .map(Some)
        .map_err(|err| format!("invalid number: {err}"))
}

/// Shortest decimal form that parses back to the same bits.
pub fn format_double(value: f64) -> String {
    format!("{value}")
}

/// Accepts `YYYY-MM-DD`, optionally followed by a `T` or space time part.
pub fn parse_date(raw: &str) -> Result<Option<Date>, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let date_part = if trimmed.len() == ISO_DATE_LEN {
        trimmed
    } else if trimmed.len() > ISO_DATE_LEN
        && matches!(trimmed.as_bytes()[ISO_DATE_LEN], b'T' | b' ')
    {
        trimmed
            .get(..ISO_DATE_LEN)
            .ok_or_else(|| "expected YYYY-MM-DD".to_string())?
    } else {
        return Err("expected YYYY-MM-DD".to_string());
    };
    Date::parse(date_part, format_description!("[year]-[month]-[day]"))
        .map(Some)
        .map_err(|err| format!("invalid date: {err}"))
}

pub fn format_date(date: Date) -> String {
    format!(
        "{:04}-{:02}-{:02}",
        date.year(),
        u8::from(date.month()),
        date.day()
    )
}
