//! Purpose: Named, typed, append-only column storage.
//! Exports: `Column`, `TextColumn`, `ValueColumn`, `Parser`, `Formatter`.
//! Role: Leaf storage for `Table`; every variant exposes the same append/get/format shape.
//! Invariants: Columns only grow; appended values are never rewritten.
//! Invariants: A failed `append` leaves the column unchanged.
//! Invariants: Columns do not know their table; name uniqueness is the table's job.
use std::fmt;
use std::sync::Arc;

use time::Date;

use crate::core::error::{Error, ErrorKind};
use crate::core::scalar::{ColumnType, Scalar, Value};

/// Converts one raw field into a typed value; `Ok(None)` means absent.
pub type Parser<T> = Arc<dyn Fn(&str) -> Result<Option<T>, String> + Send + Sync>;

/// Renders one present value for text output.
pub type Formatter<T> = Arc<dyn Fn(&T) -> String + Send + Sync>;

fn out_of_range(name: &str, index: usize, len: usize) -> Error {
    Error::new(ErrorKind::IndexOutOfRange)
        .with_message(format!("row {index} out of range for column of length {len}"))
        .with_column(name)
        .with_row(index as u64)
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TextColumn {
    name: String,
    values: Vec<String>,
}

impl TextColumn {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: Vec::new(),
        }
    }

    pub fn from_values<I, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn append(&mut self, raw: &str) {
        self.values.push(raw.to_string());
    }

    pub fn get(&self, index: usize) -> Result<&str, Error> {
        self.values
            .get(index)
            .map(String::as_str)
            .ok_or_else(|| out_of_range(&self.name, index, self.values.len()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(String::as_str)
    }
}

pub struct ValueColumn<T: Scalar> {
    name: String,
    values: Vec<Option<T>>,
    parser: Parser<T>,
    formatter: Option<Formatter<T>>,
}

impl<T: Scalar> ValueColumn<T> {
    /// A column using the built-in parser and formatter for `T`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: Vec::new(),
            parser: Arc::new(T::parse_text),
            formatter: None,
        }
    }

    pub fn with_parser<F>(name: impl Into<String>, parser: F) -> Self
    where
        F: Fn(&str) -> Result<Option<T>, String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            values: Vec::new(),
            parser: Arc::new(parser),
            formatter: None,
        }
    }

    pub fn from_values<I>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = Option<T>>,
    {
        let mut column = Self::new(name);
        column.values = values.into_iter().collect();
        column
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn append(&mut self, raw: &str) -> Result<(), Error> {
        let parsed = (self.parser)(raw).map_err(|reason| {
            Error::new(ErrorKind::Parse)
                .with_message(format!("cannot parse {} value: {reason}", T::TYPE))
                .with_column(self.name.as_str())
                .with_value(raw)
        })?;
        self.values.push(parsed);
        Ok(())
    }

    pub fn push(&mut self, value: Option<T>) {
        self.values.push(value);
    }

    pub fn get(&self, index: usize) -> Result<Option<T>, Error> {
        self.values
            .get(index)
            .copied()
            .ok_or_else(|| out_of_range(&self.name, index, self.values.len()))
    }

    pub fn values(&self) -> &[Option<T>] {
        &self.values
    }

    /// Replace the formatter used by `format_at`. Stored values are unaffected.
    pub fn set_formatter<F>(&mut self, formatter: F)
    where
        F: Fn(&T) -> String + Send + Sync + 'static,
    {
        self.formatter = Some(Arc::new(formatter));
    }

    pub fn reset_formatter(&mut self) {
        self.formatter = None;
    }

    pub fn format_at(&self, index: usize) -> Result<String, Error> {
        Ok(match self.get(index)? {
            Some(value) => self.format_value(&value),
            None => String::new(),
        })
    }

    fn format_value(&self, value: &T) -> String {
        match &self.formatter {
            Some(formatter) => formatter(value),
            None => value.format_text(),
        }
    }
}

impl<T: Scalar> Clone for ValueColumn<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            values: self.values.clone(),
            parser: Arc::clone(&self.parser),
            formatter: self.formatter.clone(),
        }
    }
}

impl<T: Scalar> fmt::Debug for ValueColumn<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueColumn")
            .field("name", &self.name)
            .field("type", &T::TYPE)
            .field("values", &self.values)
            .field("custom_formatter", &self.formatter.is_some())
            .finish()
    }
}

/// A column of one of the supported backing types.
#[derive(Clone, Debug)]
pub enum Column {
    Text(TextColumn),
    Float64(ValueColumn<f64>),
    Date(ValueColumn<Date>),
}

impl Column {
    pub fn text(name: impl Into<String>) -> Self {
        Column::Text(TextColumn::new(name))
    }

    pub fn float64(name: impl Into<String>) -> Self {
        Column::Float64(ValueColumn::new(name))
    }

    pub fn date(name: impl Into<String>) -> Self {
        Column::Date(ValueColumn::new(name))
    }

    /// An empty column of the given type with the built-in parser.
    pub fn of_type(name: impl Into<String>, column_type: ColumnType) -> Self {
        match column_type {
            ColumnType::Text => Column::text(name),
            ColumnType::Float64 => Column::float64(name),
            ColumnType::Date => Column::date(name),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Column::Text(column) => column.name(),
            Column::Float64(column) => column.name(),
            Column::Date(column) => column.name(),
        }
    }

    pub(crate) fn set_name(&mut self, name: String) {
        match self {
            Column::Text(column) => column.name = name,
            Column::Float64(column) => column.name = name,
            Column::Date(column) => column.name = name,
        }
    }

    pub fn column_type(&self) -> ColumnType {
        match self {
            Column::Text(_) => ColumnType::Text,
            Column::Float64(_) => ColumnType::Float64,
            Column::Date(_) => ColumnType::Date,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Column::Text(column) => column.len(),
            Column::Float64(column) => column.len(),
            Column::Date(column) => column.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn append(&mut self, raw: &str) -> Result<(), Error> {
        match self {
            Column::Text(column) => {
                column.append(raw);
                Ok(())
            }
            Column::Float64(column) => column.append(raw),
            Column::Date(column) => column.append(raw),
        }
    }

    pub fn append_absent(&mut self) {
        match self {
            Column::Text(column) => column.append(""),
            Column::Float64(column) => column.push(None),
            Column::Date(column) => column.push(None),
        }
    }

    pub fn get(&self, index: usize) -> Result<Option<Value>, Error> {
        match self {
            Column::Text(column) => Ok(Some(Value::Text(column.get(index)?.to_string()))),
            Column::Float64(column) => Ok(column.get(index)?.map(Scalar::into_value)),
            Column::Date(column) => Ok(column.get(index)?.map(Scalar::into_value)),
        }
    }

    pub fn format_at(&self, index: usize) -> Result<String, Error> {
        match self {
            Column::Text(column) => Ok(column.get(index)?.to_string()),
            Column::Float64(column) => column.format_at(index),
            Column::Date(column) => column.format_at(index),
        }
    }
}

impl From<TextColumn> for Column {
    fn from(column: TextColumn) -> Self {
        Column::Text(column)
    }
}

impl<T: Scalar> From<ValueColumn<T>> for Column {
    fn from(column: ValueColumn<T>) -> Self {
        T::wrap(column)
    }
}
