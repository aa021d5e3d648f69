//! Purpose: Ordered set of equal-length named columns.
//! Exports: `Table`, `ColumnRef`, `Rows`.
//! Role: Owns column binding, lookup, renaming and row materialization.
//! Invariants: Every column length equals `row_count()`.
//! Invariants: Column names are unique; every mutating call checks before it commits.
//! Invariants: A rejected call leaves the column list unchanged.
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::column::{Column, TextColumn, ValueColumn};
use crate::core::error::{Error, ErrorKind};
use crate::core::scalar::{Scalar, Value};

/// Column lookup by position or by name.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ColumnRef<'a> {
    Index(usize),
    Name(&'a str),
}

impl From<usize> for ColumnRef<'_> {
    fn from(index: usize) -> Self {
        ColumnRef::Index(index)
    }
}

impl<'a> From<&'a str> for ColumnRef<'a> {
    fn from(name: &'a str) -> Self {
        ColumnRef::Name(name)
    }
}

impl<'a> From<&'a String> for ColumnRef<'a> {
    fn from(name: &'a String) -> Self {
        ColumnRef::Name(name.as_str())
    }
}

#[derive(Clone, Debug, Default)]
pub struct Table {
    source: Option<PathBuf>,
    pub(crate) columns: Vec<Column>,
    pub(crate) rows: usize,
}

impl Table {
    /// An in-memory table with no source file.
    pub fn new() -> Self {
        Self::default()
    }

    /// A table backed by a delimited text file, read later by `begin_read`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let metadata = fs::metadata(path).map_err(|err| {
            Error::from_io(err, path).with_message("source file is not readable")
        })?;
        if !metadata.is_file() {
            return Err(Error::new(ErrorKind::NotFound)
                .with_message("source path is not a file")
                .with_path(path));
        }
        Ok(Self {
            source: Some(path.to_path_buf()),
            columns: Vec::new(),
            rows: 0,
        })
    }

    /// An in-memory table assembled from pre-built columns.
    pub fn from_columns(columns: Vec<Column>) -> Result<Self, Error> {
        let rows = columns.first().map(Column::len).unwrap_or(0);
        let mut table = Self {
            source: None,
            columns: Vec::new(),
            rows,
        };
        table.add_columns(columns)?;
        Ok(table)
    }

    pub fn source_path(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(Column::name).collect()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column.name() == name)
    }

    pub(crate) fn resolve(&self, column: ColumnRef<'_>) -> Result<usize, Error> {
        match column {
            ColumnRef::Index(index) if index < self.columns.len() => Ok(index),
            ColumnRef::Index(index) => Err(Error::new(ErrorKind::IndexOutOfRange).with_message(
                format!(
                    "column index {index} out of range for table of {} columns",
                    self.columns.len()
                ),
            )),
            ColumnRef::Name(name) => self.index_of(name).ok_or_else(|| {
                Error::new(ErrorKind::NotFound)
                    .with_message("no column with this name")
                    .with_column(name)
            }),
        }
    }

    pub fn column<'a>(&self, column: impl Into<ColumnRef<'a>>) -> Result<&Column, Error> {
        let index = self.resolve(column.into())?;
        Ok(&self.columns[index])
    }

    /// Typed access to a value column; fails with `TypeMismatch` on another backing type.
    pub fn column_as<'a, T: Scalar>(
        &self,
        column: impl Into<ColumnRef<'a>>,
    ) -> Result<&ValueColumn<T>, Error> {
        let found = self.column(column)?;
        T::column_ref(found).ok_or_else(|| type_mismatch(found, T::TYPE.as_str()))
    }

    pub fn text_column<'a>(&self, column: impl Into<ColumnRef<'a>>) -> Result<&TextColumn, Error> {
        match self.column(column)? {
            Column::Text(text) => Ok(text),
            other => Err(type_mismatch(other, "text")),
        }
    }

    /// Replace the formatter of a value column for subsequent output.
    pub fn set_formatter<'a, T, F>(
        &mut self,
        column: impl Into<ColumnRef<'a>>,
        formatter: F,
    ) -> Result<(), Error>
    where
        T: Scalar,
        F: Fn(&T) -> String + Send + Sync + 'static,
    {
        let index = self.resolve(column.into())?;
        let found = &mut self.columns[index];
        if found.column_type() != T::TYPE {
            return Err(type_mismatch(found, T::TYPE.as_str()));
        }
        if let Some(typed) = T::column_mut(found) {
            typed.set_formatter(formatter);
        }
        Ok(())
    }

    pub fn get_row(&self, row: usize) -> Result<Vec<Option<Value>>, Error> {
        self.check_row(row)?;
        self.columns.iter().map(|column| column.get(row)).collect()
    }

    pub fn format_row(&self, row: usize) -> Result<Vec<String>, Error> {
        self.check_row(row)?;
        self.columns
            .iter()
            .map(|column| column.format_at(row))
            .collect()
    }

    pub fn rows(&self) -> Rows<'_> {
        Rows {
            table: self,
            next: 0,
        }
    }

    pub(crate) fn check_row(&self, row: usize) -> Result<(), Error> {
        if row >= self.rows {
            return Err(Error::new(ErrorKind::IndexOutOfRange)
                .with_message(format!("row {row} out of range for table of {} rows", self.rows))
                .with_row(row as u64));
        }
        Ok(())
    }

    pub fn rename_column(&mut self, old: &str, new: &str) -> Result<(), Error> {
        let index = self.resolve(ColumnRef::Name(old))?;
        if new.trim().is_empty() {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("column name must not be blank")
                .with_column(old));
        }
        if old == new {
            return Ok(());
        }
        if self.index_of(new).is_some() {
            return Err(Error::new(ErrorKind::AlreadyExists)
                .with_message(format!("cannot rename {old:?}: name already in use"))
                .with_column(new));
        }
        self.columns[index].set_name(new.to_string());
        Ok(())
    }

    pub fn bind_text_column(&mut self, name: impl Into<String>) -> Result<(), Error> {
        self.add_column(Column::text(name))
    }

    pub fn bind_text_columns<I, S>(&mut self, names: I) -> Result<(), Error>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.add_columns(names.into_iter().map(Column::text).collect())
    }

    pub fn bind_value_column<T: Scalar>(&mut self, name: impl Into<String>) -> Result<(), Error> {
        self.add_column(ValueColumn::<T>::new(name))
    }

    pub fn bind_value_column_with<T, F>(
        &mut self,
        name: impl Into<String>,
        parser: F,
    ) -> Result<(), Error>
    where
        T: Scalar,
        F: Fn(&str) -> Result<Option<T>, String> + Send + Sync + 'static,
    {
        self.add_column(ValueColumn::with_parser(name, parser))
    }

    pub fn bind_value_columns<T, I, S>(&mut self, names: I) -> Result<(), Error>
    where
        T: Scalar,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.add_columns(
            names
                .into_iter()
                .map(|name| T::wrap(ValueColumn::new(name)))
                .collect(),
        )
    }

    pub fn add_column(&mut self, column: impl Into<Column>) -> Result<(), Error> {
        let column = column.into();
        self.check_insertable(&column, &[])?;
        self.columns.push(column);
        Ok(())
    }

    /// Append several columns; either all of them are added or none.
    pub fn add_columns(&mut self, columns: Vec<Column>) -> Result<(), Error> {
        for (index, column) in columns.iter().enumerate() {
            self.check_insertable(column, &columns[..index])?;
        }
        self.columns.extend(columns);
        Ok(())
    }

    fn check_insertable(&self, column: &Column, pending: &[Column]) -> Result<(), Error> {
        if column.len() != self.rows {
            return Err(Error::new(ErrorKind::LengthMismatch)
                .with_message(format!(
                    "column has {} rows, table has {}",
                    column.len(),
                    self.rows
                ))
                .with_column(column.name()));
        }
        let taken = self.index_of(column.name()).is_some()
            || pending.iter().any(|other| other.name() == column.name());
        if taken {
            return Err(Error::new(ErrorKind::AlreadyExists)
                .with_message("column name already in use")
                .with_column(column.name()));
        }
        Ok(())
    }
}

fn type_mismatch(column: &Column, expected: &str) -> Error {
    Error::new(ErrorKind::TypeMismatch)
        .with_message(format!(
            "column is {}, requested {expected}",
            column.column_type()
        ))
        .with_column(column.name())
}

/// Iterator over materialized rows, in order.
pub struct Rows<'a> {
    table: &'a Table,
    next: usize,
}

impl Iterator for Rows<'_> {
    type Item = Vec<Option<Value>>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = self.table.get_row(self.next).ok()?;
        self.next += 1;
        Some(row)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.table.rows.saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::Table;
    use crate::core::column::{Column, TextColumn, ValueColumn};
    use crate::core::error::ErrorKind;
    use crate::core::scalar::Value;
    use time::Date;

    fn sample_table() -> Table {
        Table::from_columns(vec![
            TextColumn::from_values("country", ["Chad", "Peru", "Fiji"]).into(),
            ValueColumn::<f64>::from_values("VA", [Some(-1.5), None, Some(0.25)]).into(),
        ])
        .expect("table")
    }

    #[test]
    fn from_columns_derives_row_count() {
        let table = sample_table();
        assert_eq!(table.row_count(), 3);
        assert_eq!(table.column_names(), vec!["country", "VA"]);
        assert!(table.source_path().is_none());
    }

    #[test]
    fn open_rejects_missing_source() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = Table::open(temp.path().join("absent.csv")).expect_err("should fail");
        assert_eq!(err.kind(), ErrorKind::NotFound);
        let err = Table::open(temp.path()).expect_err("directory is not a file");
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn get_row_materializes_every_column() {
        let table = sample_table();
        assert_eq!(
            table.get_row(0).expect("row"),
            vec![Some(Value::Text("Chad".into())), Some(Value::Float64(-1.5))]
        );
        assert_eq!(table.get_row(1).expect("row")[1], None);
        let err = table.get_row(3).expect_err("should fail");
        assert_eq!(err.kind(), ErrorKind::IndexOutOfRange);
    }

    #[test]
    fn rows_iterates_in_order() {
        let table = sample_table();
        let names: Vec<String> = table
            .rows()
            .map(|row| row[0].as_ref().and_then(Value::as_text).unwrap_or("").to_string())
            .collect();
        assert_eq!(names, vec!["Chad", "Peru", "Fiji"]);
        assert_eq!(Table::new().rows().count(), 0);
    }

    #[test]
    fn add_column_rejects_length_mismatch() {
        let mut table = sample_table();
        let before: Vec<String> = table.column_names().iter().map(|s| s.to_string()).collect();
        let short = ValueColumn::<f64>::from_values("Total Cases", [Some(1.0), Some(2.0)]);
        let err = table.add_column(short).expect_err("should fail");
        assert_eq!(err.kind(), ErrorKind::LengthMismatch);
        assert_eq!(table.column_names(), before);
    }

    #[test]
    fn add_columns_is_all_or_nothing() {
        let mut table = sample_table();
        let good = ValueColumn::<f64>::from_values("a", [None, None, None]);
        let bad = ValueColumn::<f64>::from_values("b", [None]);
        let err = table
            .add_columns(vec![good.into(), bad.into()])
            .expect_err("should fail");
        assert_eq!(err.kind(), ErrorKind::LengthMismatch);
        assert_eq!(table.column_count(), 2);

        let first = ValueColumn::<f64>::from_values("dup", [None, None, None]);
        let second = ValueColumn::<f64>::from_values("dup", [None, None, None]);
        let err = table
            .add_columns(vec![first.into(), second.into()])
            .expect_err("should fail");
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
        assert_eq!(table.column_count(), 2);
    }

    #[test]
    fn binding_rejects_duplicate_names() {
        let mut table = Table::new();
        table.bind_text_column("country").expect("bind");
        let err = table.bind_value_column::<f64>("country").expect_err("should fail");
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
        table
            .bind_value_columns::<f64, _, _>(["VA", "PV"])
            .expect("bind");
        table.bind_value_column::<Date>("date").expect("bind");
        assert_eq!(table.column_names(), vec!["country", "VA", "PV", "date"]);
    }

    #[test]
    fn rename_enforces_uniqueness() {
        let mut table = sample_table();
        let err = table.rename_column("VA", "country").expect_err("should fail");
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
        assert_eq!(table.column_names(), vec!["country", "VA"]);

        let err = table.rename_column("missing", "x").expect_err("should fail");
        assert_eq!(err.kind(), ErrorKind::NotFound);
        let err = table.rename_column("VA", "  ").expect_err("should fail");
        assert_eq!(err.kind(), ErrorKind::Usage);

        table
            .rename_column("VA", "Voice & Accountability")
            .expect("rename");
        assert_eq!(table.column_names(), vec!["country", "Voice & Accountability"]);
        table.rename_column("country", "country").expect("no-op rename");
    }

    #[test]
    fn typed_access_checks_backing_type() {
        let table = sample_table();
        let va = table.column_as::<f64>("VA").expect("typed");
        assert_eq!(va.values(), &[Some(-1.5), None, Some(0.25)]);
        let err = table.column_as::<Date>("VA").expect_err("should fail");
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
        let err = table.text_column(1).expect_err("should fail");
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
        assert_eq!(table.text_column(0).expect("text").get(2).expect("get"), "Fiji");
        let err = table.column(9).expect_err("should fail");
        assert_eq!(err.kind(), ErrorKind::IndexOutOfRange);
    }

    #[test]
    fn set_formatter_applies_to_output_only() {
        let mut table = sample_table();
        table
            .set_formatter::<f64, _>("VA", |value| format!("{value:.2}"))
            .expect("formatter");
        assert_eq!(table.format_row(0).expect("row"), vec!["Chad", "-1.50"]);
        assert_eq!(table.get_row(0).expect("row")[1], Some(Value::Float64(-1.5)));
        let err = table
            .set_formatter::<Date, _>("VA", |_| String::new())
            .expect_err("should fail");
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    }

    #[test]
    fn from_columns_rejects_ragged_input() {
        let err = Table::from_columns(vec![
            Column::from(TextColumn::from_values("a", ["x"])),
            Column::from(TextColumn::from_values("b", ["x", "y"])),
        ])
        .expect_err("should fail");
        assert_eq!(err.kind(), ErrorKind::LengthMismatch);
    }
}
