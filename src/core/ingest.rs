//! Purpose: Populate a `Table` from delimited text with header reconciliation.
//! Exports: `ReadOptions`, `ReadOutcome`, `FieldFailure`, `DEFAULT_DELIMITER`.
//! Role: Best-effort, row-by-row ingestion engine behind `Table::begin_read`.
//! Invariants: A bad field never aborts the read; it is reported and stored as absent.
//! Invariants: Column lengths stay equal after every processed line, even on I/O error.
//! Invariants: Reconciliation is computed off to the side and committed only on success.
//! Invariants: No quoting; a field containing the delimiter shifts the rest of its line.
use std::fs::File;
use std::io::{BufRead, BufReader, Read};

use bstr::ByteSlice;
use tracing::{debug, info, warn};

use crate::core::column::Column;
use crate::core::error::{Error, ErrorKind};
use crate::core::table::Table;

pub const DEFAULT_DELIMITER: char = ',';

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ReadOptions {
    pub delimiter: char,
    /// Maximum number of data lines to ingest; `None` or `Some(0)` reads to the end.
    pub lines_to_read: Option<usize>,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            delimiter: DEFAULT_DELIMITER,
            lines_to_read: None,
        }
    }
}

impl ReadOptions {
    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_lines_to_read(mut self, lines: usize) -> Self {
        self.lines_to_read = Some(lines);
        self
    }

    fn line_limit(&self) -> Option<usize> {
        self.lines_to_read.filter(|limit| *limit > 0)
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ReadOutcome {
    pub rows: u64,
    pub failed: u64,
    pub inserted_columns: Vec<String>,
    pub moved_columns: Vec<String>,
}

/// One field that could not be stored as read; the column holds absent instead.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FieldFailure {
    /// 1-based physical line in the source; the header is line 1.
    pub line: u64,
    /// 0-based data row the field belongs to.
    pub row: u64,
    pub column: String,
    /// Raw field text; `None` when the line had no field for this column.
    pub value: Option<String>,
    pub raw_line: String,
    pub kind: ErrorKind,
    pub message: String,
}

struct Reconciled {
    columns: Vec<Column>,
    header_width: usize,
    inserted: Vec<String>,
    moved: Vec<String>,
}

impl Table {
    /// Ingest the source file, logging recovered field failures.
    pub fn begin_read(&mut self, options: &ReadOptions) -> Result<ReadOutcome, Error> {
        self.begin_read_with(options, |_| {}, |_| {})
    }

    /// Ingest the source file, reporting progress (0-100) and field failures to callbacks.
    pub fn begin_read_with<P, F>(
        &mut self,
        options: &ReadOptions,
        on_progress: P,
        on_failure: F,
    ) -> Result<ReadOutcome, Error>
    where
        P: FnMut(f64),
        F: FnMut(FieldFailure),
    {
        let path = self
            .source_path()
            .map(|path| path.to_path_buf())
            .ok_or_else(|| {
                Error::new(ErrorKind::Usage)
                    .with_message("table has no source file")
                    .with_hint("Use Table::open(path) for tables that ingest from disk.")
            })?;
        let file = File::open(&path).map_err(|err| Error::from_io(err, &path))?;
        let total = file
            .metadata()
            .map_err(|err| Error::from_io(err, &path))?
            .len();
        self.read_from(file, Some(total), options, on_progress, on_failure)
            .map_err(|err| match err.path() {
                Some(_) => err,
                None => err.with_path(&path),
            })
    }

    /// Ingest from any reader. `total_bytes` enables progress reporting.
    pub fn read_from<R, P, F>(
        &mut self,
        reader: R,
        total_bytes: Option<u64>,
        options: &ReadOptions,
        mut on_progress: P,
        mut on_failure: F,
    ) -> Result<ReadOutcome, Error>
    where
        R: Read,
        P: FnMut(f64),
        F: FnMut(FieldFailure),
    {
        if self.rows != 0 || self.columns.iter().any(|column| !column.is_empty()) {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("table already holds rows; ingest into a freshly bound table"));
        }

        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        let mut consumed = read_line(&mut reader, &mut buf)? as u64;
        if consumed == 0 {
            return Err(Error::new(ErrorKind::SchemaMismatch)
                .with_message("source has no header line"));
        }
        let header_text = trim_line_end(&buf).to_str_lossy().into_owned();
        let header = header_names(&header_text, options.delimiter);

        let reconciled = reconcile(&self.columns, &header)?;
        for name in &reconciled.inserted {
            info!(column = %name, "auto-inserted text column for unbound header field");
        }
        for name in &reconciled.moved {
            info!(column = %name, "moved bound column to its header position");
        }
        let sourceless: Vec<&str> = reconciled.columns[reconciled.header_width..]
            .iter()
            .map(Column::name)
            .collect();
        if !sourceless.is_empty() {
            warn!(columns = ?sourceless, "bound columns missing from header; filling with absent values");
        }
        self.columns = reconciled.columns;
        let header_width = reconciled.header_width;

        let mut outcome = ReadOutcome {
            inserted_columns: reconciled.inserted,
            moved_columns: reconciled.moved,
            ..ReadOutcome::default()
        };
        let limit = options.line_limit();
        let mut line_no = 1u64;
        let mut last_percent = -1i64;

        loop {
            if limit.is_some_and(|limit| outcome.rows as usize >= limit) {
                break;
            }
            let read = read_line(&mut reader, &mut buf)?;
            if read == 0 {
                break;
            }
            consumed += read as u64;
            line_no += 1;

            let text = trim_line_end(&buf).to_str_lossy();
            let parts: Vec<&str> = text.split(options.delimiter).collect();
            let row = outcome.rows;

            for (index, column) in self.columns.iter_mut().enumerate() {
                if index >= header_width {
                    column.append_absent();
                    continue;
                }
                let failure = match parts.get(index) {
                    Some(raw) => match column.append(raw) {
                        Ok(()) => None,
                        Err(err) => Some((Some(raw.to_string()), err)),
                    },
                    None => Some((
                        None,
                        Error::new(ErrorKind::IndexOutOfRange).with_message(format!(
                            "line has {} fields, expected at least {}",
                            parts.len(),
                            index + 1
                        )),
                    )),
                };
                if let Some((value, err)) = failure {
                    column.append_absent();
                    let failure = FieldFailure {
                        line: line_no,
                        row,
                        column: column.name().to_string(),
                        value,
                        raw_line: text.to_string(),
                        kind: err.kind(),
                        message: err.message().unwrap_or("field rejected").to_string(),
                    };
                    warn!(
                        line = failure.line,
                        column = %failure.column,
                        value = ?failure.value,
                        raw_line = %failure.raw_line,
                        "{}; stored as absent",
                        failure.message
                    );
                    outcome.failed += 1;
                    on_failure(failure);
                }
            }
            self.rows += 1;
            outcome.rows += 1;

            if let Some(total) = total_bytes.filter(|total| *total > 0) {
                let percent = (consumed as f64 * 100.0 / total as f64).min(100.0);
                if percent.floor() as i64 != last_percent {
                    last_percent = percent.floor() as i64;
                    debug!(percent = last_percent, "ingest progress");
                    on_progress(percent);
                }
            }
        }

        Ok(outcome)
    }
}

fn read_line<R: BufRead>(reader: &mut R, buf: &mut Vec<u8>) -> Result<usize, Error> {
    buf.clear();
    reader.read_until(b'\n', buf).map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to read delimited source")
            .with_source(err)
    })
}

fn trim_line_end(buf: &[u8]) -> &[u8] {
    let line = buf.strip_suffix(b"\n").unwrap_or(buf);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Header fields in order; a blank field is named `column_<position>`, 1-based.
fn header_names(text: &str, delimiter: char) -> Vec<String> {
    text.split(delimiter)
        .enumerate()
        .map(|(index, name)| {
            if name.trim().is_empty() {
                format!("column_{}", index + 1)
            } else {
                name.to_string()
            }
        })
        .collect()
}

/// Align bound columns with the header: keep matches, pull later bound columns
/// forward, and insert text columns for header fields nobody declared.
fn reconcile(bound: &[Column], header: &[String]) -> Result<Reconciled, Error> {
    let mut columns = bound.to_vec();
    let mut inserted = Vec::new();
    let mut moved = Vec::new();

    for (index, name) in header.iter().enumerate() {
        let name = name.as_str();
        if columns.get(index).is_some_and(|column| column.name() == name) {
            continue;
        }
        if columns[..index.min(columns.len())]
            .iter()
            .any(|column| column.name() == name)
        {
            return Err(Error::new(ErrorKind::SchemaMismatch)
                .with_message(format!("header repeats field {name:?}"))
                .with_column(name)
                .with_line(1));
        }
        let later = columns
            .iter()
            .skip(index + 1)
            .position(|column| column.name() == name);
        match later {
            Some(offset) => {
                let column = columns.remove(index + 1 + offset);
                columns.insert(index, column);
                moved.push(name.to_string());
            }
            None => {
                columns.insert(index, Column::text(name));
                inserted.push(name.to_string());
            }
        }
    }

    Ok(Reconciled {
        columns,
        header_width: header.len(),
        inserted,
        moved,
    })
}

#[cfg(test)]
mod tests {
    use super::{FieldFailure, ReadOptions};
    use crate::core::error::ErrorKind;
    use crate::core::scalar::{ColumnType, Value};
    use crate::core::table::Table;
    use std::io::Cursor;
    use time::macros::date;

    fn ingest(table: &mut Table, text: &str, options: &ReadOptions) -> Vec<FieldFailure> {
        let mut failures = Vec::new();
        table
            .read_from(
                Cursor::new(text.as_bytes().to_vec()),
                Some(text.len() as u64),
                options,
                |_| {},
                |failure| failures.push(failure),
            )
            .expect("read");
        failures
    }

    #[test]
    fn header_reconciliation_inserts_unbound_fields() {
        let mut table = Table::new();
        table.bind_text_column("a").expect("bind");
        table.bind_value_column::<f64>("c").expect("bind");

        let failures = ingest(&mut table, "a,b,c\nx,hello,1.5\ny,world,2\n", &ReadOptions::default());
        assert!(failures.is_empty());
        assert_eq!(table.column_names(), vec!["a", "b", "c"]);
        assert_eq!(table.column(1).expect("b").column_type(), ColumnType::Text);
        assert_eq!(table.column(2).expect("c").column_type(), ColumnType::Float64);
        assert_eq!(
            table.get_row(1).expect("row"),
            vec![
                Some(Value::Text("y".into())),
                Some(Value::Text("world".into())),
                Some(Value::Float64(2.0)),
            ]
        );
    }

    #[test]
    fn unbound_trailing_fields_are_appended() {
        let mut table = Table::new();
        table.bind_text_column("a").expect("bind");
        ingest(&mut table, "a,b\n1,2\n", &ReadOptions::default());
        assert_eq!(table.column_names(), vec!["a", "b"]);
        assert_eq!(table.format_row(0).expect("row"), vec!["1", "2"]);
    }

    #[test]
    fn reordered_bound_column_keeps_its_type() {
        let mut table = Table::new();
        table.bind_value_column::<f64>("score").expect("bind");
        table.bind_text_column("name").expect("bind");

        let outcome = table
            .read_from(
                Cursor::new(b"name,score\nann,3\n".to_vec()),
                None,
                &ReadOptions::default(),
                |_| {},
                |_| {},
            )
            .expect("read");
        assert_eq!(outcome.moved_columns, vec!["name".to_string()]);
        assert!(outcome.inserted_columns.is_empty());
        assert_eq!(table.column_names(), vec!["name", "score"]);
        assert_eq!(table.get_row(0).expect("row")[1], Some(Value::Float64(3.0)));
    }

    #[test]
    fn duplicate_header_field_is_schema_mismatch() {
        let mut table = Table::new();
        table.bind_text_column("a").expect("bind");
        let err = table
            .read_from(
                Cursor::new(b"a,a\n1,2\n".to_vec()),
                None,
                &ReadOptions::default(),
                |_| {},
                |_| {},
            )
            .expect_err("should fail");
        assert_eq!(err.kind(), ErrorKind::SchemaMismatch);
        assert_eq!(table.column_names(), vec!["a"]);
        assert_eq!(table.row_count(), 0);
    }

    #[test]
    fn bad_fields_become_absent_and_are_reported() {
        let mut table = Table::new();
        table.bind_text_column("country").expect("bind");
        table.bind_value_column::<f64>("VA").expect("bind");
        table.bind_value_column::<time::Date>("date").expect("bind");

        let text = "country,VA,date\nChad,1.5,2021-01-02\nPeru,n/a,2021-13-01\nFiji,,\n";
        let failures = ingest(&mut table, text, &ReadOptions::default());

        assert_eq!(table.row_count(), 3);
        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0].line, 3);
        assert_eq!(failures[0].row, 1);
        assert_eq!(failures[0].column, "VA");
        assert_eq!(failures[0].value.as_deref(), Some("n/a"));
        assert_eq!(failures[0].raw_line, "Peru,n/a,2021-13-01");
        assert_eq!(failures[0].kind, ErrorKind::Parse);
        assert_eq!(failures[1].column, "date");

        assert_eq!(
            table.get_row(0).expect("row"),
            vec![
                Some(Value::Text("Chad".into())),
                Some(Value::Float64(1.5)),
                Some(Value::Date(date!(2021 - 01 - 02))),
            ]
        );
        assert_eq!(&table.get_row(1).expect("row")[1..], &[None, None]);
        assert_eq!(&table.get_row(2).expect("row")[1..], &[None, None]);
    }

    #[test]
    fn short_lines_report_missing_fields_and_extras_are_ignored() {
        let mut table = Table::new();
        table.bind_text_column("a").expect("bind");
        table.bind_value_column::<f64>("b").expect("bind");
        let failures = ingest(&mut table, "a,b\nx\ny,2,extra,more\n", &ReadOptions::default());

        assert_eq!(table.row_count(), 2);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].kind, ErrorKind::IndexOutOfRange);
        assert_eq!(failures[0].value, None);
        assert_eq!(table.get_row(0).expect("row")[1], None);
        assert_eq!(table.get_row(1).expect("row")[1], Some(Value::Float64(2.0)));
        assert_eq!(table.column_count(), 2);
    }

    #[test]
    fn sourceless_bound_columns_fill_with_absent() {
        let mut table = Table::new();
        table.bind_text_column("a").expect("bind");
        table.bind_value_column::<f64>("later").expect("bind");
        let failures = ingest(&mut table, "a\n1\n2\n", &ReadOptions::default());
        assert!(failures.is_empty());
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.column_as::<f64>("later").expect("typed").values(), &[None, None]);
    }

    #[test]
    fn crlf_lines_are_trimmed_and_blank_lines_are_rows() {
        let mut table = Table::new();
        table.bind_text_column("a").expect("bind");
        table.bind_value_column::<f64>("b").expect("bind");
        let failures = ingest(&mut table, "a,b\r\nx,1\r\n\r\ny,2", &ReadOptions::default());
        assert_eq!(table.row_count(), 3);
        assert_eq!(table.format_row(1).expect("row"), vec!["", ""]);
        assert_eq!(table.format_row(2).expect("row"), vec!["y", "2"]);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].line, 3);
        assert_eq!(failures[0].column, "b");
        assert_eq!(failures[0].kind, ErrorKind::IndexOutOfRange);
    }

    #[test]
    fn single_column_absent_values_survive_reingest() {
        let mut numbers = Table::new();
        numbers.bind_value_column::<f64>("v").expect("bind");
        let failures = ingest(&mut numbers, "v\n1\n\n3\n", &ReadOptions::default());
        assert!(failures.is_empty());
        assert_eq!(numbers.row_count(), 3);
        assert_eq!(
            numbers.column_as::<f64>("v").expect("column").values(),
            &[Some(1.0), None, Some(3.0)]
        );

        let mut words = Table::new();
        words.bind_text_column("w").expect("bind");
        ingest(&mut words, "w\na\n\nc\n", &ReadOptions::default());
        assert_eq!(words.row_count(), 3);
        assert_eq!(words.format_row(1).expect("row"), vec![""]);
        assert_eq!(words.format_row(2).expect("row"), vec!["c"]);
    }

    #[test]
    fn blank_header_fields_are_named_by_position() {
        let mut table = Table::new();
        ingest(&mut table, "a,b,\n1,2,3\n", &ReadOptions::default());
        assert_eq!(table.column_names(), vec!["a", "b", "column_3"]);
        assert_eq!(table.format_row(0).expect("row"), vec!["1", "2", "3"]);

        let mut table = Table::new();
        ingest(&mut table, ",x,,\n1,2,3,4\n", &ReadOptions::default());
        assert_eq!(
            table.column_names(),
            vec!["column_1", "x", "column_3", "column_4"]
        );
        table.rename_column("column_3", "y").expect("rename");
        assert_eq!(table.format_row(0).expect("row")[2], "3");
    }

    #[test]
    fn line_limit_bounds_ingestion() {
        let mut table = Table::new();
        table.bind_text_column("a").expect("bind");
        ingest(&mut table, "a\n1\n2\n3\n", &ReadOptions::default().with_lines_to_read(2));
        assert_eq!(table.row_count(), 2);

        let mut unbounded = Table::new();
        ingest(&mut unbounded, "a\n1\n2\n3\n", &ReadOptions::default().with_lines_to_read(0));
        assert_eq!(unbounded.row_count(), 3);
    }

    #[test]
    fn custom_delimiter_is_honored() {
        let mut table = Table::new();
        ingest(&mut table, "a;b\n1;2\n", &ReadOptions::default().with_delimiter(';'));
        assert_eq!(table.column_names(), vec!["a", "b"]);
    }

    #[test]
    fn empty_source_has_no_header() {
        let mut table = Table::new();
        let err = table
            .read_from(Cursor::new(Vec::new()), None, &ReadOptions::default(), |_| {}, |_| {})
            .expect_err("should fail");
        assert_eq!(err.kind(), ErrorKind::SchemaMismatch);
    }

    #[test]
    fn second_read_into_populated_table_is_rejected() {
        let mut table = Table::new();
        ingest(&mut table, "a\n1\n", &ReadOptions::default());
        let err = table
            .read_from(Cursor::new(b"a\n2\n".to_vec()), None, &ReadOptions::default(), |_| {}, |_| {})
            .expect_err("should fail");
        assert_eq!(err.kind(), ErrorKind::Usage);
        assert_eq!(table.row_count(), 1);
    }

    #[test]
    fn progress_reaches_one_hundred() {
        let mut table = Table::new();
        let text = "a\n1\n2\n3\n4\n";
        let mut seen = Vec::new();
        table
            .read_from(
                Cursor::new(text.as_bytes().to_vec()),
                Some(text.len() as u64),
                &ReadOptions::default(),
                |percent| seen.push(percent),
                |_| {},
            )
            .expect("read");
        assert!(!seen.is_empty());
        assert!(seen.windows(2).all(|pair| pair[0] <= pair[1]));
        assert_eq!(seen.last().copied(), Some(100.0));
    }

    #[test]
    fn begin_read_requires_source_and_reads_file() {
        let mut in_memory = Table::new();
        let err = in_memory.begin_read(&ReadOptions::default()).expect_err("should fail");
        assert_eq!(err.kind(), ErrorKind::Usage);

        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("input.csv");
        std::fs::write(&path, "country,VA\nChad,0.5\n").expect("write");
        let mut table = Table::open(&path).expect("open");
        table.bind_text_column("country").expect("bind");
        table.bind_value_column::<f64>("VA").expect("bind");
        let outcome = table.begin_read(&ReadOptions::default()).expect("read");
        assert_eq!(outcome.rows, 1);
        assert_eq!(outcome.failed, 0);
        assert_eq!(table.get_row(0).expect("row")[1], Some(Value::Float64(0.5)));
    }
}
