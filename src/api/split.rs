//! Purpose: Partition a table by a key column into per-entity record files.
//! Exports: `SplitOptions`, `SplitOutcome`, `Dataset::split`.
//! Role: Write side of the dataset layout read by `Dataset`.
//! Invariants: One file per written column per entity; record order follows row order.
//! Invariants: An entity's files are truncated on first use within a split, appended after.
//! Invariants: At most `max_open_entities` entities hold open handles at once.
use std::collections::{HashMap, HashSet, VecDeque};
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::debug;

use crate::api::dataset::Dataset;
use crate::core::column::Column;
use crate::core::error::{Error, ErrorKind};
use crate::core::record::{self, DateRecord, DoubleRecord, RecordWriter};
use crate::core::table::{ColumnRef, Table};

pub const DEFAULT_MAX_OPEN_ENTITIES: usize = 16;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SplitOptions {
    /// Text column whose value names the entity directory.
    pub key_column: String,
    /// Columns not written to disk, in addition to the key column.
    pub skip_columns: Vec<String>,
    pub max_open_entities: usize,
}

impl SplitOptions {
    pub fn new(key_column: impl Into<String>) -> Self {
        Self {
            key_column: key_column.into(),
            skip_columns: Vec::new(),
            max_open_entities: DEFAULT_MAX_OPEN_ENTITIES,
        }
    }

    pub fn with_skip_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skip_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_max_open_entities(mut self, max: usize) -> Self {
        self.max_open_entities = max;
        self
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SplitOutcome {
    /// Entities in first-seen order.
    pub entities: Vec<String>,
    pub rows: u64,
    /// Column names written for every entity, in table order.
    pub fields: Vec<String>,
}

type FileSink = BufWriter<File>;

enum FieldSink {
    Date(RecordWriter<FileSink, DateRecord>),
    Double(RecordWriter<FileSink, DoubleRecord>),
    Text(FileSink),
}

impl FieldSink {
    fn open(path: &Path, column: &Column, truncate: bool) -> Result<Self, Error> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(truncate)
            .append(!truncate)
            .open(path)
            .map_err(|err| Error::from_io(err, path))?;
        let sink = BufWriter::new(file);
        Ok(match column {
            Column::Date(_) => FieldSink::Date(RecordWriter::new(sink)),
            Column::Float64(_) => FieldSink::Double(RecordWriter::new(sink)),
            Column::Text(_) => FieldSink::Text(sink),
        })
    }

    fn write(&mut self, column: &Column, row: usize) -> Result<(), Error> {
        match (self, column) {
            (FieldSink::Date(writer), Column::Date(values)) => writer.write(values.get(row)?),
            (FieldSink::Double(writer), Column::Float64(values)) => writer.write(values.get(row)?),
            (FieldSink::Text(writer), Column::Text(values)) => writer
                .write_all(&record::encode_text(values.get(row)?))
                .map_err(|err| {
                    Error::new(ErrorKind::Io)
                        .with_message("failed to write text field")
                        .with_source(err)
                }),
            _ => Err(Error::new(ErrorKind::Internal)
                .with_message("field sink does not match column type")
                .with_column(column.name())),
        }
    }

    fn flush(&mut self) -> Result<(), Error> {
        match self {
            FieldSink::Date(writer) => writer.flush(),
            FieldSink::Double(writer) => writer.flush(),
            FieldSink::Text(writer) => writer.flush().map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message("failed to flush text field")
                    .with_source(err)
            }),
        }
    }
}

struct EntityStreams {
    sinks: Vec<(usize, FieldSink)>,
}

impl EntityStreams {
    fn flush(&mut self, entity: &str) -> Result<(), Error> {
        for (_, sink) in &mut self.sinks {
            sink.flush()
                .map_err(|err| err.with_value(entity.to_string()))?;
        }
        Ok(())
    }
}

impl Dataset {
    /// Write every row of `table` into `<root>/<key>/<column>.data` files.
    pub fn split(&self, table: &Table, options: &SplitOptions) -> Result<SplitOutcome, Error> {
        let key_index = table.resolve(ColumnRef::Name(&options.key_column))?;
        let keys = table.text_column(key_index)?;
        let mut skipped = HashSet::from([key_index]);
        for name in &options.skip_columns {
            skipped.insert(table.resolve(ColumnRef::Name(name))?);
        }
        let fields: Vec<usize> = (0..table.column_count())
            .filter(|index| !skipped.contains(index))
            .collect();
        let max_open = options.max_open_entities.max(1);

        let mut outcome = SplitOutcome {
            fields: fields
                .iter()
                .map(|index| table.columns()[*index].name().to_string())
                .collect(),
            ..SplitOutcome::default()
        };
        let mut seen = HashSet::new();
        let mut open: HashMap<String, EntityStreams> = HashMap::new();
        let mut open_order: VecDeque<String> = VecDeque::new();

        for row in 0..table.row_count() {
            let entity = keys.get(row)?;
            if entity.trim().is_empty() {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message("blank entity key")
                    .with_column(options.key_column.as_str())
                    .with_row(row as u64));
            }

            if !open.contains_key(entity) {
                if open_order.len() >= max_open {
                    if let Some(oldest) = open_order.pop_front() {
                        if let Some(mut streams) = open.remove(&oldest) {
                            streams.flush(&oldest)?;
                        }
                    }
                }
                let first_use = seen.insert(entity.to_string());
                if first_use {
                    outcome.entities.push(entity.to_string());
                }
                let streams = self.open_entity(table, entity, &fields, first_use)?;
                open.insert(entity.to_string(), streams);
                open_order.push_back(entity.to_string());
            }

            if let Some(streams) = open.get_mut(entity) {
                for (index, sink) in &mut streams.sinks {
                    sink.write(&table.columns()[*index], row)
                        .map_err(|err| err.with_row(row as u64))?;
                }
            }
            outcome.rows += 1;
        }

        for entity in open_order {
            if let Some(mut streams) = open.remove(&entity) {
                streams.flush(&entity)?;
            }
        }
        Ok(outcome)
    }

    fn open_entity(
        &self,
        table: &Table,
        entity: &str,
        fields: &[usize],
        truncate: bool,
    ) -> Result<EntityStreams, Error> {
        let dir = self.entity_dir(entity)?;
        fs::create_dir_all(&dir).map_err(|err| Error::from_io(err, &dir))?;
        let mut sinks = Vec::with_capacity(fields.len());
        for index in fields {
            let column = &table.columns()[*index];
            let path = self.path(entity, column.name())?;
            debug!(path = %path.display(), truncate, "opening field file");
            sinks.push((*index, FieldSink::open(&path, column, truncate)?));
        }
        Ok(EntityStreams { sinks })
    }
}
