//! Purpose: Define the stable public Rust API boundary for coltab.
//! Exports: Table, column, codec and dataset types used by the CLI and tests.
//! Role: Public, additive-only surface over `core` plus the on-disk dataset layer.
//! Invariants: Dataset files are always `<root>/<entity>/<field>.data`.

mod dataset;
mod entities;
mod split;

#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::column::{Column, Formatter, Parser, TextColumn, ValueColumn};
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::ingest::{DEFAULT_DELIMITER, FieldFailure, ReadOptions, ReadOutcome};
pub use crate::core::record::{
    self, DATE_RECORD_LEN, DOUBLE_RECORD_LEN, DateRecord, DoubleRecord, RecordCodec,
    RecordReader, RecordWriter,
};
pub use crate::core::sampler::Sampler;
pub use crate::core::scalar::{ColumnType, Scalar, Value};
pub use crate::core::table::{ColumnRef, Rows, Table};
pub use dataset::{DATA_EXTENSION, DATE_FIELD, Dataset};
pub use entities::EntityNames;
pub use split::{DEFAULT_MAX_OPEN_ENTITIES, SplitOptions, SplitOutcome};
