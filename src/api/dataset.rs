//! Purpose: Locate and read per-entity `.data` record files.
//! Exports: `Dataset`, `DATA_EXTENSION`, `DATE_FIELD`.
//! Role: Read side of the on-disk dataset layout `<root>/<entity>/<field>.data`.
//! Invariants: Entity and field names are single path components; separators are rejected.
//! Invariants: Each read opens, decodes and closes its file within the call.
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use time::Date;

use crate::core::error::{Error, ErrorKind};
use crate::core::record::{self, DateRecord, DoubleRecord};

pub const DATA_EXTENSION: &str = "data";
pub const DATE_FIELD: &str = "date";

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Dataset {
    root: PathBuf,
}

impl Dataset {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn entity_dir(&self, entity: &str) -> Result<PathBuf, Error> {
        validate_component(entity, "entity")?;
        Ok(self.root.join(entity))
    }

    pub fn path(&self, entity: &str, field: &str) -> Result<PathBuf, Error> {
        validate_component(field, "field")?;
        Ok(self
            .entity_dir(entity)?
            .join(format!("{field}.{DATA_EXTENSION}")))
    }

    /// Entity directories under the root, sorted by name.
    pub fn entities(&self) -> Result<Vec<String>, Error> {
        let entries = fs::read_dir(&self.root).map_err(|err| Error::from_io(err, &self.root))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| Error::from_io(err, &self.root))?;
            let is_dir = entry
                .file_type()
                .map_err(|err| Error::from_io(err, entry.path()))?
                .is_dir();
            if is_dir {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    pub fn read_dates(&self, entity: &str) -> Result<Vec<Option<Date>>, Error> {
        let path = self.path(entity, DATE_FIELD)?;
        record::decode_all::<DateRecord, _>(open(&path)?).map_err(|err| err.with_path(&path))
    }

    pub fn read_numerics(&self, entity: &str, field: &str) -> Result<Vec<Option<f64>>, Error> {
        let path = self.path(entity, field)?;
        record::decode_all::<DoubleRecord, _>(open(&path)?).map_err(|err| err.with_path(&path))
    }

    pub fn read_time_series(&self, entity: &str, field: &str) -> Result<Vec<f64>, Error> {
        let path = self.path(entity, field)?;
        record::decode_time_series(open(&path)?).map_err(|err| err.with_path(&path))
    }

    pub fn read_final_value(&self, entity: &str, field: &str) -> Result<Option<f64>, Error> {
        let path = self.path(entity, field)?;
        record::decode_final_value(open(&path)?).map_err(|err| err.with_path(&path))
    }

    /// Lines of a text field file, one per row.
    pub fn read_text(&self, entity: &str, field: &str) -> Result<Vec<String>, Error> {
        let path = self.path(entity, field)?;
        open(&path)?
            .lines()
            .map(|line| line.map_err(|err| Error::from_io(err, &path)))
            .collect()
    }
}

fn open(path: &Path) -> Result<BufReader<File>, Error> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|err| Error::from_io(err, path).with_message("dataset file is not readable"))
}

fn validate_component(name: &str, label: &str) -> Result<(), Error> {
    if name.trim().is_empty() {
        return Err(Error::new(ErrorKind::Usage).with_message(format!("{label} name is blank")));
    }
    if name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(Error::new(ErrorKind::Usage)
            .with_message(format!("{label} name must be a single path component"))
            .with_value(name));
    }
    Ok(())
}
