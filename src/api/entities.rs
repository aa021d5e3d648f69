//! Purpose: Load a list of known entity names from a plain text file.
//! Exports: `EntityNames`.
//! Role: Cross-check split keys against an expected set of entities.
//! Invariants: One name per line; names are trimmed and blank lines are ignored.
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::core::error::Error;

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct EntityNames {
    names: Vec<String>,
    index: HashSet<String>,
}

impl EntityNames {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|err| {
            Error::from_io(err, path).with_message("entity names file is not readable")
        })?;
        Ok(Self::parse(&String::from_utf8_lossy(&bytes)))
    }

    pub fn parse(text: &str) -> Self {
        let mut names = Self::default();
        for line in text.lines() {
            let name = line.trim();
            if !name.is_empty() && names.index.insert(name.to_string()) {
                names.names.push(name.to_string());
            }
        }
        names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Keys absent from this list, deduplicated, in first-seen order.
    pub fn missing_from<I, S>(&self, keys: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut reported = HashSet::new();
        let mut missing = Vec::new();
        for key in keys {
            let key = key.as_ref();
            if !self.contains(key) && reported.insert(key.to_string()) {
                missing.push(key.to_string());
            }
        }
        missing
    }
}
