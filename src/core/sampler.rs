// Borrowed column-subset views over a table.
use std::ops::{Bound, RangeBounds};

use crate::core::error::{Error, ErrorKind};
use crate::core::scalar::Value;
use crate::core::table::{ColumnRef, Table};

/// A non-owning projection of a table onto a subset or reordering of its columns.
///
/// The view borrows the table, so the column layout cannot change while it is alive.
#[derive(Clone, Debug)]
pub struct Sampler<'a> {
    table: &'a Table,
    indices: Vec<usize>,
}

impl<'a> Sampler<'a> {
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn column_names(&self) -> Vec<&'a str> {
        self.indices
            .iter()
            .map(|index| self.table.columns[*index].name())
            .collect()
    }

    pub fn row_count(&self) -> usize {
        self.table.rows
    }

    pub fn get_row(&self, row: usize) -> Result<Vec<Option<Value>>, Error> {
        self.table.check_row(row)?;
        self.indices
            .iter()
            .map(|index| self.table.columns[*index].get(row))
            .collect()
    }

    pub fn format_row(&self, row: usize) -> Result<Vec<String>, Error> {
        self.table.check_row(row)?;
        self.indices
            .iter()
            .map(|index| self.table.columns[*index].format_at(row))
            .collect()
    }
}

impl Table {
    /// View over a contiguous range of column positions.
    pub fn sample_range(&self, range: impl RangeBounds<usize>) -> Result<Sampler<'_>, Error> {
        let count = self.columns.len();
        let start = match range.start_bound() {
            Bound::Included(start) => *start,
            Bound::Excluded(start) => start.saturating_add(1),
            Bound::Unbounded => 0,
        };
        let end = match range.end_bound() {
            Bound::Included(end) => end.saturating_add(1),
            Bound::Excluded(end) => *end,
            Bound::Unbounded => count,
        };
        if start > end || end > count {
            return Err(Error::new(ErrorKind::IndexOutOfRange).with_message(format!(
                "column range {start}..{end} out of bounds for table of {count} columns"
            )));
        }
        Ok(Sampler {
            table: self,
            indices: (start..end).collect(),
        })
    }

    /// View over the named columns, in the order given.
    pub fn sample<I, S>(&self, names: I) -> Result<Sampler<'_>, Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let indices = names
            .into_iter()
            .map(|name| self.resolve(ColumnRef::Name(name.as_ref())))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Sampler {
            table: self,
            indices,
        })
    }
}
