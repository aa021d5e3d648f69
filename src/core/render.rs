// Delimited and column-aligned text output for tables.
use std::io::Write;

use crate::core::error::{Error, ErrorKind};
use crate::core::ingest::DEFAULT_DELIMITER;
use crate::core::table::Table;

fn write_error(err: std::io::Error) -> Error {
    Error::new(ErrorKind::Io)
        .with_message("failed to write table text")
        .with_source(err)
}

impl Table {
    pub fn write_delimited<W: Write>(&self, mut writer: W, delimiter: char) -> Result<(), Error> {
        let separator = delimiter.to_string();
        writeln!(writer, "{}", self.column_names().join(&separator)).map_err(write_error)?;
        for row in 0..self.rows {
            let cells = self.format_row(row)?;
            writeln!(writer, "{}", cells.join(&separator)).map_err(write_error)?;
        }
        Ok(())
    }

    /// Cells are right-padded to their column width and separated by `"<delimiter> "`.
    ///
    /// Every formatted cell is held in memory while widths are measured.
    pub fn write_aligned<W: Write>(&self, mut writer: W, delimiter: char) -> Result<(), Error> {
        let mut grid = Vec::with_capacity(self.rows + 1);
        grid.push(
            self.column_names()
                .into_iter()
                .map(str::to_string)
                .collect::<Vec<_>>(),
        );
        for row in 0..self.rows {
            grid.push(self.format_row(row)?);
        }

        let mut widths = vec![0usize; self.columns.len()];
        for cells in &grid {
            for (width, cell) in widths.iter_mut().zip(cells) {
                *width = (*width).max(cell.chars().count());
            }
        }

        let separator = format!("{delimiter} ");
        for cells in &grid {
            let line = cells
                .iter()
                .zip(&widths)
                .map(|(cell, width)| format!("{cell:<width$}"))
                .collect::<Vec<_>>()
                .join(&separator);
            writeln!(writer, "{line}").map_err(write_error)?;
        }
        Ok(())
    }

    pub fn to_delimited_text(&self) -> Result<String, Error> {
        let mut out = Vec::new();
        self.write_delimited(&mut out, DEFAULT_DELIMITER)?;
        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    pub fn to_aligned_text(&self) -> Result<String, Error> {
        let mut out = Vec::new();
        self.write_aligned(&mut out, DEFAULT_DELIMITER)?;
        Ok(String::from_utf8_lossy(&out).into_owned())
    }
}
