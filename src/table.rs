//! A minimal long-format table of text cells, used to assemble and write the output TSV files.

use csv::{ReaderBuilder, WriterBuilder};

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::error::{FsPostError, Result};

/// The text written for missing values.
pub const MISSING: &str = "n/a";

/// A table with named columns. A cell is `None` if the value is missing.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl Table {
    pub fn new<S: Into<String>>(columns: Vec<S>) -> Table {
        Table {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// Append a row. Its length must match the number of columns.
    pub fn push_row(&mut self, row: Vec<Option<String>>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(FsPostError::Table(format!(
                "row has {} values, but the table has {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    fn require_column(&self, name: &str) -> Result<usize> {
        self.column_index(name)
            .ok_or_else(|| FsPostError::Table(format!("no such column '{}'", name)))
    }

    /// All values of the named column, in row order.
    pub fn column_values(&self, name: &str) -> Result<Vec<Option<&str>>> {
        let idx = self.require_column(name)?;
        Ok(self.rows.iter().map(|row| row[idx].as_deref()).collect())
    }

    /// Insert a column holding the same value in every row at position `idx`.
    pub fn insert_column(&mut self, idx: usize, name: &str, value: Option<&str>) -> Result<()> {
        if self.column_index(name).is_some() {
            return Err(FsPostError::Table(format!("column '{}' already exists", name)));
        }
        let idx = idx.min(self.columns.len());
        self.columns.insert(idx, name.to_string());
        for row in self.rows.iter_mut() {
            row.insert(idx, value.map(String::from));
        }
        Ok(())
    }

    pub fn drop_column(&mut self, name: &str) -> Result<()> {
        let idx = self.require_column(name)?;
        self.columns.remove(idx);
        for row in self.rows.iter_mut() {
            row.remove(idx);
        }
        Ok(())
    }

    pub fn rename_column(&mut self, from: &str, to: &str) -> Result<()> {
        let idx = self.require_column(from)?;
        self.columns[idx] = to.to_string();
        Ok(())
    }

    pub fn move_column_to_front(&mut self, name: &str) -> Result<()> {
        let idx = self.require_column(name)?;
        let col = self.columns.remove(idx);
        self.columns.insert(0, col);
        for row in self.rows.iter_mut() {
            let cell = row.remove(idx);
            row.insert(0, cell);
        }
        Ok(())
    }

    /// Rename every column with the given function.
    pub fn map_column_names<F>(&mut self, f: F)
    where
        F: Fn(&str) -> String,
    {
        self.columns = self.columns.iter().map(|c| f(c)).collect();
    }

    /// Inner join with `other` on all column names the two tables share.
    ///
    /// Result rows follow the order of `self`; for each row of `self`, matching rows of `other`
    /// follow in their own order. The non-key columns of `other` are appended after the columns
    /// of `self`.
    pub fn inner_join(&self, other: &Table) -> Result<Table> {
        let keys: Vec<(usize, usize)> = self
            .columns
            .iter()
            .enumerate()
            .filter_map(|(li, c)| other.column_index(c).map(|ri| (li, ri)))
            .collect();
        if keys.is_empty() {
            return Err(FsPostError::Table(String::from("no shared columns to join on")));
        }
        let right_extra: Vec<usize> = (0..other.columns.len())
            .filter(|ri| !keys.iter().any(|(_, k)| k == ri))
            .collect();

        let mut columns = self.columns.clone();
        columns.extend(right_extra.iter().map(|&ri| other.columns[ri].clone()));
        let mut joined = Table::new(columns);

        for left in self.rows.iter() {
            for right in other.rows.iter() {
                if keys.iter().all(|&(li, ri)| left[li] == right[ri]) {
                    let mut row = left.clone();
                    row.extend(right_extra.iter().map(|&ri| right[ri].clone()));
                    joined.rows.push(row);
                }
            }
        }
        Ok(joined)
    }

    /// Stack tables with identical columns on top of each other.
    pub fn concat(tables: Vec<Table>) -> Result<Table> {
        let mut iter = tables.into_iter();
        let mut result = match iter.next() {
            Some(t) => t,
            None => return Ok(Table::default()),
        };
        for table in iter {
            if table.columns != result.columns {
                return Err(FsPostError::Table(format!(
                    "cannot concatenate tables with different columns: {:?} vs {:?}",
                    result.columns, table.columns
                )));
            }
            result.rows.extend(table.rows);
        }
        Ok(result)
    }

    /// Write the table with a header line, using the given field delimiter. Missing values are written as `n/a`.
    pub fn write_delimited<W: Write>(&self, output: W, delimiter: u8) -> Result<()> {
        let mut wtr = WriterBuilder::new().delimiter(delimiter).from_writer(output);
        wtr.write_record(&self.columns)?;
        for row in self.rows.iter() {
            wtr.write_record(row.iter().map(|cell| cell.as_deref().unwrap_or(MISSING)))?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn write_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.write_delimited(BufWriter::new(File::create(path)?), b'\t')
    }

    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.write_delimited(BufWriter::new(File::create(path)?), b',')
    }

    /// Read a TSV file written by [`Table::write_tsv`]. Cells reading `n/a` become missing values.
    pub fn read_tsv<P: AsRef<Path>>(path: P) -> Result<Table> {
        let file = BufReader::new(File::open(path)?);
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .delimiter(b'\t')
            .flexible(false)
            .from_reader(file);

        let columns: Vec<String> = rdr.headers()?.iter().map(String::from).collect();
        let mut table = Table::new(columns);
        for result in rdr.records() {
            let record = result?;
            let row = record
                .iter()
                .map(|v| if v == MISSING { None } else { Some(v.to_string()) })
                .collect();
            table.push_row(row)?;
        }
        Ok(table)
    }
}
