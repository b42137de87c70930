//! A small column-named string table with CSV read/write.
//!
//! Every pipeline stage takes a `Table` and hands back a new one; cells are
//! kept as the text that was read so nothing is lost between stages.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

use crate::error::{PrepError, Result};

/// Text encoding of an input CSV.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    #[default]
    Utf8,
    Latin1,
}

impl Encoding {
    pub fn decode(&self, bytes: &[u8]) -> String {
        match self {
            Encoding::Utf8 => match std::str::from_utf8(bytes) {
                Ok(text) => text.to_string(),
                Err(e) => {
                    warn!(
                        "Invalid UTF-8 after byte {}; undecodable bytes replaced with U+FFFD (try encoding = \"latin1\")",
                        e.valid_up_to()
                    );
                    String::from_utf8_lossy(bytes).into_owned()
                }
            },
            // Latin-1 maps each byte straight onto the first 256 code points
            Encoding::Latin1 => bytes.iter().map(|&b| b as char).collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new<S: Into<String>>(headers: impl IntoIterator<Item = S>) -> Self {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn require_column(&self, name: &str) -> Result<usize> {
        self.column_index(name)
            .ok_or_else(|| PrepError::MissingColumn(name.to_string()))
    }

    /// Append a row, padding short rows with empty cells and cutting long ones.
    pub fn push_row<S: Into<String>>(&mut self, row: impl IntoIterator<Item = S>) {
        let mut row: Vec<String> = row.into_iter().map(Into::into).collect();
        row.resize(self.headers.len(), String::new());
        self.rows.push(row);
    }

    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        let idx = self.column_index(column)?;
        self.rows.get(row).map(|r| r[idx].as_str())
    }

    /// All values of a column, in row order.
    pub fn column(&self, name: &str) -> Result<Vec<&str>> {
        let idx = self.require_column(name)?;
        Ok(self.rows.iter().map(|r| r[idx].as_str()).collect())
    }

    /// Replace a column's values, or append the column if it is new.
    pub fn set_column(&mut self, name: &str, values: Vec<String>) -> Result<()> {
        if values.len() != self.rows.len() {
            return Err(PrepError::Shape(format!(
                "column '{}' has {} values for {} rows",
                name,
                values.len(),
                self.rows.len()
            )));
        }
        match self.column_index(name) {
            Some(idx) => {
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row[idx] = value;
                }
            }
            None => {
                self.headers.push(name.to_string());
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row.push(value);
                }
            }
        }
        Ok(())
    }

    /// Drop the named columns; names not present are ignored.
    pub fn drop_columns(&self, names: &[&str]) -> Table {
        let keep: Vec<usize> = (0..self.headers.len())
            .filter(|&i| !names.contains(&self.headers[i].as_str()))
            .collect();
        self.project(&keep)
    }

    /// Select exactly the named columns in the given order.
    pub fn select(&self, names: &[&str]) -> Result<Table> {
        let idx = names
            .iter()
            .map(|n| self.require_column(n))
            .collect::<Result<Vec<_>>>()?;
        Ok(self.project(&idx))
    }

    /// Rearrange to the named columns; columns absent from the table come out empty.
    pub fn reindex(&self, names: &[&str]) -> Table {
        let idx: Vec<Option<usize>> = names.iter().map(|n| self.column_index(n)).collect();
        Table {
            headers: names.iter().map(|n| n.to_string()).collect(),
            rows: self
                .rows
                .iter()
                .map(|row| {
                    idx.iter()
                        .map(|i| i.map(|i| row[i].clone()).unwrap_or_default())
                        .collect()
                })
                .collect(),
        }
    }

    fn project(&self, idx: &[usize]) -> Table {
        Table {
            headers: idx.iter().map(|&i| self.headers[i].clone()).collect(),
            rows: self
                .rows
                .iter()
                .map(|row| idx.iter().map(|&i| row[i].clone()).collect())
                .collect(),
        }
    }

    pub fn filter_rows(&self, mut keep: impl FnMut(&[String]) -> bool) -> Table {
        Table {
            headers: self.headers.clone(),
            rows: self.rows.iter().filter(|r| keep(r)).cloned().collect(),
        }
    }

    pub fn head(&self, n: usize) -> Table {
        Table {
            headers: self.headers.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }

    /// Keep the first row for each distinct value of `column`.
    pub fn dedup_by(&self, column: &str) -> Result<Table> {
        let idx = self.require_column(column)?;
        let mut seen = HashSet::new();
        Ok(self.filter_rows(|row| seen.insert(row[idx].clone())))
    }

    /// Stable sort on a column holding integer ids; unparsable values sort last.
    pub fn sort_by_id(&mut self, column: &str) -> Result<()> {
        let idx = self.require_column(column)?;
        self.rows
            .sort_by_key(|row| parse_id(&row[idx]).map_or((1, 0), |id| (0, id)));
        Ok(())
    }

    /// Read a CSV with a header row. Short or long records are tolerated.
    pub fn read_csv(path: &Path, encoding: Encoding) -> Result<Table> {
        let bytes = fs::read(path)?;
        let text = encoding.decode(&bytes);
        let table = Self::from_csv_str(&text)?;
        debug!("Read {} rows from {}", table.len(), path.display());
        Ok(table)
    }

    pub fn from_csv_str(text: &str) -> Result<Table> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(text.as_bytes());
        let mut table = Table::new(reader.headers()?.iter());
        for record in reader.records() {
            table.push_row(record?.iter());
        }
        Ok(table)
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        debug!("Wrote {} rows to {}", self.len(), path.display());
        Ok(())
    }

    /// Build a table from serializable records; the header comes from the
    /// given column list so an empty record set still yields a header.
    pub fn from_records<T: Serialize>(columns: &[&str], records: &[T]) -> Result<Table> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        for record in records {
            writer.serialize(record)?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| PrepError::Io(e.into_error()))?;
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(bytes.as_slice());
        let mut table = Table::new(columns.iter().copied());
        for row in reader.records() {
            table.push_row(row?.iter());
        }
        Ok(table)
    }
}

/// Coerce an id cell to an integer. Integral floats such as `862.0` are
/// accepted; anything else is `None`.
pub fn parse_id(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if let Ok(id) = raw.parse::<i64>() {
        return Some(id);
    }
    let float = raw.parse::<f64>().ok()?;
    if float.is_finite() && float.fract() == 0.0 && float.abs() < i64::MAX as f64 {
        Some(float as i64)
    } else {
        None
    }
}
