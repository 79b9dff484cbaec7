//! Tabular input model
//!
//! A [`Table`] is an ordered list of column names plus records. Each
//! [`Record`] maps column name to a raw cell, where `None` is the null
//! marker (a cell missing from a short CSV row, or an explicit null from a
//! caller). Column order is preserved through validation and on output.

use std::io;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{TableError, TableResult};

/// One row of the input, keyed by column name in table-column order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    cells: IndexMap<String, Option<String>>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a cell, keeping the column's original position if it already exists
    pub fn insert(&mut self, column: impl Into<String>, value: Option<String>) {
        self.cells.insert(column.into(), value);
    }

    /// Builder form of [`Record::insert`] for a non-null value
    pub fn with(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(column, Some(value.into()));
        self
    }

    /// Cell value, or `None` if the column is absent or the cell is null
    pub fn get(&self, column: &str) -> Option<&str> {
        self.cells.get(column).and_then(|cell| cell.as_deref())
    }

    pub fn contains_column(&self, column: &str) -> bool {
        self.cells.contains_key(column)
    }

    /// Columns and raw cells in order
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.cells
            .iter()
            .map(|(column, cell)| (column.as_str(), cell.as_deref()))
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl<K, V> FromIterator<(K, Option<V>)> for Record
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, Option<V>)>>(iter: I) -> Self {
        Self {
            cells: iter
                .into_iter()
                .map(|(column, value)| (column.into(), value.map(Into::into)))
                .collect(),
        }
    }
}

/// An in-memory table of records sharing one column list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    columns: Vec<String>,
    records: Vec<Record>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            records: Vec::new(),
        }
    }

    /// Build a table from column names and string rows. Short rows get null
    /// cells for the missing trailing columns; extra cells are dropped.
    pub fn from_rows<C, R, V>(columns: C, rows: R) -> Self
    where
        C: IntoIterator,
        C::Item: Into<String>,
        R: IntoIterator,
        R::Item: IntoIterator<Item = V>,
        V: Into<String>,
    {
        let mut table = Self::new(columns.into_iter().map(Into::into).collect());
        for row in rows {
            let mut values = row.into_iter().map(Into::into);
            let record = table
                .columns
                .iter()
                .map(|column| (column.clone(), values.next()))
                .collect();
            table.records.push(record);
        }
        table
    }

    /// Append a record. Columns the table does not know about are kept on
    /// the record but are not part of the table's column list.
    pub fn push(&mut self, record: Record) {
        self.records.push(record);
    }

    /// Read a CSV file whose first row is the header
    pub fn from_csv_path(path: &Path) -> TableResult<Self> {
        let file = std::fs::File::open(path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => TableError::NotFound {
                path: path.to_path_buf(),
            },
            _ => TableError::Io {
                path: path.to_path_buf(),
                source,
            },
        })?;
        Self::from_reader(file)
    }

    /// Read CSV from any reader whose first row is the header
    pub fn from_reader<R: io::Read>(reader: R) -> TableResult<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let columns: Vec<String> = csv_reader
            .headers()?
            .iter()
            .map(|header| header.to_string())
            .collect();

        let mut table = Self::new(columns);
        for row in csv_reader.records() {
            let row = row?;
            let record = table
                .columns
                .iter()
                .enumerate()
                .map(|(index, column)| (column.clone(), row.get(index).map(str::to_string)))
                .collect();
            table.records.push(record);
        }

        Ok(table)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Raw cells of one column, top to bottom
    pub fn column_values<'a>(&'a self, column: &'a str) -> impl Iterator<Item = Option<&'a str>> {
        self.records.iter().map(move |record| record.get(column))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Column value rendered for CSV output: null cells become empty strings
pub(crate) fn cell_text(record: &Record, column: &str) -> String {
    record.get(column).unwrap_or_default().to_string()
}
