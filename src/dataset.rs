//! In-memory dataset parsed from an uploaded file.
//!
//! Cells are kept exactly as parsed; typing happens only when the dataset is
//! written (see [`crate::typing`]). Column names are uppercased on load so
//! they compare directly against catalog names.

use std::collections::HashSet;

use encoding_rs::{Encoding, UTF_8};
use log::debug;
use serde::Serialize;

use crate::{
    error::{WorkflowError, WorkflowResult},
    io_utils,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dataset {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, Copy)]
pub struct LoadOptions {
    pub delimiter: u8,
    pub encoding: &'static Encoding,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            delimiter: io_utils::DEFAULT_CSV_DELIMITER,
            encoding: UTF_8,
        }
    }
}

impl Dataset {
    /// Builds a dataset from already-normalized parts. Every row must have
    /// exactly one cell per column.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> WorkflowResult<Self> {
        if let Some((idx, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != columns.len())
        {
            return Err(WorkflowError::Parse(format!(
                "Row {} has {} field(s) but the header has {}",
                idx + 2,
                row.len(),
                columns.len()
            )));
        }
        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    pub fn head(&self, limit: usize) -> &[Vec<String>] {
        &self.rows[..self.rows.len().min(limit)]
    }

    /// Returns a copy with columns rearranged to the given source indices.
    pub(crate) fn project(&self, order: &[usize]) -> Dataset {
        let columns = order.iter().map(|&idx| self.columns[idx].clone()).collect();
        let rows = self
            .rows
            .iter()
            .map(|row| order.iter().map(|&idx| row[idx].clone()).collect())
            .collect();
        Dataset { columns, rows }
    }
}

/// Parses uploaded bytes into a [`Dataset`], uppercasing the header row.
pub fn load(bytes: &[u8], options: &LoadOptions) -> WorkflowResult<Dataset> {
    let text = io_utils::decode_upload(bytes, options.encoding).ok_or_else(|| {
        WorkflowError::Parse(format!(
            "Upload is not valid {} text",
            options.encoding.name()
        ))
    })?;

    let mut reader = io_utils::open_csv_reader(text.as_bytes(), options.delimiter);
    let headers = reader
        .headers()
        .map_err(|err| WorkflowError::Parse(format!("Reading header row: {err}")))?
        .clone();
    if headers.is_empty() {
        return Err(WorkflowError::Parse("Upload has no header row".to_string()));
    }

    let columns = normalize_headers(headers.iter())?;
    let mut rows: Vec<Vec<String>> = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record =
            record.map_err(|err| WorkflowError::Parse(format!("Reading row {}: {err}", idx + 2)))?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    debug!(
        "Parsed {} row(s) with delimiter '{}'",
        rows.len(),
        io_utils::printable_delimiter(options.delimiter)
    );
    Dataset::new(columns, rows)
}

fn normalize_headers<'a>(headers: impl Iterator<Item = &'a str>) -> WorkflowResult<Vec<String>> {
    let mut seen = HashSet::new();
    let mut columns = Vec::new();
    for (idx, raw) in headers.enumerate() {
        let name = raw.to_uppercase();
        if name.trim().is_empty() {
            return Err(WorkflowError::Parse(format!(
                "Column {} has an empty name",
                idx + 1
            )));
        }
        if !seen.insert(name.clone()) {
            return Err(WorkflowError::Parse(format!(
                "Column '{raw}' repeats '{name}' once names are uppercased"
            )));
        }
        columns.push(name);
    }
    Ok(columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::WINDOWS_1252;

    #[test]
    fn load_uppercases_headers_and_keeps_raw_cells() {
        let dataset = load(b"id,Name,amt\n1, Alice ,0042.50\n", &LoadOptions::default()).unwrap();
        assert_eq!(dataset.columns(), ["ID", "NAME", "AMT"]);
        assert_eq!(dataset.rows()[0], vec!["1", " Alice ", "0042.50"]);
    }

    #[test]
    fn load_rejects_ragged_rows() {
        let err = load(b"id,name\n1,Alice\n2\n", &LoadOptions::default()).unwrap_err();
        assert!(matches!(err, WorkflowError::Parse(_)), "{err}");
    }

    #[test]
    fn load_rejects_names_colliding_after_uppercase() {
        let err = load(b"id,ID\n1,2\n", &LoadOptions::default()).unwrap_err();
        assert!(err.to_string().contains("uppercased"));
    }

    #[test]
    fn load_rejects_empty_input() {
        assert!(matches!(
            load(b"", &LoadOptions::default()),
            Err(WorkflowError::Parse(_))
        ));
    }

    #[test]
    fn load_honours_delimiter_and_encoding() {
        let options = LoadOptions {
            delimiter: b';',
            encoding: WINDOWS_1252,
        };
        let dataset = load(b"city;n\nM\xFCnchen;1\n", &options).unwrap();
        assert_eq!(dataset.columns(), ["CITY", "N"]);
        assert_eq!(dataset.rows()[0][0], "München");
    }

    #[test]
    fn header_only_upload_is_an_empty_dataset() {
        let dataset = load(b"id,name\n", &LoadOptions::default()).unwrap();
        assert_eq!(dataset.row_count(), 0);
        assert_eq!(dataset.columns().len(), 2);
    }
}
