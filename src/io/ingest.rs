//! Raw CSV ingest.
//!
//! This module only turns a source file into a `RawTable` (headers + string
//! cells + line numbers). It knows nothing about dates, areas or counts; that
//! is the normalizer's job, driven by the source's `SourceConfig`.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::PipelineError;

/// One raw data row, with its 1-based line number in the source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    pub line: usize,
    pub values: Vec<String>,
}

/// A source-specific table of raw string cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTable {
    /// Name used in error messages (usually the group tag).
    pub source: String,
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

impl RawTable {
    /// Build an in-memory table. Rows are numbered as if they followed a header line.
    pub fn new(source: impl Into<String>, headers: &[&str], rows: Vec<Vec<String>>) -> Self {
        Self {
            source: source.into(),
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: rows
                .into_iter()
                .enumerate()
                .map(|(idx, values)| RawRow { line: idx + 2, values })
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of a column by name. Matching ignores case, surrounding
    /// whitespace and a UTF-8 BOM.
    pub fn column(&self, name: &str) -> Option<usize> {
        let wanted = normalize_header_name(name);
        self.headers
            .iter()
            .position(|h| normalize_header_name(h) == wanted)
    }

    /// Trimmed cell value, `None` when the cell is missing or blank.
    pub fn cell<'a>(&self, row: &'a RawRow, idx: usize) -> Option<&'a str> {
        row.values.get(idx).map(|s| s.trim()).filter(|s| !s.is_empty())
    }
}

/// Read a raw CSV file.
pub fn read_raw_csv(path: &Path, source: &str) -> Result<RawTable, PipelineError> {
    let file = File::open(path).map_err(|e| PipelineError::io(path, e))?;
    let table = read_raw_from_reader(file, source)?;
    tracing::debug!(
        source,
        path = %path.display(),
        rows = table.rows.len(),
        columns = table.headers.len(),
        "read raw CSV"
    );
    Ok(table)
}

/// Read a raw CSV table from any reader.
///
/// A record the CSV parser rejects is fatal for the whole source.
pub fn read_raw_from_reader<R: Read>(reader: R, source: &str) -> Result<RawTable, PipelineError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| PipelineError::malformed(source, 1, format!("failed to read CSV headers: {e}")))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        // +2: records() starts after the header, and lines are 1-based.
        let line = idx + 2;
        let record = result.map_err(|e| PipelineError::malformed(source, line, format!("CSV parse error: {e}")))?;
        rows.push(RawRow {
            line,
            values: record.iter().map(str::to_string).collect(),
        });
    }

    Ok(RawTable {
        source: source.to_string(),
        headers,
        rows,
    })
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports sometimes prefix the first header with a BOM.
    let name = name.trim().trim_start_matches('\u{feff}').trim();
    name.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_headers_and_numbers_lines() {
        let data = "\u{feff}Date,Area,Cases\n2020-06-01,A,3\n2020-06-02,A,4\n";
        let table = read_raw_from_reader(data.as_bytes(), "test").unwrap();
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.column("date"), Some(0));
        assert_eq!(table.column(" CASES "), Some(2));
        assert_eq!(table.rows[1].line, 3);
        assert_eq!(table.cell(&table.rows[0], 1), Some("A"));
    }

    #[test]
    fn header_lookup_handles_greek_case() {
        let table = RawTable::new("test", &["county", "Πληθυσμός "], vec![]);
        assert_eq!(table.column("πληθυσμός"), Some(1));
    }

    #[test]
    fn blank_and_missing_cells_are_none() {
        let table = RawTable::new("test", &["a", "b", "c"], vec![vec!["1".into(), "  ".into()]]);
        let row = &table.rows[0];
        assert_eq!(table.cell(row, 0), Some("1"));
        assert_eq!(table.cell(row, 1), None);
        assert_eq!(table.cell(row, 2), None);
    }

    #[test]
    fn header_only_file_is_empty() {
        let table = read_raw_from_reader("a,b\n".as_bytes(), "test").unwrap();
        assert!(table.is_empty());
    }
}
