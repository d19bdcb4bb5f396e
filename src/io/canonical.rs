//! Read a canonical table back from an exported CSV.
//!
//! Only the canonical columns are read; derived columns present in the file
//! are ignored so the engine can recompute them.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::domain::CaseRecord;
use crate::error::PipelineError;
use crate::io::export::CanonicalCsvRow;

pub fn read_canonical_csv(path: &Path) -> Result<Vec<CaseRecord>, PipelineError> {
    let file = File::open(path).map_err(|e| PipelineError::io(path, e))?;
    read_canonical_from_reader(file, &path.display().to_string())
}

pub fn read_canonical_from_reader<R: Read>(reader: R, source: &str) -> Result<Vec<CaseRecord>, PipelineError> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::Headers).from_reader(reader);
    reader
        .deserialize::<CanonicalCsvRow>()
        .enumerate()
        .map(|(idx, result)| {
            result
                .map(CanonicalCsvRow::into_record)
                .map_err(|e| PipelineError::malformed(source, idx + 2, format!("canonical row: {e}")))
        })
        .collect()
}
