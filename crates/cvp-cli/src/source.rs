// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::error::PipelineError;
use cvp_core::Record;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Reads a delimited file with a header row into records.
///
/// Values are trimmed. Rows are numbered from 0 in file order; that ordinal
/// is the tie-break for same-day rows of one region.
pub fn read_records(path: &Path, delimiter: u8) -> Result<Vec<Record>, PipelineError> {
    let file = File::open(path).map_err(|source| {
        PipelineError::io(format!("failed to read '{}'", path.display()), source)
    })?;
    parse_records(file, delimiter, &path.display().to_string())
}

/// Parses delimited text from any reader. `label` names the input in errors.
pub fn parse_records<R: Read>(
    reader: R,
    delimiter: u8,
    label: &str,
) -> Result<Vec<Record>, PipelineError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .has_headers(true)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|source| PipelineError::csv(format!("failed to read header of '{label}'"), source))?
        .clone();

    let mut seen = BTreeSet::new();
    if let Some(duplicate) = headers.iter().find(|name| !seen.insert(*name)) {
        return Err(PipelineError::invalid_input(format!(
            "duplicate column '{duplicate}' in header of '{label}'"
        )));
    }

    let mut records = Vec::new();
    for (ordinal, row) in reader.records().enumerate() {
        let row = row.map_err(|source| {
            PipelineError::csv(
                format!("failed to parse row {} of '{label}'", ordinal + 1),
                source,
            )
        })?;
        records.push(Record::from_pairs(
            ordinal as u64,
            headers.iter().zip(row.iter()),
        ));
    }
    Ok(records)
}
