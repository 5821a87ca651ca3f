//! Tab-delimited table reading.
//!
//! Reads MetaPhlAn-style merged profiles with metadata rows inserted above
//! the abundance rows: a header of `identifier, sample...`, then one record
//! per row.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use ::csv::ReaderBuilder;
use microval_core::{MicrovalError, Result};
use microval_ml::AbundanceTable;

/// Read a tab-delimited table from a file.
///
/// Lines starting with `#` are treated as comments.
pub fn read_table(path: impl AsRef<Path>) -> Result<AbundanceTable> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| {
        MicrovalError::Io(std::io::Error::new(
            e.kind(),
            format!("{}: {}", path.display(), e),
        ))
    })?;
    read_table_from(file)
}

/// Parse a tab-delimited table held in memory.
pub fn parse_table_str(text: &str) -> Result<AbundanceTable> {
    read_table_from(text.as_bytes())
}

fn read_table_from<R: Read>(reader: R) -> Result<AbundanceTable> {
    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .flexible(true)
        .comment(Some(b'#'))
        .from_reader(reader);

    let header: Vec<String> = reader
        .headers()
        .map_err(|e| MicrovalError::Parse(e.to_string()))?
        .iter()
        .map(|s| s.to_string())
        .collect();
    if header.len() < 2 {
        return Err(MicrovalError::Parse(
            "header needs an identifier column and at least one sample".into(),
        ));
    }

    let mut records = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| MicrovalError::Parse(e.to_string()))?;
        records.push(record.iter().map(|s| s.to_string()).collect::<Vec<_>>());
    }

    AbundanceTable::from_records(header, records)
}

/// Parse a comma-delimited list of zero-based row indices, e.g. `0,1,2`.
pub fn parse_row_list(text: &str) -> Result<Vec<usize>> {
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<usize>().map_err(|_| {
                MicrovalError::InvalidInput(format!("'{}' is not a row index", s))
            })
        })
        .collect()
}
