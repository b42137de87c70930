//! Restricts auxiliary tables to ids present in the canonical movies table.
//!
//! Ratings files run to tens of millions of rows, so they are filtered as a
//! stream: one record is read, checked against the id set and written out
//! before the next is read.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::info;

use crate::constants::ID_COLUMN;
use crate::error::{PrepError, Result};
use crate::metrics;
use crate::pipeline::outcome::StageOutcome;
use crate::table::{parse_id, Encoding, Table};

pub const STAGE: &str = "align";

/// Numeric ids of the canonical table. Missing or unparsable ids are skipped.
pub fn valid_ids(movies: &Table) -> Result<HashSet<i64>> {
    Ok(movies
        .column(ID_COLUMN)?
        .into_iter()
        .filter_map(parse_id)
        .collect())
}

/// Copy the rows of `input` whose `key_column` names a valid movie id to
/// `output`, keeping their order. The value is the number of rows kept.
pub fn align_file(
    input: &Path,
    output: &Path,
    key_column: &str,
    ids: &HashSet<i64>,
    encoding: Encoding,
) -> StageOutcome<usize> {
    let mut outcome = StageOutcome::new(STAGE, 0);
    let result = align_into(input, output, key_column, ids, encoding, &mut outcome);
    outcome.settle(result)
}

fn align_into(
    input: &Path,
    output: &Path,
    key_column: &str,
    ids: &HashSet<i64>,
    encoding: Encoding,
    outcome: &mut StageOutcome<usize>,
) -> Result<()> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(input)?;
    let headers = reader.byte_headers()?.clone();
    let key_idx = headers
        .iter()
        .position(|h| encoding.decode(h) == key_column)
        .ok_or_else(|| PrepError::MissingColumn(key_column.to_string()))?;

    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut writer = csv::Writer::from_path(output)?;
    write_record(&mut writer, &headers, encoding)?;

    let mut read = 0usize;
    let mut kept = 0usize;
    let mut record = csv::ByteRecord::new();
    while reader.read_byte_record(&mut record)? {
        read += 1;
        let known = record
            .get(key_idx)
            .and_then(|key| parse_id(&encoding.decode(key)))
            .is_some_and(|id| ids.contains(&id));
        if known {
            write_record(&mut writer, &record, encoding)?;
            kept += 1;
        }
    }
    writer.flush()?;

    info!("Kept {} of {} rows referencing known movies", kept, read);
    metrics::stage::rows_out(STAGE, kept);
    outcome.value = kept;
    Ok(())
}

/// UTF-8 records are copied byte for byte; Latin-1 ones are re-encoded.
fn write_record(
    writer: &mut csv::Writer<fs::File>,
    record: &csv::ByteRecord,
    encoding: Encoding,
) -> Result<()> {
    match encoding {
        Encoding::Utf8 => writer.write_byte_record(record)?,
        Encoding::Latin1 => writer.write_record(record.iter().map(|field| encoding.decode(field)))?,
    }
    Ok(())
}
