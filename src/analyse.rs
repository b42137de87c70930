//! Dataset profiling: missing-value summary, multi-value frequencies and
//! row sampling.

use std::collections::HashMap;
use std::path::Path;
use tracing::info;

use crate::constants::FIELD_DELIMITER;
use crate::error::Result;
use crate::pipeline::flatten::is_missing;
use crate::table::{Encoding, Table};

/// Per-column count and percentage of missing cells.
pub fn null_profile(table: &Table) -> Table {
    let mut profile = Table::new(["column", "null_values", "null_percent"]);
    for (idx, column) in table.headers().iter().enumerate() {
        let nulls = table.rows().iter().filter(|row| is_missing(&row[idx])).count();
        let percent = if table.is_empty() {
            0.0
        } else {
            nulls as f64 / table.len() as f64 * 100.0
        };
        profile.push_row([column.clone(), nulls.to_string(), format!("{:.2}", percent)]);
    }
    profile
}

/// Occurrences of each `|`-separated value of `column`, in first-seen order.
/// Empty cells count under the empty string.
pub fn value_counts(table: &Table, column: &str) -> Result<Vec<(String, usize)>> {
    let mut order: Vec<String> = Vec::new();
    let mut counts: HashMap<String, usize> = HashMap::new();
    for cell in table.column(column)? {
        for value in cell.split(FIELD_DELIMITER) {
            let count = counts.entry(value.to_string()).or_insert_with(|| {
                order.push(value.to_string());
                0
            });
            *count += 1;
        }
    }
    Ok(order
        .into_iter()
        .map(|value| {
            let count = counts[&value];
            (value, count)
        })
        .collect())
}

/// Write the null profile and value counts of `columns` into `output_dir`.
pub fn profile_file(
    input: &Path,
    encoding: Encoding,
    columns: &[&str],
    output_dir: &Path,
    profile_file_name: &str,
) -> Result<Vec<String>> {
    let table = Table::read_csv(input, encoding)?;
    let mut written = Vec::new();

    let profile_path = output_dir.join(profile_file_name);
    null_profile(&table).write_csv(&profile_path)?;
    written.push(profile_path.to_string_lossy().to_string());

    for &column in columns {
        let counts = value_counts(&table, column)?;
        info!("{}: {} unique values", column, counts.len());
        let mut out = Table::new(["value", "count"]);
        for (value, count) in counts {
            out.push_row([value, count.to_string()]);
        }
        let path = output_dir.join(format!("value_counts_{}.csv", column));
        out.write_csv(&path)?;
        written.push(path.to_string_lossy().to_string());
    }
    Ok(written)
}

/// Copy the first `rows` rows of a CSV to another file.
pub fn extract_sample(input: &Path, output: &Path, rows: usize, encoding: Encoding) -> Result<usize> {
    let sample = Table::read_csv(input, encoding)?.head(rows);
    sample.write_csv(output)?;
    info!("Wrote {} sample rows to {}", sample.len(), output.display());
    Ok(sample.len())
}
