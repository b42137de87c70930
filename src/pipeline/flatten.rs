//! Turns literal-encoded lists of records into `|`-joined strings.

use serde_json::Value;

use crate::config::FlattenPolicy;
use crate::constants::FIELD_DELIMITER;
use crate::error::{PrepError, Result};
use crate::literal;
use crate::pipeline::outcome::StageOutcome;
use crate::table::Table;

pub const STAGE: &str = "flatten";

/// Cells pandas would have read as missing.
pub fn is_missing(cell: &str) -> bool {
    matches!(cell.trim(), "" | "nan" | "NaN" | "None" | "null")
}

/// Parse a cell holding a list of records. Missing cells are an empty list.
pub fn parse_record_list(cell: &str) -> Result<Vec<Value>> {
    if is_missing(cell) {
        return Ok(Vec::new());
    }
    match literal::parse(cell)? {
        Value::Array(items) => Ok(items),
        other => Err(PrepError::Shape(format!(
            "expected a list of records, found {}",
            value_kind(&other)
        ))),
    }
}

/// Read `key` from a record as text.
pub fn field_text(record: &Value, key: &str) -> Result<String> {
    let object = record.as_object().ok_or_else(|| {
        PrepError::Shape(format!("expected a record, found {}", value_kind(record)))
    })?;
    match object.get(key) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Null) => Ok(String::new()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(Value::Bool(b)) => Ok(b.to_string()),
        Some(other) => Err(PrepError::Shape(format!(
            "field '{}' is {}, not text",
            key,
            value_kind(other)
        ))),
        None => Err(PrepError::Shape(format!("record has no '{}' field", key))),
    }
}

/// `key` of every record in the cell, in source order.
pub fn extract_field(cell: &str, key: &str) -> Result<Vec<String>> {
    parse_record_list(cell)?
        .iter()
        .map(|record| field_text(record, key))
        .collect()
}

/// Flatten one cell to its `|`-joined names.
pub fn flatten_cell(cell: &str) -> Result<String> {
    Ok(extract_field(cell, "name")?.join(FIELD_DELIMITER))
}

/// Flatten each named column in place.
///
/// A column the table lacks is recorded and skipped. Malformed cells are
/// handled per `policy`: blanked one by one, or the whole column is left
/// exactly as read.
pub fn flatten_columns(table: &Table, columns: &[&str], policy: FlattenPolicy) -> StageOutcome<Table> {
    let mut outcome = StageOutcome::new(STAGE, table.clone());
    let result = flatten_into(columns, policy, &mut outcome);
    outcome.settle(result)
}

fn flatten_into(columns: &[&str], policy: FlattenPolicy, outcome: &mut StageOutcome<Table>) -> Result<()> {
    for &column in columns {
        let cells = match outcome.value.column(column) {
            Ok(cells) => cells,
            Err(e) => {
                outcome.record(format!("column {}", column), &e);
                continue;
            }
        };

        let mut flattened = Vec::with_capacity(cells.len());
        let mut failures = Vec::new();
        for (row, cell) in cells.iter().enumerate() {
            match flatten_cell(cell) {
                Ok(joined) => flattened.push(joined),
                Err(e) => {
                    failures.push((row, e));
                    flattened.push(String::new());
                }
            }
        }

        match policy {
            FlattenPolicy::PerCell => {
                for (row, e) in failures {
                    outcome.record(format!("{} row {}", column, row), e);
                }
                outcome.value.set_column(column, flattened)?;
            }
            FlattenPolicy::ColumnAtomic => {
                if let Some((row, e)) = failures.into_iter().next() {
                    outcome.record(
                        format!("column {}", column),
                        format!("left unflattened, row {}: {}", row, e),
                    );
                } else {
                    outcome.value.set_column(column, flattened)?;
                }
            }
        }
    }
    Ok(())
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "None",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a record",
    }
}
