//! Joins cleaned metadata, credits and posters into the canonical movies table.

use std::collections::{HashMap, HashSet};
use tracing::info;

use crate::constants::{
    CANONICAL_COLUMNS, CREDITS_COLUMNS, ID_COLUMN, MERGE_SOURCE_COLUMNS, POSTER_PATH_COLUMN,
    REDUNDANT_METADATA_COLUMNS,
};
use crate::error::Result;
use crate::metrics;
use crate::pipeline::outcome::StageOutcome;
use crate::table::{parse_id, Table};

pub const STAGE: &str = "merge";

/// Map each parsable id to the index of its first row.
fn index_by_id<T>(table: &Table, name: &str, outcome: &mut StageOutcome<T>) -> Result<HashMap<i64, usize>> {
    let idx = table.require_column(ID_COLUMN)?;
    let mut index = HashMap::with_capacity(table.len());
    for (row, cells) in table.rows().iter().enumerate() {
        match parse_id(&cells[idx]) {
            Some(id) => {
                index.entry(id).or_insert(row);
            }
            None => outcome.record(
                format!("{} row {}", name, row),
                format!("non-numeric id '{}'", cells[idx]),
            ),
        }
    }
    Ok(index)
}

/// Indexes of the id and credit columns, or the first one missing.
fn credit_columns(credits: &Table) -> Result<Vec<usize>> {
    credits.require_column(ID_COLUMN)?;
    CREDITS_COLUMNS
        .iter()
        .map(|c| credits.require_column(c))
        .collect()
}

/// Left-join credits (and optionally posters) onto metadata by `id`.
///
/// Every metadata row with a numeric id appears once, in first-seen order
/// unless `sort_by_id` is set. Movies without credits get empty credit
/// columns, and so does every movie when the credits table is unusable. Source-only columns (`cast`, `crew`, the raw `poster_path`, and
/// the unused metadata fields) never reach the output.
pub fn merge_movies(
    metadata: &Table,
    credits: &Table,
    posters: Option<&Table>,
    sort_by_id: bool,
) -> StageOutcome<Table> {
    let mut outcome = StageOutcome::new(STAGE, Table::default());
    let result = merge_into(metadata, credits, posters, sort_by_id, &mut outcome);
    outcome.settle(result)
}

fn merge_into(
    metadata: &Table,
    credits: &Table,
    posters: Option<&Table>,
    sort_by_id: bool,
    outcome: &mut StageOutcome<Table>,
) -> Result<()> {
    let base = metadata
        .drop_columns(MERGE_SOURCE_COLUMNS)
        .drop_columns(REDUNDANT_METADATA_COLUMNS)
        .reindex(CANONICAL_COLUMNS);
    let id_idx = base.require_column(ID_COLUMN)?;

    // Without usable credits the movies still go through, with blank credit fields
    let credit_lookup = match credit_columns(credits) {
        Ok(columns) => Some((columns, index_by_id(credits, "credits", outcome)?)),
        Err(e) => {
            outcome.record("credits", format!("{}; credit columns left empty", e));
            None
        }
    };

    let poster_lookup = match posters {
        Some(posters) => Some((
            posters.require_column(POSTER_PATH_COLUMN)?,
            index_by_id(posters, "posters", outcome)?,
            posters,
        )),
        None => None,
    };

    let mut headers: Vec<&str> = CANONICAL_COLUMNS.iter().chain(CREDITS_COLUMNS).copied().collect();
    if poster_lookup.is_some() {
        headers.push(POSTER_PATH_COLUMN);
    }
    let mut merged = Table::new(headers);

    let mut seen = HashSet::new();
    let mut duplicates = 0usize;
    let mut without_credits = 0usize;
    for (row, cells) in base.rows().iter().enumerate() {
        let Some(id) = parse_id(&cells[id_idx]) else {
            outcome.record(
                format!("metadata row {}", row),
                format!("non-numeric id '{}'", cells[id_idx]),
            );
            continue;
        };
        if !seen.insert(id) {
            duplicates += 1;
            continue;
        }

        let mut out = cells.clone();
        out[id_idx] = id.to_string();
        let credit_row = credit_lookup
            .as_ref()
            .and_then(|(columns, index)| index.get(&id).map(|&row| (columns, row)));
        match credit_row {
            Some((columns, row)) => {
                let credit = &credits.rows()[row];
                out.extend(columns.iter().map(|&c| credit[c].clone()));
            }
            None => {
                without_credits += 1;
                out.extend(CREDITS_COLUMNS.iter().map(|_| String::new()));
            }
        }
        if let Some((path_idx, index, posters)) = &poster_lookup {
            out.push(
                index
                    .get(&id)
                    .map(|&r| posters.rows()[r][*path_idx].clone())
                    .unwrap_or_default(),
            );
        }
        merged.push_row(out);
    }

    if sort_by_id {
        merged.sort_by_id(ID_COLUMN)?;
    }

    info!(
        "Merged {} movies ({} duplicate ids dropped, {} without credits)",
        merged.len(),
        duplicates,
        without_credits
    );
    metrics::stage::rows_out(STAGE, merged.len());
    outcome.value = merged;
    Ok(())
}
