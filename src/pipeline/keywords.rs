//! Expands each movie's keyword list into one row per keyword.

use serde_json::Value;

use crate::constants::{ID_COLUMN, KEYWORDS_COLUMN, MOVIE_ID_COLUMN, TAG_COLUMN, TAG_ID_COLUMN};
use crate::error::{PrepError, Result};
use crate::metrics;
use crate::pipeline::flatten::{field_text, parse_record_list};
use crate::pipeline::outcome::StageOutcome;
use crate::table::Table;
use crate::types::KeywordRecord;

pub const STAGE: &str = "keywords";

/// Keyword records for one movie. An empty or unparsable list yields none.
pub fn expand_row(movie_id: &str, keywords_cell: &str) -> Result<Vec<KeywordRecord>> {
    parse_record_list(keywords_cell)?
        .iter()
        .map(|keyword| {
            Ok(KeywordRecord {
                movie_id: movie_id.to_string(),
                tag_id: tag_id(keyword)?,
                tag: field_text(keyword, "name")?,
            })
        })
        .collect()
}

fn tag_id(keyword: &Value) -> Result<i64> {
    match keyword.get("id") {
        Some(Value::Number(n)) => n
            .as_i64()
            .ok_or_else(|| PrepError::Shape(format!("keyword id {} is not an integer", n))),
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map_err(|_| PrepError::Shape(format!("keyword id '{}' is not an integer", s))),
        _ => Err(PrepError::Shape("keyword has no integer 'id'".into())),
    }
}

/// Build the `movieId,tagId,tag` table from raw keywords.
pub fn handle_keywords(keywords: &Table) -> StageOutcome<Table> {
    let mut outcome = StageOutcome::new(STAGE, Table::default());
    let result = keywords_into(keywords, &mut outcome);
    outcome.settle(result)
}

fn keywords_into(keywords: &Table, outcome: &mut StageOutcome<Table>) -> Result<()> {
    let ids = keywords.column(ID_COLUMN)?;
    let cells = keywords.column(KEYWORDS_COLUMN)?;

    let mut records = Vec::new();
    for (row, (id, cell)) in ids.iter().zip(&cells).enumerate() {
        match expand_row(id, cell) {
            Ok(expanded) => records.extend(expanded),
            Err(e) => outcome.record(format!("row {} (id {})", row, id), e),
        }
    }

    let table = Table::from_records(&[MOVIE_ID_COLUMN, TAG_ID_COLUMN, TAG_COLUMN], &records)?;
    metrics::stage::rows_out(STAGE, table.len());
    outcome.value = table;
    Ok(())
}
