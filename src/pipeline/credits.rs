//! Director and cast extraction from the raw credits table.

use crate::constants::{
    ACTOR_COLUMN, CAST_COLUMN, CHARACTER_COLUMN, CREW_COLUMN, DIRECTOR_COLUMN, DIRECTOR_JOB,
    ID_COLUMN, MAX_CAST_MEMBERS,
};
use crate::error::Result;
use crate::metrics;
use crate::pipeline::flatten::{field_text, parse_record_list};
use crate::pipeline::outcome::StageOutcome;
use crate::table::Table;
use crate::types::CreditsRecord;

pub const STAGE: &str = "credits";

/// Names of every crew member whose job is `Director`, in source order.
pub fn extract_directors(crew_cell: &str) -> Result<Vec<String>> {
    let mut directors = Vec::new();
    for member in parse_record_list(crew_cell)? {
        if field_text(&member, "job")? == DIRECTOR_JOB {
            directors.push(field_text(&member, "name")?);
        }
    }
    Ok(directors)
}

/// Actor names and the characters they play, for the first billed cast
/// members. Both lists always have the same length.
pub fn extract_cast(cast_cell: &str) -> Result<(Vec<String>, Vec<String>)> {
    let mut actors = Vec::new();
    let mut characters = Vec::new();
    for member in parse_record_list(cast_cell)?.iter().take(MAX_CAST_MEMBERS) {
        // Read both before pushing either so the lists stay aligned
        let actor = field_text(member, "name")?;
        let character = field_text(member, "character")?;
        actors.push(actor);
        characters.push(character);
    }
    Ok((actors, characters))
}

/// Build the `id,director,actor,character` table from raw credits.
///
/// A row whose crew or cast literal is malformed keeps its id with the
/// affected columns empty, and the failure is recorded.
pub fn handle_credits(credits: &Table) -> StageOutcome<Table> {
    let mut outcome = StageOutcome::new(STAGE, Table::default());
    let result = credits_into(credits, &mut outcome);
    outcome.settle(result)
}

fn credits_into(credits: &Table, outcome: &mut StageOutcome<Table>) -> Result<()> {
    let ids = credits.column(ID_COLUMN)?;
    let crew = credits.column(CREW_COLUMN)?;
    let cast = credits.column(CAST_COLUMN)?;

    let mut table = Table::new([ID_COLUMN, DIRECTOR_COLUMN, ACTOR_COLUMN, CHARACTER_COLUMN]);
    for (row, ((id, crew_cell), cast_cell)) in ids.iter().zip(&crew).zip(&cast).enumerate() {
        let mut record = CreditsRecord {
            id: id.to_string(),
            ..CreditsRecord::default()
        };

        match extract_directors(crew_cell) {
            Ok(directors) => record.director = directors,
            Err(e) => outcome.record(format!("crew row {} (id {})", row, id), e),
        }
        match extract_cast(cast_cell) {
            Ok((actors, characters)) => {
                record.actor = actors;
                record.character = characters;
            }
            Err(e) => outcome.record(format!("cast row {} (id {})", row, id), e),
        }

        table.push_row(record.to_row());
    }

    metrics::stage::rows_out(STAGE, table.len());
    outcome.value = table;
    Ok(())
}
