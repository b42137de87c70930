//! Cleans the raw `movies_metadata.csv` table.

use crate::config::FlattenPolicy;
use crate::constants::{
    CANONICAL_COLUMNS, FLATTEN_COLUMNS, ID_COLUMN, POSTER_PATH_COLUMN, REDUNDANT_METADATA_COLUMNS,
};
use crate::error::Result;
use crate::metrics;
use crate::pipeline::flatten::{self, is_missing};
use crate::pipeline::outcome::StageOutcome;
use crate::table::{parse_id, Table};
use crate::types::PosterRecord;

pub const STAGE: &str = "metadata";

#[derive(Debug, Clone)]
pub struct MetadataOptions {
    pub flatten_policy: FlattenPolicy,
    pub sort_by_id: bool,
    /// Prefix for relative poster paths; `None` keeps them as read
    pub image_base_url: Option<String>,
}

impl Default for MetadataOptions {
    fn default() -> Self {
        Self {
            flatten_policy: FlattenPolicy::PerCell,
            sort_by_id: true,
            image_base_url: None,
        }
    }
}

/// Cleaned movies plus the poster paths split off from them.
#[derive(Debug, Clone, Default)]
pub struct CleanedMetadata {
    pub movies: Table,
    pub posters: Table,
}

/// Drop unused columns, coerce ids, flatten list columns, split off the
/// poster paths and arrange the rest in canonical order.
pub fn clean_metadata(raw: &Table, options: &MetadataOptions) -> StageOutcome<CleanedMetadata> {
    let mut outcome = StageOutcome::new(STAGE, CleanedMetadata::default());
    let result = clean_into(raw, options, &mut outcome);
    outcome.settle(result)
}

fn clean_into(
    raw: &Table,
    options: &MetadataOptions,
    outcome: &mut StageOutcome<CleanedMetadata>,
) -> Result<()> {
    let table = raw.drop_columns(REDUNDANT_METADATA_COLUMNS);
    let table = coerce_ids(&table, outcome)?;

    let flattened = flatten::flatten_columns(&table, FLATTEN_COLUMNS, options.flatten_policy);
    let table = absorb_flattened(table, flattened, outcome).dedup_by(ID_COLUMN)?;

    let mut posters = extract_posters(&table, options.image_base_url.as_deref(), outcome)?;
    let mut movies = table.drop_columns(&[POSTER_PATH_COLUMN]).reindex(CANONICAL_COLUMNS);

    if options.sort_by_id {
        movies.sort_by_id(ID_COLUMN)?;
        posters.sort_by_id(ID_COLUMN)?;
    }

    metrics::stage::rows_out(STAGE, movies.len());
    outcome.value = CleanedMetadata { movies, posters };
    Ok(())
}

/// Take the flattened table and its item errors. A fatal flatten keeps
/// `unflattened` so the movies still reach later steps.
fn absorb_flattened<T>(
    unflattened: Table,
    flattened: StageOutcome<Table>,
    outcome: &mut StageOutcome<T>,
) -> Table {
    outcome.errors.extend(flattened.errors);
    match flattened.fatal {
        Some(reason) => {
            outcome.record(flatten::STAGE, format!("columns left unflattened: {}", reason));
            unflattened
        }
        None => flattened.value,
    }
}

/// Rewrite ids as plain integers and drop rows whose id is not numeric.
fn coerce_ids<T>(table: &Table, outcome: &mut StageOutcome<T>) -> Result<Table> {
    let idx = table.require_column(ID_COLUMN)?;
    let mut coerced = Table::new(table.headers().iter().map(String::as_str));
    for (row, cells) in table.rows().iter().enumerate() {
        match parse_id(&cells[idx]) {
            Some(id) => {
                let mut cells = cells.clone();
                cells[idx] = id.to_string();
                coerced.push_row(cells);
            }
            None => outcome.record(format!("row {}", row), format!("non-numeric id '{}'", cells[idx])),
        }
    }
    Ok(coerced)
}

fn extract_posters<T>(
    table: &Table,
    image_base_url: Option<&str>,
    outcome: &mut StageOutcome<T>,
) -> Result<Table> {
    let columns = [ID_COLUMN, POSTER_PATH_COLUMN];
    if !table.has_column(POSTER_PATH_COLUMN) {
        outcome.record(format!("column {}", POSTER_PATH_COLUMN), "not present, no posters extracted");
        return Ok(Table::new(columns));
    }

    let ids = table.column(ID_COLUMN)?;
    let paths = table.column(POSTER_PATH_COLUMN)?;
    let records: Vec<PosterRecord> = ids
        .iter()
        .zip(paths)
        .map(|(id, path)| PosterRecord {
            id: id.to_string(),
            poster_path: absolute_poster(path, image_base_url),
        })
        .collect();
    Table::from_records(&columns, &records)
}

fn absolute_poster(path: &str, image_base_url: Option<&str>) -> String {
    let path = path.trim();
    if is_missing(path) {
        return String::new();
    }
    match image_base_url {
        Some(base) if !path.starts_with("http") => {
            format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
        }
        _ => path.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::outcome::StageStatus;

    fn raw() -> Table {
        let mut table = Table::new([
            "adult", "budget", "genres", "homepage", "id", "imdb_id", "original_language",
            "original_title", "overview", "popularity", "poster_path", "production_companies",
            "production_countries", "release_date", "revenue", "runtime", "spoken_languages",
            "status", "tagline", "title", "video", "vote_average", "vote_count",
        ]);
        table.push_row([
            "False", "30000000", "[{'id': 16, 'name': 'Animation'}, {'id': 35, 'name': 'Comedy'}]",
            "http://toystory.disney.com/toy-story", "862", "tt0114709", "en", "Toy Story",
            "Led by Woody...", "21.946943", "/rhIRbceoE9lR4veEXuwCC2wARtG.jpg",
            "[{'name': 'Pixar Animation Studios', 'id': 3}]",
            "[{'iso_3166_1': 'US', 'name': 'United States of America'}]", "1995-10-30",
            "373554033", "81.0", "[{'iso_639_1': 'en', 'name': 'English'}]", "Released", "",
            "Toy Story", "False", "7.7", "5415",
        ]);
        table.push_row([
            "False", "65000000", "[{'id': 12, 'name': 'Adventure'}]", "", "8844", "tt0113497",
            "en", "Jumanji", "When siblings...", "17.015539", "", "[]", "[]", "1995-12-15",
            "262797249", "104.0", "[]", "Released", "", "Jumanji", "False", "6.9", "2413",
        ]);
        // Shifted row from the real dataset: the id column holds a date
        table.push_row([
            " - Written by Ørnås", "/ff9qCepilowshEtG2GYWwzt2bs4.jpg", "[]", "", "1997-08-20",
            "0", "", "", "", "", "", "", "", "", "", "", "", "", "", "", "", "", "",
        ]);
        // Duplicate id, later copy is dropped
        table.push_row([
            "False", "0", "[]", "", "862", "tt0114709", "en", "Toy Story (dup)", "", "", "", "[]",
            "[]", "", "", "", "[]", "Released", "", "Toy Story (dup)", "False", "", "",
        ]);
        table
    }

    #[test]
    fn test_clean_metadata_shapes_canonical_table() {
        let outcome = clean_metadata(&raw(), &MetadataOptions::default());
        let movies = &outcome.value.movies;

        assert_eq!(movies.headers(), CANONICAL_COLUMNS);
        assert_eq!(movies.len(), 2);
        assert_eq!(movies.column("id").unwrap(), vec!["862", "8844"]);
        assert_eq!(movies.cell(0, "genres"), Some("Animation|Comedy"));
        assert_eq!(movies.cell(0, "production_companies"), Some("Pixar Animation Studios"));
        assert_eq!(movies.cell(0, "production_countries"), Some("United States of America"));
        assert_eq!(movies.cell(0, "title"), Some("Toy Story"));
        assert_eq!(movies.cell(1, "spoken_languages"), Some(""));
        assert!(!movies.has_column("homepage"));
        assert!(!movies.has_column("poster_path"));
    }

    #[test]
    fn test_non_numeric_ids_are_recorded() {
        let outcome = clean_metadata(&raw(), &MetadataOptions::default());
        assert_eq!(outcome.status(), StageStatus::Partial);
        assert!(outcome.errors.iter().any(|e| e.reason.contains("1997-08-20")));
    }

    #[test]
    fn test_posters_split_off_and_absolutized() {
        let options = MetadataOptions {
            image_base_url: Some("https://image.tmdb.org/t/p/original".into()),
            ..MetadataOptions::default()
        };
        let posters = clean_metadata(&raw(), &options).value.posters;

        assert_eq!(posters.headers(), &["id", "poster_path"]);
        assert_eq!(
            posters.rows()[0],
            vec!["862", "https://image.tmdb.org/t/p/original/rhIRbceoE9lR4veEXuwCC2wARtG.jpg"]
        );
        assert_eq!(posters.rows()[1], vec!["8844", ""]);
    }

    #[test]
    fn test_sorting_is_numeric() {
        let mut table = Table::new(["id", "title"]);
        table.push_row(["100", "b"]);
        table.push_row(["20", "a"]);
        let outcome = clean_metadata(&table, &MetadataOptions::default());
        assert_eq!(outcome.value.movies.column("id").unwrap(), vec!["20", "100"]);
    }

    #[test]
    fn test_fatal_flatten_keeps_unflattened_rows() {
        let mut unflattened = Table::new(["id", "genres"]);
        unflattened.push_row(["862", "[{'id': 16, 'name': 'Animation'}]"]);

        let mut flattened = StageOutcome::new(flatten::STAGE, Table::default());
        flattened.record("genres row 0", "bad literal");
        let flattened = flattened.settle(Err(crate::error::PrepError::Shape("column length".into())));

        let mut outcome: StageOutcome<CleanedMetadata> = StageOutcome::new(STAGE, CleanedMetadata::default());
        let table = absorb_flattened(unflattened.clone(), flattened, &mut outcome);

        assert_eq!(table, unflattened);
        assert_eq!(outcome.errors.len(), 2);
        assert_eq!(outcome.errors[1].item, "flatten");
        assert!(!outcome.is_fatal());
    }

    #[test]
    fn test_missing_id_column_is_fatal() {
        let table = Table::new(["title"]);
        let outcome = clean_metadata(&table, &MetadataOptions::default());
        assert!(outcome.is_fatal());
        assert!(outcome.value.movies.is_empty());
    }
}
