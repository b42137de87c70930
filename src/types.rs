use serde::{Deserialize, Serialize};

use crate::constants::FIELD_DELIMITER;

/// One successfully fetched catalog entry, as written to `extra_data.csv`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchedMovie {
    /// The id exactly as it was requested
    pub id: String,
    /// Absolute poster URL, or empty when the catalog has none
    pub poster_path: String,
    pub title: String,
    /// Genre names joined with `|`
    pub genres: String,
}

/// Director and billed cast for one movie.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreditsRecord {
    pub id: String,
    pub director: Vec<String>,
    /// `actor[i]` plays `character[i]`
    pub actor: Vec<String>,
    pub character: Vec<String>,
}

impl CreditsRecord {
    /// Render as the `id,director,actor,character` output row.
    pub fn to_row(&self) -> [String; 4] {
        [
            self.id.clone(),
            self.director.join(FIELD_DELIMITER),
            self.actor.join(FIELD_DELIMITER),
            self.character.join(FIELD_DELIMITER),
        ]
    }
}

/// One (movie, keyword) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordRecord {
    #[serde(rename = "movieId")]
    pub movie_id: String,
    #[serde(rename = "tagId")]
    pub tag_id: i64,
    pub tag: String,
}

/// Poster URL for one movie, as written to `poster_path.csv`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PosterRecord {
    pub id: String,
    pub poster_path: String,
}
