/// Column, file and default constants shared across the pipeline.
/// Keeping them in one place avoids drift between stages that read what
/// another stage wrote.

/// Separator used inside every flattened multi-value field
pub const FIELD_DELIMITER: &str = "|";

// Key columns
pub const ID_COLUMN: &str = "id";
pub const MOVIE_ID_COLUMN: &str = "movieId";
pub const POSTER_PATH_COLUMN: &str = "poster_path";

// Credits columns
pub const CAST_COLUMN: &str = "cast";
pub const CREW_COLUMN: &str = "crew";
pub const DIRECTOR_COLUMN: &str = "director";
pub const ACTOR_COLUMN: &str = "actor";
pub const CHARACTER_COLUMN: &str = "character";
pub const DIRECTOR_JOB: &str = "Director";

/// Only the first billed cast members are kept
pub const MAX_CAST_MEMBERS: usize = 15;

// Keywords columns
pub const KEYWORDS_COLUMN: &str = "keywords";
pub const TAG_ID_COLUMN: &str = "tagId";
pub const TAG_COLUMN: &str = "tag";

/// Raw metadata columns with no downstream consumer
pub const REDUNDANT_METADATA_COLUMNS: &[&str] = &[
    "belongs_to_collection",
    "homepage",
    "tagline",
    "video",
    "adult",
    "imdb_id",
];

/// Columns dropped from the working table once the merge has consumed them
pub const MERGE_SOURCE_COLUMNS: &[&str] = &[CREW_COLUMN, CAST_COLUMN, POSTER_PATH_COLUMN];

/// Literal-encoded list columns flattened to `|`-joined names
pub const FLATTEN_COLUMNS: &[&str] = &[
    "production_companies",
    "production_countries",
    "spoken_languages",
    "genres",
];

/// Canonical movies column order
pub const CANONICAL_COLUMNS: &[&str] = &[
    "id",
    "title",
    "original_title",
    "genres",
    "original_language",
    "spoken_languages",
    "overview",
    "runtime",
    "release_date",
    "production_companies",
    "production_countries",
    "status",
    "budget",
    "revenue",
    "popularity",
    "vote_count",
    "vote_average",
];

/// Credits-derived columns appended after the canonical metadata columns
pub const CREDITS_COLUMNS: &[&str] = &[DIRECTOR_COLUMN, ACTOR_COLUMN, CHARACTER_COLUMN];

/// Header of the fetcher output file
pub const EXTRA_DATA_COLUMNS: &[&str] = &["id", "poster_path", "title", "genres"];

/// Columns profiled by the value-count analysis
pub const ANALYSED_COLUMNS: &[&str] = &["genres", "production_countries", "spoken_languages"];

// Input file names
pub const METADATA_INPUT_FILE: &str = "movies_metadata.csv";
pub const CREDITS_INPUT_FILE: &str = "credits.csv";
pub const KEYWORDS_INPUT_FILE: &str = "keywords.csv";

// Output file names
pub const MOVIES_FILE: &str = "movies.csv";
pub const POSTER_FILE: &str = "poster_path.csv";
pub const CREDITS_FILE: &str = "credits.csv";
pub const KEYWORDS_FILE: &str = "keywords.csv";
pub const EXTRA_DATA_FILE: &str = "extra_data.csv";
pub const PROFILE_FILE: &str = "metadata_info.csv";

// Fetcher defaults
pub const DEFAULT_API_BASE_URL: &str = "https://api.themoviedb.org/3";
pub const DEFAULT_IMAGE_BASE_URL: &str = "https://image.tmdb.org/t/p/original";
pub const DEFAULT_LANGUAGE: &str = "zh-CN";
pub const DEFAULT_POOL_SIZE: usize = 30;
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Environment variable that overrides the configured API key
pub const API_KEY_ENV: &str = "TMDB_API_KEY";

/// Default config file looked up when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "movie_prep.toml";

/// Rows copied by the sample extractor
pub const DEFAULT_SAMPLE_ROWS: usize = 10;
