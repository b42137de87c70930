pub mod align;
pub mod credits;
pub mod flatten;
pub mod keywords;
pub mod merge;
pub mod metadata;
pub mod outcome;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use std::time::Instant;
use tracing::{info, instrument, warn};

use crate::config::Config;
use crate::constants::{
    CREDITS_FILE, CREDITS_INPUT_FILE, EXTRA_DATA_COLUMNS, EXTRA_DATA_FILE, ID_COLUMN,
    KEYWORDS_FILE, KEYWORDS_INPUT_FILE, METADATA_INPUT_FILE, MOVIES_FILE, MOVIE_ID_COLUMN,
    POSTER_FILE, POSTER_PATH_COLUMN,
};
use crate::error::Result;
use crate::fetcher::{self, Fetcher};
use crate::metrics;
use crate::table::Table;
use crate::types::FetchedMovie;

use self::metadata::{CleanedMetadata, MetadataOptions};
use self::outcome::{StageOutcome, StageStatus, StageSummary};

/// Result of a complete pipeline run
#[derive(Debug, Serialize)]
pub struct PipelineResult {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub stages: Vec<StageSummary>,
    pub outputs: Vec<String>,
}

impl PipelineResult {
    pub fn failed_stages(&self) -> impl Iterator<Item = &StageSummary> {
        self.stages.iter().filter(|s| s.status == StageStatus::Fatal)
    }
}

/// Runs the preparation stages in order over the configured directories.
///
/// Each stage reads its inputs, produces a new table and writes its own
/// output file. A stage that fails is logged and summarised; later stages
/// carry on with whatever earlier ones produced.
pub struct Pipeline {
    config: Config,
}

impl Pipeline {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn read_input(&self, file: &str) -> Result<Table> {
        Table::read_csv(&self.config.paths.input(file), self.config.paths.encoding)
    }

    fn read_output(&self, file: &str) -> Result<Table> {
        Table::read_csv(&self.config.paths.output(file), self.config.paths.encoding)
    }

    /// Write a stage's table to `file` under the output directory. A failed
    /// write turns the stage fatal.
    fn persist(&self, outcome: StageOutcome<Table>, file: &str) -> StageOutcome<Table> {
        if outcome.is_fatal() {
            return outcome;
        }
        let path = self.config.paths.output(file);
        match outcome.value.write_csv(&path) {
            Ok(()) => {
                info!("💾 Saved {} rows to {}", outcome.value.len(), path.display());
                outcome
            }
            Err(e) => outcome.settle(Err(e)),
        }
    }

    fn metadata_options(&self) -> MetadataOptions {
        MetadataOptions {
            flatten_policy: self.config.pipeline.flatten_policy,
            sort_by_id: self.config.pipeline.sort_by_id,
            image_base_url: Some(self.config.fetcher.image_base_url.clone()),
        }
    }

    /// Clean the raw metadata and write `poster_path.csv`.
    #[instrument(skip(self))]
    pub fn metadata_stage(&self) -> StageOutcome<CleanedMetadata> {
        let raw = match self.read_input(METADATA_INPUT_FILE) {
            Ok(raw) => raw,
            Err(e) => return StageOutcome::fatal(metadata::STAGE, &e),
        };
        let outcome = metadata::clean_metadata(&raw, &self.metadata_options());
        if outcome.is_fatal() {
            return outcome;
        }

        let path = self.config.paths.output(POSTER_FILE);
        match outcome.value.posters.write_csv(&path) {
            Ok(()) => {
                info!("💾 Saved posters to {}", path.display());
                outcome
            }
            Err(e) => outcome.settle(Err(e)),
        }
    }

    /// Clean metadata and write it as `movies.csv` without merging credits.
    pub fn clean_only(&self) -> StageSummary {
        let movies = self.metadata_stage().map(|cleaned| cleaned.movies);
        self.persist(movies, MOVIES_FILE).summary()
    }

    #[instrument(skip(self))]
    pub fn credits_stage(&self) -> StageOutcome<Table> {
        match self.read_input(CREDITS_INPUT_FILE) {
            Ok(raw) => self.persist(credits::handle_credits(&raw), CREDITS_FILE),
            Err(e) => StageOutcome::fatal(credits::STAGE, &e),
        }
    }

    #[instrument(skip(self))]
    pub fn keywords_stage(&self) -> StageOutcome<Table> {
        match self.read_input(KEYWORDS_INPUT_FILE) {
            Ok(raw) => self.persist(keywords::handle_keywords(&raw), KEYWORDS_FILE),
            Err(e) => StageOutcome::fatal(keywords::STAGE, &e),
        }
    }

    /// Fetch catalog details for every movie id and write `extra_data.csv`.
    #[instrument(skip(self, fetcher, movies))]
    pub async fn fetch_stage(&self, fetcher: &Fetcher, movies: &Table) -> StageOutcome<Vec<FetchedMovie>> {
        let ids = match movies.column(ID_COLUMN) {
            Ok(ids) => ids.into_iter().map(str::to_string).collect::<Vec<_>>(),
            Err(e) => return StageOutcome::fatal(fetcher::STAGE, &e),
        };
        let outcome = fetcher.fetch_all(ids).await;
        if outcome.value.is_empty() {
            warn!("No movie details fetched; {} not written", EXTRA_DATA_FILE);
            return outcome;
        }
        match fetcher::write_extra_data(&outcome.value, &self.config.paths.output(EXTRA_DATA_FILE)) {
            Ok(()) => outcome,
            Err(e) => outcome.settle(Err(e)),
        }
    }

    /// Join metadata, credits and optional posters; write `movies.csv`.
    #[instrument(skip_all)]
    pub fn merge_stage(&self, movies: &Table, credits: &Table, posters: Option<&Table>) -> StageOutcome<Table> {
        let merged = merge::merge_movies(movies, credits, posters, self.config.pipeline.sort_by_id);
        self.persist(merged, MOVIES_FILE)
    }

    /// Merge from the files earlier stages left in the output directory.
    pub fn merge_from_outputs(&self) -> StageOutcome<Table> {
        let movies = match self.read_output(MOVIES_FILE) {
            Ok(movies) => movies,
            Err(e) => return StageOutcome::fatal(merge::STAGE, &e),
        };
        // Missing credits leave the credit columns empty rather than failing the merge
        let credits = self.read_output(CREDITS_FILE).unwrap_or_else(|e| {
            warn!("Merging without credits: {}", e);
            Table::default()
        });

        let extra_path = self.config.paths.output(EXTRA_DATA_FILE);
        let posters = if extra_path.exists() {
            match self
                .read_output(EXTRA_DATA_FILE)
                .and_then(|t| t.select(&[ID_COLUMN, POSTER_PATH_COLUMN]))
            {
                Ok(posters) => Some(posters),
                Err(e) => {
                    warn!("Ignoring {}: {}", extra_path.display(), e);
                    None
                }
            }
        } else {
            None
        };
        self.merge_stage(&movies, &credits, posters.as_ref())
    }

    /// Filter every configured ratings file to the ids in `movies`.
    #[instrument(skip_all)]
    pub fn align_stage(&self, movies: &Table) -> Vec<StageSummary> {
        let ids = match align::valid_ids(movies) {
            Ok(ids) => ids,
            Err(e) => return vec![StageOutcome::<usize>::fatal(align::STAGE, &e).summary()],
        };

        let paths = &self.config.paths;
        paths
            .ratings_files
            .iter()
            .map(|file| {
                let output = paths.output(file);
                let aligned =
                    align::align_file(&paths.input(file), &output, MOVIE_ID_COLUMN, &ids, paths.encoding);
                if !aligned.is_fatal() {
                    info!("💾 Saved {} rows to {}", aligned.value, output.display());
                }
                let mut summary = aligned.summary();
                summary.stage = format!("{}:{}", align::STAGE, file);
                summary
            })
            .collect()
    }

    /// Align using the `movies.csv` a previous run wrote.
    pub fn align_from_outputs(&self) -> Vec<StageSummary> {
        match self.read_output(MOVIES_FILE) {
            Ok(movies) => self.align_stage(&movies),
            Err(e) => vec![StageOutcome::<usize>::fatal(align::STAGE, &e).summary()],
        }
    }

    /// Run every stage in order. With a fetcher and `fetch_extra` enabled,
    /// fetched poster URLs are joined onto the canonical table.
    pub async fn run(&self, fetcher: Option<&Fetcher>) -> PipelineResult {
        let started_at = Utc::now();
        let t_pipeline = Instant::now();
        info!("🚀 Starting pipeline");
        let mut stages = Vec::new();

        let cleaned = self.metadata_stage();
        stages.push(cleaned.summary());
        let metadata_failed = cleaned.is_fatal();
        let cleaned = cleaned.value;

        let credits = self.credits_stage();
        stages.push(credits.summary());

        let keywords = self.keywords_stage();
        stages.push(keywords.summary());

        let mut posters = None;
        match fetcher {
            Some(fetcher) if self.config.pipeline.fetch_extra => {
                let fetched = self.fetch_stage(fetcher, &cleaned.movies).await;
                stages.push(fetched.summary());
                match Table::from_records(EXTRA_DATA_COLUMNS, &fetched.value)
                    .and_then(|t| t.select(&[ID_COLUMN, POSTER_PATH_COLUMN]))
                {
                    Ok(table) if !table.is_empty() => posters = Some(table),
                    Ok(_) => {}
                    Err(e) => warn!("Fetched posters not joined: {}", e),
                }
            }
            _ => info!("Skipping catalog fetch"),
        }

        if metadata_failed {
            warn!("Metadata stage failed; skipping merge and ratings alignment");
        } else {
            let merged = self.merge_stage(&cleaned.movies, &credits.value, posters.as_ref());
            stages.push(merged.summary());

            if merged.is_fatal() || merged.value.is_empty() {
                warn!("No canonical movies table; ratings left unaligned");
            } else {
                stages.extend(self.align_stage(&merged.value));
            }
        }

        let outputs = written_outputs(&self.config.paths.output_dir, &stages);
        metrics::stage::duration("pipeline", t_pipeline.elapsed().as_secs_f64());
        info!("✅ Pipeline finished in {:.1}s", t_pipeline.elapsed().as_secs_f64());

        PipelineResult {
            started_at,
            finished_at: Utc::now(),
            stages,
            outputs,
        }
    }
}

/// Output files that exist after the run, in stage order.
fn written_outputs(output_dir: &Path, stages: &[StageSummary]) -> Vec<String> {
    let mut files = vec![POSTER_FILE, CREDITS_FILE, KEYWORDS_FILE, EXTRA_DATA_FILE, MOVIES_FILE]
        .into_iter()
        .map(str::to_string)
        .collect::<Vec<_>>();
    files.extend(
        stages
            .iter()
            .filter_map(|s| s.stage.strip_prefix(&format!("{}:", align::STAGE)).map(str::to_string)),
    );
    files
        .into_iter()
        .map(|f| output_dir.join(f))
        .filter(|p| p.exists())
        .map(|p| p.to_string_lossy().to_string())
        .collect()
}
