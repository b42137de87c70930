//! Bounded concurrent fan-out over a [`MovieCatalog`].
//!
//! Each id is fetched in its own task, at most `pool_size` at a time.
//! Results come back in completion order and a failing id only ever costs
//! its own record: it is logged, recorded as an item error and dropped.

use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, instrument};

use crate::apis::{MovieCatalog, TmdbClient};
use crate::config::FetcherConfig;
use crate::constants::{EXTRA_DATA_COLUMNS, ID_COLUMN};
use crate::error::{PrepError, Result};
use crate::metrics;
use crate::pipeline::outcome::StageOutcome;
use crate::table::{Encoding, Table};
use crate::types::FetchedMovie;

pub const STAGE: &str = "fetch";

pub struct Fetcher {
    catalog: Arc<dyn MovieCatalog>,
    pool_size: usize,
}

impl Fetcher {
    pub fn new(catalog: Arc<dyn MovieCatalog>, pool_size: usize) -> Self {
        Self {
            catalog,
            pool_size: pool_size.max(1),
        }
    }

    /// Fetcher backed by the HTTP catalog described by `config`.
    pub fn from_config(config: &FetcherConfig) -> Result<Self> {
        let client = TmdbClient::new(config.clone())?;
        Ok(Self::new(Arc::new(client), config.pool_size))
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Fetch every id, returning only the successful records.
    ///
    /// Duplicate ids are requested once. Output order follows completion,
    /// not input order.
    #[instrument(skip(self, ids), fields(catalog = self.catalog.catalog_name()))]
    pub async fn fetch_all<I, S>(&self, ids: I) -> StageOutcome<Vec<FetchedMovie>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let ids: Vec<String> = ids
            .into_iter()
            .map(|id| id.into().trim().to_string())
            .filter(|id| seen.insert(id.clone()))
            .collect();
        info!("Fetching {} movies with {} workers", ids.len(), self.pool_size);

        let results: Vec<(String, Result<FetchedMovie>)> = stream::iter(ids)
            .map(|id| {
                let catalog = Arc::clone(&self.catalog);
                async move {
                    let task_id = id.clone();
                    // A panicking request must not take its siblings with it
                    let result =
                        match tokio::spawn(async move { catalog.fetch_movie(&task_id).await }).await {
                            Ok(result) => result,
                            Err(e) => Err(PrepError::Task(e)),
                        };
                    (id, result)
                }
            })
            .buffer_unordered(self.pool_size)
            .collect()
            .await;

        let mut outcome = StageOutcome::new(STAGE, Vec::with_capacity(results.len()));
        for (id, result) in results {
            match result {
                Ok(movie) => {
                    metrics::fetch::request_success();
                    outcome.value.push(movie);
                }
                Err(e) => {
                    metrics::fetch::request_error(failure_kind(&e));
                    outcome.record(format!("movie {}", id), &e);
                }
            }
        }

        info!(
            "Fetched {} movies ({} failed)",
            outcome.value.len(),
            outcome.errors.len()
        );
        metrics::stage::rows_out(STAGE, outcome.value.len());
        outcome
    }
}

fn failure_kind(err: &PrepError) -> &'static str {
    match err {
        PrepError::Http(e) if e.is_timeout() => "timeout",
        PrepError::Http(e) if e.is_connect() => "connect",
        PrepError::Http(_) => "transport",
        PrepError::Api { .. } => "status",
        PrepError::Json(_) => "body",
        PrepError::Task(_) => "task",
        _ => "other",
    }
}

/// Read the ids to fetch from the `id` column of a movies CSV.
pub fn read_movie_ids(path: &Path, encoding: Encoding) -> Result<Vec<String>> {
    let table = Table::read_csv(path, encoding)?;
    Ok(table
        .column(ID_COLUMN)?
        .into_iter()
        .map(str::to_string)
        .collect())
}

/// Write fetched records with the `id,poster_path,title,genres` header.
pub fn write_extra_data(movies: &[FetchedMovie], path: &Path) -> Result<()> {
    Table::from_records(EXTRA_DATA_COLUMNS, movies)?.write_csv(path)?;
    info!("Data successfully written to {}", path.display());
    Ok(())
}
