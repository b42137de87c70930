use async_trait::async_trait;
use serde_json::Value;
use std::time::Instant;
use tracing::{debug, instrument, warn};

use super::MovieCatalog;
use crate::config::FetcherConfig;
use crate::constants::FIELD_DELIMITER;
use crate::error::{PrepError, Result};
use crate::metrics;
use crate::types::FetchedMovie;

/// Client for the `GET {base}/movie/{id}` details endpoint.
pub struct TmdbClient {
    client: reqwest::Client,
    config: FetcherConfig,
}

impl TmdbClient {
    pub fn new(config: FetcherConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;
        Self::with_client(config, client)
    }

    /// Use a prebuilt HTTP client; its timeout should match `config`.
    pub fn with_client(config: FetcherConfig, client: reqwest::Client) -> Result<Self> {
        config.validate()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &FetcherConfig {
        &self.config
    }

    /// Build the details request for one id.
    pub fn movie_request(&self, id: &str) -> Result<reqwest::Request> {
        let url = format!("{}/movie/{}", self.config.base_url.trim_end_matches('/'), id.trim());
        Ok(self
            .client
            .get(url)
            .query(&[
                ("api_key", self.config.api_key.as_str()),
                ("language", self.config.language.as_str()),
            ])
            .build()?)
    }

    /// Send the request, re-sending only on connect or timeout errors and
    /// never more than `max_retries` times in total.
    async fn send_with_retry(&self, id: &str) -> Result<reqwest::Response> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let request = self.movie_request(id)?;
            match self.client.execute(request).await {
                Ok(response) => return Ok(response),
                Err(e) if (e.is_connect() || e.is_timeout()) && attempt < self.config.max_retries => {
                    debug!("Attempt {} for movie {} failed: {}; retrying", attempt, id, e);
                    metrics::fetch::retry();
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Pull the poster, title and genres out of a details body.
    pub fn details_from_json(&self, id: &str, body: &Value) -> FetchedMovie {
        let poster_path = match body.get("poster_path").and_then(Value::as_str) {
            Some(path) if !path.is_empty() => format!(
                "{}/{}",
                self.config.image_base_url.trim_end_matches('/'),
                path.trim_start_matches('/')
            ),
            _ => String::new(),
        };

        let title = body
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let genres = body
            .get("genres")
            .and_then(Value::as_array)
            .map(|genres| {
                genres
                    .iter()
                    .filter_map(|g| g.get("name").and_then(Value::as_str))
                    .collect::<Vec<_>>()
                    .join(FIELD_DELIMITER)
            })
            .unwrap_or_default();

        FetchedMovie {
            id: id.to_string(),
            poster_path,
            title,
            genres,
        }
    }
}

#[async_trait]
impl MovieCatalog for TmdbClient {
    fn catalog_name(&self) -> &'static str {
        "tmdb"
    }

    #[instrument(skip(self))]
    async fn fetch_movie(&self, id: &str) -> Result<FetchedMovie> {
        let started = Instant::now();
        let response = self.send_with_retry(id).await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        metrics::fetch::request_duration(started.elapsed().as_secs_f64());

        if !status.is_success() {
            // The catalog explains failures in a `status_message` field
            let message = serde_json::from_slice::<Value>(&bytes)
                .ok()
                .and_then(|v| v.get("status_message").and_then(Value::as_str).map(str::to_string))
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown").to_string());
            warn!("Catalog returned {} for movie {}", status.as_u16(), id);
            return Err(PrepError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: Value = serde_json::from_slice(&bytes)?;
        Ok(self.details_from_json(id, &body))
    }
}
