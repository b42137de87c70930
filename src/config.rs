use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::{
    API_KEY_ENV, DEFAULT_API_BASE_URL, DEFAULT_IMAGE_BASE_URL, DEFAULT_LANGUAGE,
    DEFAULT_MAX_RETRIES, DEFAULT_POOL_SIZE, DEFAULT_TIMEOUT_SECS,
};
use crate::error::{PrepError, Result};
use crate::table::Encoding;

/// Top-level configuration, read from a TOML file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub fetcher: FetcherConfig,
    pub paths: PathsConfig,
    pub pipeline: PipelineOptions,
}

/// Settings for the remote catalog fetcher.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    pub api_key: String,
    pub base_url: String,
    pub image_base_url: String,
    pub language: String,
    pub pool_size: usize,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_API_BASE_URL.to_string(),
            image_base_url: DEFAULT_IMAGE_BASE_URL.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
            pool_size: DEFAULT_POOL_SIZE,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl FetcherConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Reject settings the fetcher cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(PrepError::Config(format!(
                "fetcher.api_key is empty (set it in the config file or {})",
                API_KEY_ENV
            )));
        }
        if self.pool_size == 0 {
            return Err(PrepError::Config("fetcher.pool_size must be at least 1".into()));
        }
        if self.timeout_secs == 0 {
            return Err(PrepError::Config("fetcher.timeout_secs must be at least 1".into()));
        }
        if self.max_retries == 0 {
            return Err(PrepError::Config("fetcher.max_retries must be at least 1".into()));
        }
        Ok(())
    }
}

/// Where inputs are read from and outputs written to.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub encoding: Encoding,
    pub ratings_files: Vec<String>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("archive"),
            output_dir: PathBuf::from("output"),
            encoding: Encoding::Utf8,
            ratings_files: vec!["ratings.csv".to_string(), "ratings_small.csv".to_string()],
        }
    }
}

impl PathsConfig {
    pub fn input(&self, file: &str) -> PathBuf {
        self.input_dir.join(file)
    }

    pub fn output(&self, file: &str) -> PathBuf {
        self.output_dir.join(file)
    }
}

/// How a malformed cell affects the column being flattened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlattenPolicy {
    /// A bad cell becomes an empty string; the rest of the column is flattened.
    #[default]
    PerCell,
    /// Any bad cell leaves the whole column exactly as it was read.
    ColumnAtomic,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineOptions {
    pub flatten_policy: FlattenPolicy,
    pub sort_by_id: bool,
    pub fetch_extra: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            flatten_policy: FlattenPolicy::PerCell,
            sort_by_id: true,
            fetch_extra: false,
        }
    }
}

impl Config {
    /// Load configuration from `path`. A missing file yields defaults; the
    /// API key environment variable always wins over the file.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = fs::read_to_string(path).map_err(|e| {
                PrepError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
            })?;
            Self::from_toml(&content)?
        } else {
            tracing::debug!("Config file {} not found, using defaults", path.display());
            Self::default()
        };

        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                config.fetcher.api_key = key;
            }
        }
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}
