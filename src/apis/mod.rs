pub mod tmdb;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::FetchedMovie;

/// A remote source of per-movie details.
#[async_trait]
pub trait MovieCatalog: Send + Sync {
    /// Short name used in logs
    fn catalog_name(&self) -> &'static str;

    /// Fetch poster, localized title and genres for one id.
    async fn fetch_movie(&self, id: &str) -> Result<FetchedMovie>;
}

pub use tmdb::TmdbClient;
