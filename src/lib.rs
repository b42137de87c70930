pub mod analyse;
pub mod apis;
pub mod config;
pub mod constants;
pub mod error;
pub mod fetcher;
pub mod literal;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod table;
pub mod types;
