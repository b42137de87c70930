use std::fs;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const LOG_DIR: &str = "logs";
const LOG_FILE_PREFIX: &str = "movie_prep.log";
const DEFAULT_FILTER: &str = "movie_prep=info,warn";

/// `RUST_LOG` when it parses, otherwise crate logs at info and the rest at warn.
fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Human-readable logs on stdout plus JSON lines in a daily file under `logs/`.
pub fn init_logging() {
    if let Err(e) = fs::create_dir_all(LOG_DIR) {
        eprintln!("cannot create {}: {}", LOG_DIR, e);
    }

    let (json_writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(LOG_DIR, LOG_FILE_PREFIX));

    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().json().with_writer(json_writer))
        .with(fmt::layer().with_target(true).with_writer(std::io::stdout))
        .init();

    // Dropping the guard stops the background writer, so it lives for the process
    std::mem::forget(guard);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_parses() {
        let filter = EnvFilter::try_new(DEFAULT_FILTER).unwrap();
        assert!(filter.to_string().contains("movie_prep=info"));
    }
}
