//! Metric names and recording helpers for the fetcher and pipeline stages.
//!
//! Recording goes through the `metrics` facade; with no recorder installed
//! the calls are no-ops, so binaries opt in by installing one.

use std::fmt;

/// All metric names used in the crate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Fetch metrics
    FetchRequestsSuccess,
    FetchRequestsError,
    FetchRetries,
    FetchRequestDuration,

    // Stage metrics
    StageRowsOut,
    StageItemErrors,
    StageFatal,
    StageDuration,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::FetchRequestsSuccess => "movie_prep_fetch_requests_success_total",
            MetricName::FetchRequestsError => "movie_prep_fetch_requests_error_total",
            MetricName::FetchRetries => "movie_prep_fetch_retries_total",
            MetricName::FetchRequestDuration => "movie_prep_fetch_request_duration_seconds",

            MetricName::StageRowsOut => "movie_prep_stage_rows_out_total",
            MetricName::StageItemErrors => "movie_prep_stage_item_errors_total",
            MetricName::StageFatal => "movie_prep_stage_fatal_total",
            MetricName::StageDuration => "movie_prep_stage_duration_seconds",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

pub mod fetch {
    use super::MetricName;

    pub fn request_success() {
        ::metrics::counter!(MetricName::FetchRequestsSuccess.as_str()).increment(1);
    }

    pub fn request_error(reason: &'static str) {
        ::metrics::counter!(MetricName::FetchRequestsError.as_str(), "reason" => reason).increment(1);
    }

    pub fn retry() {
        ::metrics::counter!(MetricName::FetchRetries.as_str()).increment(1);
    }

    pub fn request_duration(secs: f64) {
        ::metrics::histogram!(MetricName::FetchRequestDuration.as_str()).record(secs);
    }
}

pub mod stage {
    use super::MetricName;

    pub fn rows_out(stage: &'static str, rows: usize) {
        ::metrics::counter!(MetricName::StageRowsOut.as_str(), "stage" => stage).increment(rows as u64);
    }

    pub fn item_errors(stage: &'static str, count: usize) {
        ::metrics::counter!(MetricName::StageItemErrors.as_str(), "stage" => stage)
            .increment(count as u64);
    }

    pub fn fatal(stage: &'static str) {
        ::metrics::counter!(MetricName::StageFatal.as_str(), "stage" => stage).increment(1);
    }

    pub fn duration(stage: &'static str, secs: f64) {
        ::metrics::histogram!(MetricName::StageDuration.as_str(), "stage" => stage).record(secs);
    }
}
