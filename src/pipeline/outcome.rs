use serde::Serialize;
use std::fmt;
use tracing::{error, warn};

use crate::error::PrepError;
use crate::metrics;

/// How a stage finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Success,
    /// Finished with a usable result, but some items failed
    Partial,
    /// Could not produce a result; the value is an empty placeholder
    Fatal,
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StageStatus::Success => "success",
            StageStatus::Partial => "partial",
            StageStatus::Fatal => "fatal",
        };
        write!(f, "{}", s)
    }
}

/// A single failed item: a row, a cell, a column or a fetched id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemError {
    pub item: String,
    pub reason: String,
}

/// Result of one stage: its value plus everything that went wrong on the way.
#[derive(Debug, Clone)]
pub struct StageOutcome<T> {
    pub stage: &'static str,
    pub value: T,
    pub errors: Vec<ItemError>,
    pub fatal: Option<String>,
}

impl<T> StageOutcome<T> {
    pub fn new(stage: &'static str, value: T) -> Self {
        Self {
            stage,
            value,
            errors: Vec::new(),
            fatal: None,
        }
    }

    /// Log and keep a per-item failure.
    pub fn record(&mut self, item: impl Into<String>, reason: impl fmt::Display) {
        let item = item.into();
        let reason = reason.to_string();
        warn!(stage = self.stage, item = %item, "{}", reason);
        self.errors.push(ItemError { item, reason });
    }

    pub fn status(&self) -> StageStatus {
        if self.fatal.is_some() {
            StageStatus::Fatal
        } else if self.errors.is_empty() {
            StageStatus::Success
        } else {
            StageStatus::Partial
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.fatal.is_some()
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> StageOutcome<U> {
        StageOutcome {
            stage: self.stage,
            value: f(self.value),
            errors: self.errors,
            fatal: self.fatal,
        }
    }

    /// Shorthand summary used by the orchestrator and CLI.
    pub fn summary(&self) -> StageSummary {
        StageSummary {
            stage: self.stage.to_string(),
            status: self.status(),
            item_errors: self.errors.len(),
            fatal: self.fatal.clone(),
        }
    }
}

impl<T: Default> StageOutcome<T> {
    pub fn fatal(stage: &'static str, err: &PrepError) -> Self {
        error!(stage = stage, "Stage failed: {}", err);
        metrics::stage::fatal(stage);
        Self {
            stage,
            value: T::default(),
            errors: Vec::new(),
            fatal: Some(err.to_string()),
        }
    }

    /// Turn a stage body's `Result` into an outcome, keeping item errors
    /// recorded before a fatal error struck.
    pub fn settle(mut self, result: crate::error::Result<()>) -> Self {
        if let Err(err) = result {
            error!(stage = self.stage, "Stage failed: {}", err);
            metrics::stage::fatal(self.stage);
            self.value = T::default();
            self.fatal = Some(err.to_string());
        }
        metrics::stage::item_errors(self.stage, self.errors.len());
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StageSummary {
    pub stage: String,
    pub status: StageStatus,
    pub item_errors: usize,
    pub fatal: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_progression() {
        let mut outcome: StageOutcome<Vec<u32>> = StageOutcome::new("demo", vec![1]);
        assert_eq!(outcome.status(), StageStatus::Success);

        outcome.record("row 3", "bad literal");
        assert_eq!(outcome.status(), StageStatus::Partial);
        assert_eq!(outcome.errors[0].item, "row 3");

        let outcome = outcome.settle(Err(PrepError::MissingColumn("id".into())));
        assert_eq!(outcome.status(), StageStatus::Fatal);
        assert!(outcome.value.is_empty());
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.summary().fatal.as_deref(), Some("Missing required column: id"));
    }
}
