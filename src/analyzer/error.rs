use serde::Serialize;
use thiserror::Error;

/// Errors that abort a weekly analysis run.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(
        "insufficient data for {user_id}: {days_with_data} day(s) with a mood score, at least {required} required ({dropped} malformed entries dropped)"
    )]
    InsufficientData {
        user_id: String,
        days_with_data: usize,
        required: usize,
        dropped: usize,
    },

    #[error("invalid analysis settings: {0}")]
    InvalidSettings(String),
}

/// A log entry that failed validation. Recorded as a warning; the run continues without it.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[error("log entry #{index} ({date}) dropped: {reason}")]
pub struct MalformedEntryError {
    pub index: usize,
    pub date: String,
    pub reason: String,
}

impl MalformedEntryError {
    pub fn new(index: usize, date: &str, reason: impl Into<String>) -> Self {
        Self {
            index,
            date: date.to_string(),
            reason: reason.into(),
        }
    }
}
