use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChurnError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid date format: {input:?}")]
    InvalidDateFormat { input: String },

    #[error("Invalid date range: end {end} precedes start {start}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[error("Unknown timezone: {name:?}")]
    UnknownTimezone { name: String },

    #[error("Account '{account_id}' not found")]
    AccountNotFound { account_id: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type ChurnResult<T> = Result<T, ChurnError>;
