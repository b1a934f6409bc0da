#![deny(clippy::cargo)]
#![deny(clippy::complexity)]
#![deny(clippy::correctness)]
#![deny(clippy::nursery)]
#![deny(clippy::perf)]
#![deny(clippy::style)]
#![deny(clippy::suspicious)]
#![deny(clippy::pedantic)]

use serde_json::Value;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub mod app;
pub mod backends;
pub mod expression;
pub mod record;
pub mod request;
pub mod response;
pub mod setup;
pub mod ui;

pub use expression::UpdateExpression;
pub use record::{Note, Record};

// More convenient Result types
pub type Result<T> = std::result::Result<T, ServiceError>;
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Capability set every key-value backend provides.
///
/// Tables are plain names; keys are the record `id`. All calls are single
/// round-trips with no partial results.
pub trait RecordStore: Send + Sync {
    /// Fetches one record by primary key, `None` when absent
    ///
    /// # Errors
    ///
    /// Returns an error if the backend could not be read
    fn get(&self, table: &str, id: &str) -> StoreResult<Option<Record>>;

    /// Writes a record, replacing any existing record with the same key
    ///
    /// # Errors
    ///
    /// Returns an error if the backend could not be written
    fn put(&self, table: &str, record: &Record) -> StoreResult<()>;

    /// Returns every record in the table, in no particular order
    ///
    /// # Errors
    ///
    /// Returns an error if the backend could not be read
    fn scan(&self, table: &str) -> StoreResult<Vec<Record>>;

    /// Applies the assignments of `expression` to the record with key `id`.
    /// A missing record is created holding `id` and the assigned attributes.
    /// Concurrent updates of one key must each see the other's assignments.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend could not be read or written
    fn update(&self, table: &str, id: &str, expression: &UpdateExpression) -> StoreResult<()>;

    /// Removes the record with key `id`. Removing an absent key succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend could not be written
    fn delete(&self, table: &str, id: &str) -> StoreResult<()>;

    /// Secondary lookup: records whose `attribute` equals `value`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend could not be read
    fn query_by(&self, table: &str, attribute: &str, value: &Value) -> StoreResult<Vec<Record>> {
        Ok(filter_by(self.scan(table)?, attribute, value))
    }
}

/// Keeps only the records whose `attribute` equals `value`
#[must_use]
pub fn filter_by(records: Vec<Record>, attribute: &str, value: &Value) -> Vec<Record> {
    records
        .into_iter()
        .filter(|record| record.get(attribute) == Some(value))
        .collect()
}

// Every way an operation can fail, as seen by the caller
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("No record with ID '{id}' in table '{table}'")]
    NotFound { table: String, id: String },

    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    #[error("Unrecognized operation: {0}")]
    InvalidOperation(String),

    #[error("Malformed request: {0}")]
    MalformedRequest(String),
}

impl ServiceError {
    /// Name of the error kind, as rendered in responses
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NotFound",
            Self::StoreUnavailable(_) => "StoreUnavailable",
            Self::InvalidOperation(_) => "InvalidOperation",
            Self::MalformedRequest(_) => "MalformedRequest",
        }
    }

    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedRequest(msg.into())
    }
}

// Enum for all possible backend errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed creating directory '{}'", .path.display())]
    DirectoryCreationError { path: PathBuf, source: io::Error },

    #[error("Failed reading directory contents")]
    DirectoryReadError(io::Error),

    #[error("Failed writing item data to file")]
    FileWriteError(io::Error),

    #[error("Failed reading item data from file")]
    FileReadError(io::Error),

    #[error("Failed removing item file")]
    FileRemoveError(io::Error),

    #[error("Item is improperly formatted: {0}")]
    ItemCorrupted(#[from] serde_json::Error),

    #[error("Database is locked or busy")]
    Timeout,

    #[error("Database file is not a valid SQLite database")]
    NotADatabase,

    #[error("Database schema has changed unexpectedly")]
    SchemaChanged,

    #[error("Insufficient permissions")]
    PermissionDenied,

    #[error("Store lock was poisoned by a panicking writer")]
    Poisoned,

    #[error(transparent)]
    Other(#[from] anyhow::Error), // Used as fallback
}

// Failures of the command-line host itself, outside any single request
#[derive(Debug, Error)]
pub enum HostError {
    #[error("Failed to read input: {0}")]
    InputReadError(io::Error),

    #[error("Failed to open input file '{}': {source}", .path.display())]
    InputOpenError { path: PathBuf, source: io::Error },

    #[error("Failed writing to stdout: {0}")]
    OutputWriteError(io::Error),

    #[error("Failed to open store: {0}")]
    Store(#[from] StoreError),
}
