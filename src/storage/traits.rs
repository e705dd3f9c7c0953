//! Storage traits and error types
//!
//! This module defines the document sink the pipeline persists into and the
//! read-only query surface over what it stored.

use crate::pipeline::CandidateRecord;
use crate::storage::{RunRecord, RunStatus};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Storage call timed out after {0:?}")]
    Timeout(Duration),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Persistence target for committed records
///
/// Upserts are keyed by URL and idempotent, so concurrent or repeated writes
/// of the same record leave one row.
#[async_trait]
pub trait DocumentSink: Send + Sync {
    /// Inserts the record or replaces the one stored under the same URL
    async fn upsert(&self, record: &CandidateRecord) -> StorageResult<()>;

    /// Records the start of a crawl run
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    async fn begin_run(&self, config_hash: &str) -> StorageResult<i64>;

    /// Records how a run ended
    async fn finish_run(
        &self,
        run_id: i64,
        status: RunStatus,
        committed: u64,
        error_message: Option<&str>,
    ) -> StorageResult<()>;
}

/// Keyword match over one article field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordMatch {
    pub keyword: String,
    pub case_sensitive: bool,
}

impl KeywordMatch {
    pub fn new(keyword: impl Into<String>, case_sensitive: bool) -> Self {
        Self {
            keyword: keyword.into(),
            case_sensitive,
        }
    }
}

/// Read-only queries over harvested articles
pub trait ArticleQuery {
    /// Every stored article, oldest first
    fn list_all(&self) -> StorageResult<Vec<CandidateRecord>>;

    /// Articles whose text contains the keyword
    fn find_by_text(&self, query: &KeywordMatch) -> StorageResult<Vec<CandidateRecord>>;

    /// Articles whose headline contains the keyword
    fn find_by_headline(&self, query: &KeywordMatch) -> StorageResult<Vec<CandidateRecord>>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;
}
