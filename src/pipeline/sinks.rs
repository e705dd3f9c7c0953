//! Terminal stages: persistence and export

use crate::crawler::{with_retry, RetryPolicy};
use crate::output::ExportLog;
use crate::pipeline::stage::{priority, Outcome, Stage};
use crate::pipeline::CandidateRecord;
use crate::storage::{DocumentSink, StorageError};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Upserts the record into the document sink
///
/// Failures are retried with backoff; once retries run out the run turns fatal.
pub struct Persistence {
    sink: Arc<dyn DocumentSink>,
    retry: RetryPolicy,
    timeout: Duration,
}

impl Persistence {
    pub fn new(sink: Arc<dyn DocumentSink>, retry: RetryPolicy, timeout: Duration) -> Self {
        Self {
            sink,
            retry,
            timeout,
        }
    }
}

#[async_trait]
impl Stage for Persistence {
    fn name(&self) -> &'static str {
        "persistence"
    }

    fn priority(&self) -> u32 {
        priority::PERSISTENCE
    }

    async fn apply(&self, record: CandidateRecord) -> Outcome {
        let label = format!("upsert {}", record.url);
        let sink = &self.sink;
        let timeout = self.timeout;
        let pending = &record;

        let result = with_retry(&self.retry, &label, |_| true, move || async move {
            tokio::time::timeout(timeout, sink.upsert(pending))
                .await
                .unwrap_or(Err(StorageError::Timeout(timeout)))
        })
        .await;

        match result {
            Ok(()) => Outcome::Continue(record),
            Err(e) => Outcome::Fatal(format!("persisting {} failed: {}", record.url, e)),
        }
    }
}

/// Appends the committed record to the run's export log
pub struct Export {
    log: Arc<ExportLog>,
}

impl Export {
    pub fn new(log: Arc<ExportLog>) -> Self {
        Self { log }
    }
}

#[async_trait]
impl Stage for Export {
    fn name(&self) -> &'static str {
        "export"
    }

    fn priority(&self) -> u32 {
        priority::EXPORT
    }

    async fn apply(&self, record: CandidateRecord) -> Outcome {
        match self.log.append(&record) {
            Ok(()) => Outcome::Continue(record),
            Err(e) => Outcome::Fatal(format!("exporting {} failed: {}", record.url, e)),
        }
    }
}
