use crate::pipeline::DropReason;
use crate::storage::RunStatus;
use std::collections::BTreeMap;
use std::time::Duration;

/// Counters gathered over one crawl invocation
#[derive(Debug, Clone, Default)]
pub struct CrawlReport {
    /// Ledger id of the run, once recorded in the sink
    pub run_id: Option<i64>,

    /// Terminal status, set by `Crawler::stop`
    pub status: Option<RunStatus>,

    /// Pages fetched successfully
    pub fetched: u64,

    /// Pages whose fetch failed after retries
    pub fetch_failed: u64,

    /// URLs skipped because robots.txt disallows them
    pub robots_denied: u64,

    /// Links admitted to the frontier, start URLs included
    pub enqueued: u64,

    /// Candidate records built by the item extractor
    pub extracted: u64,

    /// Records that passed every pipeline stage
    pub committed: u64,

    /// Records dropped as duplicates
    pub duplicates: u64,

    /// Other drops, keyed by reason
    pub dropped: BTreeMap<String, u64>,

    /// Records written to the export log
    pub exported: u64,

    /// The first fatal pipeline error, if any
    pub fatal: Option<String>,

    pub elapsed: Duration,
}

impl CrawlReport {
    /// Counts one dropped record
    pub fn record_drop(&mut self, reason: &DropReason) {
        if *reason == DropReason::Duplicate {
            self.duplicates += 1;
        } else {
            *self.dropped.entry(reason.to_string()).or_insert(0) += 1;
        }
    }

    /// Keeps the first fatal error
    pub fn record_fatal(&mut self, message: impl Into<String>) {
        if self.fatal.is_none() {
            self.fatal = Some(message.into());
        }
    }

    /// Drops other than duplicates
    pub fn total_dropped(&self) -> u64 {
        self.dropped.values().sum()
    }

    pub fn is_fatal(&self) -> bool {
        self.fatal.is_some()
    }
}
