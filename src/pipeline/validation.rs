//! Stages that reject incomplete or repeated records

use crate::pipeline::stage::{priority, DropReason, Outcome, Stage};
use crate::pipeline::CandidateRecord;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Fields every committed record must carry, checked in this order
pub const MANDATORY_FIELDS: [&str; 4] = ["headline", "url", "text", "author"];

/// Drops records with an empty mandatory field
#[derive(Debug, Default)]
pub struct MandatoryFieldValidation;

#[async_trait]
impl Stage for MandatoryFieldValidation {
    fn name(&self) -> &'static str {
        "mandatory-fields"
    }

    fn priority(&self) -> u32 {
        priority::MANDATORY_FIELDS
    }

    async fn apply(&self, record: CandidateRecord) -> Outcome {
        let missing = MANDATORY_FIELDS.iter().copied().find(|name| {
            record
                .field(name)
                .map_or(true, |value| value.trim().is_empty())
        });

        match missing {
            Some(name) => Outcome::Drop(DropReason::MissingField(name)),
            None => Outcome::Continue(record),
        }
    }
}

/// URLs that already went through deduplication in this run
#[derive(Debug, Default)]
pub struct SeenSet {
    urls: Mutex<HashSet<String>>,
}

impl SeenSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the URL was not seen before
    pub fn insert(&self, url: &str) -> bool {
        let mut urls = self.urls.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        urls.insert(url.to_string())
    }

    pub fn len(&self) -> usize {
        self.urls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Drops a record whose URL was already seen in this run
pub struct Deduplication {
    seen: Arc<SeenSet>,
}

impl Deduplication {
    pub fn new(seen: Arc<SeenSet>) -> Self {
        Self { seen }
    }
}

#[async_trait]
impl Stage for Deduplication {
    fn name(&self) -> &'static str {
        "deduplication"
    }

    fn priority(&self) -> u32 {
        priority::DEDUPLICATION
    }

    async fn apply(&self, record: CandidateRecord) -> Outcome {
        if self.seen.insert(&record.url) {
            Outcome::Continue(record)
        } else {
            Outcome::Drop(DropReason::Duplicate)
        }
    }
}
