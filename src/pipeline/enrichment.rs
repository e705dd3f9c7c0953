//! Stages that call out to the enrichment collaborators

use crate::config::CountryFailurePolicy;
use crate::enrich::{ExtractionError, PlaceExtractor, Summarizer};
use crate::pipeline::stage::{priority, DropReason, Outcome, Stage};
use crate::pipeline::CandidateRecord;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

async fn with_deadline<T, F>(limit: Duration, call: F) -> Result<T, ExtractionError>
where
    F: Future<Output = Result<T, ExtractionError>>,
{
    tokio::time::timeout(limit, call)
        .await
        .unwrap_or(Err(ExtractionError::Timeout(limit)))
}

/// Replaces the record text with the summarizer's article text
pub struct TextExtraction {
    summarizer: Arc<dyn Summarizer>,
    timeout: Duration,
}

impl TextExtraction {
    pub fn new(summarizer: Arc<dyn Summarizer>, timeout: Duration) -> Self {
        Self {
            summarizer,
            timeout,
        }
    }
}

#[async_trait]
impl Stage for TextExtraction {
    fn name(&self) -> &'static str {
        "text-extraction"
    }

    fn priority(&self) -> u32 {
        priority::TEXT_EXTRACTION
    }

    async fn apply(&self, mut record: CandidateRecord) -> Outcome {
        let url = match Url::parse(&record.url) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!("Cannot summarize {}: {}", record.url, e);
                return Outcome::Drop(DropReason::TextExtractionFailed);
            }
        };

        match with_deadline(self.timeout, self.summarizer.summarize(&url)).await {
            Ok(text) if !text.trim().is_empty() => {
                record.text = text;
                Outcome::Continue(record)
            }
            Ok(_) => {
                tracing::warn!("Summarizer returned no text for {}", record.url);
                Outcome::Drop(DropReason::TextExtractionFailed)
            }
            Err(e) => {
                tracing::warn!("Text extraction failed for {}: {}", record.url, e);
                Outcome::Drop(DropReason::TextExtractionFailed)
            }
        }
    }
}

/// Fills `countries_mentioned` from headline and text
pub struct CountryExtraction {
    places: Arc<dyn PlaceExtractor>,
    on_failure: CountryFailurePolicy,
    timeout: Duration,
}

impl CountryExtraction {
    pub fn new(
        places: Arc<dyn PlaceExtractor>,
        on_failure: CountryFailurePolicy,
        timeout: Duration,
    ) -> Self {
        Self {
            places,
            on_failure,
            timeout,
        }
    }
}

#[async_trait]
impl Stage for CountryExtraction {
    fn name(&self) -> &'static str {
        "country-extraction"
    }

    fn priority(&self) -> u32 {
        priority::COUNTRY_EXTRACTION
    }

    async fn apply(&self, mut record: CandidateRecord) -> Outcome {
        let source = format!("{}\n{}", record.headline, record.text);

        match with_deadline(self.timeout, self.places.countries(&source)).await {
            Ok(countries) => {
                record.countries_mentioned = countries;
                Outcome::Continue(record)
            }
            Err(e) => match self.on_failure {
                CountryFailurePolicy::Drop => {
                    tracing::warn!("Country extraction failed for {}: {}", record.url, e);
                    Outcome::Drop(DropReason::CountryExtractionFailed)
                }
                CountryFailurePolicy::Continue => {
                    tracing::warn!(
                        "Country extraction failed for {}, continuing without countries: {}",
                        record.url,
                        e
                    );
                    record.countries_mentioned.clear();
                    Outcome::Continue(record)
                }
            },
        }
    }
}
