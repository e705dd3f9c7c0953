//! Pipeline execution
//!
//! Holds the priority-ordered stages and applies them to each candidate
//! record until one drops it or fails fatally.

use crate::config::PipelineConfig;
use crate::crawler::RetryPolicy;
use crate::enrich::{PlaceExtractor, Summarizer};
use crate::output::ExportLog;
use crate::pipeline::enrichment::{CountryExtraction, TextExtraction};
use crate::pipeline::sinks::{Export, Persistence};
use crate::pipeline::stage::{DropReason, Outcome, Stage};
use crate::pipeline::validation::{Deduplication, MandatoryFieldValidation, SeenSet};
use crate::pipeline::CandidateRecord;
use crate::storage::DocumentSink;
use std::sync::Arc;
use std::time::Duration;

/// Base delay between persistence retries
const PERSISTENCE_BACKOFF: Duration = Duration::from_millis(200);

/// External services the standard stages call
#[derive(Clone)]
pub struct Collaborators {
    pub summarizer: Arc<dyn Summarizer>,
    pub places: Arc<dyn PlaceExtractor>,
    pub sink: Arc<dyn DocumentSink>,
}

/// Runs candidate records through an ordered list of stages
///
/// Stages are sorted by ascending priority once, at construction. The first
/// `Drop` or `Fatal` ends the record's run.
pub struct PipelineExecutor {
    stages: Vec<Box<dyn Stage>>,
}

impl PipelineExecutor {
    pub fn new(mut stages: Vec<Box<dyn Stage>>) -> Self {
        // stable sort keeps insertion order for equal priorities
        stages.sort_by_key(|stage| stage.priority());
        Self { stages }
    }

    /// Builds the six standard stages
    ///
    /// # Arguments
    ///
    /// * `config` - Pipeline section of the rule file
    /// * `collaborators` - Summarizer, place extractor and document sink
    /// * `export` - The run's export log, already opened
    /// * `seen` - Run-scoped dedup set
    pub fn standard(
        config: &PipelineConfig,
        collaborators: &Collaborators,
        export: Arc<ExportLog>,
        seen: Arc<SeenSet>,
    ) -> Self {
        let timeout = Duration::from_secs(config.collaborator_timeout_secs);

        Self::new(vec![
            Box::new(TextExtraction::new(
                collaborators.summarizer.clone(),
                timeout,
            )),
            Box::new(CountryExtraction::new(
                collaborators.places.clone(),
                config.on_country_extraction_failure,
                timeout,
            )),
            Box::new(MandatoryFieldValidation),
            Box::new(Deduplication::new(seen)),
            Box::new(Persistence::new(
                collaborators.sink.clone(),
                RetryPolicy::new(config.persistence_retries, PERSISTENCE_BACKOFF),
                timeout,
            )),
            Box::new(Export::new(export)),
        ])
    }

    /// Stage names in execution order
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    /// Applies every stage to the record in order
    ///
    /// # Returns
    ///
    /// `Continue` with the committed record, or the first `Drop`/`Fatal`
    pub async fn run(&self, record: CandidateRecord) -> Outcome {
        let url = record.url.clone();
        let mut current = record;

        for stage in &self.stages {
            match stage.apply(current).await {
                Outcome::Continue(next) => current = next,
                Outcome::Drop(reason) => {
                    if reason == DropReason::Duplicate {
                        tracing::debug!("{} dropped {}: {}", stage.name(), url, reason);
                    } else {
                        tracing::warn!("{} dropped {}: {}", stage.name(), url, reason);
                    }
                    return Outcome::Drop(reason);
                }
                Outcome::Fatal(message) => {
                    tracing::error!("{} failed fatally on {}: {}", stage.name(), url, message);
                    return Outcome::Fatal(message);
                }
            }
        }

        tracing::info!("Committed: {}", url);
        Outcome::Continue(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::ExtractionError;
    use crate::pipeline::priority;
    use crate::storage::SqliteSink;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;
    use url::Url;

    struct EchoSummarizer;

    #[async_trait]
    impl Summarizer for EchoSummarizer {
        async fn summarize(&self, url: &Url) -> Result<String, ExtractionError> {
            Ok(format!("Body of {} mentions France.", url.path()))
        }
    }

    struct FixedPlaces;

    #[async_trait]
    impl PlaceExtractor for FixedPlaces {
        async fn countries(&self, _text: &str) -> Result<Vec<String>, ExtractionError> {
            Ok(vec!["France".to_string()])
        }
    }

    /// Records the order stages were applied in
    struct Recorder {
        name: &'static str,
        priority: u32,
        log: Arc<Mutex<Vec<&'static str>>>,
        outcome: fn(CandidateRecord) -> Outcome,
    }

    #[async_trait]
    impl Stage for Recorder {
        fn name(&self) -> &'static str {
            self.name
        }

        fn priority(&self) -> u32 {
            self.priority
        }

        async fn apply(&self, record: CandidateRecord) -> Outcome {
            self.log.lock().unwrap().push(self.name);
            (self.outcome)(record)
        }
    }

    fn pass(record: CandidateRecord) -> Outcome {
        Outcome::Continue(record)
    }

    fn reject(_record: CandidateRecord) -> Outcome {
        Outcome::Drop(DropReason::Duplicate)
    }

    fn record() -> CandidateRecord {
        CandidateRecord {
            url: "https://site.example/article/1".to_string(),
            headline: "Headline".to_string(),
            author: "Ann Lee".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_stages_run_in_priority_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let stage = |name, priority, outcome| -> Box<dyn Stage> {
            Box::new(Recorder {
                name,
                priority,
                log: log.clone(),
                outcome,
            })
        };

        let executor = PipelineExecutor::new(vec![
            stage("late", 800, pass as fn(CandidateRecord) -> Outcome),
            stage("early", 200, pass),
            stage("middle", 500, pass),
        ]);

        assert_eq!(executor.stage_names(), vec!["early", "middle", "late"]);
        assert!(executor.run(record()).await.is_continue());
        assert_eq!(*log.lock().unwrap(), vec!["early", "middle", "late"]);
    }

    #[tokio::test]
    async fn test_drop_stops_later_stages() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let executor = PipelineExecutor::new(vec![
            Box::new(Recorder {
                name: "first",
                priority: 100,
                log: log.clone(),
                outcome: reject,
            }),
            Box::new(Recorder {
                name: "second",
                priority: 200,
                log: log.clone(),
                outcome: pass,
            }),
        ]);

        assert!(matches!(
            executor.run(record()).await,
            Outcome::Drop(DropReason::Duplicate)
        ));
        assert_eq!(*log.lock().unwrap(), vec!["first"]);
    }

    #[tokio::test]
    async fn test_standard_pipeline_commits_and_exports() {
        let dir = TempDir::new().unwrap();
        let export = Arc::new(ExportLog::at_path(dir.path().join("news.json")));
        export.open().unwrap();

        let sink = Arc::new(SqliteSink::open_in_memory().unwrap());
        let collaborators = Collaborators {
            summarizer: Arc::new(EchoSummarizer),
            places: Arc::new(FixedPlaces),
            sink: sink.clone(),
        };
        let executor = PipelineExecutor::standard(
            &PipelineConfig::default(),
            &collaborators,
            export.clone(),
            Arc::new(SeenSet::new()),
        );

        assert_eq!(
            executor.stage_names(),
            vec![
                "text-extraction",
                "country-extraction",
                "mandatory-fields",
                "deduplication",
                "persistence",
                "export"
            ]
        );

        match executor.run(record()).await {
            Outcome::Continue(committed) => {
                assert_eq!(committed.text, "Body of /article/1 mentions France.");
                assert_eq!(committed.countries_mentioned, vec!["France"]);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(matches!(
            executor.run(record()).await,
            Outcome::Drop(DropReason::Duplicate)
        ));

        assert_eq!(sink.count_articles().unwrap(), 1);
        assert_eq!(export.finish().unwrap(), 1);
    }

    #[test]
    fn test_standard_priorities_are_distinct() {
        let all: std::collections::HashSet<u32> = [
            priority::TEXT_EXTRACTION,
            priority::COUNTRY_EXTRACTION,
            priority::MANDATORY_FIELDS,
            priority::DEDUPLICATION,
            priority::PERSISTENCE,
            priority::EXPORT,
        ]
        .into_iter()
        .collect();
        assert_eq!(all.len(), 6);
    }
}
