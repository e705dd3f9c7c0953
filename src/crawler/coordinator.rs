//! Crawl driver
//!
//! The [`Crawler`] owns one run: it seeds the frontier, dispatches a bounded
//! pool of tasks (each task takes one URL through robots check, fetch, link
//! discovery, item extraction and the full pipeline), and finally flushes the
//! visited store, finalizes the export log and records the run outcome.

use crate::config::Config;
use crate::crawler::frontier::{Frontier, FrontierEntry, ScheduledFetch};
use crate::crawler::items::ItemExtractor;
use crate::crawler::links::LinkExtractor;
use crate::crawler::report::CrawlReport;
use crate::crawler::{FetchedPage, Fetcher};
use crate::output::ExportLog;
use crate::pipeline::{Collaborators, Outcome, PipelineExecutor, SeenSet};
use crate::robots::RobotsCache;
use crate::rules::{CompiledRules, Handler};
use crate::state::{RunState, VisitedStore};
use crate::storage::{DocumentSink, RunStatus};
use crate::HarvestError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::task::JoinSet;

/// State scoped to one crawl invocation
pub struct RunContext {
    /// URLs processed in this and earlier runs
    pub visited: Arc<VisitedStore>,

    /// URLs that went through deduplication in this run
    pub seen: Arc<SeenSet>,

    /// This run's export log
    pub export: Arc<ExportLog>,

    /// Hash of the rule file, recorded with the run
    pub config_hash: String,

    run_id: Option<i64>,
}

impl RunContext {
    pub fn new(
        visited: Arc<VisitedStore>,
        export: Arc<ExportLog>,
        config_hash: impl Into<String>,
    ) -> Self {
        Self {
            visited,
            seen: Arc::new(SeenSet::new()),
            export,
            config_hash: config_hash.into(),
            run_id: None,
        }
    }

    /// Ledger id, once the run has been started
    pub fn run_id(&self) -> Option<i64> {
        self.run_id
    }
}

/// Requests a graceful stop from outside the crawl loop
///
/// Stopping closes the frontier: nothing new is admitted or dequeued, and
/// in-flight tasks run to completion.
#[derive(Clone)]
pub struct StopHandle {
    requested: Arc<AtomicBool>,
    frontier: Arc<Frontier>,
}

impl StopHandle {
    pub fn stop(&self) {
        if !self.requested.swap(true, Ordering::SeqCst) {
            tracing::info!("Stop requested, draining in-flight work");
        }
        self.frontier.close();
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}

/// Everything a crawl task needs, shared between tasks
struct Worker {
    rules: Arc<CompiledRules>,
    links: LinkExtractor,
    items: ItemExtractor,
    pipeline: PipelineExecutor,
    fetcher: Arc<dyn Fetcher>,
    robots: Option<RobotsCache>,
    frontier: Arc<Frontier>,
    visited: Arc<VisitedStore>,
    report: Mutex<CrawlReport>,
}

impl Worker {
    fn tally<T>(&self, update: impl FnOnce(&mut CrawlReport) -> T) -> T {
        let mut report = self.report.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        update(&mut report)
    }

    fn snapshot(&self) -> CrawlReport {
        self.tally(|report| report.clone())
    }

    /// Records a fatal error and stops admission
    fn fail(&self, message: String) {
        tracing::error!("Fatal: {}", message);
        self.tally(|report| report.record_fatal(message));
        self.frontier.close();
    }

    /// Takes one URL through its whole unit of work
    ///
    /// The URL is marked visited once link discovery and the extraction
    /// attempt are done, whatever the pipeline outcome. `scheduled` holds the
    /// in-flight slot until then.
    async fn process(&self, scheduled: ScheduledFetch) {
        let entry = &scheduled.entry;

        if let Some(robots) = &self.robots {
            if !robots.is_allowed(&entry.url).await {
                tracing::info!("Disallowed by robots.txt: {}", entry.url);
                self.tally(|report| report.robots_denied += 1);
                return;
            }
        }

        tracing::debug!("Fetching {} (depth {})", entry.url, entry.depth);
        match self.fetcher.fetch(&entry.url).await {
            Ok(page) => {
                let fetched = self.tally(|report| {
                    report.fetched += 1;
                    report.fetched
                });
                if fetched % 10 == 0 {
                    tracing::info!(
                        "Progress: {} pages fetched, {} queued, {} in flight",
                        fetched,
                        self.frontier.len(),
                        self.frontier.in_flight()
                    );
                }
                self.handle_page(entry, &page).await;
            }
            Err(e) => {
                tracing::warn!("Fetch failed for {}: {}", entry.url, e);
                self.tally(|report| report.fetch_failed += 1);
            }
        }

        if let Err(e) = self.visited.mark_visited(entry.url.as_str()) {
            self.fail(format!("recording {} as visited failed: {}", entry.url, e));
        }
    }

    async fn handle_page(&self, entry: &FrontierEntry, page: &FetchedPage) {
        if !page.is_html() {
            tracing::debug!(
                "Skipping non-HTML page {} ({})",
                entry.url,
                page.content_type
            );
            return;
        }

        let discovered = self.links.extract(&page.final_url, &page.body, entry.depth);
        let found = discovered.len();
        let admitted = discovered
            .into_iter()
            .filter(|next| self.frontier.enqueue(next.clone()))
            .count();
        self.tally(|report| report.enqueued += admitted as u64);
        tracing::debug!("{} links on {}, {} new", found, entry.url, admitted);

        if self.rules.handler_for(entry.origin_rule) != Handler::ParseItem {
            return;
        }

        let record = self.items.extract(&entry.url, &page.body);
        self.tally(|report| report.extracted += 1);

        match self.pipeline.run(record).await {
            Outcome::Continue(_) => self.tally(|report| report.committed += 1),
            Outcome::Drop(reason) => self.tally(|report| report.record_drop(&reason)),
            Outcome::Fatal(message) => self.fail(message),
        }
    }
}

/// Drives one crawl run through `Idle → Running → Draining → Stopped`
pub struct Crawler {
    worker: Arc<Worker>,
    sink: Arc<dyn DocumentSink>,
    context: RunContext,
    state: RunState,
    stop: StopHandle,
    started: Option<Instant>,
}

/// Frontier, extractors and pipeline a [`Crawler`] drives
pub struct CrawlerParts {
    pub frontier: Arc<Frontier>,
    pub links: LinkExtractor,
    pub items: ItemExtractor,
    pub pipeline: PipelineExecutor,
}

impl CrawlerParts {
    /// Builds the parts a normal run uses, with the six standard stages
    pub fn standard(
        config: &Config,
        rules: &Arc<CompiledRules>,
        collaborators: &Collaborators,
        context: &RunContext,
    ) -> Self {
        Self {
            frontier: Arc::new(Frontier::new(
                config.crawler.concurrency as usize,
                config.crawler.max_depth,
                Arc::clone(&context.visited),
            )),
            links: LinkExtractor::new(Arc::clone(rules)),
            items: ItemExtractor::new(Arc::clone(rules)),
            pipeline: PipelineExecutor::standard(
                &config.pipeline,
                collaborators,
                Arc::clone(&context.export),
                Arc::clone(&context.seen),
            ),
        }
    }
}

impl Crawler {
    /// Wires a crawler for one run with the standard parts
    ///
    /// # Arguments
    ///
    /// * `config` - The loaded rule file
    /// * `rules` - Rules compiled from `config`
    /// * `fetcher` - Page fetcher (also used for robots.txt)
    /// * `collaborators` - Summarizer, place extractor and document sink
    /// * `context` - Visited store, export log and config hash of this run
    pub fn new(
        config: &Config,
        rules: Arc<CompiledRules>,
        fetcher: Arc<dyn Fetcher>,
        collaborators: Collaborators,
        context: RunContext,
    ) -> Self {
        let parts = CrawlerParts::standard(config, &rules, &collaborators, &context);
        Self::with_parts(config, rules, fetcher, collaborators.sink, parts, context)
    }

    /// Wires a crawler around caller-supplied parts
    ///
    /// `sink` records the run ledger; records reach storage only through
    /// the stages of `parts.pipeline`.
    pub fn with_parts(
        config: &Config,
        rules: Arc<CompiledRules>,
        fetcher: Arc<dyn Fetcher>,
        sink: Arc<dyn DocumentSink>,
        parts: CrawlerParts,
        context: RunContext,
    ) -> Self {
        let robots = if config.crawler.obey_robots {
            Some(RobotsCache::new(
                Arc::clone(&fetcher),
                config.crawler.user_agent.clone(),
            ))
        } else {
            None
        };

        let frontier = parts.frontier;
        let worker = Worker {
            rules,
            links: parts.links,
            items: parts.items,
            pipeline: parts.pipeline,
            fetcher,
            robots,
            frontier: Arc::clone(&frontier),
            visited: Arc::clone(&context.visited),
            report: Mutex::new(CrawlReport::default()),
        };

        Self {
            worker: Arc::new(worker),
            sink,
            context,
            state: RunState::Idle,
            stop: StopHandle {
                requested: Arc::new(AtomicBool::new(false)),
                frontier,
            },
            started: None,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn context(&self) -> &RunContext {
        &self.context
    }

    /// Handle that requests a graceful stop
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Counters gathered so far
    pub fn report(&self) -> CrawlReport {
        self.worker.snapshot()
    }

    /// Records the run, opens the export log and seeds the start URLs
    ///
    /// The export log is only created once the run is in the ledger, so a
    /// failed start leaves no unfinished export behind.
    pub async fn start(&mut self) -> Result<(), HarvestError> {
        self.check(RunState::Running)?;

        let run_id = self.sink.begin_run(&self.context.config_hash).await?;
        if let Err(e) = self.context.export.open() {
            let message = format!("opening export log failed: {}", e);
            tracing::error!("{}", message);
            self.sink
                .finish_run(run_id, RunStatus::Failed, 0, Some(&message))
                .await?;
            return Err(e.into());
        }
        self.context.run_id = Some(run_id);

        let mut seeded = 0u64;
        for url in &self.worker.rules.start_urls {
            if self.worker.frontier.enqueue(FrontierEntry::seed(url.clone())) {
                seeded += 1;
            } else {
                tracing::debug!("Start URL already visited: {}", url);
            }
        }
        self.worker.tally(|report| {
            report.run_id = Some(run_id);
            report.enqueued += seeded;
        });

        tracing::info!(
            "Started run {}: {} of {} start URLs queued, export to {}",
            run_id,
            seeded,
            self.worker.rules.start_urls.len(),
            self.context.export.path().display()
        );

        self.started = Some(Instant::now());
        self.transition(RunState::Running)
    }

    /// Dispatches work until quiescence, a stop request or a fatal error,
    /// then drains in-flight tasks
    pub async fn run(&mut self) -> Result<(), HarvestError> {
        self.check(RunState::Draining)?;

        let mut tasks = JoinSet::new();
        loop {
            tokio::select! {
                next = self.worker.frontier.dequeue() => match next {
                    Some(scheduled) => {
                        let worker = Arc::clone(&self.worker);
                        tasks.spawn(async move { worker.process(scheduled).await });
                    }
                    None => break,
                },
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        self.worker.fail(format!("crawl task failed: {}", e));
                    }
                }
            }
        }

        self.transition(RunState::Draining)?;
        self.worker.frontier.close();

        if !tasks.is_empty() {
            tracing::info!("Draining {} in-flight tasks", tasks.len());
        }
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                self.worker.fail(format!("crawl task failed: {}", e));
            }
        }

        Ok(())
    }

    /// Flushes the visited store, finalizes the export log and records the
    /// run outcome
    ///
    /// # Returns
    ///
    /// The final report; its status is `Failed` after a fatal error,
    /// `Interrupted` after a stop request, `Completed` otherwise
    pub async fn stop(&mut self) -> Result<CrawlReport, HarvestError> {
        self.check(RunState::Stopped)?;
        self.worker.frontier.close();

        let mut report = self.worker.snapshot();
        if let Err(e) = self.context.visited.flush() {
            report.record_fatal(format!("flushing visited store failed: {}", e));
        }
        match self.context.export.finish() {
            Ok(exported) => report.exported = exported,
            Err(e) => report.record_fatal(format!("finalizing export log failed: {}", e)),
        }

        let status = if report.is_fatal() {
            RunStatus::Failed
        } else if self.stop.is_requested() {
            RunStatus::Interrupted
        } else {
            RunStatus::Completed
        };
        report.status = Some(status);
        report.elapsed = self.started.map(|at| at.elapsed()).unwrap_or_default();

        self.transition(RunState::Stopped)?;

        if let Some(run_id) = self.context.run_id {
            self.sink
                .finish_run(run_id, status, report.committed, report.fatal.as_deref())
                .await?;
        }

        tracing::info!(
            "Run finished ({}): {} fetched, {} committed, {} dropped, {} duplicates in {:?}",
            status.to_db_string(),
            report.fetched,
            report.committed,
            report.total_dropped(),
            report.duplicates,
            report.elapsed
        );

        Ok(report)
    }

    /// Runs `start`, `run` and `stop` in sequence
    pub async fn crawl(&mut self) -> Result<CrawlReport, HarvestError> {
        self.start().await?;
        self.run().await?;
        self.stop().await
    }

    fn check(&self, next: RunState) -> Result<(), HarvestError> {
        if self.state.can_transition_to(next) {
            Ok(())
        } else {
            Err(HarvestError::InvalidTransition {
                from: self.state,
                to: next,
            })
        }
    }

    fn transition(&mut self, next: RunState) -> Result<(), HarvestError> {
        self.check(next)?;
        tracing::debug!("Run state {} -> {}", self.state, next);
        self.state = next;
        Ok(())
    }
}
