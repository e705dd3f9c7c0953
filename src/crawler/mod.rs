//! Crawler module for page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with retry logic
//! - The frontier (work queue, dedup, concurrency cap)
//! - Rule-driven link discovery and selector-based item extraction
//! - Overall crawl coordination and the run lifecycle

mod coordinator;
mod fetcher;
mod frontier;
mod items;
mod links;
mod report;
mod retry;

pub use coordinator::{Crawler, CrawlerParts, RunContext, StopHandle};
pub use fetcher::{
    build_http_client, is_not_found, FetchError, FetchedPage, Fetcher, HttpFetcher,
};
pub use frontier::{Frontier, FrontierEntry, ScheduledFetch};
pub use items::ItemExtractor;
pub use links::LinkExtractor;
pub use report::CrawlReport;
pub use retry::{with_retry, RetryPolicy};
