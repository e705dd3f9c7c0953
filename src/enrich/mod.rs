//! Enrichment collaborators used by the item pipeline
//!
//! - [`Summarizer`]: produces the article body text for a URL
//! - [`PlaceExtractor`]: lists the countries a piece of text mentions
//!
//! Each ships with one concrete implementation: [`HtmlSummarizer`] and
//! [`GazetteerPlaceExtractor`].

mod gazetteer;
mod summarizer;

pub use gazetteer::GazetteerPlaceExtractor;
pub use summarizer::{summarize_html, HtmlSummarizer};

use crate::crawler::FetchError;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Errors raised by enrichment collaborators
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("failed to fetch page: {0}")]
    Fetch(#[from] FetchError),

    #[error("no article text found at {0}")]
    EmptyText(String),

    #[error("place extraction failed: {0}")]
    Places(String),

    #[error("collaborator timed out after {0:?}")]
    Timeout(Duration),
}

/// Produces readable article text for a page
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, url: &Url) -> Result<String, ExtractionError>;
}

/// Finds the countries a text mentions
#[async_trait]
pub trait PlaceExtractor: Send + Sync {
    /// Country names, most mentioned first
    async fn countries(&self, text: &str) -> Result<Vec<String>, ExtractionError>;
}
