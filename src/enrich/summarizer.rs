//! Article body extraction

use crate::crawler::Fetcher;
use crate::enrich::{ExtractionError, Summarizer};
use crate::rules::collapse_whitespace;
use async_trait::async_trait;
use scraper::{Html, Selector};
use std::sync::Arc;
use url::Url;

/// Paragraph containers tried first, in order
const ARTICLE_SCOPES: &str = "article p, main p, [role=main] p";

/// Summarizer that fetches the page and keeps its article paragraphs
pub struct HtmlSummarizer {
    fetcher: Arc<dyn Fetcher>,
}

impl HtmlSummarizer {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl Summarizer for HtmlSummarizer {
    async fn summarize(&self, url: &Url) -> Result<String, ExtractionError> {
        let page = self.fetcher.fetch(url).await?;
        summarize_html(&page.body).ok_or_else(|| ExtractionError::EmptyText(url.to_string()))
    }
}

/// Extracts article body text from HTML
///
/// Paragraphs inside `article`, `main` or `[role=main]` are preferred; when
/// none carry text, every body paragraph is used. Each paragraph is
/// whitespace-collapsed and paragraphs are separated by a blank line.
///
/// # Returns
///
/// `None` if the page has no paragraph text at all
pub fn summarize_html(html: &str) -> Option<String> {
    let document = Html::parse_document(html);

    let text = paragraphs(&document, ARTICLE_SCOPES);
    if !text.is_empty() {
        return Some(text);
    }

    let text = paragraphs(&document, "body p");
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn paragraphs(document: &Html, css: &str) -> String {
    let Ok(selector) = Selector::parse(css) else {
        return String::new();
    };

    document
        .select(&selector)
        .map(|p| collapse_whitespace(p.text()))
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}
