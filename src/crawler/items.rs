//! Item extraction
//!
//! Evaluates the compiled selector chains against a fetched page to build a
//! [`CandidateRecord`].

use crate::pipeline::CandidateRecord;
use crate::rules::{CompiledRules, RecordField};
use scraper::Html;
use std::sync::Arc;
use url::Url;

/// Builds candidate records from fetched pages using the selector chains
#[derive(Debug, Clone)]
pub struct ItemExtractor {
    rules: Arc<CompiledRules>,
}

impl ItemExtractor {
    pub fn new(rules: Arc<CompiledRules>) -> Self {
        Self { rules }
    }

    /// Evaluates every field chain against the page
    ///
    /// Empty fields are not an error here; validation happens in the pipeline.
    /// `url` is always the URL the page was fetched from.
    pub fn extract(&self, page_url: &Url, html: &str) -> CandidateRecord {
        let document = Html::parse_document(html);
        let field = |field: RecordField| {
            self.rules
                .chain(field)
                .map(|chain| chain.evaluate(&document))
                .unwrap_or_default()
        };

        CandidateRecord {
            url: page_url.to_string(),
            headline: field(RecordField::Headline),
            author: field(RecordField::Author),
            text: field(RecordField::Text),
            countries_mentioned: Vec::new(),
        }
    }
}
