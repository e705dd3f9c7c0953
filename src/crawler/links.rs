//! Rule-driven link extraction
//!
//! For every compiled rule, in declaration order, the extractor collects the
//! `<a href>` links inside the rule's restrict scopes (or the whole page),
//! resolves and normalizes them, drops anything off-site, and emits a
//! [`FrontierEntry`] tagged with the rule index when the rule follows.

use crate::crawler::frontier::FrontierEntry;
use crate::rules::{CompiledRules, CrawlRule};
use crate::url::{extract_domain, is_allowed_host, resolve_link};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::sync::Arc;
use url::Url;

/// Applies compiled rules to fetched pages
#[derive(Debug, Clone)]
pub struct LinkExtractor {
    rules: Arc<CompiledRules>,
}

impl LinkExtractor {
    pub fn new(rules: Arc<CompiledRules>) -> Self {
        Self { rules }
    }

    /// Extracts next-hop frontier entries from a page
    ///
    /// A link matched by several following rules is emitted once per rule;
    /// the frontier deduplicates.
    ///
    /// # Arguments
    ///
    /// * `page_url` - Base URL for resolving relative links
    /// * `html` - The page body
    /// * `depth` - Depth of the page itself; entries are emitted at `depth + 1`
    pub fn extract(&self, page_url: &Url, html: &str, depth: u32) -> Vec<FrontierEntry> {
        let document = Html::parse_document(html);
        let mut entries = Vec::new();

        for (index, rule) in self.rules.rules.iter().enumerate() {
            if !rule.follow {
                continue;
            }

            for url in self.matching_links(&document, page_url, rule) {
                entries.push(FrontierEntry {
                    url,
                    depth: depth + 1,
                    origin_rule: Some(index),
                });
            }
        }

        entries
    }

    /// Links on the page accepted by one rule, in document order, without repeats
    fn matching_links(&self, document: &Html, page_url: &Url, rule: &CrawlRule) -> Vec<Url> {
        let mut seen = HashSet::new();
        let mut links = Vec::new();

        for href in candidate_hrefs(document, rule) {
            let Some(url) = resolve_link(page_url, href) else {
                continue;
            };

            let host = extract_domain(&url).unwrap_or_default();
            if !is_allowed_host(&self.rules.allowed_domains, &host) {
                tracing::trace!("Skipping off-site link {}", url);
                continue;
            }

            if !rule.matches_url(url.as_str()) {
                continue;
            }

            if seen.insert(url.as_str().to_string()) {
                links.push(url);
            }
        }

        links
    }
}

/// Collects raw `href` values inside the rule's scopes (whole page when unscoped)
fn candidate_hrefs<'a>(document: &'a Html, rule: &CrawlRule) -> Vec<&'a str> {
    let Ok(anchor) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    if !rule.is_scoped() {
        return document
            .select(&anchor)
            .filter_map(|a| a.value().attr("href"))
            .collect();
    }

    let mut hrefs = Vec::new();
    for scope in rule.restrict_scopes() {
        for region in document.select(scope) {
            hrefs.extend(hrefs_within(region, &anchor));
        }
    }
    hrefs
}

fn hrefs_within<'a>(region: ElementRef<'a>, anchor: &Selector) -> Vec<&'a str> {
    let mut hrefs: Vec<&'a str> = region
        .select(anchor)
        .filter_map(|a| a.value().attr("href"))
        .collect();

    // A scope selector may point straight at the anchors themselves
    if region.value().name() == "a" {
        if let Some(href) = region.value().attr("href") {
            hrefs.insert(0, href);
        }
    }
    hrefs
}
