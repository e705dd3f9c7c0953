//! Compiled crawl rules
//!
//! A [`CrawlRule`] decides which discovered links are admitted and what
//! [`Handler`] applies to the pages they lead to.

use crate::ConfigError;
use regex::RegexSet;
use scraper::Selector;
use std::str::FromStr;

/// What the crawler does with a page reached through a rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handler {
    /// Run item extraction and the pipeline on the page
    ParseItem,
    /// Only discover links on the page
    LinksOnly,
}

impl FromStr for Handler {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "parse_item" | "parseItems" | "parse_items" => Ok(Self::ParseItem),
            "none" | "links" => Ok(Self::LinksOnly),
            other => Err(ConfigError::UnknownHandler(other.to_string())),
        }
    }
}

/// A compiled link-traversal rule
///
/// Evaluation is a pure function of the compiled patterns; nothing is
/// re-parsed per page.
#[derive(Debug, Clone)]
pub struct CrawlRule {
    allow: RegexSet,
    deny: RegexSet,
    restrict_scopes: Vec<Selector>,
    pub follow: bool,
    pub handler: Handler,
}

impl CrawlRule {
    /// Compiles the allow and deny patterns and scope selectors of one rule
    pub fn new<S: AsRef<str>>(
        allow: &[S],
        deny: &[S],
        restrict_scopes: Vec<Selector>,
        follow: bool,
        handler: Handler,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            allow: compile_patterns(allow)?,
            deny: compile_patterns(deny)?,
            restrict_scopes,
            follow,
            handler,
        })
    }

    /// True when the URL passes allow (empty allows all) and matches no deny pattern
    pub fn matches_url(&self, url: &str) -> bool {
        let allowed = self.allow.is_empty() || self.allow.is_match(url);
        allowed && !self.deny.is_match(url)
    }

    /// Page regions links are searched in; empty means the whole page
    pub fn restrict_scopes(&self) -> &[Selector] {
        &self.restrict_scopes
    }

    pub fn is_scoped(&self) -> bool {
        !self.restrict_scopes.is_empty()
    }

    /// True when the rule can never admit a page to the frontier
    ///
    /// Links are only emitted by following rules, so the handler of a
    /// non-following rule is never applied to any page.
    pub fn is_inert(&self) -> bool {
        !self.follow
    }
}

fn compile_patterns<S: AsRef<str>>(patterns: &[S]) -> Result<RegexSet, ConfigError> {
    // Compile one by one so the error names the offending pattern
    for pattern in patterns {
        regex::Regex::new(pattern.as_ref()).map_err(|e| {
            ConfigError::InvalidPattern(format!("'{}': {}", pattern.as_ref(), e))
        })?;
    }
    RegexSet::new(patterns.iter().map(|p| p.as_ref()))
        .map_err(|e| ConfigError::InvalidPattern(e.to_string()))
}
