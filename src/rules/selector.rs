//! Field selectors and their fallback chains
//!
//! A field selector is a CSS selector with an optional extraction suffix:
//!
//! | Spec | Yields |
//! |------|--------|
//! | `h1.headline` | whitespace-collapsed text of the element |
//! | `h1.headline::text` | same as above |
//! | `meta[name=author]::attr(content)` | the trimmed attribute value |
//!
//! Within one selector the first matching element with a non-empty value
//! wins; within a chain the first selector with a non-empty value wins.

use crate::ConfigError;
use scraper::{ElementRef, Html, Selector};
use std::fmt;

/// Logical record fields that selector chains can fill
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RecordField {
    Headline,
    Author,
    Text,
}

impl RecordField {
    /// Resolves a `fieldSelectors` key, accepting the common aliases
    pub fn from_config_name(name: &str) -> Option<Self> {
        match name {
            "headline" | "title" => Some(Self::Headline),
            "author" | "byline" => Some(Self::Author),
            "text" | "body" => Some(Self::Text),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Headline => "headline",
            Self::Author => "author",
            Self::Text => "text",
        }
    }
}

impl fmt::Display for RecordField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Extraction {
    Text,
    Attr(String),
}

/// One compiled field selector
#[derive(Debug, Clone)]
pub struct FieldSelector {
    source: String,
    selector: Selector,
    extraction: Extraction,
}

impl FieldSelector {
    /// Compiles a selector spec, failing on invalid CSS or an unknown suffix
    pub fn parse(spec: &str) -> Result<Self, ConfigError> {
        let spec = spec.trim();
        let (css, extraction) = match spec.rsplit_once("::") {
            Some((css, "text")) => (css, Extraction::Text),
            Some((css, suffix)) if suffix.starts_with("attr(") && suffix.ends_with(')') => {
                let name = suffix["attr(".len()..suffix.len() - 1].trim();
                if name.is_empty() {
                    return Err(ConfigError::InvalidSelector(format!(
                        "'{}': empty attribute name",
                        spec
                    )));
                }
                (css, Extraction::Attr(name.to_string()))
            }
            _ => (spec, Extraction::Text),
        };

        let selector = parse_css(css)?;

        Ok(Self {
            source: spec.to_string(),
            selector,
            extraction,
        })
    }

    /// The selector as written in the rule file
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Returns the first non-empty value among matching elements
    pub fn extract(&self, document: &Html) -> Option<String> {
        document
            .select(&self.selector)
            .map(|element| self.value_of(element))
            .find(|value| !value.is_empty())
    }

    fn value_of(&self, element: ElementRef<'_>) -> String {
        match &self.extraction {
            Extraction::Text => collapse_whitespace(element.text()),
            Extraction::Attr(name) => element
                .value()
                .attr(name)
                .map(|value| value.trim().to_string())
                .unwrap_or_default(),
        }
    }
}

/// Ordered fallback list of selectors for one field
#[derive(Debug, Clone, Default)]
pub struct SelectorChain {
    selectors: Vec<FieldSelector>,
}

impl SelectorChain {
    pub fn new(selectors: Vec<FieldSelector>) -> Self {
        Self { selectors }
    }

    /// Compiles every spec in order
    pub fn parse<S: AsRef<str>>(specs: &[S]) -> Result<Self, ConfigError> {
        let selectors = specs
            .iter()
            .map(|spec| FieldSelector::parse(spec.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(selectors))
    }

    /// First non-empty selector result, or an empty string when all fail
    pub fn evaluate(&self, document: &Html) -> String {
        self.selectors
            .iter()
            .find_map(|selector| selector.extract(document))
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.selectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selectors.is_empty()
    }

    pub fn selectors(&self) -> &[FieldSelector] {
        &self.selectors
    }
}

/// Compiles a bare CSS selector into a `scraper` selector
pub fn parse_css(css: &str) -> Result<Selector, ConfigError> {
    let css = css.trim();
    if css.is_empty() {
        return Err(ConfigError::InvalidSelector("empty selector".to_string()));
    }
    Selector::parse(css).map_err(|e| ConfigError::InvalidSelector(format!("'{}': {:?}", css, e)))
}

/// Joins text nodes and collapses all runs of whitespace to single spaces
pub fn collapse_whitespace<'a, I>(parts: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut out = String::new();
    for part in parts {
        for word in part.split_whitespace() {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(word);
        }
    }
    out
}
