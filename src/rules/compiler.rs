//! Rule compilation
//!
//! Turns the declarative rule file into [`CompiledRules`]: regex-backed crawl
//! rules, normalized start URLs and per-field selector chains.

use crate::config::Config;
use crate::rules::rule::{CrawlRule, Handler};
use crate::rules::selector::{parse_css, RecordField, SelectorChain};
use crate::url::normalize_url;
use crate::ConfigError;
use std::collections::BTreeMap;
use url::Url;

/// The immutable product of compiling a rule file
#[derive(Debug, Clone)]
pub struct CompiledRules {
    /// Allowed-domain entries, kept verbatim for host matching
    pub allowed_domains: Vec<String>,

    /// Normalized start URLs in declaration order
    pub start_urls: Vec<Url>,

    /// Rules in declaration order; a frontier entry refers to them by index
    pub rules: Vec<CrawlRule>,

    /// One selector chain per logical record field
    pub selectors: BTreeMap<RecordField, SelectorChain>,
}

impl CompiledRules {
    /// Looks up a rule by its declaration index
    pub fn rule(&self, index: usize) -> Option<&CrawlRule> {
        self.rules.get(index)
    }

    /// Handler for a page reached through `originating_rule`
    ///
    /// Start URLs have no originating rule and are only link-discovered.
    pub fn handler_for(&self, originating_rule: Option<usize>) -> Handler {
        originating_rule
            .and_then(|index| self.rule(index))
            .map(|rule| rule.handler)
            .unwrap_or(Handler::LinksOnly)
    }

    /// Selector chain for a field (empty chain when none was configured)
    pub fn chain(&self, field: RecordField) -> Option<&SelectorChain> {
        self.selectors.get(&field)
    }
}

/// Compiles a validated configuration into matchable rules and selector chains
///
/// Declaration order of rules and of selectors within each chain is preserved.
/// The transform is pure: the same config always yields the same rules.
pub fn compile(config: &Config) -> Result<CompiledRules, ConfigError> {
    let start_urls = config
        .start_urls
        .iter()
        .map(|raw| {
            normalize_url(raw)
                .map_err(|e| ConfigError::InvalidUrl(format!("Invalid start URL '{}': {}", raw, e)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut rules = Vec::with_capacity(config.rules.len());
    for (index, descriptor) in config.rules.iter().enumerate() {
        let handler: Handler = descriptor.handler.parse()?;
        let scopes = descriptor
            .restrict_scopes
            .iter()
            .map(|scope| parse_css(scope))
            .collect::<Result<Vec<_>, _>>()?;

        let rule = CrawlRule::new(
            &descriptor.allow,
            &descriptor.deny,
            scopes,
            descriptor.follow,
            handler,
        )?;

        tracing::debug!(
            "Compiled rule {}: {} allow, {} deny, {} scopes, follow={}, handler={:?}",
            index,
            descriptor.allow.len(),
            descriptor.deny.len(),
            descriptor.restrict_scopes.len(),
            descriptor.follow,
            handler
        );
        if rule.is_inert() && handler == Handler::ParseItem {
            tracing::warn!(
                "Rule {} has handler parse_item but follow=false; it emits no links, so no page is ever parsed through it",
                index
            );
        }
        rules.push(rule);
    }

    let mut selectors = BTreeMap::new();
    for (name, specs) in &config.field_selectors {
        let field = RecordField::from_config_name(name)
            .ok_or_else(|| ConfigError::UnknownField(name.clone()))?;

        if selectors.contains_key(&field) {
            return Err(ConfigError::Validation(format!(
                "fieldSelectors defines '{}' more than once (check aliases)",
                field
            )));
        }

        selectors.insert(field, SelectorChain::parse(specs)?);
    }

    Ok(CompiledRules {
        allowed_domains: config.allowed_domains.clone(),
        start_urls,
        rules,
        selectors,
    })
}
