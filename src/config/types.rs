use serde::Deserialize;
use std::collections::BTreeMap;

/// Main configuration structure: the rule set plus crawler and pipeline settings
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Hosts the crawl may stay on (a bare domain also admits its subdomains)
    pub allowed_domains: Vec<String>,

    /// URLs the crawl starts from; they are link-discovered but never item-extracted
    pub start_urls: Vec<String>,

    /// Link-traversal rules, evaluated in declaration order
    pub rules: Vec<RuleDescriptor>,

    /// Logical field name -> ordered selector fallback chain
    pub field_selectors: BTreeMap<String, Vec<String>>,

    #[serde(default)]
    pub crawler: CrawlerConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// One uncompiled link-traversal rule as written in the rule file
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleDescriptor {
    /// Regex patterns a link must match (empty means allow all)
    #[serde(default)]
    pub allow: Vec<String>,

    /// Regex patterns that exclude a link
    #[serde(default)]
    pub deny: Vec<String>,

    /// CSS selectors limiting where on the page links are searched
    #[serde(default)]
    pub restrict_scopes: Vec<String>,

    /// Whether matching links are submitted to the frontier
    pub follow: bool,

    /// What to do with pages reached through this rule
    pub handler: String,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlerConfig {
    /// Maximum number of fetch-and-process tasks in flight
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,

    /// Per-request timeout (seconds)
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// Retries after the first failed fetch attempt
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Base delay for exponential retry backoff (milliseconds)
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Maximum link depth from the start URLs (unbounded when absent)
    #[serde(default)]
    pub max_depth: Option<u32>,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Whether robots.txt directives are honored
    #[serde(default = "default_true")]
    pub obey_robots: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            retries: default_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            max_depth: None,
            user_agent: default_user_agent(),
            obey_robots: true,
        }
    }
}

/// Item pipeline configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineConfig {
    /// What CountryExtraction does when the place extractor fails
    #[serde(default)]
    pub on_country_extraction_failure: CountryFailurePolicy,

    /// Retries for a failed sink upsert before the run turns fatal
    #[serde(default = "default_persistence_retries")]
    pub persistence_retries: u32,

    /// Timeout for one summarizer or place extractor call (seconds)
    #[serde(default = "default_collaborator_timeout_secs")]
    pub collaborator_timeout_secs: u64,

    /// File name prefix of the per-run export artifact
    #[serde(default = "default_export_prefix")]
    pub export_prefix: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            on_country_extraction_failure: CountryFailurePolicy::default(),
            persistence_retries: default_persistence_retries(),
            collaborator_timeout_secs: default_collaborator_timeout_secs(),
            export_prefix: default_export_prefix(),
        }
    }
}

/// Policy for records whose country extraction failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CountryFailurePolicy {
    /// Discard the record
    Drop,
    /// Keep the record with an empty country list
    #[default]
    Continue,
}

fn default_concurrency() -> u32 {
    8
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

fn default_retries() -> u32 {
    2
}

fn default_retry_backoff_ms() -> u64 {
    500
}

fn default_user_agent() -> String {
    format!("news-harvester/{}", env!("CARGO_PKG_VERSION"))
}

fn default_true() -> bool {
    true
}

fn default_persistence_retries() -> u32 {
    3
}

fn default_collaborator_timeout_secs() -> u64 {
    30
}

fn default_export_prefix() -> String {
    "news".to_string()
}
