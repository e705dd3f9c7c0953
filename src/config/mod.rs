//! Configuration module for News-Harvester
//!
//! This module handles loading, parsing, and validating the rule file. The rule
//! file is TOML, or JSON when its name ends in `.json`.
//!
//! # Example
//!
//! ```no_run
//! use news_harvester::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("rules.toml")).unwrap();
//! println!("Crawl will start from {} URLs", config.start_urls.len());
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, CountryFailurePolicy, CrawlerConfig, PipelineConfig, RuleDescriptor};

pub use validation::validate;

// Re-export parser functions
pub use parser::{
    compute_config_hash, load_config, load_config_with_hash, parse_config, ConfigFormat,
};
