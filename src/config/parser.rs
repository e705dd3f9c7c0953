use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Serialization format of a rule file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    /// Picks the format from the file extension (`.json` is JSON, anything else TOML)
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Toml,
        }
    }
}

/// Loads and parses a rule file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML or JSON rule file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use news_harvester::config::load_config;
///
/// let config = load_config(Path::new("rules.toml")).unwrap();
/// println!("Rules: {}", config.rules.len());
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content, ConfigFormat::from_path(path))
}

/// Parses and validates rule file content that is already in memory
pub fn parse_config(content: &str, format: ConfigFormat) -> Result<Config, ConfigError> {
    let config: Config = match format {
        ConfigFormat::Toml => toml::from_str(content)?,
        ConfigFormat::Json => serde_json::from_str(content)?,
    };

    validate(&config)?;

    Ok(config)
}

/// Computes a SHA-256 hash of the rule file content
///
/// The hash is recorded with each run so that runs made under different rule
/// sets can be told apart.
///
/// # Returns
///
/// * `Ok(String)` - Hex-encoded SHA-256 hash of the file content
/// * `Err(ConfigError)` - Failed to read the file
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&content);
    Ok(hex::encode(hasher.finalize()))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CountryFailurePolicy;
    use std::io::Write;
    use tempfile::{Builder, NamedTempFile};

    fn create_temp_config(content: &str, suffix: &str) -> NamedTempFile {
        let mut file = Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    const VALID_TOML: &str = r#"
allowedDomains = ["news.example.com"]
startUrls = ["https://news.example.com/"]

[[rules]]
allow = ["/news/"]
deny = ["/news/video"]
follow = true
handler = "parse_item"

[fieldSelectors]
headline = ["h1.story-headline", "h1"]
author = ["span.byline__name", "meta[name=author]::attr(content)"]

[crawler]
concurrency = 4
maxDepth = 3

[pipeline]
onCountryExtractionFailure = "drop"
"#;

    #[test]
    fn test_load_valid_toml_config() {
        let file = create_temp_config(VALID_TOML, ".toml");
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.allowed_domains, vec!["news.example.com"]);
        assert_eq!(config.rules.len(), 1);
        assert!(config.rules[0].follow);
        assert_eq!(config.rules[0].deny, vec!["/news/video"]);
        assert_eq!(config.crawler.concurrency, 4);
        assert_eq!(config.crawler.max_depth, Some(3));
        assert_eq!(config.crawler.retries, 2);
        assert_eq!(
            config.pipeline.on_country_extraction_failure,
            CountryFailurePolicy::Drop
        );
        assert_eq!(config.field_selectors["author"].len(), 2);
    }

    #[test]
    fn test_load_valid_json_config() {
        let json = r#"{
            "allowedDomains": ["news.example.com"],
            "startUrls": ["https://news.example.com/"],
            "rules": [
                {"allow": ["/article/"], "follow": true, "handler": "parseItems"}
            ],
            "fieldSelectors": {"headline": ["h1"]}
        }"#;
        let file = create_temp_config(json, ".json");
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.rules[0].handler, "parseItems");
        assert!(config.rules[0].restrict_scopes.is_empty());
        assert_eq!(
            config.pipeline.on_country_extraction_failure,
            CountryFailurePolicy::Continue
        );
        assert!(config.crawler.obey_robots);
    }

    #[test]
    fn test_rule_without_follow_is_rejected() {
        let content = r#"
allowedDomains = []
startUrls = ["https://news.example.com/"]
fieldSelectors = {}

[[rules]]
allow = ["/news/"]
handler = "parse_item"
"#;
        let result = parse_config(content, ConfigFormat::Toml);
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_rule_without_handler_is_rejected() {
        let json = r#"{
            "allowedDomains": [],
            "startUrls": ["https://news.example.com/"],
            "rules": [{"allow": ["/news/"], "follow": true}],
            "fieldSelectors": {}
        }"#;
        let result = parse_config(json, ConfigFormat::Json);
        assert!(matches!(result, Err(ConfigError::Json(_))));
    }

    #[test]
    fn test_missing_start_urls_is_rejected() {
        let content = r#"
allowedDomains = []
rules = []
fieldSelectors = {}
"#;
        assert!(parse_config(content, ConfigFormat::Toml).is_err());
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/rules.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let file = create_temp_config("this is not valid TOML {{{", ".toml");
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(
            ConfigFormat::from_path(Path::new("bbcRules.json")),
            ConfigFormat::Json
        );
        assert_eq!(
            ConfigFormat::from_path(Path::new("rules.toml")),
            ConfigFormat::Toml
        );
        assert_eq!(ConfigFormat::from_path(Path::new("rules")), ConfigFormat::Toml);
    }

    #[test]
    fn test_compute_config_hash() {
        let file = create_temp_config("test content", ".toml");

        let hash1 = compute_config_hash(file.path()).unwrap();
        let hash2 = compute_config_hash(file.path()).unwrap();

        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_different_content_different_hash() {
        let file1 = create_temp_config("content 1", ".toml");
        let file2 = create_temp_config("content 2", ".toml");

        let hash1 = compute_config_hash(file1.path()).unwrap();
        let hash2 = compute_config_hash(file2.path()).unwrap();

        assert_ne!(hash1, hash2);
    }
}
