//! News-Harvester main entry point
//!
//! This is the command-line interface for the News-Harvester article crawler.

use anyhow::{bail, Context};
use clap::Parser;
use news_harvester::config::{load_config_with_hash, validate, Config};
use news_harvester::crawler::{Crawler, HttpFetcher, RunContext};
use news_harvester::enrich::{GazetteerPlaceExtractor, HtmlSummarizer};
use news_harvester::output::{print_report, render_records, ExportLog};
use news_harvester::pipeline::Collaborators;
use news_harvester::rules::{compile, RecordField};
use news_harvester::state::VisitedStore;
use news_harvester::storage::{ArticleQuery, KeywordMatch, SqliteSink};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// News-Harvester: a rule-driven news article harvester
///
/// News-Harvester follows configured link rules across one news site,
/// extracts article fields, enriches them with body text and mentioned
/// countries, and stores each article once. URLs visited in earlier runs are
/// never fetched again.
#[derive(Parser, Debug)]
#[command(name = "news-harvester")]
#[command(version)]
#[command(about = "A rule-driven news article harvester", long_about = None)]
struct Cli {
    /// Path to the rule file (TOML, or JSON when it ends in .json)
    #[arg(
        value_name = "CONFIG",
        required_unless_present_any = ["list", "search_text", "search_headline"]
    )]
    config: Option<PathBuf>,

    /// Directory for the export log, visited list and database
    #[arg(short, long, default_value = "output")]
    output: PathBuf,

    /// Maximum number of pages in flight (overrides the rule file)
    #[arg(long)]
    concurrency: Option<u32>,

    /// Fetch timeout in seconds (overrides the rule file)
    #[arg(long)]
    timeout: Option<u64>,

    /// Fetch retries after the first attempt (overrides the rule file)
    #[arg(long)]
    retries: Option<u32>,

    /// Visited-URL file [default: <OUTPUT>/visited_urls.txt]
    #[arg(long)]
    visited: Option<PathBuf>,

    /// SQLite database [default: <OUTPUT>/news.db]
    #[arg(long)]
    database: Option<PathBuf>,

    /// List every stored article as JSON and exit
    #[arg(long, conflicts_with_all = ["search_text", "search_headline", "dry_run"])]
    list: bool,

    /// Print stored articles whose text contains KEYWORD and exit
    #[arg(long, value_name = "KEYWORD", conflicts_with_all = ["search_headline", "dry_run"])]
    search_text: Option<String>,

    /// Print stored articles whose headline contains KEYWORD and exit
    #[arg(long, value_name = "KEYWORD", conflicts_with = "dry_run")]
    search_headline: Option<String>,

    /// Match keywords case-insensitively
    #[arg(long)]
    ignore_case: bool,

    /// Validate and compile the rule file, show what would be crawled, and exit
    #[arg(long)]
    dry_run: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Cli {
    fn database_path(&self) -> PathBuf {
        self.database
            .clone()
            .unwrap_or_else(|| self.output.join("news.db"))
    }

    fn visited_path(&self) -> PathBuf {
        self.visited
            .clone()
            .unwrap_or_else(|| self.output.join("visited_urls.txt"))
    }

    fn is_query(&self) -> bool {
        self.list || self.search_text.is_some() || self.search_headline.is_some()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    if cli.is_query() {
        return handle_query(&cli);
    }

    let Some(config_path) = cli.config.as_deref() else {
        bail!("a rule file is required to crawl");
    };

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", config_path.display());
    let (mut config, config_hash) = match load_config_with_hash(config_path) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };
    apply_overrides(&cli, &mut config)?;

    tracing::info!(
        "Country extraction failures: {:?}",
        config.pipeline.on_country_extraction_failure
    );

    if cli.dry_run {
        handle_dry_run(&config)
    } else {
        handle_crawl(&cli, config, config_hash).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("news_harvester=info,warn"),
            1 => EnvFilter::new("news_harvester=debug,info"),
            2 => EnvFilter::new("news_harvester=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Applies command-line overrides and re-validates the result
fn apply_overrides(cli: &Cli, config: &mut Config) -> anyhow::Result<()> {
    if let Some(concurrency) = cli.concurrency {
        config.crawler.concurrency = concurrency;
    }
    if let Some(timeout) = cli.timeout {
        config.crawler.fetch_timeout_secs = timeout;
    }
    if let Some(retries) = cli.retries {
        config.crawler.retries = retries;
    }
    validate(config).context("invalid command-line override")?;
    Ok(())
}

/// Handles the --dry-run mode: compiles the rules and shows what would be crawled
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    let rules = compile(config)?;

    println!("=== News-Harvester Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Concurrency: {}", config.crawler.concurrency);
    println!("  Fetch timeout: {}s", config.crawler.fetch_timeout_secs);
    println!("  Retries: {}", config.crawler.retries);
    match config.crawler.max_depth {
        Some(depth) => println!("  Max depth: {}", depth),
        None => println!("  Max depth: unlimited"),
    }
    println!("  User agent: {}", config.crawler.user_agent);
    println!("  Obey robots.txt: {}", config.crawler.obey_robots);

    println!("\nAllowed Domains ({}):", rules.allowed_domains.len());
    for domain in &rules.allowed_domains {
        println!("  - {}", domain);
    }

    println!("\nStart URLs ({}):", rules.start_urls.len());
    for url in &rules.start_urls {
        println!("  - {}", url);
    }

    println!("\nRules ({}):", config.rules.len());
    for (index, rule) in config.rules.iter().enumerate() {
        println!(
            "  {}. handler={} follow={}",
            index, rule.handler, rule.follow
        );
        if !rule.allow.is_empty() {
            println!("     allow: {}", rule.allow.join(", "));
        }
        if !rule.deny.is_empty() {
            println!("     deny: {}", rule.deny.join(", "));
        }
        if !rule.restrict_scopes.is_empty() {
            println!("     scopes: {}", rule.restrict_scopes.join(", "));
        }
    }

    println!("\nField Selectors:");
    for field in [RecordField::Headline, RecordField::Author, RecordField::Text] {
        let sources: Vec<&str> = rules
            .chain(field)
            .map(|chain| chain.selectors().iter().map(|s| s.source()).collect())
            .unwrap_or_default();
        println!("  {}: {}", field.as_str(), sources.join(" | "));
    }

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would start crawling with {} start URLs",
        rules.start_urls.len()
    );

    Ok(())
}

/// Handles --list, --search-text and --search-headline
fn handle_query(cli: &Cli) -> anyhow::Result<()> {
    let database = cli.database_path();
    if !database.exists() {
        bail!("no database at {}", database.display());
    }
    let sink = SqliteSink::open(&database)?;

    let records = if let Some(keyword) = &cli.search_text {
        sink.find_by_text(&KeywordMatch::new(keyword.as_str(), !cli.ignore_case))?
    } else if let Some(keyword) = &cli.search_headline {
        sink.find_by_headline(&KeywordMatch::new(keyword.as_str(), !cli.ignore_case))?
    } else {
        sink.list_all()?
    };

    tracing::info!("{} matching articles", records.len());
    println!("{}", render_records(&records)?);
    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(cli: &Cli, config: Config, config_hash: String) -> anyhow::Result<()> {
    let rules = Arc::new(compile(&config)?);
    tracing::info!(
        "Allowed domains: {}, Rules: {}, Start URLs: {}",
        rules.allowed_domains.len(),
        rules.rules.len(),
        rules.start_urls.len()
    );

    let visited_path = cli.visited_path();
    let visited = Arc::new(
        VisitedStore::open(&visited_path)
            .with_context(|| format!("opening visited store {}", visited_path.display()))?,
    );
    let sink = Arc::new(open_database(&cli.database_path())?);
    let export = Arc::new(ExportLog::new(
        &cli.output,
        &config.pipeline.export_prefix,
        chrono::Local::now(),
    ));

    let fetcher = Arc::new(HttpFetcher::from_config(&config.crawler)?);
    let collaborators = Collaborators {
        summarizer: Arc::new(HtmlSummarizer::new(fetcher.clone())),
        places: Arc::new(GazetteerPlaceExtractor::new()?),
        sink,
    };

    let mut crawler = Crawler::new(
        &config,
        rules,
        fetcher,
        collaborators,
        RunContext::new(visited, export, config_hash),
    );

    let stop = crawler.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            stop.stop();
        }
    });

    let report = match crawler.crawl().await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            return Err(e.into());
        }
    };

    if !cli.quiet {
        print_report(&report);
    }

    if let Some(fatal) = report.fatal {
        bail!("run failed: {}", fatal);
    }
    Ok(())
}

fn open_database(path: &Path) -> anyhow::Result<SqliteSink> {
    tracing::info!("Database: {}", path.display());
    SqliteSink::open(path).with_context(|| format!("opening database {}", path.display()))
}
