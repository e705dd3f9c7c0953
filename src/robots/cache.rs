//! Robots.txt caching implementation
//!
//! robots.txt is fetched once per origin through the crawler's [`Fetcher`]
//! and kept for 24 hours.

use crate::crawler::{is_not_found, Fetcher};
use crate::robots::RobotsRules;
use crate::url::origin_key;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use url::Url;

/// Cached robots.txt data for an origin
#[derive(Debug, Clone)]
pub struct CachedRobots {
    /// The robots.txt rules
    pub rules: RobotsRules,

    /// When the robots.txt was fetched
    pub fetched_at: DateTime<Utc>,
}

impl CachedRobots {
    /// Creates a new CachedRobots stamped with the current time
    pub fn new(rules: RobotsRules) -> Self {
        Self {
            rules,
            fetched_at: Utc::now(),
        }
    }

    /// Checks if the cached robots.txt is older than 24 hours
    pub fn is_stale(&self) -> bool {
        self.age() > Duration::hours(24)
    }

    pub fn age(&self) -> Duration {
        Utc::now() - self.fetched_at
    }
}

/// Per-origin robots.txt cache
pub struct RobotsCache {
    fetcher: Arc<dyn Fetcher>,
    user_agent: String,
    entries: Mutex<HashMap<String, CachedRobots>>,
}

impl RobotsCache {
    pub fn new(fetcher: Arc<dyn Fetcher>, user_agent: impl Into<String>) -> Self {
        Self {
            fetcher,
            user_agent: user_agent.into(),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Checks a URL against its origin's robots.txt, fetching it if needed
    ///
    /// The cache lock is held while fetching so an origin is fetched once even
    /// when many tasks ask at the same time.
    pub async fn is_allowed(&self, url: &Url) -> bool {
        let origin = origin_key(url);
        let mut entries = self.entries.lock().await;

        let needs_fetch = entries.get(&origin).map_or(true, CachedRobots::is_stale);
        if needs_fetch {
            tracing::debug!("Fetching robots.txt for {}", origin);
            let rules = self.fetch_rules(url).await;
            entries.insert(origin.clone(), CachedRobots::new(rules));
        }

        entries
            .get(&origin)
            .map_or(true, |cached| cached.rules.is_allowed(url.as_str(), &self.user_agent))
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    async fn fetch_rules(&self, url: &Url) -> RobotsRules {
        let robots_url = match url.join("/robots.txt") {
            Ok(robots_url) => robots_url,
            Err(_) => return RobotsRules::allow_all(),
        };

        match self.fetcher.fetch(&robots_url).await {
            Ok(page) => RobotsRules::from_content(&page.body),
            Err(e) if is_not_found(&e) => {
                tracing::debug!("No robots.txt at {}", robots_url);
                RobotsRules::allow_all()
            }
            Err(e) => {
                tracing::warn!("robots.txt unreachable, allowing all: {}", e);
                RobotsRules::allow_all()
            }
        }
    }
}
