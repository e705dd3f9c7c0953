/// Checks if a host falls under an allowed-domain entry
///
/// Both `example.com` and `*.example.com` match:
///    - "example.com" (the bare domain)
///    - "news.example.com" (single subdomain)
///    - "feeds.v2.example.com" (nested subdomains)
///
/// The host is expected to be lowercase already; the entry is compared
/// case-insensitively.
///
/// # Examples
///
/// ```
/// use news_harvester::url::matches_domain;
///
/// assert!(matches_domain("bbc.co.uk", "bbc.co.uk"));
/// assert!(matches_domain("bbc.co.uk", "www.bbc.co.uk"));
/// assert!(matches_domain("*.bbc.co.uk", "news.bbc.co.uk"));
/// assert!(!matches_domain("bbc.co.uk", "notbbc.co.uk"));
/// ```
pub fn matches_domain(entry: &str, host: &str) -> bool {
    let base = entry.strip_prefix("*.").unwrap_or(entry);
    if base.is_empty() {
        return false;
    }

    let base = base.to_ascii_lowercase();
    host == base || host.ends_with(&format!(".{}", base))
}

/// Checks a host against the whole allowed-domain list (empty list allows any host)
pub fn is_allowed_host(allowed_domains: &[String], host: &str) -> bool {
    allowed_domains.is_empty() || allowed_domains.iter().any(|entry| matches_domain(entry, host))
}
