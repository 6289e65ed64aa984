//! Worker and supervisor configuration.
//!
//! Struct-of-options with `impl Default`, following the same `CrawlConfig`
//! idiom throughout: plain fields for anything that round-trips through
//! JSON or CLI flags, `#[serde(skip)]` for anything constructed at runtime
//! (compiled patterns, channels).

use regex::Regex;
use std::time::Duration;

/// Worker-side configuration: one per job, assembled from CLI flags and the
/// job-fetch response.
#[derive(Clone)]
pub struct WorkerConfig {
    pub job_id: String,
    pub api_url: String,
    pub api_key: Option<String>,
    pub project_id: String,

    pub max_concurrent_fetches: usize,
    pub max_concurrent_per_domain: usize,
    pub crawl_rate_rps: f64,

    pub page_timeout: Duration,
    pub navigation_timeout: Duration,
    pub sitemap_timeout: Duration,

    pub max_page_retries: u8,
    pub batch_size: usize,

    /// When set, page results are written to this directory instead of
    /// POSTed to the ingestion API (file-output mode).
    pub output_dir: Option<std::path::PathBuf>,

    /// Patterns excluding a fetched extension/path from traversal, compiled
    /// once and shared by the frontier's link filter.
    pub excluded_patterns: Vec<Regex>,

    /// Render `main_content` to markdown as well as plain text. Off by
    /// default: most ingestion backends only want the plain-text signal.
    pub render_markdown: bool,

    /// Sample a bounded set of outbound links per page with a HEAD (falling
    /// back to GET on 405) and record which come back broken. Off by
    /// default: it costs one extra request per sampled link.
    pub check_broken_links: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            job_id: String::new(),
            api_url: String::new(),
            api_key: None,
            project_id: String::new(),
            max_concurrent_fetches: 8,
            max_concurrent_per_domain: 4,
            crawl_rate_rps: crate::utils::DEFAULT_CRAWL_RATE_RPS,
            page_timeout: Duration::from_secs(30),
            navigation_timeout: Duration::from_millis(30_000),
            sitemap_timeout: Duration::from_secs(30),
            max_page_retries: 2,
            batch_size: 50,
            output_dir: None,
            excluded_patterns: default_excluded_patterns(),
            render_markdown: false,
            check_broken_links: false,
        }
    }
}

fn default_excluded_patterns() -> Vec<Regex> {
    const EXCLUDED_EXTENSIONS: &[&str] = &[
        "jpg", "jpeg", "png", "gif", "svg", "webp", "ico", "css", "js", "woff", "woff2", "ttf",
        "eot", "mp4", "mp3", "zip", "gz", "tar", "exe", "dmg", "pdf",
    ];
    EXCLUDED_EXTENSIONS
        .iter()
        .filter_map(|ext| Regex::new(&format!(r"(?i)\.{ext}(\?|$)")).ok())
        .collect()
}

impl WorkerConfig {
    #[must_use]
    pub fn with_output_dir(mut self, dir: std::path::PathBuf) -> Self {
        self.output_dir = Some(dir);
        self
    }

    #[must_use]
    pub fn with_api_key(mut self, key: Option<String>) -> Self {
        self.api_key = key;
        self
    }

    #[must_use]
    pub fn with_render_markdown(mut self, render_markdown: bool) -> Self {
        self.render_markdown = render_markdown;
        self
    }

    #[must_use]
    pub fn with_check_broken_links(mut self, check_broken_links: bool) -> Self {
        self.check_broken_links = check_broken_links;
        self
    }
}

/// Supervisor configuration: one per process lifetime.
#[derive(Clone)]
pub struct SupervisorConfig {
    pub port: u16,
    pub api_url: String,
    pub api_key: Option<String>,
    pub poll_interval: Duration,
    pub retry_interval: Duration,
    pub max_retries: u8,
    pub enable_watcher: bool,
    pub enable_retry: bool,
    pub worker_binary: std::path::PathBuf,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            api_url: String::new(),
            api_key: None,
            poll_interval: Duration::from_secs(5),
            retry_interval: Duration::from_secs(30),
            max_retries: 3,
            enable_watcher: true,
            enable_retry: true,
            worker_binary: std::path::PathBuf::from("geoscope-worker"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_excluded_patterns_match_known_asset_extensions() {
        let patterns = default_excluded_patterns();
        let matches = |url: &str| patterns.iter().any(|p| p.is_match(url));
        assert!(matches("https://example.com/logo.PNG"));
        assert!(matches("https://example.com/app.js?v=2"));
        assert!(!matches("https://example.com/article"));
    }
}
