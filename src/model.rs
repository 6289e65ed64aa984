//! Data model shared by the supervisor, worker, and shipper.
//!
//! Grounded on `crawler_server.py` (job/worker record shapes) and
//! `items.py` (page result field groups).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Crawl scope policy: how far a link may stray from the seed before it's out of bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Subdomain,
    Domain,
    Subfolder,
    #[serde(rename = "subdomain+subfolder")]
    SubdomainSubfolder,
}

impl Default for Scope {
    fn default() -> Self {
        Self::Domain
    }
}

/// Headless-rendering policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JsMode {
    Off,
    Auto,
    Full,
}

impl Default for JsMode {
    fn default() -> Self {
        Self::Off
    }
}

/// Seed-construction mode for the frontier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrawlMode {
    Full,
    UrlsOnly,
    Sitemap,
    AllExisting,
}

impl Default for CrawlMode {
    fn default() -> Self {
        Self::Full
    }
}

/// Job settings bag, deserialized from the job-fetch response
/// and overridable by explicit (non-default) CLI flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSettings {
    #[serde(default)]
    pub scope: Scope,
    #[serde(rename = "jsMode", default)]
    pub js_mode: JsMode,
    #[serde(rename = "maxPages", default = "default_max_pages")]
    pub max_pages: u32,
    #[serde(rename = "maxDepth")]
    pub max_depth: Option<u8>,
    #[serde(rename = "sitemapUrl")]
    pub sitemap_url: Option<String>,
    #[serde(default)]
    pub crawl_mode: CrawlMode,
    pub urls: Option<Vec<String>>,
    #[serde(default)]
    pub sitemap_alternate_links: bool,
}

const fn default_max_pages() -> u32 {
    500
}

impl JobSettings {
    /// Smart default for `maxDepth`: 0 for modes that don't traverse links, 10 for `full`.
    #[must_use]
    pub fn resolved_max_depth(&self) -> u8 {
        self.max_depth.unwrap_or(match self.crawl_mode {
            CrawlMode::UrlsOnly | CrawlMode::Sitemap | CrawlMode::AllExisting => 0,
            CrawlMode::Full => 10,
        })
    }
}

/// Job status state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Paused,
    Completed,
    Failed,
    Killed,
}

/// A job as fetched from the backend (`GET /api/crawl/job/:id`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub project_id: String,
    pub domain: Option<String>,
    pub urls: Option<Vec<String>>,
    #[serde(rename = "crawlMode")]
    pub crawl_mode: Option<CrawlMode>,
    pub settings: JobSettings,
}

/// Supervisor-local worker record; never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct WorkerRecord {
    pub job_id: String,
    pub os_pid: u32,
    pub status: JobStatus,
    pub started_at: DateTime<Utc>,
    pub paused_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub exit_code: Option<i32>,
    #[serde(skip)]
    pub log_lines: VecDeque<String>,
}

/// Ring buffer of the last 100 stdout lines captured from a worker process.
pub const WORKER_LOG_RING_CAPACITY: usize = 100;
/// Lines returned by `GET /status/:job_id`.
pub const WORKER_LOG_STATUS_TAIL: usize = 10;
/// Finished worker records retained after garbage collection.
pub const WORKER_RECORD_GC_KEEP: usize = 50;

impl WorkerRecord {
    #[must_use]
    pub fn new(job_id: String, os_pid: u32) -> Self {
        Self {
            job_id,
            os_pid,
            status: JobStatus::Running,
            started_at: Utc::now(),
            paused_at: None,
            finished_at: None,
            exit_code: None,
            log_lines: VecDeque::with_capacity(WORKER_LOG_RING_CAPACITY),
        }
    }

    pub fn push_log_line(&mut self, line: String) {
        if self.log_lines.len() == WORKER_LOG_RING_CAPACITY {
            self.log_lines.pop_front();
        }
        self.log_lines.push_back(line);
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Killed
        )
    }

    #[must_use]
    pub fn tail(&self, n: usize) -> Vec<String> {
        self.log_lines.iter().rev().take(n).rev().cloned().collect()
    }
}

/// A pending item in the frontier queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlRecord {
    pub url: String,
    pub depth: u8,
    pub referrer: Option<String>,
    /// Whether this request should use the headless renderer.
    pub render: bool,
}

/// Running counters shipped with every batch envelope.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CrawlStats {
    pub pages_queued: u64,
    pub pages_crawled: u64,
    pub pages_errored: u64,
}

/// Batch status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Running,
    Completed,
    Failed,
}

/// The JSON body POSTed to `<api_url>/api/crawl/results`.
#[derive(Debug, Clone, Serialize)]
pub struct BatchEnvelope {
    pub job_id: String,
    pub project_id: String,
    pub api_key: Option<String>,
    pub status: BatchStatus,
    pub pages: Vec<crate::page_extractor::PageResult>,
    pub stats: CrawlStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_depth_smart_default_matches_crawl_mode() {
        let mut settings = JobSettings {
            scope: Scope::Domain,
            js_mode: JsMode::Off,
            max_pages: 10,
            max_depth: None,
            sitemap_url: None,
            crawl_mode: CrawlMode::UrlsOnly,
            urls: None,
            sitemap_alternate_links: false,
        };
        assert_eq!(settings.resolved_max_depth(), 0);
        settings.crawl_mode = CrawlMode::Full;
        assert_eq!(settings.resolved_max_depth(), 10);
        settings.max_depth = Some(3);
        assert_eq!(settings.resolved_max_depth(), 3);
    }

    #[test]
    fn worker_record_log_ring_is_bounded() {
        let mut record = WorkerRecord::new("job-1".into(), 123);
        for i in 0..150 {
            record.push_log_line(format!("line {i}"));
        }
        assert_eq!(record.log_lines.len(), WORKER_LOG_RING_CAPACITY);
        assert_eq!(record.log_lines.front().unwrap(), "line 50");
        assert_eq!(record.tail(10).len(), 10);
        assert_eq!(record.tail(10).last().unwrap(), "line 149");
    }
}
