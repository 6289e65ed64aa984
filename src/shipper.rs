//! Batches extracted page results and POSTs them to the backend
//! (POSTs batches to `<api_url>/api/crawl/results`).
//!
//! Grounded on `run_crawl_job.py`'s `ResultShipper`: buffer to `batch_size`,
//! flush on a timer or on close, and never fail the crawl over a dropped
//! batch.

use crate::model::{BatchEnvelope, BatchStatus, CrawlStats};
use crate::page_extractor::PageResult;

pub struct Shipper {
    http: reqwest::Client,
    api_url: String,
    job_id: String,
    project_id: String,
    api_key: Option<String>,
    batch_size: usize,
    buffer: Vec<PageResult>,
    stats: CrawlStats,
}

impl Shipper {
    #[must_use]
    pub fn new(http: reqwest::Client, api_url: String, job_id: String, project_id: String, api_key: Option<String>, batch_size: usize) -> Self {
        Self {
            http,
            api_url,
            job_id,
            project_id,
            api_key,
            batch_size: batch_size.max(1),
            buffer: Vec::new(),
            stats: CrawlStats::default(),
        }
    }

    /// Announce the job has started: ship an immediate, empty `running` batch
    /// so the backend has a liveness signal before the first page completes.
    pub async fn open(&self) {
        self.send(Vec::new(), BatchStatus::Running).await;
    }

    pub fn record_queued(&mut self, n: u64) {
        self.stats.pages_queued += n;
    }

    pub fn record_error(&mut self) {
        self.stats.pages_errored += 1;
    }

    /// Buffer one page result, flushing when `batch_size` is reached.
    pub async fn push(&mut self, page: PageResult) {
        self.stats.pages_crawled += 1;
        self.buffer.push(page);
        if self.buffer.len() >= self.batch_size {
            self.flush(BatchStatus::Running).await;
        }
    }

    async fn flush(&mut self, status: BatchStatus) {
        let pages = std::mem::take(&mut self.buffer);
        self.send(pages, status).await;
    }

    async fn send(&self, pages: Vec<PageResult>, status: BatchStatus) {
        let envelope = BatchEnvelope {
            job_id: self.job_id.clone(),
            project_id: self.project_id.clone(),
            api_key: self.api_key.clone(),
            status,
            pages,
            stats: self.stats,
        };
        let url = format!("{}/api/crawl/results", self.api_url.trim_end_matches('/'));
        let mut request = self.http.post(&url).json(&envelope);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        if let Err(e) = request.send().await {
            tracing::warn!(job_id = %self.job_id, error = %e, "result batch send failed, continuing crawl");
        }
    }

    /// Flush any remaining buffered pages and ship the closing status.
    pub async fn close(&mut self, status: BatchStatus) {
        self.flush(status).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_size_floor_is_one() {
        let http = reqwest::Client::new();
        let shipper = Shipper::new(http, "https://api.example.com".into(), "job-1".into(), "proj-1".into(), None, 0);
        assert_eq!(shipper.batch_size, 1);
    }

    #[tokio::test]
    async fn open_posts_an_empty_running_batch() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/crawl/results")
            .match_header("authorization", "Bearer secret")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "job_id": "job-1",
                "status": "running",
                "pages": [],
            })))
            .with_status(200)
            .create_async()
            .await;

        let http = reqwest::Client::new();
        let shipper = Shipper::new(http, server.url(), "job-1".into(), "proj-1".into(), Some("secret".into()), 10);
        shipper.open().await;

        mock.assert_async().await;
    }
}
