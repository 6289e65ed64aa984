//! Background loops the supervisor runs alongside its HTTP surface: poll the
//! backend for pending jobs to spawn, and retry jobs whose worker exited
//! with a retryable failure.
//!
//! Grounded on `crawler_server.py`'s polling thread: a fixed interval, one
//! backend call per tick, and error logging that never aborts the loop.

use crate::model::Job;
use crate::supervisor::process::ProcessManager;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

pub async fn poll_pending_jobs(manager: Arc<ProcessManager>, http: reqwest::Client, api_url: String, api_key: Option<String>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        let jobs = match fetch_jobs(&http, &api_url, api_key.as_deref(), "pending").await {
            Ok(jobs) => jobs,
            Err(e) => {
                tracing::warn!(error = %e, "failed to poll for pending jobs");
                continue;
            }
        };
        for job in jobs {
            match manager.spawn(&job) {
                Ok(()) => tracing::info!(job_id = %job.id, "spawned worker for pending job"),
                Err(e) => tracing::warn!(job_id = %job.id, error = %e, "failed to spawn worker"),
            }
        }
    }
}

/// Respawns workers for jobs the backend reports as failed, up to
/// `max_retries` attempts per job. The backend is the source of truth for
/// *which* failures are worth retrying (it saw the worker's exit status and
/// last error); the supervisor only enforces the attempt ceiling, since a
/// crash-looping worker would otherwise retry forever.
pub async fn retry_failed_jobs(manager: Arc<ProcessManager>, http: reqwest::Client, api_url: String, api_key: Option<String>, interval: Duration, max_retries: u8) {
    let attempts: DashMap<String, u8> = DashMap::new();
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        let jobs = match fetch_jobs(&http, &api_url, api_key.as_deref(), "failed").await {
            Ok(jobs) => jobs,
            Err(e) => {
                tracing::warn!(error = %e, "failed to poll for retryable jobs");
                continue;
            }
        };
        for job in jobs {
            let mut count = attempts.entry(job.id.clone()).or_insert(0);
            if *count >= max_retries {
                continue;
            }
            *count += 1;
            match manager.spawn(&job) {
                Ok(()) => tracing::info!(job_id = %job.id, attempt = *count, "respawned worker for failed job"),
                Err(e) => tracing::warn!(job_id = %job.id, error = %e, "failed to respawn worker"),
            }
        }
    }
}

async fn fetch_jobs(http: &reqwest::Client, api_url: &str, api_key: Option<&str>, status: &str) -> anyhow::Result<Vec<Job>> {
    let url = format!("{}/api/crawl/jobs?status={status}", api_url.trim_end_matches('/'));
    let mut request = http.get(&url);
    if let Some(key) = api_key {
        request = request.bearer_auth(key);
    }
    let response = request.send().await?.error_for_status()?;
    Ok(response.json().await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job_json(id: &str) -> serde_json::Value {
        serde_json::json!({
            "id": id,
            "project_id": "proj-1",
            "domain": "example.com",
            "urls": null,
            "crawlMode": "full",
            "settings": {},
        })
    }

    #[tokio::test]
    async fn fetch_jobs_sends_status_filter_and_bearer_auth() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/crawl/jobs")
            .match_query(mockito::Matcher::UrlEncoded("status".into(), "pending".into()))
            .match_header("authorization", "Bearer secret")
            .with_status(200)
            .with_body(serde_json::json!([job_json("job-1")]).to_string())
            .create_async()
            .await;

        let http = reqwest::Client::new();
        let jobs = fetch_jobs(&http, &server.url(), Some("secret"), "pending").await.unwrap();

        mock.assert_async().await;
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].id, "job-1");
    }

    #[tokio::test]
    async fn fetch_jobs_surfaces_non_success_status_as_an_error() {
        let mut server = mockito::Server::new_async().await;
        server.mock("GET", "/api/crawl/jobs").match_query(mockito::Matcher::Any).with_status(500).create_async().await;

        let http = reqwest::Client::new();
        let result = fetch_jobs(&http, &server.url(), None, "failed").await;
        assert!(result.is_err());
    }
}
