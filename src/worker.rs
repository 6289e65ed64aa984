//! The worker: one OS process per job. Builds a frontier from the job's
//! settings, drains it through the fetcher and extraction pipeline, and
//! ships results in batches.
//!
//! Grounded on `run_crawl_job.py`'s main loop.

use crate::config::WorkerConfig;
use crate::crawl_engine::rate_limiter::RateLimitDecision;
use crate::crawl_engine::{fetcher::Fetcher, sitemap, CrawlRateLimiter, DomainLimiter, Frontier};
use crate::model::{BatchStatus, CrawlMode, Job, JsMode, Scope, UrlRecord};
use crate::page_extractor::{extract_page_result, PageInput};
use crate::shipper::Shipper;
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::Semaphore;

pub struct Worker {
    config: WorkerConfig,
    job: Job,
    http: reqwest::Client,
    fetcher: Arc<Fetcher>,
    domain_limiter: Arc<DomainLimiter>,
    rate_limiter: Arc<CrawlRateLimiter>,
    /// Kept alive for the worker's lifetime so its `Drop` impl removes the
    /// Chrome profile directory once the crawl finishes; `None` when the job
    /// never launches a browser.
    _browser_profile: Option<crate::browser_profile::BrowserProfile>,
}

impl Worker {
    pub async fn new(config: WorkerConfig, job: Job) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(crate::utils::CHROME_USER_AGENT)
            .timeout(config.page_timeout)
            .build()
            .context("failed to build HTTP client")?;

        let (browser, browser_profile) = if job.settings.js_mode == JsMode::Off {
            (None, None)
        } else {
            let profile = crate::browser_profile::create_job_profile(&job.id).context("failed to create a Chrome profile directory")?;
            let (browser, _handler, _profile_dir) =
                crate::browser_setup::launch_browser(true, Some(profile.path().to_path_buf()), config.navigation_timeout)
                    .await
                    .context("failed to launch headless browser")?;
            (Some(browser), Some(profile))
        };

        Ok(Self {
            fetcher: Arc::new(Fetcher::new(http.clone(), browser)),
            domain_limiter: Arc::new(DomainLimiter::new(config.max_concurrent_per_domain)),
            rate_limiter: Arc::new(CrawlRateLimiter::new()),
            _browser_profile: browser_profile,
            config,
            job,
            http,
        })
    }

    /// Build the frontier's seed set per `crawlMode`.
    async fn seed_urls(&self) -> Result<Vec<String>> {
        let settings = &self.job.settings;
        match settings.crawl_mode {
            CrawlMode::UrlsOnly | CrawlMode::AllExisting => Ok(settings.urls.clone().unwrap_or_default()),
            CrawlMode::Full => {
                let domain = self.job.domain.clone().context("crawl mode `full` requires a domain")?;
                Ok(vec![domain])
            }
            CrawlMode::Sitemap => {
                let sitemap_url = settings
                    .sitemap_url
                    .clone()
                    .or_else(|| self.job.domain.clone().map(|d| format!("https://{d}/sitemap.xml")))
                    .context("crawl mode `sitemap` requires a sitemapUrl or domain")?;
                let outcome = sitemap::ingest(&self.http, &sitemap_url, settings.sitemap_alternate_links).await?;
                if outcome.truncated {
                    tracing::warn!(job_id = %self.job.id, "sitemap ingestion truncated at the URL ceiling");
                }
                Ok(outcome.urls.into_iter().map(|e| e.loc).collect())
            }
        }
    }

    pub async fn run(&self) -> Result<()> {
        let settings = &self.job.settings;
        let seeds = self.seed_urls().await?;
        let mut frontier = Frontier::new(&seeds, settings.scope, settings.resolved_max_depth(), settings.max_pages);
        frontier.seed(seeds.iter().cloned());

        let mut shipper = Shipper::new(
            self.http.clone(),
            self.config.api_url.clone(),
            self.job.id.clone(),
            self.job.project_id.clone(),
            self.config.api_key.clone(),
            self.config.batch_size,
        );
        shipper.open().await;

        let global_permits = Arc::new(Semaphore::new(self.config.max_concurrent_fetches));
        let mut in_flight = tokio::task::JoinSet::new();
        let mut had_error = false;

        loop {
            while let Some(record) = frontier.next() {
                if is_excluded(&record.url, &self.config.excluded_patterns) {
                    continue;
                }
                let global_permit = global_permits.clone().acquire_owned().await.expect("semaphore not closed");
                let domain_limiter = self.domain_limiter.clone();
                let rate_limiter = self.rate_limiter.clone();
                let fetcher = self.fetcher.clone();
                let js_mode = settings.js_mode;
                let crawl_rate_rps = self.config.crawl_rate_rps;
                let screenshot_dir = self.config.output_dir.clone();
                let render_markdown = self.config.render_markdown;
                let check_broken_links = self.config.check_broken_links;
                let http = self.http.clone();
                let host = url::Url::parse(&record.url).ok().and_then(|u| u.host_str().map(str::to_string)).unwrap_or_default();
                in_flight.spawn(async move {
                    let domain_permit = domain_limiter.acquire(host).await;
                    loop {
                        match rate_limiter.check(&record.url, crawl_rate_rps).await {
                            RateLimitDecision::Allow => break,
                            RateLimitDecision::Deny { retry_after } => tokio::time::sleep(retry_after).await,
                        }
                    }
                    let outcome = fetch_and_extract(&fetcher, &http, &record, js_mode, screenshot_dir.as_deref(), render_markdown, check_broken_links).await;
                    drop(domain_permit);
                    drop(global_permit);
                    (record, outcome)
                });

                if in_flight.len() >= self.config.max_concurrent_fetches {
                    break;
                }
            }

            let Some(joined) = in_flight.join_next().await else {
                if frontier.is_empty() {
                    break;
                }
                continue;
            };
            let (record, outcome) = joined.context("fetch task panicked")?;
            match outcome {
                Ok((result, discovered)) => {
                    for link in discovered {
                        frontier.enqueue(link, record.depth + 1, Some(record.url.clone()), false);
                    }
                    if let Some(dir) = &self.config.output_dir {
                        if let Err(e) = crate::content_saver::save_page_result(&result, dir).await {
                            tracing::warn!(url = %record.url, error = %e, "failed to write page result to disk");
                        }
                    }
                    shipper.push(result).await;
                }
                Err(e) => {
                    had_error = true;
                    shipper.record_error();
                    tracing::warn!(url = %record.url, error = %e, "page fetch/extract failed");
                }
            }

            if frontier.is_empty() && in_flight.is_empty() {
                break;
            }
        }

        while let Some(joined) = in_flight.join_next().await {
            if let Ok((_record, Ok((result, _)))) = joined {
                shipper.push(result).await;
            }
        }

        shipper.close(if had_error { BatchStatus::Failed } else { BatchStatus::Completed }).await;
        Ok(())
    }
}

fn is_excluded(url: &str, patterns: &[regex::Regex]) -> bool {
    patterns.iter().any(|p| p.is_match(url))
}

async fn fetch_and_extract(
    fetcher: &Fetcher,
    http: &reqwest::Client,
    record: &UrlRecord,
    js_mode: JsMode,
    screenshot_dir: Option<&std::path::Path>,
    render_markdown: bool,
    check_broken_links: bool,
) -> Result<(crate::page_extractor::PageResult, Vec<String>)> {
    let outcome = fetcher.fetch(&record.url, js_mode).await?;
    let discovered = extract_discovered_links(&outcome.html, &outcome.final_url);

    let input = PageInput {
        url: &outcome.final_url,
        html: &outcome.html,
        status_code: outcome.status_code,
        rendered: outcome.rendered,
    };
    let mut result = extract_page_result(input, outcome.page.as_ref(), screenshot_dir, render_markdown).await?;
    if check_broken_links {
        result.link_signals.broken_link_samples = crate::crawl_engine::broken_links::sample_broken(http, &result.links).await;
    }
    Ok((result, discovered))
}

fn extract_discovered_links(html: &str, base_url: &str) -> Vec<String> {
    let doc = scraper::Html::parse_document(html);
    crate::page_extractor::extractors::extract_links(&doc, base_url)
        .into_iter()
        .map(|l| l.url)
        .collect()
}

#[must_use]
pub fn default_scope_for_job(job: &Job) -> Scope {
    job.settings.scope
}
