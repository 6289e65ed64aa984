//! Unifies plain-HTTP and headless-rendered fetching behind one operation,
//! applies the `jsMode` selection policy, and retries transient failures.
//!
//! Grounded on `run_crawl_job.py`'s `fetch_page` (retry/backoff policy) and
//! `crawler_spider.py`'s JS-mode dispatch.

use crate::model::JsMode;
use anyhow::{Context, Result};
use chromiumoxide::{Browser, Page};
use std::time::Duration;

/// HTTP statuses worth a retry: request timeout, rate limiting, and the
/// common 5xx transients.
const RETRYABLE_STATUSES: [u16; 6] = [408, 429, 500, 502, 503, 504];
const MAX_RETRIES: u32 = 2;

pub struct FetchOutcome {
    pub html: String,
    pub status_code: Option<u16>,
    pub rendered: bool,
    pub final_url: String,
    /// The live page behind a rendered fetch, kept open so the extraction
    /// step can pull navigation timing and a screenshot without a second
    /// navigation.
    pub page: Option<Page>,
}

pub struct Fetcher {
    http: reqwest::Client,
    browser: Option<Browser>,
}

impl Fetcher {
    #[must_use]
    pub fn new(http: reqwest::Client, browser: Option<Browser>) -> Self {
        Self { http, browser }
    }

    /// Fetch `url` per `js_mode`. `auto` first does a cheap plain-HTTP fetch
    /// and only escalates to the headless renderer if the response looks
    /// client-side rendered (see `needs_render`).
    pub async fn fetch(&self, url: &str, js_mode: JsMode) -> Result<FetchOutcome> {
        match js_mode {
            JsMode::Off => self.fetch_plain(url).await,
            JsMode::Full => self.fetch_rendered(url).await,
            JsMode::Auto => {
                let plain = self.fetch_plain(url).await?;
                if needs_render(&plain.html) && self.browser.is_some() {
                    self.fetch_rendered(url).await
                } else {
                    Ok(plain)
                }
            }
        }
    }

    async fn fetch_plain(&self, url: &str) -> Result<FetchOutcome> {
        let mut attempt = 0u32;
        loop {
            let response = self.http.get(url).send().await;
            match response {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if RETRYABLE_STATUSES.contains(&status) && attempt < MAX_RETRIES {
                        attempt += 1;
                        backoff(attempt).await;
                        continue;
                    }
                    let final_url = resp.url().to_string();
                    let html = resp.text().await.context("failed to read response body")?;
                    return Ok(FetchOutcome { html, status_code: Some(status), rendered: false, final_url, page: None });
                }
                Err(e) if attempt < MAX_RETRIES => {
                    attempt += 1;
                    tracing::warn!(url, error = %e, attempt, "retrying plain fetch");
                    backoff(attempt).await;
                }
                Err(e) => return Err(e).context("plain HTTP fetch failed"),
            }
        }
    }

    async fn fetch_rendered(&self, url: &str) -> Result<FetchOutcome> {
        let browser = self.browser.as_ref().context("js rendering requested but no browser is attached")?;
        let mut attempt = 0u32;
        loop {
            match render_once(browser, url).await {
                Ok(outcome) => return Ok(outcome),
                Err(e) if attempt < MAX_RETRIES => {
                    attempt += 1;
                    tracing::warn!(url, error = %e, attempt, "retrying rendered fetch");
                    backoff(attempt).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

}

async fn render_once(browser: &Browser, url: &str) -> Result<FetchOutcome> {
    let page = browser.new_page(url).await.context("failed to open page")?;
    crate::browser_setup::apply_stealth_measures(&page).await?;
    page.wait_for_navigation().await.context("navigation did not settle")?;
    let html = page.content().await.map_err(|e| anyhow::anyhow!("failed to read rendered content: {e}"))?;
    let final_url = page.url().await.ok().flatten().unwrap_or_else(|| url.to_string());
    Ok(FetchOutcome { html, status_code: None, rendered: true, final_url, page: Some(page) })
}

async fn backoff(attempt: u32) {
    tokio::time::sleep(Duration::from_millis(250 * u64::from(attempt))).await;
}

/// Heuristic render signal: a body that parses to almost no text but still
/// references a known client-side framework root is very likely hydrated by
/// JavaScript the plain fetch never ran.
#[must_use]
pub fn needs_render(html: &str) -> bool {
    let doc = scraper::Html::parse_document(html);
    let body_text_len = doc
        .select(&scraper::Selector::parse("body").expect("static selector"))
        .next()
        .map(|el| el.text().collect::<String>().split_whitespace().count())
        .unwrap_or(0);
    if body_text_len > 200 {
        return false;
    }
    let framework_roots = [r#"id="root""#, r#"id="app""#, r#"id="__next""#, "ng-version", "data-reactroot"];
    framework_roots.iter().any(|needle| html.contains(needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thin_body_with_react_root_needs_render() {
        let html = r#"<html><body><div id="root"></div><script src="bundle.js"></script></body></html>"#;
        assert!(needs_render(html));
    }

    #[test]
    fn fully_rendered_body_does_not_need_render() {
        let html = format!("<html><body><article>{}</article></body></html>", "word ".repeat(300));
        assert!(!needs_render(&html));
    }
}
