//! Finds or downloads a Chrome/Chromium binary and launches it headless for
//! the rendered-fetch path, plus the stealth JS the fetcher injects into
//! every rendered page before navigation settles.
//!
//! Workers run in Linux containers, so the executable search only covers
//! `CHROMIUM_PATH`, the handful of common Linux install paths, and `which` —
//! there is no desktop-installer layout to account for.

use anyhow::{Context, Result};
use chromiumoxide::browser::{Browser, BrowserConfigBuilder, HeadlessMode};
use chromiumoxide::fetcher::{BrowserFetcher, BrowserFetcherOptions};
use futures::StreamExt;
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;
use tokio::task::{self, JoinHandle};
use tracing::{error, info, trace, warn};

use crate::utils::constants::CHROME_USER_AGENT;

const LINUX_CHROME_PATHS: &[&str] = &[
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/snap/bin/chromium",
    "/usr/local/bin/chromium",
    "/opt/google/chrome/chrome",
];

/// Locate a usable Chrome/Chromium binary: `CHROMIUM_PATH` env override,
/// then the known Linux install locations, then `which` on the PATH.
pub async fn find_browser_executable() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("CHROMIUM_PATH") {
        let path = PathBuf::from(path);
        if path.exists() {
            info!(path = %path.display(), "using browser from CHROMIUM_PATH");
            return Ok(path);
        }
        warn!(path = %path.display(), "CHROMIUM_PATH points to a non-existent file");
    }

    for candidate in LINUX_CHROME_PATHS {
        let path = PathBuf::from(candidate);
        if path.exists() {
            info!(path = %path.display(), "found browser at known location");
            return Ok(path);
        }
    }

    for cmd in ["chromium", "chromium-browser", "google-chrome", "chrome"] {
        let output = Command::new("which").arg(cmd).output();
        if let Ok(output) = output
            && output.status.success()
        {
            let found = String::from_utf8_lossy(&output.stdout).trim().to_string();
            if !found.is_empty() {
                info!(path = %found, "found browser via `which`");
                return Ok(PathBuf::from(found));
            }
        }
    }

    warn!("no Chrome/Chromium executable found, falling back to managed download");
    Err(anyhow::anyhow!("Chrome/Chromium executable not found"))
}

/// Download a managed Chromium build into the platform cache directory,
/// under `geoscope/chromium`, falling back to a temp directory if the
/// platform cache location can't be determined.
pub async fn download_managed_browser() -> Result<PathBuf> {
    info!("downloading managed Chromium build");

    let cache_dir = dirs::cache_dir()
        .unwrap_or_else(|| {
            let fallback = std::env::temp_dir().join("geoscope_chrome_cache");
            warn!(path = %fallback.display(), "no platform cache directory, using temp fallback");
            fallback
        })
        .join("geoscope")
        .join("chromium");
    std::fs::create_dir_all(&cache_dir).context("failed to create browser cache directory")?;

    let fetcher = BrowserFetcher::new(
        BrowserFetcherOptions::builder()
            .with_path(&cache_dir)
            .build()
            .context("failed to build browser fetcher options")?,
    );
    let revision = fetcher.fetch().await.context("failed to download browser")?;
    info!(path = %revision.folder_path.display(), "downloaded Chromium build");
    Ok(revision.executable_path)
}

/// Find or download Chrome, then launch it headless with a profile
/// directory isolated per job so concurrent crawls never fight over a
/// singleton lock. `request_timeout` comes from the job's
/// [`crate::config::WorkerConfig::navigation_timeout`] so a slow-loading
/// page times out on the same clock the rest of the fetch path uses.
pub async fn launch_browser(headless: bool, chrome_data_dir: Option<PathBuf>, request_timeout: Duration) -> Result<(Browser, JoinHandle<()>, PathBuf)> {
    let chrome_path = match find_browser_executable().await {
        Ok(path) => path,
        Err(_) => download_managed_browser().await?,
    };

    let user_data_dir = chrome_data_dir.unwrap_or_else(|| std::env::temp_dir().join(format!("geoscope_chrome_{}", std::process::id())));
    std::fs::create_dir_all(&user_data_dir).context("failed to create Chrome user data directory")?;

    let mut builder = BrowserConfigBuilder::default()
        .request_timeout(request_timeout)
        .window_size(1920, 1080)
        .user_data_dir(user_data_dir.clone())
        .chrome_executable(chrome_path);

    builder = if headless { builder.headless_mode(HeadlessMode::default()) } else { builder.with_head() };

    builder = builder
        .arg(format!("--user-agent={CHROME_USER_AGENT}"))
        .arg("--disable-blink-features=AutomationControlled")
        .arg("--disable-infobars")
        .arg("--disable-notifications")
        .arg("--disable-popup-blocking")
        .arg("--disable-background-networking")
        .arg("--disable-backgrounding-occluded-windows")
        .arg("--no-first-run")
        .arg("--no-default-browser-check")
        .arg("--no-sandbox")
        .arg("--disable-setuid-sandbox")
        .arg("--password-store=basic")
        .arg("--use-mock-keychain")
        .arg("--hide-scrollbars")
        .arg("--mute-audio");

    let config = builder.build().map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

    let (browser, mut handler) = Browser::launch(config).await.context("failed to launch browser")?;
    let handler_task = task::spawn(async move {
        while let Some(event) = handler.next().await {
            if let Err(e) = event {
                // chromiumoxide doesn't recognize every CDP event Chrome sends; these
                // two are known-benign and would otherwise drown real handler errors.
                // https://github.com/mattsse/chromiumoxide/issues/167
                let msg = e.to_string();
                if msg.contains("data did not match any variant of untagged enum Message") || msg.contains("Failed to deserialize WS response") {
                    trace!(error = %msg, "suppressed benign CDP deserialization error");
                } else {
                    error!(error = %e, "browser handler error");
                }
            }
        }
        info!("browser handler task ended");
    });

    Ok((browser, handler_task, user_data_dir))
}

/// Inject stealth JS into a freshly-opened page before navigation, so sites
/// fingerprinting `navigator.webdriver` and friends see a plausible regular
/// browser instead of an obvious headless one. Called once per rendered
/// fetch from [`crate::crawl_engine::fetcher::Fetcher`]; the additional
/// per-page init script lives in `page_extractor::js_scripts`.
pub async fn apply_stealth_measures(page: &chromiumoxide::Page) -> Result<()> {
    page.evaluate("Object.defineProperty(navigator, 'webdriver', { get: () => false });").await?;

    page.evaluate(format!("Object.defineProperty(navigator, 'userAgent', {{ value: '{CHROME_USER_AGENT}' }});")).await?;

    page.evaluate("Object.defineProperty(navigator, 'languages', { get: () => ['en-US', 'en'] });").await?;

    page.evaluate(
        r"
        if (!window.chrome) { window.chrome = {}; }
        if (!window.chrome.runtime) {
            window.chrome.runtime = {
                connect: () => ({ onMessage: { addListener: () => {}, removeListener: () => {} }, postMessage: () => {} })
            };
        }
        ",
    )
    .await?;

    page.evaluate(
        r"
        if (window.WebGLRenderingContext) {
            const getParameter = WebGLRenderingContext.prototype.getParameter;
            WebGLRenderingContext.prototype.getParameter = new Proxy(getParameter, {
                apply(target, ctx, args) {
                    const param = (args && args[0]) || null;
                    if (param === 37445) return 'Intel Inc.';
                    if (param === 37446) return 'Intel Iris OpenGL Engine';
                    return Reflect.apply(target, ctx, args);
                }
            });
        }
        ",
    )
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn find_browser_executable_honors_chromium_path_override() {
        let dir = tempfile::tempdir().unwrap();
        let fake_binary = dir.path().join("chrome");
        std::fs::write(&fake_binary, b"").unwrap();
        unsafe {
            std::env::set_var("CHROMIUM_PATH", &fake_binary);
        }
        let found = find_browser_executable().await.unwrap();
        unsafe {
            std::env::remove_var("CHROMIUM_PATH");
        }
        assert_eq!(found, fake_binary);
    }
}
