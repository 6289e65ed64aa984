//! The `geoscope-worker` binary: the supervisor spawns one of these per job.
//!
//! Fetches the job record from the backend, builds a [`Worker`], runs the
//! crawl to completion, and exits with a status code reflecting success.

use clap::Parser;
use geoscope::config::WorkerConfig;
use geoscope::model::{CrawlMode, Job, JobSettings, JsMode, Scope};
use geoscope::Worker;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "geoscope-worker", about = "Crawl one job to completion and ship its results")]
struct Args {
    #[arg(long, env = "GEOSCOPE_JOB_ID")]
    job_id: String,

    #[arg(long, env = "GEOSCOPE_API_URL")]
    api_url: String,

    #[arg(long, env = "GEOSCOPE_API_KEY")]
    api_key: Option<String>,

    #[arg(long, env = "GEOSCOPE_PROJECT_ID", default_value = "")]
    project_id: String,

    /// Overrides the job's domain (crawl mode `full`).
    #[arg(long)]
    domain: Option<String>,

    /// Overrides the job's scope policy.
    #[arg(long, value_enum)]
    scope: Option<ScopeArg>,

    /// Overrides the job's JS rendering mode.
    #[arg(long = "js-mode", value_enum)]
    js_mode: Option<JsModeArg>,

    #[arg(long)]
    max_pages: Option<u32>,

    #[arg(long)]
    max_depth: Option<u8>,

    /// Write page results to this directory instead of POSTing them.
    #[arg(long)]
    output_dir: Option<std::path::PathBuf>,

    /// Also render each page's main content to markdown.
    #[arg(long, default_value_t = false)]
    render_markdown: bool,

    /// Sample a bounded set of outbound links per page and record which are broken.
    #[arg(long, default_value_t = false)]
    check_broken_links: bool,

    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum ScopeArg {
    Subdomain,
    Domain,
    Subfolder,
    SubdomainSubfolder,
}

impl From<ScopeArg> for Scope {
    fn from(value: ScopeArg) -> Self {
        match value {
            ScopeArg::Subdomain => Scope::Subdomain,
            ScopeArg::Domain => Scope::Domain,
            ScopeArg::Subfolder => Scope::Subfolder,
            ScopeArg::SubdomainSubfolder => Scope::SubdomainSubfolder,
        }
    }
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum JsModeArg {
    Off,
    Auto,
    Full,
}

impl From<JsModeArg> for JsMode {
    fn from(value: JsModeArg) -> Self {
        match value {
            JsModeArg::Off => JsMode::Off,
            JsModeArg::Auto => JsMode::Auto,
            JsModeArg::Full => JsMode::Full,
        }
    }
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let args = Args::parse();
    init_tracing(&args.log_level);

    match run(args).await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = format!("{e:#}"), "worker exited with an error");
            std::process::ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    match geoscope::browser_profile::cleanup_stale_profiles() {
        Ok(0) => {}
        Ok(n) => tracing::info!(n, "swept stale Chrome profiles from a previous worker"),
        Err(e) => tracing::warn!(error = %e, "stale Chrome profile sweep failed, continuing"),
    }

    let job = fetch_job(&args).await?;

    let mut config = WorkerConfig {
        job_id: job.id.clone(),
        api_url: args.api_url.clone(),
        project_id: job.project_id.clone(),
        ..WorkerConfig::default()
    };
    config = config.with_api_key(args.api_key.clone());
    config = config.with_render_markdown(args.render_markdown);
    config = config.with_check_broken_links(args.check_broken_links);
    if let Some(dir) = args.output_dir {
        config = config.with_output_dir(dir);
    }

    tracing::info!(job_id = %job.id, domain = ?job.domain, "starting crawl");
    let worker = Worker::new(config, job).await?;
    worker.run().await
}

/// Fetches the job from the backend, then applies any CLI overrides for
/// flags common to running a worker by hand against a domain without first
/// registering a job (local testing, one-off backfills).
async fn fetch_job(args: &Args) -> anyhow::Result<Job> {
    let client = reqwest::Client::builder().timeout(Duration::from_secs(15)).build()?;
    let url = format!("{}/api/crawl/job/{}", args.api_url.trim_end_matches('/'), args.job_id);
    let mut request = client.get(&url);
    if let Some(key) = &args.api_key {
        request = request.bearer_auth(key);
    }

    let mut job = match request.send().await {
        Ok(resp) if resp.status().is_success() => resp.json::<Job>().await?,
        Ok(resp) => {
            tracing::warn!(status = %resp.status(), "job fetch failed, falling back to CLI-constructed job");
            job_from_args(args)
        }
        Err(e) => {
            tracing::warn!(error = %e, "job fetch failed, falling back to CLI-constructed job");
            job_from_args(args)
        }
    };

    if let Some(domain) = &args.domain {
        job.domain = Some(domain.clone());
    }
    if let Some(scope) = args.scope {
        job.settings.scope = scope.into();
    }
    if let Some(js_mode) = args.js_mode {
        job.settings.js_mode = js_mode.into();
    }
    if let Some(max_pages) = args.max_pages {
        job.settings.max_pages = max_pages;
    }
    if args.max_depth.is_some() {
        job.settings.max_depth = args.max_depth;
    }
    Ok(job)
}

fn job_from_args(args: &Args) -> Job {
    Job {
        id: args.job_id.clone(),
        project_id: args.project_id.clone(),
        domain: args.domain.clone(),
        urls: None,
        crawl_mode: Some(CrawlMode::Full),
        settings: JobSettings {
            scope: args.scope.map(Into::into).unwrap_or_default(),
            js_mode: args.js_mode.map(Into::into).unwrap_or_default(),
            max_pages: args.max_pages.unwrap_or(500),
            max_depth: args.max_depth,
            sitemap_url: None,
            crawl_mode: CrawlMode::Full,
            urls: None,
            sitemap_alternate_links: false,
        },
    }
}

fn init_tracing(log_level: &str) {
    // A handful of lower-level modules (domain limiter, URL utilities) still log
    // through the plain `log` facade; give them a sink independent of tracing's.
    let _ = env_logger::try_init();
    let filter = tracing_subscriber::EnvFilter::try_new(log_level).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
