//! The `geoscope-supervisor` binary: owns the worker fleet, exposes the HTTP
//! control surface, and drives the pending/retry poll loops.

use clap::Parser;
use geoscope::config::SupervisorConfig;
use geoscope::supervisor::http::{router, AppState};
use geoscope::supervisor::{process, retry};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "geoscope-supervisor", about = "Run the crawl job supervisor")]
struct Args {
    #[arg(long, default_value_t = 8080, env = "GEOSCOPE_PORT")]
    port: u16,

    #[arg(long, env = "GEOSCOPE_API_URL")]
    api_url: String,

    #[arg(long, env = "GEOSCOPE_API_KEY")]
    api_key: Option<String>,

    #[arg(long, default_value = "geoscope-worker", env = "GEOSCOPE_WORKER_BINARY")]
    worker_binary: std::path::PathBuf,

    #[arg(long, default_value_t = 5, env = "GEOSCOPE_POLL_INTERVAL_SECS")]
    poll_interval_secs: u64,

    #[arg(long, default_value_t = 30, env = "GEOSCOPE_RETRY_INTERVAL_SECS")]
    retry_interval_secs: u64,

    #[arg(long, default_value_t = 3, env = "GEOSCOPE_MAX_RETRIES")]
    max_retries: u8,

    #[arg(long, default_value_t = true)]
    enable_watcher: bool,

    #[arg(long, default_value_t = true)]
    enable_retry: bool,

    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level);

    let config = SupervisorConfig {
        port: args.port,
        api_url: args.api_url.clone(),
        api_key: args.api_key.clone(),
        poll_interval: Duration::from_secs(args.poll_interval_secs),
        retry_interval: Duration::from_secs(args.retry_interval_secs),
        max_retries: args.max_retries,
        enable_watcher: args.enable_watcher,
        enable_retry: args.enable_retry,
        worker_binary: args.worker_binary,
    };

    let manager = Arc::new(process::ProcessManager::new(config.worker_binary.clone(), config.api_url.clone(), config.api_key.clone()));
    let http_client = reqwest::Client::new();

    if config.enable_watcher {
        let manager = manager.clone();
        let http_client = http_client.clone();
        let config = config.clone();
        tokio::spawn(async move {
            retry::poll_pending_jobs(manager, http_client, config.api_url, config.api_key, config.poll_interval).await;
        });
    }

    if config.enable_retry {
        let manager = manager.clone();
        let http_client = http_client.clone();
        let config = config.clone();
        tokio::spawn(async move {
            retry::retry_failed_jobs(manager, http_client, config.api_url, config.api_key, config.retry_interval, config.max_retries).await;
        });
    }

    tokio::spawn(gc_loop(manager.clone()));

    let state = AppState { manager, api_key: config.api_key.clone() };
    let app = router(state).layer(tower_http::trace::TraceLayer::new_for_http()).layer(tower_http::cors::CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    tracing::info!(port = config.port, "supervisor listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn gc_loop(manager: Arc<process::ProcessManager>) {
    let mut ticker = tokio::time::interval(Duration::from_secs(300));
    loop {
        ticker.tick().await;
        manager.gc().await;
    }
}

fn init_tracing(log_level: &str) {
    // A handful of lower-level modules (domain limiter, URL utilities) still log
    // through the plain `log` facade; give them a sink independent of tracing's.
    let _ = env_logger::try_init();
    let filter = tracing_subscriber::EnvFilter::try_new(log_level).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
