//! The crawl engine: frontier, scope filtering, sitemap ingestion, per-host
//! politeness/concurrency limits, and the fetcher that ties them to a
//! worker's job.

pub mod broken_links;
pub mod domain_limiter;
pub mod fetcher;
pub mod frontier;
pub mod rate_limiter;
pub mod scope;
pub mod sitemap;

pub use domain_limiter::DomainLimiter;
pub use fetcher::{FetchOutcome, Fetcher};
pub use frontier::Frontier;
pub use rate_limiter::CrawlRateLimiter;
