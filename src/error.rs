//! Shared error types for the crawl engine and supervisor.
//!
//! Library-boundary errors are small enums implementing `std::error::Error`;
//! internal call sites propagate `anyhow::Result` and attach context with
//! `.context(...)`, converting to `CrawlError`/`SupervisorError` only at the
//! boundary where a typed error is required by a caller.

use std::fmt;

/// Errors surfaced across a worker's public boundary (orchestrator, fetcher wiring).
#[derive(Debug, Clone)]
pub enum CrawlError {
    /// Job configuration was missing a required field or held an invalid value.
    ConfigError(String),
    /// Headless-renderer adapter failed (launch, navigation, CDP session).
    BrowserError(String),
    /// Plain-HTTP transport failure (DNS, connect, TLS, timeout).
    NetworkError(String),
    /// A pause/kill signal interrupted the crawl before natural completion.
    Cancelled,
    /// Anything else, with the originating error chain preserved as text.
    Other(String),
}

impl fmt::Display for CrawlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigError(msg) => write!(f, "configuration error: {msg}"),
            Self::BrowserError(msg) => write!(f, "browser error: {msg}"),
            Self::NetworkError(msg) => write!(f, "network error: {msg}"),
            Self::Cancelled => write!(f, "crawl was cancelled"),
            Self::Other(msg) => write!(f, "crawl error: {msg}"),
        }
    }
}

impl std::error::Error for CrawlError {}

impl From<anyhow::Error> for CrawlError {
    fn from(err: anyhow::Error) -> Self {
        // {:#} preserves the full `.context(...)` chain, not just the top frame.
        Self::Other(format!("{err:#}"))
    }
}

/// Convenience alias for worker-boundary results.
pub type CrawlResult<T> = Result<T, CrawlError>;

/// Errors surfaced by the supervisor's HTTP handlers.
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("job {0} is already tracked")]
    AlreadyTracked(String),
    #[error("job {0} is not running")]
    NotRunning(String),
    #[error("job {0} is not paused")]
    NotPaused(String),
    #[error("job {0} is already terminal")]
    AlreadyTerminal(String),
    #[error("job {0} not found")]
    NotFound(String),
    #[error("unauthorized")]
    Unauthorized,
    #[error("failed to spawn worker: {0}")]
    SpawnFailed(String),
}

/// Categorizes page/job failures for retry policy decisions.
///
/// Network errors are usually transient and retried aggressively; content
/// extraction failures are usually permanent and not retried at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Network,
    Browser,
    ContentExtraction,
    RateLimited,
    Unknown,
}

impl FailureKind {
    /// Classify an error into a failure kind based on message substrings.
    #[must_use]
    pub fn classify(error: &anyhow::Error) -> Self {
        let msg = error.to_string().to_lowercase();

        if msg.contains("429") || msg.contains("too many requests") || msg.contains("rate limit") {
            return Self::RateLimited;
        }
        if msg.contains("timeout")
            || msg.contains("timed out")
            || msg.contains("connection refused")
            || msg.contains("connection reset")
            || msg.contains("dns")
            || msg.contains("network")
            || msg.contains("unreachable")
            || msg.contains("eof")
        {
            return Self::Network;
        }
        if msg.contains("browser")
            || msg.contains("chrome")
            || msg.contains("cdp")
            || msg.contains("target closed")
            || msg.contains("session")
        {
            return Self::Browser;
        }
        if msg.contains("extract")
            || msg.contains("validation")
            || msg.contains("html")
            || msg.contains("parse")
            || msg.contains("selector")
        {
            return Self::ContentExtraction;
        }
        Self::Unknown
    }

    /// Whether this failure kind should be retried by default.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        match self {
            Self::Network | Self::Browser | Self::RateLimited | Self::Unknown => true,
            Self::ContentExtraction => false,
        }
    }

    /// Base delay multiplier applied on top of the retry backoff schedule.
    #[must_use]
    pub const fn delay_multiplier(self) -> f64 {
        match self {
            Self::Network => 1.0,
            Self::Browser => 1.5,
            Self::RateLimited => 3.0,
            Self::ContentExtraction | Self::Unknown => 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_rate_limit_before_network() {
        let err = anyhow::anyhow!("HTTP 429 Too Many Requests after timeout");
        assert_eq!(FailureKind::classify(&err), FailureKind::RateLimited);
    }

    #[test]
    fn classifies_dns_as_network() {
        let err = anyhow::anyhow!("dns error: failed to lookup address information");
        assert_eq!(FailureKind::classify(&err), FailureKind::Network);
    }

    #[test]
    fn content_extraction_is_not_retryable() {
        assert!(!FailureKind::ContentExtraction.is_retryable());
        assert!(FailureKind::Network.is_retryable());
    }

    #[test]
    fn crawl_error_preserves_context_chain() {
        let inner = anyhow::anyhow!("root cause").context("while fetching");
        let err: CrawlError = inner.into();
        assert!(err.to_string().contains("root cause"));
    }
}
