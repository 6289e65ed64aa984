//! Per-host politeness throttle.
//!
//! Token bucket keyed by host: `DashMap` for domain lookups, a small `Mutex`
//! around each bucket's `(tokens, last_refill_nanos)` pair held only for the
//! arithmetic itself. One instance is owned by the worker's frontier and
//! scoped to a single job; there is no cross-job/global rate limiting.

use dashmap::DashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Scaling factor for fixed-point token arithmetic (1000x precision)
const TOKEN_SCALE: u64 = 1000;

/// Scaling factor for nanosecond rate calculations
const RATE_SCALE: u64 = 1_000_000;

/// Rate limit decision for a crawl request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    /// Request is allowed to proceed
    Allow,
    /// Request should be denied/deferred due to rate limiting
    /// Contains the duration to wait before retrying
    Deny { retry_after: Duration },
}

/// Per-domain rate limiter using a token bucket algorithm.
#[derive(Debug)]
struct DomainRateLimiter {
    /// `(tokens, last_refill_nanos)`, both scaled per the constants above.
    state: Mutex<(u64, u64)>,
    /// Rate in tokens per nanosecond scaled by `TOKEN_SCALE` * `RATE_SCALE`
    rate_per_nano: u64,
    /// Maximum tokens scaled by `TOKEN_SCALE`
    max_tokens: u64,
}

impl DomainRateLimiter {
    /// Create a new domain rate limiter with the specified rate
    #[inline]
    fn new(rate_rps: f64, base_time: &Instant) -> Self {
        let max_tokens = (rate_rps.max(1.0) * TOKEN_SCALE as f64) as u64;
        let rate_per_nano =
            ((rate_rps * TOKEN_SCALE as f64 * RATE_SCALE as f64) / 1_000_000_000.0) as u64;

        let now_nanos = base_time.elapsed().as_nanos() as u64;

        Self {
            state: Mutex::new((max_tokens, now_nanos)),
            rate_per_nano,
            max_tokens,
        }
    }

    /// Attempt to consume one token from the bucket.
    ///
    /// Returns Allow if a token was available and consumed.
    /// Returns Deny with retry_after duration if insufficient tokens.
    async fn try_consume_token(&self, base_time: &Instant) -> RateLimitDecision {
        let now_nanos = base_time.elapsed().as_nanos() as u64;
        let mut state = self.state.lock().expect("rate limiter mutex poisoned");

        let (current_tokens, last_refill) = *state;
        let (tokens, last_refill) = self.refill(current_tokens, last_refill, now_nanos);

        if tokens < TOKEN_SCALE {
            *state = (tokens, last_refill);
            let tokens_needed = TOKEN_SCALE.saturating_sub(tokens);
            let nanos_needed = if self.rate_per_nano > 0 {
                (tokens_needed.saturating_mul(RATE_SCALE)) / self.rate_per_nano
            } else {
                1_000_000 // 1ms default
            };
            return RateLimitDecision::Deny { retry_after: Duration::from_nanos(nanos_needed) };
        }

        *state = (tokens - TOKEN_SCALE, last_refill);
        RateLimitDecision::Allow
    }

    /// Refill tokens based on elapsed time since last refill. Preserves
    /// fractional nanoseconds by only advancing the timestamp by the time
    /// that actually produced tokens.
    fn refill(&self, current_tokens: u64, last_refill: u64, now_nanos: u64) -> (u64, u64) {
        if now_nanos <= last_refill {
            return (current_tokens, last_refill);
        }

        let elapsed_nanos = now_nanos.saturating_sub(last_refill);
        let tokens_to_add = (elapsed_nanos.saturating_mul(self.rate_per_nano)) / RATE_SCALE;

        let time_credited_nanos = if self.rate_per_nano > 0 {
            (tokens_to_add.saturating_mul(RATE_SCALE)) / self.rate_per_nano
        } else {
            0
        };

        let new_last_refill = last_refill.saturating_add(time_credited_nanos);
        let new_tokens = if tokens_to_add > 0 {
            current_tokens.saturating_add(tokens_to_add).min(self.max_tokens)
        } else {
            current_tokens
        };

        (new_tokens, new_last_refill)
    }
}

/// Per-job, per-host rate limiter with isolated state.
pub struct CrawlRateLimiter {
    /// Per-domain rate limiter cache (lock-free concurrent map)
    cache: DashMap<String, Arc<DomainRateLimiter>>,
    /// Base time for all time calculations in this instance
    base_time: Instant,
}

impl Default for CrawlRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl CrawlRateLimiter {
    /// Create a new rate limiter instance with isolated state
    ///
    /// Each instance has its own domain cache and time reference,
    /// enabling test isolation when running tests in parallel.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cache: DashMap::new(),
            base_time: Instant::now(),
        }
    }

    /// Check if a crawl request to the given URL should be rate limited
    ///
    /// # Arguments
    ///
    /// * `url` - The URL being requested
    /// * `rate_rps` - Maximum requests per second allowed for this domain
    ///
    /// # Returns
    ///
    /// * `RateLimitDecision::Allow` - Request can proceed
    /// * `RateLimitDecision::Deny { retry_after }` - Request should wait
    pub async fn check(&self, url: &str, rate_rps: f64) -> RateLimitDecision {
        if rate_rps <= 0.0 {
            return RateLimitDecision::Allow;
        }

        let domain = match extract_domain(url) {
            Some(domain) if !domain.is_empty() => domain,
            _ => return RateLimitDecision::Allow,
        };

        self.check_domain(&domain, rate_rps).await
    }

    /// Check rate limit for a specific domain (lock-free)
    async fn check_domain(&self, domain: &str, rate_rps: f64) -> RateLimitDecision {
        let limiter = Arc::clone(
            self.cache
                .entry(domain.to_string())
                .or_insert_with(|| Arc::new(DomainRateLimiter::new(rate_rps, &self.base_time)))
                .value()
        );
        
        limiter.try_consume_token(&self.base_time).await
    }

    /// Clear all domain rate limiters in this instance
    pub async fn clear(&self) {
        self.cache.clear();
    }

    /// Get the number of domains currently being tracked
    pub async fn tracked_count(&self) -> usize {
        self.cache.len()
    }
}

/// Extract a lowercased, `www.`-stripped host from a URL for bucketing.
#[inline]
#[must_use]
pub fn extract_domain(url: &str) -> Option<String> {
    let after_scheme = url.find("://").map_or(url, |i| &url[i + 3..]);
    let domain_end = after_scheme
        .find(['/', '?', '#', ':'])
        .unwrap_or(after_scheme.len());
    let domain = &after_scheme[..domain_end];
    let normalized = domain.strip_prefix("www.").unwrap_or(domain);
    Some(normalized.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_immediate_request_is_denied_at_low_rate() {
        let limiter = CrawlRateLimiter::new();
        assert_eq!(
            limiter.check("https://example.com/a", 1.0).await,
            RateLimitDecision::Allow
        );
        assert!(matches!(
            limiter.check("https://example.com/b", 1.0).await,
            RateLimitDecision::Deny { .. }
        ));
    }

    #[tokio::test]
    async fn zero_rate_always_allows() {
        let limiter = CrawlRateLimiter::new();
        for _ in 0..5 {
            assert_eq!(
                limiter.check("https://example.com/", 0.0).await,
                RateLimitDecision::Allow
            );
        }
    }

    #[test]
    fn extract_domain_strips_www_and_scheme() {
        assert_eq!(
            extract_domain("https://www.example.com/path?q=1"),
            Some("example.com".to_string())
        );
        assert_eq!(extract_domain("example.com/x"), Some("example.com".to_string()));
    }
}
