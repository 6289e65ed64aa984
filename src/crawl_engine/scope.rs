//! URL normalization and scope filtering.
//!
//! Grounded on `crawler_spider.py`'s `_normalize_url`, `_get_domain`,
//! `_matches_scope`, and `_is_under_path`.

use crate::model::Scope;
use url::Url;

/// Normalize a URL for dedup purposes: lowercase scheme + host, strip a
/// trailing `/` from the path, preserve the query string verbatim.
///
/// Idempotent: `normalize(normalize(u)) == normalize(u)`.
#[must_use]
pub fn normalize(url: &str) -> Option<String> {
    let mut parsed = Url::parse(url).ok()?;
    let _ = parsed.set_scheme(&parsed.scheme().to_lowercase());
    if let Some(host) = parsed.host_str() {
        let host = host.to_lowercase();
        let _ = parsed.set_host(Some(&host));
    }
    let path = parsed.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        parsed.set_path(path.trim_end_matches('/'));
    }
    Some(parsed.to_string())
}

/// Root domain is the last two dotted labels (`blog.example.co.uk` -> `co.uk`
/// in this simplified scheme, matching the source's two-label heuristic
/// rather than a public-suffix-list lookup).
#[must_use]
pub fn root_domain(host: &str) -> String {
    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() <= 2 {
        host.to_lowercase()
    } else {
        labels[labels.len() - 2..].join(".").to_lowercase()
    }
}

/// One seed URL's scope-relevant components.
#[derive(Debug, Clone)]
pub struct ScopeSeed {
    pub netloc: String,
    pub root_domain: String,
    pub path: String,
}

impl ScopeSeed {
    #[must_use]
    pub fn from_url(url: &str) -> Option<Self> {
        let parsed = Url::parse(url).ok()?;
        let host = parsed.host_str()?.to_lowercase();
        let netloc = match parsed.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.clone(),
        };
        Some(Self {
            netloc,
            root_domain: root_domain(&host),
            path: parsed.path().to_string(),
        })
    }
}

/// A candidate path is "under" a base path when it equals it byte-for-byte or
/// continues past a `/` boundary. An empty/root base matches everything.
#[must_use]
pub fn is_under_path(base_path: &str, candidate_path: &str) -> bool {
    let base = base_path.trim_end_matches('/');
    if base.is_empty() {
        return true;
    }
    candidate_path == base || candidate_path.starts_with(&format!("{base}/"))
}

fn matches_one(seed: &ScopeSeed, candidate: &ScopeSeed, scope: Scope) -> bool {
    match scope {
        Scope::Subdomain => seed.netloc == candidate.netloc,
        Scope::Domain => seed.root_domain == candidate.root_domain,
        Scope::Subfolder | Scope::SubdomainSubfolder => {
            seed.netloc == candidate.netloc && is_under_path(&seed.path, &candidate.path)
        }
    }
}

/// A candidate URL is in scope when ANY seed accepts it.
#[must_use]
pub fn in_scope(seeds: &[ScopeSeed], candidate_url: &str, scope: Scope) -> bool {
    let Some(candidate) = ScopeSeed::from_url(candidate_url) else {
        return false;
    };
    seeds.iter().any(|seed| matches_one(seed, &candidate, scope))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_is_idempotent() {
        let u = "HTTPS://Example.COM/Path/?x=1";
        let once = normalize(u).unwrap();
        let twice = normalize(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn normalize_strips_trailing_slash_but_keeps_query() {
        let n = normalize("https://example.com/blog/?x=1").unwrap();
        assert_eq!(n, "https://example.com/blog?x=1");
    }

    #[test]
    fn normalize_preserves_root_slash() {
        let n = normalize("https://example.com/").unwrap();
        assert_eq!(n, "https://example.com/");
    }

    #[test]
    fn subfolder_boundary_rejects_prefix_collision() {
        assert!(is_under_path("/blog", "/blog"));
        assert!(is_under_path("/blog", "/blog/x"));
        assert!(!is_under_path("/blog", "/blogger"));
    }

    #[test]
    fn root_domain_takes_last_two_labels() {
        assert_eq!(root_domain("blog.example.com"), "example.com");
        assert_eq!(root_domain("example.com"), "example.com");
    }

    #[test]
    fn domain_scope_accepts_any_subdomain() {
        let seeds = vec![ScopeSeed::from_url("https://www.example.com/").unwrap()];
        assert!(in_scope(&seeds, "https://blog.example.com/post", Scope::Domain));
        assert!(!in_scope(&seeds, "https://other.com/post", Scope::Domain));
    }

    #[test]
    fn subdomain_scope_requires_exact_host() {
        let seeds = vec![ScopeSeed::from_url("https://www.example.com/").unwrap()];
        assert!(!in_scope(&seeds, "https://blog.example.com/post", Scope::Subdomain));
        assert!(in_scope(&seeds, "https://www.example.com/post", Scope::Subdomain));
    }

    proptest::proptest! {
        #[test]
        fn normalize_is_idempotent_over_generated_paths(
            host in "[a-z]{3,10}\\.(com|net|org)",
            path in "[a-zA-Z0-9/]{0,20}",
        ) {
            let url = format!("https://{host}/{path}");
            if let Some(once) = normalize(&url) {
                let twice = normalize(&once).unwrap();
                proptest::prop_assert_eq!(once, twice);
            }
        }
    }
}
