//! Sitemap ingestion: XML/gzip parsing, index recursion, robots.txt
//! discovery, and the SSRF guard.
//!
//! Grounded on `crawler_spider.py`'s `_get_sitemap_body`, `_parse_sitemap`,
//! `_is_private_ip`, and `_validate_sitemap_url_security`.

use anyhow::{bail, Context, Result};
use std::io::Read;
use std::net::{IpAddr, SocketAddr, ToSocketAddrs};

/// Sitemap index/urlset recursion cap.
pub const SITEMAP_MAX_RECURSION_DEPTH: u32 = 5;
/// Total page URLs a single job will accept from sitemap traversal.
pub const SITEMAP_MAX_URLS: usize = 100_000;
/// Decompressed-size ceiling for gzipped sitemaps.
const MAX_DECOMPRESSED_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct SitemapUrlEntry {
    pub loc: String,
    /// `true` when this entry came from an `xhtml:link rel="alternate"` tag
    /// rather than the entry's own `<loc>`.
    pub is_alternate: bool,
}

#[derive(Debug, Default)]
pub struct SitemapOutcome {
    pub urls: Vec<SitemapUrlEntry>,
    pub truncated: bool,
    pub recursion_limit_hit: bool,
}

/// Resolve `host` and fail closed (reject) if resolution fails or the
/// address is private, loopback, or link-local.
fn is_public_host(host: &str) -> bool {
    let addrs = match (host, 443).to_socket_addrs() {
        Ok(it) => it,
        Err(_) => return false,
    };
    let mut saw_any = false;
    for addr in addrs {
        saw_any = true;
        if !is_public_ip(addr.ip()) {
            return false;
        }
    }
    saw_any
}

fn is_public_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => !(v4.is_private() || v4.is_loopback() || v4.is_link_local() || v4.is_unspecified()),
        IpAddr::V6(v6) => !(v6.is_loopback() || v6.is_unspecified() || (v6.segments()[0] & 0xffc0) == 0xfe80),
    }
}

/// Every sitemap fetch must be HTTPS with a publicly-routable resolved host.
pub fn validate_sitemap_url_security(url: &str) -> Result<()> {
    let parsed = url::Url::parse(url).context("invalid sitemap URL")?;
    if parsed.scheme() != "https" {
        bail!("sitemap URL must use https: {url}");
    }
    let host = parsed.host_str().context("sitemap URL has no host")?;
    if !is_public_host(host) {
        bail!("sitemap URL resolves to a private/loopback/link-local address: {url}");
    }
    Ok(())
}

fn looks_gzipped(bytes: &[u8]) -> bool {
    bytes.len() >= 2 && bytes[0] == 0x1f && bytes[1] == 0x8b
}

fn decompress_gzip(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = flate2::read::GzDecoder::new(bytes);
    let mut out = Vec::new();
    let mut limited = (&mut decoder).take(MAX_DECOMPRESSED_BYTES as u64 + 1);
    limited.read_to_end(&mut out).context("gzip decompression failed")?;
    if out.len() as u64 > MAX_DECOMPRESSED_BYTES as u64 {
        bail!("decompressed sitemap exceeds {MAX_DECOMPRESSED_BYTES} bytes");
    }
    Ok(out)
}

/// Extract `Sitemap:` directives from robots.txt bytes.
#[must_use]
pub fn sitemap_urls_from_robots(body: &str) -> Vec<String> {
    body.lines()
        .filter_map(|line| {
            let line = line.trim();
            let rest = line
                .strip_prefix("Sitemap:")
                .or_else(|| line.strip_prefix("sitemap:"))?;
            Some(rest.trim().to_string())
        })
        .collect()
}

enum ParsedSitemap {
    UrlSet(Vec<SitemapUrlEntry>),
    SitemapIndex(Vec<String>),
}

fn parse_sitemap_xml(body: &str, alternate_links: bool) -> Result<ParsedSitemap> {
    if body.contains("<sitemapindex") {
        let mut out = Vec::new();
        for loc in extract_tag_text(body, "loc") {
            out.push(loc);
        }
        return Ok(ParsedSitemap::SitemapIndex(out));
    }
    if body.contains("<urlset") {
        let mut out = Vec::new();
        for (block_loc, block) in extract_url_blocks(body) {
            out.push(SitemapUrlEntry {
                loc: block_loc,
                is_alternate: false,
            });
            if alternate_links {
                for alt in extract_alternate_hrefs(&block) {
                    out.push(SitemapUrlEntry {
                        loc: alt,
                        is_alternate: true,
                    });
                }
            }
        }
        return Ok(ParsedSitemap::UrlSet(out));
    }
    bail!("sitemap body is neither a urlset nor a sitemapindex")
}

/// Very small, dependency-free XML scan: good enough for the flat, predictable
/// structure of sitemap files without pulling in a full XML parser for a
/// single use site.
fn extract_tag_text(body: &str, tag: &str) -> Vec<String> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let mut out = Vec::new();
    let mut rest = body;
    while let Some(start) = rest.find(&open) {
        let after = &rest[start + open.len()..];
        if let Some(end) = after.find(&close) {
            out.push(after[..end].trim().to_string());
            rest = &after[end + close.len()..];
        } else {
            break;
        }
    }
    out
}

fn extract_url_blocks(body: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    let mut rest = body;
    while let Some(start) = rest.find("<url>") {
        let after = &rest[start + "<url>".len()..];
        if let Some(end) = after.find("</url>") {
            let block = &after[..end];
            if let Some(loc) = extract_tag_text(block, "loc").into_iter().next() {
                out.push((loc, block.to_string()));
            }
            rest = &after[end + "</url>".len()..];
        } else {
            break;
        }
    }
    out
}

fn extract_alternate_hrefs(block: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut rest = block;
    while let Some(start) = rest.find("rel=\"alternate\"") {
        let before = &rest[..start];
        if let Some(href_start) = before.rfind("href=\"") {
            let after_href = &before[href_start + "href=\"".len()..];
            if let Some(end) = after_href.find('"') {
                out.push(after_href[..end].to_string());
            }
        }
        rest = &rest[start + "rel=\"alternate\"".len()..];
    }
    out
}

/// Fetch and fully expand a sitemap (or `/robots.txt`) into a bounded list of
/// page URLs, recursing into `sitemapindex` entries up to
/// `SITEMAP_MAX_RECURSION_DEPTH` and stopping at `SITEMAP_MAX_URLS`.
pub async fn ingest(
    client: &reqwest::Client,
    start_url: &str,
    alternate_links: bool,
) -> Result<SitemapOutcome> {
    let mut outcome = SitemapOutcome::default();
    let mut stack = vec![(start_url.to_string(), 0u32)];

    while let Some((url, depth)) = stack.pop() {
        if depth >= SITEMAP_MAX_RECURSION_DEPTH {
            outcome.recursion_limit_hit = true;
            continue;
        }
        // DNS resolution is blocking; keep it off the async executor thread.
        let check_url = url.clone();
        let security_ok = tokio::task::spawn_blocking(move || validate_sitemap_url_security(&check_url).is_ok())
            .await
            .unwrap_or(false);
        if !security_ok {
            tracing::warn!(url, "rejecting sitemap URL that failed the SSRF guard");
            continue;
        }

        let bytes = match client.get(&url).send().await {
            Ok(resp) => match resp.bytes().await {
                Ok(b) => b.to_vec(),
                Err(_) => continue,
            },
            Err(_) => continue,
        };

        if url.ends_with("/robots.txt") {
            let text = String::from_utf8_lossy(&bytes).to_string();
            for sitemap_url in sitemap_urls_from_robots(&text) {
                stack.push((sitemap_url, depth));
            }
            continue;
        }

        let body = if looks_gzipped(&bytes) || url.ends_with(".gz") {
            match decompress_gzip(&bytes) {
                Ok(b) => b,
                Err(e) => {
                    tracing::warn!(url, error = %e, "skipping oversized/invalid gzipped sitemap");
                    continue;
                }
            }
        } else {
            bytes
        };
        let text = String::from_utf8_lossy(&body).to_string();

        match parse_sitemap_xml(&text, alternate_links) {
            Ok(ParsedSitemap::SitemapIndex(children)) => {
                for child in children {
                    stack.push((child, depth + 1));
                }
            }
            Ok(ParsedSitemap::UrlSet(entries)) => {
                for entry in entries {
                    if outcome.urls.len() >= SITEMAP_MAX_URLS {
                        outcome.truncated = true;
                        break;
                    }
                    outcome.urls.push(entry);
                }
            }
            Err(e) => tracing::warn!(url, error = %e, "unrecognized sitemap body"),
        }
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_https_sitemap_urls() {
        assert!(validate_sitemap_url_security("http://example.com/sitemap.xml").is_err());
    }

    #[test]
    fn rejects_loopback_resolved_sitemap_urls() {
        assert!(validate_sitemap_url_security("https://127.0.0.1/sitemap.xml").is_err());
    }

    #[test]
    fn parses_urlset_locs() {
        let xml = r#"<urlset><url><loc>https://example.com/a</loc></url><url><loc>https://example.com/b</loc></url></urlset>"#;
        match parse_sitemap_xml(xml, false).unwrap() {
            ParsedSitemap::UrlSet(entries) => assert_eq!(entries.len(), 2),
            ParsedSitemap::SitemapIndex(_) => panic!("expected urlset"),
        }
    }

    #[test]
    fn parses_sitemapindex_locs() {
        let xml = r#"<sitemapindex><sitemap><loc>https://example.com/s1.xml</loc></sitemap></sitemapindex>"#;
        match parse_sitemap_xml(xml, false).unwrap() {
            ParsedSitemap::SitemapIndex(children) => assert_eq!(children, vec!["https://example.com/s1.xml"]),
            ParsedSitemap::UrlSet(_) => panic!("expected index"),
        }
    }

    #[test]
    fn extracts_sitemap_directive_from_robots_txt() {
        let robots = "User-agent: *\nDisallow: /admin\nSitemap: https://example.com/sitemap.xml\n";
        assert_eq!(
            sitemap_urls_from_robots(robots),
            vec!["https://example.com/sitemap.xml".to_string()]
        );
    }

    #[test]
    fn gzip_magic_number_detection() {
        assert!(looks_gzipped(&[0x1f, 0x8b, 0x08]));
        assert!(!looks_gzipped(b"<urlset>"));
    }
}
