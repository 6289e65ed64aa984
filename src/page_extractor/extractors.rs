//! Per-page signal extractors.
//!
//! All extractors except [`extract_timing_info`] and [`capture_screenshot`]
//! work directly off the fetched HTML string via `scraper`, so the same code
//! path handles both plain-HTTP and headless-rendered fetches
//! section 4.3). The two exceptions need a live `Page` because the signal
//! (navigation timing, a rendered screenshot) only exists once Chrome has
//! painted the page.

use super::js_scripts::{SECURITY_SCRIPT, TIMING_SCRIPT};
use super::patterns;
use super::schema::{
    AiCrawlabilitySignals, ContentPatternSignals, CrawlLink, EeatSignals, FontResource,
    HeadingSignals, HreflangEntry, HreflangSignals, ImageResource, LinkSignals, MediaResource,
    MultimediaSignals, PageMetadata, ReadabilitySignals, ResourceInfo, SchemaOrgEntry,
    SchemaOrgSignals, ScriptResource, SecurityInfo, StructureSignals, StyleResource,
    TemporalSignals, TimingInfo,
};
use anyhow::{Context, Result};
use chromiumoxide::Page;
use chromiumoxide::cdp::browser_protocol::page::{
    CaptureScreenshotFormat, CaptureScreenshotParams,
};
use scraper::{Html, Selector};
use std::collections::HashMap;

fn sel(s: &str) -> Selector {
    Selector::parse(s).expect("static selector is valid")
}

fn text_of(el: &scraper::ElementRef) -> String {
    el.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `<meta>`/`<link>` derived page metadata.
#[must_use]
pub fn extract_metadata(doc: &Html, url: &str) -> PageMetadata {
    let meta_sel = sel("meta");
    let mut by_name: HashMap<String, String> = HashMap::new();
    for el in doc.select(&meta_sel) {
        let key = el
            .value()
            .attr("name")
            .or_else(|| el.value().attr("property"))
            .map(str::to_lowercase);
        if let (Some(key), Some(content)) = (key, el.value().attr("content")) {
            by_name.entry(key).or_insert_with(|| content.to_string());
        }
    }
    let language = doc
        .select(&sel("html"))
        .next()
        .and_then(|el| el.value().attr("lang"))
        .map(str::to_string);
    let canonical_url = doc
        .select(&sel(r#"link[rel="canonical"]"#))
        .next()
        .and_then(|el| el.value().attr("href"))
        .map(|href| resolve(url, href));

    PageMetadata {
        description: by_name.get("description").or_else(|| by_name.get("og:description")).cloned(),
        keywords: by_name.get("keywords").map(|k| k.split(',').map(|s| s.trim().to_string()).collect()),
        author: by_name.get("author").or_else(|| by_name.get("og:author")).cloned(),
        published_date: by_name.get("article:published_time").or_else(|| by_name.get("publisheddate")).cloned(),
        modified_date: by_name.get("article:modified_time").or_else(|| by_name.get("modifieddate")).cloned(),
        language,
        canonical_url,
        robots: by_name.get("robots").cloned(),
        viewport: by_name.get("viewport").cloned(),
        headers: HashMap::new(),
    }
}

fn resolve(base: &str, href: &str) -> String {
    url::Url::parse(base)
        .ok()
        .and_then(|b| b.join(href).ok())
        .map(|u| u.to_string())
        .unwrap_or_else(|| href.to_string())
}

#[must_use]
pub fn extract_resources(doc: &Html, base_url: &str) -> ResourceInfo {
    let scripts = doc
        .select(&sel("script[src]"))
        .filter_map(|el| {
            el.value().attr("src").map(|src| ScriptResource {
                url: Some(resolve(base_url, src)),
                inline: false,
                async_load: el.value().attr("async").is_some(),
                defer: el.value().attr("defer").is_some(),
                content_hash: None,
            })
        })
        .collect();
    let stylesheets = doc
        .select(&sel(r#"link[rel="stylesheet"]"#))
        .filter_map(|el| {
            el.value().attr("href").map(|href| StyleResource {
                url: Some(resolve(base_url, href)),
                inline: false,
                media: el.value().attr("media").map(str::to_string),
                content_hash: None,
            })
        })
        .collect();
    let images = doc
        .select(&sel("img[src]"))
        .filter_map(|el| {
            el.value().attr("src").map(|src| ImageResource {
                url: resolve(base_url, src),
                alt: el.value().attr("alt").map(str::to_string),
                dimensions: None,
                size_bytes: None,
                format: src.rsplit('.').next().map(|s| s.split('?').next().unwrap_or(s).to_string()),
            })
        })
        .collect();
    let media = doc
        .select(&sel("video, audio"))
        .filter_map(|el| {
            let tag = el.value().name().to_string();
            let src = el.value().attr("src").or_else(|| {
                el.select(&sel("source")).next().and_then(|s| s.value().attr("src"))
            })?;
            Some(MediaResource {
                url: resolve(base_url, src),
                media_type: tag,
                format: src.rsplit('.').next().map(str::to_string),
                duration: None,
                size_bytes: None,
            })
        })
        .collect();
    let fonts = doc
        .select(&sel(r#"link[rel="preload"][as="font"]"#))
        .filter_map(|el| {
            el.value().attr("href").map(|href| FontResource {
                url: Some(resolve(base_url, href)),
                format: el.value().attr("type").map(str::to_string),
                family: "unknown".to_string(),
                weight: None,
                style: None,
            })
        })
        .collect();

    ResourceInfo { scripts, stylesheets, images, media, fonts }
}

/// Body-text extraction: prefer `<article>`/`<main>`, fall back to `<body>`.
#[must_use]
pub fn extract_main_content(doc: &Html) -> String {
    for selector in ["article", "main", r#"[role="main"]"#] {
        if let Some(el) = doc.select(&sel(selector)).next() {
            let text = text_of(&el);
            if !text.is_empty() {
                return text;
            }
        }
    }
    doc.select(&sel("body")).next().map(|el| text_of(&el)).unwrap_or_default()
}

/// The same element `extract_main_content` prefers, as source HTML instead of
/// flattened text, for callers that render markdown from it.
#[must_use]
pub fn extract_main_content_html(doc: &Html) -> Option<String> {
    for selector in ["article", "main", r#"[role="main"]"#] {
        if let Some(el) = doc.select(&sel(selector)).next() {
            let html = el.html();
            if !html.is_empty() {
                return Some(html);
            }
        }
    }
    doc.select(&sel("body")).next().map(|el| el.html())
}

/// Crude syllable estimate (vowel-group count), good enough for Flesch
/// Reading Ease at the signal-quality this system needs.
fn count_syllables(word: &str) -> u32 {
    let word = word.to_lowercase();
    let mut count = 0u32;
    let mut prev_vowel = false;
    for c in word.chars() {
        let is_vowel = matches!(c, 'a' | 'e' | 'i' | 'o' | 'u' | 'y');
        if is_vowel && !prev_vowel {
            count += 1;
        }
        prev_vowel = is_vowel;
    }
    if word.ends_with('e') && count > 1 {
        count -= 1;
    }
    count.max(1)
}

#[must_use]
pub fn compute_readability(text: &str) -> ReadabilitySignals {
    let words: Vec<&str> = text.split_whitespace().collect();
    let word_count = words.len() as u32;
    let sentence_count = text
        .split(|c| c == '.' || c == '!' || c == '?')
        .filter(|s| !s.trim().is_empty())
        .count()
        .max(1) as u32;
    let syllables: u32 = words.iter().map(|w| count_syllables(w)).sum();

    let avg_words_per_sentence = f64::from(word_count) / f64::from(sentence_count);
    let avg_syllables_per_word = if word_count == 0 { 0.0 } else { f64::from(syllables) / f64::from(word_count) };
    let flesch_reading_ease = if word_count == 0 {
        0.0
    } else {
        206.835 - 1.015 * avg_words_per_sentence - 84.6 * avg_syllables_per_word
    };

    ReadabilitySignals {
        word_count,
        sentence_count,
        avg_words_per_sentence,
        avg_syllables_per_word,
        flesch_reading_ease,
    }
}

#[must_use]
pub fn extract_content_patterns(text: &str) -> ContentPatternSignals {
    ContentPatternSignals {
        question_count: patterns::QUESTION_PATTERN.find_iter(text).count() as u32,
        definition_count: patterns::DEFINITION_PATTERN.find_iter(text).count() as u32,
        comparison_count: patterns::COMPARISON_PATTERN.find_iter(text).count() as u32,
        statistic_count: patterns::STATISTIC_PATTERN.find_iter(text).count() as u32,
        citation_count: patterns::CITATION_PATTERN.find_iter(text).count() as u32,
        expert_mention_count: patterns::EXPERT_PATTERN.find_iter(text).count() as u32,
        semantic_triple_count: patterns::SEMANTIC_TRIPLE_PATTERN.find_iter(text).count() as u32,
    }
}

#[must_use]
pub fn extract_headings(doc: &Html) -> HeadingSignals {
    let mut signal = HeadingSignals::default();
    let mut last_level = 0u8;
    for el in doc.select(&sel("h1, h2, h3, h4, h5, h6")) {
        let level: u8 = el.value().name()[1..].parse().unwrap_or(1);
        match level {
            1 => signal.h1_count += 1,
            2 => signal.h2_count += 1,
            3 => signal.h3_count += 1,
            _ => signal.h4_plus_count += 1,
        }
        if last_level != 0 && level > last_level + 1 {
            signal.skips_levels = true;
        }
        last_level = level;
        signal.headings.push(text_of(&el));
    }
    signal.has_single_h1 = signal.h1_count == 1;
    signal
}

#[must_use]
pub fn extract_structure(doc: &Html, text: &str) -> StructureSignals {
    StructureSignals {
        list_count: doc.select(&sel("ul, ol")).count() as u32,
        table_count: doc.select(&sel("table")).count() as u32,
        code_block_count: doc.select(&sel("pre, code")).count() as u32,
        blockquote_count: doc.select(&sel("blockquote")).count() as u32,
        has_faq_section: text.to_lowercase().contains("frequently asked question")
            || doc.select(&sel(r#"[itemtype*="FAQPage"]"#)).next().is_some(),
        has_table_of_contents: doc.select(&sel(r#"[class*="toc"], [id*="toc"]"#)).next().is_some(),
    }
}

fn walk_schema_node(value: &serde_json::Value, depth: u32, out: &mut Vec<SchemaOrgEntry>) {
    if depth > 10 {
        return;
    }
    match value {
        serde_json::Value::Array(items) => {
            for item in items {
                walk_schema_node(item, depth + 1, out);
            }
        }
        serde_json::Value::Object(map) => {
            let schema_type = map.get("@type").and_then(|t| match t {
                serde_json::Value::String(s) => Some(s.clone()),
                serde_json::Value::Array(arr) => arr.first().and_then(|v| v.as_str()).map(str::to_string),
                _ => None,
            });
            out.push(SchemaOrgEntry { schema_type, raw: value.clone() });
            if let Some(graph) = map.get("@graph") {
                walk_schema_node(graph, depth + 1, out);
            }
        }
        _ => {}
    }
}

#[must_use]
pub fn extract_schema_org(doc: &Html) -> SchemaOrgSignals {
    let mut entries = Vec::new();
    for el in doc.select(&sel(r#"script[type="application/ld+json"]"#)) {
        let raw = el.text().collect::<String>();
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(&raw) {
            walk_schema_node(&value, 0, &mut entries);
        }
    }
    let types_present: Vec<String> = entries.iter().filter_map(|e| e.schema_type.clone()).collect();
    let has = |needle: &str| types_present.iter().any(|t| t.eq_ignore_ascii_case(needle));
    SchemaOrgSignals {
        has_article: has("Article") || has("NewsArticle") || has("BlogPosting"),
        has_faq_page: has("FAQPage"),
        has_how_to: has("HowTo"),
        has_breadcrumb_list: has("BreadcrumbList"),
        types_present,
        entries,
    }
}

#[must_use]
pub fn extract_eeat(doc: &Html, text: &str, path: &str) -> EeatSignals {
    EeatSignals {
        has_author_byline: doc.select(&sel(r#"[rel="author"], .author, [itemprop="author"]"#)).next().is_some(),
        has_author_bio: doc.select(&sel(r#"[class*="author-bio"], [class*="bio"]"#)).next().is_some(),
        expert_mention_count: patterns::EXPERT_PATTERN.find_iter(text).count() as u32,
        citation_count: patterns::CITATION_PATTERN.find_iter(text).count() as u32,
        is_trust_page: patterns::TRUST_PAGE_PATTERN.is_match(path),
        has_contact_info: patterns::EMAIL_PATTERN.is_match(text) || patterns::PHONE_PATTERN.is_match(text),
    }
}

#[must_use]
pub fn extract_link_signals(links: &[CrawlLink]) -> LinkSignals {
    let mut signals = LinkSignals::default();
    for link in links {
        if link.is_external {
            signals.external_link_count += 1;
            if let Ok(parsed) = url::Url::parse(&link.url) {
                if let Some(host) = parsed.host_str() {
                    if patterns::is_authority_host(host) {
                        signals.authority_link_count += 1;
                    }
                }
            }
        } else {
            signals.internal_link_count += 1;
        }
        if link.rel.to_lowercase().contains("nofollow") {
            signals.nofollow_link_count += 1;
        }
    }
    signals
}

/// Extract links from a parsed document, resolving relative `href`s and
/// classifying internal vs external against `base_url`'s host.
#[must_use]
pub fn extract_links(doc: &Html, base_url: &str) -> Vec<CrawlLink> {
    let base_host = url::Url::parse(base_url).ok().and_then(|u| u.host_str().map(str::to_string));
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for el in doc.select(&sel("a[href]")) {
        let Some(href) = el.value().attr("href") else { continue };
        let Some(parsed) = url::Url::parse(base_url).ok().and_then(|b| b.join(href).ok()) else { continue };
        if !matches!(parsed.scheme(), "http" | "https") {
            continue;
        }
        let absolute = parsed.to_string();
        if !seen.insert(absolute.clone()) {
            continue;
        }
        let is_external = base_host.as_deref() != parsed.host_str();
        out.push(CrawlLink {
            url: absolute,
            text: text_of(&el),
            title: el.value().attr("title").unwrap_or_default().to_string(),
            rel: el.value().attr("rel").unwrap_or_default().to_string(),
            is_external,
            path: parsed.path().to_string(),
        });
    }
    out
}

#[must_use]
pub fn extract_hreflang(doc: &Html, base_url: &str) -> HreflangSignals {
    let mut alternates = Vec::new();
    let mut has_x_default = false;
    for el in doc.select(&sel(r#"link[rel="alternate"][hreflang]"#)) {
        let (Some(lang), Some(href)) = (el.value().attr("hreflang"), el.value().attr("href")) else { continue };
        if lang.eq_ignore_ascii_case("x-default") {
            has_x_default = true;
        }
        alternates.push(HreflangEntry { lang: lang.to_string(), href: resolve(base_url, href) });
    }
    HreflangSignals { alternates, has_x_default }
}

#[must_use]
pub fn extract_temporal(metadata: &PageMetadata, text: &str) -> TemporalSignals {
    let visible_year_mentions: Vec<u32> = patterns::YEAR_PATTERN
        .find_iter(text)
        .filter_map(|m| m.as_str().parse().ok())
        .collect();

    // Cascade: explicit modified/published metadata beats a month-year mention,
    // which beats the most recent bare year seen in visible text.
    let resolved_content_date = metadata
        .modified_date
        .clone()
        .or_else(|| metadata.published_date.clone())
        .or_else(|| patterns::MONTH_YEAR_PATTERN.find(text).map(|m| m.as_str().to_string()))
        .or_else(|| visible_year_mentions.iter().max().map(u32::to_string));

    TemporalSignals {
        meta_published_date: metadata.published_date.clone(),
        meta_modified_date: metadata.modified_date.clone(),
        has_relative_time_language: patterns::RELATIVE_TIME_PATTERN.is_match(text),
        has_as_of_language: patterns::AS_OF_PATTERN.is_match(text),
        has_outdated_language: patterns::OUTDATED_PATTERN.is_match(text),
        visible_year_mentions,
        resolved_content_date,
    }
}

#[must_use]
pub fn extract_multimedia(doc: &Html, resources: &ResourceInfo) -> MultimediaSignals {
    let images_with_alt_count =
        resources.images.iter().filter(|img| img.alt.as_deref().is_some_and(|a| !a.is_empty())).count() as u32;
    MultimediaSignals {
        image_count: resources.images.len() as u32,
        images_with_alt_count,
        video_count: doc.select(&sel("video")).count() as u32,
        audio_count: doc.select(&sel("audio")).count() as u32,
        has_transcript: doc.select(&sel(r#"[class*="transcript"], [id*="transcript"]"#)).next().is_some(),
    }
}

#[must_use]
pub fn extract_ai_crawlability(metadata: &PageMetadata, main_content: &str, body_html_len: usize) -> AiCrawlabilitySignals {
    let robots = metadata.robots.as_deref().unwrap_or_default().to_lowercase();
    AiCrawlabilitySignals {
        robots_allows_ai_agents: !robots.contains("noai") && !robots.contains("noindex"),
        has_llms_txt_reference: false,
        content_requires_js: main_content.len() < 200 && body_html_len > 2000,
        main_content_char_count: main_content.len() as u32,
    }
}

/// Navigation-timing readout. Only meaningful once Chrome has painted the
/// page, so this is the one extractor that still needs a live `Page`.
pub async fn extract_timing_info(page: &Page) -> Result<TimingInfo> {
    let js_result = page
        .evaluate(TIMING_SCRIPT)
        .await
        .context("failed to execute timing extraction script")?;
    let timing: TimingInfo = js_result
        .into_value()
        .context("failed to parse timing info from JS result")?;
    Ok(timing)
}

pub async fn extract_security_info(page: &Page) -> Result<SecurityInfo> {
    let js_result = page
        .evaluate(SECURITY_SCRIPT)
        .await
        .context("failed to execute security extraction script")?;
    let security: SecurityInfo = js_result
        .into_value()
        .context("failed to parse security info from JS result")?;
    Ok(security)
}

/// Capture a full-page screenshot and write it to
/// `<output_dir>/screenshots/<12-hex-char content hash>.jpg`.
pub async fn capture_screenshot(page: &Page, url: &str, output_dir: &std::path::Path) -> Result<std::path::PathBuf> {
    let hash = xxhash_rust::xxh3::xxh3_64(url.as_bytes());
    let dir = output_dir.join("screenshots");
    tokio::fs::create_dir_all(&dir).await.context("failed to create screenshots directory")?;
    let path = dir.join(format!("{hash:012x}.jpg"));

    let params = CaptureScreenshotParams {
        quality: Some(i64::from(crate::utils::SCREENSHOT_QUALITY)),
        format: Some(CaptureScreenshotFormat::Jpeg),
        capture_beyond_viewport: Some(true),
        ..Default::default()
    };
    let bytes = page.screenshot(params).await.map_err(|e| anyhow::anyhow!("failed to capture screenshot: {e}"))?;
    tokio::fs::write(&path, bytes).await.context("failed to write screenshot")?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn main_content_prefers_article_tag() {
        let doc = Html::parse_document("<html><body><nav>nav text</nav><article>Main story here.</article></body></html>");
        assert_eq!(extract_main_content(&doc), "Main story here.");
    }

    #[test]
    fn readability_counts_words_and_sentences() {
        let r = compute_readability("This is a test. It has two sentences.");
        assert_eq!(r.sentence_count, 2);
        assert!(r.word_count >= 8);
    }

    #[test]
    fn heading_hierarchy_flags_level_skip() {
        let doc = Html::parse_document("<html><body><h1>A</h1><h3>B</h3></body></html>");
        let h = extract_headings(&doc);
        assert!(h.skips_levels);
        assert_eq!(h.h1_count, 1);
    }

    #[test]
    fn schema_org_walk_finds_nested_graph_types() {
        let doc = Html::parse_document(
            r#"<html><head><script type="application/ld+json">{"@graph":[{"@type":"Article"},{"@type":"FAQPage"}]}</script></head></html>"#,
        );
        let s = extract_schema_org(&doc);
        assert!(s.has_article);
        assert!(s.has_faq_page);
    }

    #[test]
    fn links_classify_internal_vs_external() {
        let doc = Html::parse_document(
            r#"<html><body><a href="/a">in</a><a href="https://other.com/b">out</a></body></html>"#,
        );
        let links = extract_links(&doc, "https://example.com/");
        assert_eq!(links.iter().filter(|l| !l.is_external).count(), 1);
        assert_eq!(links.iter().filter(|l| l.is_external).count(), 1);
    }
}
