//! Orchestrates the full per-page signal extraction pass.
//!
//! Runs every extractor over a single fetched document and assembles one
//! record, the way a top-level signal dispatcher would.

use super::extractors;
use super::schema::PageResult;
use anyhow::Result;
use chromiumoxide::Page;
use scraper::Html;

/// Ships enough body text for the GEO/SEO signals to be meaningful without
/// forwarding megabyte-scale pages to the backend.
const MAIN_CONTENT_CHAR_CAP: usize = 50_000;

/// Truncate at the last whitespace/punctuation boundary before the cap so the
/// shipped excerpt doesn't end mid-word.
fn truncate_main_content(text: &str) -> String {
    crate::utils::truncate_at_boundary(text, MAIN_CONTENT_CHAR_CAP, ",;:.!?").to_string()
}

/// Inputs common to both the plain-HTTP and headless-rendered fetch paths.
pub struct PageInput<'a> {
    pub url: &'a str,
    pub html: &'a str,
    pub status_code: Option<u16>,
    pub rendered: bool,
}

/// Build a [`PageResult`] from fetched HTML. When `page` is `Some`, the page
/// was rendered and we also pull navigation timing, a live security readout,
/// and a screenshot.
pub async fn extract_page_result(
    input: PageInput<'_>,
    page: Option<&Page>,
    screenshot_dir: Option<&std::path::Path>,
    render_markdown: bool,
) -> Result<PageResult> {
    let url = input.url;

    #[allow(clippy::type_complexity)]
    let (
        metadata,
        resources,
        main_content,
        markdown_content,
        links,
        headings,
        structure,
        schema_org,
        multimedia,
        hreflang,
        readability,
        content_patterns,
        eeat,
        link_signals,
        temporal,
        ai_crawlability,
        title,
    ) = {
        let doc = Html::parse_document(input.html);

        let metadata = extractors::extract_metadata(&doc, url);
        let resources = extractors::extract_resources(&doc, url);
        let main_content = truncate_main_content(&extractors::extract_main_content(&doc));
        let markdown_content = if render_markdown {
            extractors::extract_main_content_html(&doc).and_then(|html| crate::content_saver::markdown::render(&html).ok())
        } else {
            None
        };
        let links = extractors::extract_links(&doc, url);
        let headings = extractors::extract_headings(&doc);
        let structure = extractors::extract_structure(&doc, &main_content);
        let schema_org = extractors::extract_schema_org(&doc);
        let multimedia = extractors::extract_multimedia(&doc, &resources);
        let hreflang = extractors::extract_hreflang(&doc, url);
        let readability = extractors::compute_readability(&main_content);
        let content_patterns = extractors::extract_content_patterns(&main_content);
        let path = url::Url::parse(url).map(|u| u.path().to_string()).unwrap_or_default();
        let eeat = extractors::extract_eeat(&doc, &main_content, &path);
        let link_signals = extractors::extract_link_signals(&links);
        let temporal = extractors::extract_temporal(&metadata, &main_content);
        let ai_crawlability = extractors::extract_ai_crawlability(&metadata, &main_content, input.html.len());

        let title = doc
            .select(&scraper::Selector::parse("title").expect("static selector"))
            .next()
            .map(|el| el.text().collect::<String>())
            .unwrap_or_default();

        (
            metadata,
            resources,
            main_content,
            markdown_content,
            links,
            headings,
            structure,
            schema_org,
            multimedia,
            hreflang,
            readability,
            content_patterns,
            eeat,
            link_signals,
            temporal,
            ai_crawlability,
            title,
        )
    };

    let (timing, security) = if let Some(page) = page {
        let timing = extractors::extract_timing_info(page).await.ok();
        let security = extractors::extract_security_info(page).await.unwrap_or_default();
        (timing, security)
    } else {
        (None, crate::page_extractor::schema::SecurityInfo { https: url.starts_with("https://"), ..Default::default() })
    };

    let screenshot_path = if let (Some(page), Some(dir)) = (page, screenshot_dir) {
        extractors::capture_screenshot(page, url, dir)
            .await
            .ok()
            .map(|p| p.to_string_lossy().to_string())
    } else {
        None
    };

    Ok(PageResult {
        url: url.to_string(),
        title,
        main_content,
        markdown_content,
        rendered: input.rendered,
        status_code: input.status_code,
        metadata,
        resources,
        timing,
        security,
        links,
        readability,
        content_patterns,
        headings,
        structure,
        schema_org,
        eeat,
        link_signals,
        hreflang,
        temporal,
        multimedia,
        ai_crawlability,
        screenshot_path,
        crawled_at: chrono::Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn extracts_result_from_plain_html_without_a_page() {
        let html = r#"<html><head><title>Hi</title></head><body><article><h1>Hi</h1><p>Some content here with a question? Yes it is.</p></article></body></html>"#;
        let input = PageInput { url: "https://example.com/", html, status_code: Some(200), rendered: false };
        let result = extract_page_result(input, None, None, false).await.unwrap();
        assert_eq!(result.title, "Hi");
        assert!(!result.rendered);
        assert!(result.timing.is_none());
        assert!(result.markdown_content.is_none());
    }

    #[tokio::test]
    async fn renders_markdown_when_requested() {
        let html = r#"<html><head><title>Hi</title></head><body><article><h2>Section</h2><p>Body text.</p></article></body></html>"#;
        let input = PageInput { url: "https://example.com/", html, status_code: Some(200), rendered: false };
        let result = extract_page_result(input, None, None, true).await.unwrap();
        assert!(result.markdown_content.unwrap().contains("## Section"));
    }

    #[test]
    fn truncate_main_content_leaves_short_text_untouched() {
        assert_eq!(truncate_main_content("short text"), "short text");
    }

    #[test]
    fn truncate_main_content_breaks_at_a_word_boundary() {
        let word = "word ";
        let text = word.repeat(MAIN_CONTENT_CHAR_CAP / word.len() + 10);
        let truncated = truncate_main_content(&text);
        assert!(truncated.chars().count() <= MAIN_CONTENT_CHAR_CAP);
        assert!(!truncated.ends_with("wor"));
    }
}
