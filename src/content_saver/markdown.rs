//! Optional markdown rendering of a page's main content, off by default.
//!
//! Grounded on the original pipeline's second crawler tree, which carries a
//! `markdown_content` item field alongside the plain-text one.

use anyhow::{Context, Result};

/// Converts the main-content HTML fragment to markdown. Callers only invoke
/// this when markdown rendering is requested; it always runs against the
/// same element `extract_main_content` already selected.
pub fn render(main_content_html: &str) -> Result<String> {
    htmd::convert(main_content_html).context("failed to convert main content to markdown")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_headings_and_paragraphs() {
        let html = "<article><h2>Title</h2><p>Some <strong>bold</strong> text.</p></article>";
        let markdown = render(html).unwrap();
        assert!(markdown.contains("## Title"));
        assert!(markdown.contains("**bold**"));
    }
}
