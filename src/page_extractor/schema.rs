//! Wire types for extracted page data: the raw per-page signal groups
//! produced by the extraction pipeline and shipped to the backend.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PageMetadata {
    pub description: Option<String>,
    pub keywords: Option<Vec<String>>,
    pub author: Option<String>,
    pub published_date: Option<String>,
    pub modified_date: Option<String>,
    pub language: Option<String>,
    pub canonical_url: Option<String>,
    pub robots: Option<String>,
    pub viewport: Option<String>,
    pub headers: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ResourceInfo {
    pub scripts: Vec<ScriptResource>,
    pub stylesheets: Vec<StyleResource>,
    pub images: Vec<ImageResource>,
    pub media: Vec<MediaResource>,
    pub fonts: Vec<FontResource>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptResource {
    pub url: Option<String>,
    #[serde(default)]
    pub inline: bool,
    #[serde(default)]
    pub async_load: bool,
    #[serde(default)]
    pub defer: bool,
    pub content_hash: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StyleResource {
    pub url: Option<String>,
    #[serde(default)]
    pub inline: bool,
    pub media: Option<String>,
    pub content_hash: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageResource {
    pub url: String,
    pub alt: Option<String>,
    pub dimensions: Option<(u32, u32)>,
    pub size_bytes: Option<u64>,
    pub format: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaResource {
    pub url: String,
    pub media_type: String,
    pub format: Option<String>,
    pub duration: Option<f64>,
    pub size_bytes: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FontResource {
    pub url: Option<String>,
    pub format: Option<String>,
    pub family: String,
    pub weight: Option<u32>,
    pub style: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TimingInfo {
    pub navigation_start: u64,
    pub dom_complete: u64,
    pub load_complete: u64,
    pub first_paint: Option<u64>,
    pub first_contentful_paint: Option<u64>,
    pub largest_contentful_paint: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SecurityInfo {
    pub https: bool,
    pub hsts: bool,
    pub csp: Option<String>,
    pub x_frame_options: Option<String>,
    pub permissions_policy: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlLink {
    pub url: String,
    pub text: String,
    pub title: String,
    pub rel: String,
    pub is_external: bool,
    pub path: String,
}

/// Readability signals (Flesch Reading Ease family plus raw counts).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ReadabilitySignals {
    pub word_count: u32,
    pub sentence_count: u32,
    pub avg_words_per_sentence: f64,
    pub avg_syllables_per_word: f64,
    pub flesch_reading_ease: f64,
}

/// Surface counts of the content-pattern regex family.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ContentPatternSignals {
    pub question_count: u32,
    pub definition_count: u32,
    pub comparison_count: u32,
    pub statistic_count: u32,
    pub citation_count: u32,
    pub expert_mention_count: u32,
    pub semantic_triple_count: u32,
}

/// Heading hierarchy health: counts per level and whether levels are skipped.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HeadingSignals {
    pub h1_count: u32,
    pub h2_count: u32,
    pub h3_count: u32,
    pub h4_plus_count: u32,
    pub has_single_h1: bool,
    pub skips_levels: bool,
    pub headings: Vec<String>,
}

/// Presence of structural building blocks that help an extractor machine
/// segment the page (lists, tables, code blocks, FAQ-shaped sections).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StructureSignals {
    pub list_count: u32,
    pub table_count: u32,
    pub code_block_count: u32,
    pub blockquote_count: u32,
    pub has_faq_section: bool,
    pub has_table_of_contents: bool,
}

/// One JSON-LD / microdata block found on the page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaOrgEntry {
    pub schema_type: Option<String>,
    pub raw: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SchemaOrgSignals {
    pub entries: Vec<SchemaOrgEntry>,
    pub types_present: Vec<String>,
    pub has_article: bool,
    pub has_faq_page: bool,
    pub has_how_to: bool,
    pub has_breadcrumb_list: bool,
}

/// Experience/Expertise/Authoritativeness/Trust surface signals.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EeatSignals {
    pub has_author_byline: bool,
    pub has_author_bio: bool,
    pub expert_mention_count: u32,
    pub citation_count: u32,
    pub is_trust_page: bool,
    pub has_contact_info: bool,
}

/// Outbound-link composition: internal vs external, and how many external
/// links point at a curated authority domain.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LinkSignals {
    pub internal_link_count: u32,
    pub external_link_count: u32,
    pub authority_link_count: u32,
    pub nofollow_link_count: u32,
    pub broken_link_samples: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HreflangSignals {
    pub alternates: Vec<HreflangEntry>,
    pub has_x_default: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HreflangEntry {
    pub lang: String,
    pub href: String,
}

/// Dated-content signals, plus the resolved "best guess" content age.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TemporalSignals {
    pub meta_published_date: Option<String>,
    pub meta_modified_date: Option<String>,
    pub visible_year_mentions: Vec<u32>,
    pub has_relative_time_language: bool,
    pub has_as_of_language: bool,
    pub has_outdated_language: bool,
    /// Best-effort resolved content date, cascading from structured metadata
    /// down to the most recent year mentioned in visible text.
    pub resolved_content_date: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MultimediaSignals {
    pub image_count: u32,
    pub images_with_alt_count: u32,
    pub video_count: u32,
    pub audio_count: u32,
    pub has_transcript: bool,
}

/// Signals relevant to whether an AI/LLM crawler can read and cite the page.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AiCrawlabilitySignals {
    pub robots_allows_ai_agents: bool,
    pub has_llms_txt_reference: bool,
    pub content_requires_js: bool,
    pub main_content_char_count: u32,
}

/// Full record of everything extracted from one fetched page.
#[derive(Debug, Clone, Serialize)]
pub struct PageResult {
    pub url: String,
    pub title: String,
    pub main_content: String,
    /// Markdown rendering of the same content, present only when the worker
    /// was run with `--render-markdown`.
    pub markdown_content: Option<String>,
    pub rendered: bool,
    pub status_code: Option<u16>,
    pub metadata: PageMetadata,
    pub resources: ResourceInfo,
    pub timing: Option<TimingInfo>,
    pub security: SecurityInfo,
    pub links: Vec<CrawlLink>,
    pub readability: ReadabilitySignals,
    pub content_patterns: ContentPatternSignals,
    pub headings: HeadingSignals,
    pub structure: StructureSignals,
    pub schema_org: SchemaOrgSignals,
    pub eeat: EeatSignals,
    pub link_signals: LinkSignals,
    pub hreflang: HreflangSignals,
    pub temporal: TemporalSignals,
    pub multimedia: MultimediaSignals,
    pub ai_crawlability: AiCrawlabilitySignals,
    pub screenshot_path: Option<String>,
    pub crawled_at: chrono::DateTime<chrono::Utc>,
}
