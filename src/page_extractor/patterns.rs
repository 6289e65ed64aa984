//! Compiled regex set and curated domain list backing the content-pattern,
//! temporal, and authority-link extractors.
//!
//! Grounded on `geo_extractors.py`'s module-level `re.compile(...)` constants.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).expect("static pattern is valid regex")
}

pub static QUESTION_PATTERN: Lazy<Regex> =
    Lazy::new(|| re(r"(?i)\b(what|why|how|when|where|who|which|can|does|is|are)\b[^.!?]*\?"));

pub static DEFINITION_PATTERN: Lazy<Regex> = Lazy::new(|| {
    re(r"(?i)\b\w[\w\s]{0,40}\s+(is|are|refers to|means)\s+(a|an|the)\s")
});

pub static COMPARISON_PATTERN: Lazy<Regex> =
    Lazy::new(|| re(r"(?i)\b(vs\.?|versus|compared to|rather than|better than|worse than)\b"));

pub static STATISTIC_PATTERN: Lazy<Regex> =
    Lazy::new(|| re(r"\b\d{1,3}(,\d{3})*(\.\d+)?\s?(%|percent|million|billion|thousand)\b"));

pub static CITATION_PATTERN: Lazy<Regex> =
    Lazy::new(|| re(r"(?i)\b(according to|cited by|source:|study by|research from)\b"));

pub static EXPERT_PATTERN: Lazy<Regex> =
    Lazy::new(|| re(r"(?i)\b(Dr\.|Prof\.|PhD|M\.D\.|expert|specialist|certified)\b"));

/// Subject-predicate-object style sentences: a rough proxy for
/// machine-extractable semantic triples.
pub static SEMANTIC_TRIPLE_PATTERN: Lazy<Regex> =
    Lazy::new(|| re(r"(?i)\b\w+\s+(is|are|was|were|has|have|provides|enables|supports)\s+\w+"));

pub static YEAR_PATTERN: Lazy<Regex> = Lazy::new(|| re(r"\b(19|20)\d{2}\b"));

pub static RELATIVE_TIME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    re(r"(?i)\b(today|yesterday|last (week|month|year)|\d+\s+(days?|weeks?|months?|years?)\s+ago)\b")
});

pub static AS_OF_PATTERN: Lazy<Regex> = Lazy::new(|| re(r"(?i)\bas of\s+\w+"));

pub static MONTH_YEAR_PATTERN: Lazy<Regex> = Lazy::new(|| {
    re(r"(?i)\b(January|February|March|April|May|June|July|August|September|October|November|December)\s+\d{4}\b")
});

pub static OUTDATED_PATTERN: Lazy<Regex> = Lazy::new(|| {
    re(r"(?i)\b(deprecated|no longer (supported|maintained|available)|outdated|superseded by)\b")
});

pub static TRUST_PAGE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    re(r"(?i)/(about|contact|privacy|terms|author|team)(-us)?/?$")
});

pub static EMAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| re(r"[a-zA-Z0-9._%+\-]+@[a-zA-Z0-9.\-]+\.[a-zA-Z]{2,}"));

pub static PHONE_PATTERN: Lazy<Regex> =
    Lazy::new(|| re(r"\(?\+?\d{1,3}\)?[\s.\-]?\(?\d{2,4}\)?[\s.\-]?\d{3,4}[\s.\-]?\d{3,4}"));

/// Domains treated as high-authority outbound-link targets for the
/// E-E-A-T/authority-link signal. Not exhaustive, a representative seed set.
pub static AUTHORITY_DOMAINS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "wikipedia.org",
        "gov",
        "edu",
        "nature.com",
        "sciencedirect.com",
        "ncbi.nlm.nih.gov",
        "who.int",
        "un.org",
        "ieee.org",
        "acm.org",
        "nytimes.com",
        "reuters.com",
        "bbc.com",
        "bbc.co.uk",
        "apnews.com",
    ]
    .into_iter()
    .collect()
});

/// Whether `host` is, or is a subdomain of, a curated authority domain, or
/// ends in a `.gov`/`.edu` TLD.
#[must_use]
pub fn is_authority_host(host: &str) -> bool {
    let host = host.to_lowercase();
    if host.ends_with(".gov") || host.ends_with(".edu") || host == "gov" || host == "edu" {
        return true;
    }
    AUTHORITY_DOMAINS
        .iter()
        .any(|d| host == *d || host.ends_with(&format!(".{d}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn question_pattern_matches_interrogative_sentence() {
        assert!(QUESTION_PATTERN.is_match("How does this work?"));
        assert!(!QUESTION_PATTERN.is_match("This is a declarative sentence."));
    }

    #[test]
    fn statistic_pattern_matches_percentages() {
        assert!(STATISTIC_PATTERN.is_match("Adoption grew by 42.5%"));
        assert!(STATISTIC_PATTERN.is_match("over 3 million users"));
    }

    #[test]
    fn authority_host_recognizes_curated_and_tld_based_domains() {
        assert!(is_authority_host("en.wikipedia.org"));
        assert!(is_authority_host("www.nasa.gov"));
        assert!(is_authority_host("stanford.edu"));
        assert!(!is_authority_host("example.com"));
    }

    #[test]
    fn outdated_pattern_matches_deprecation_language() {
        assert!(OUTDATED_PATTERN.is_match("This API is deprecated."));
    }
}
