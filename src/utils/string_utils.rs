//! Char-boundary-safe truncation for page text.
//!
//! Crawled HTML text is full of multi-byte UTF-8 (curly quotes, em dashes,
//! CJK, emoji in headings); naive byte slicing panics on these. Everything
//! here works in Unicode scalar values instead of bytes.

/// Byte index of the `n`-th character, or the string's length if it's shorter.
fn nth_char_boundary(s: &str, n: usize) -> usize {
    s.char_indices().nth(n).map_or(s.len(), |(idx, _)| idx)
}

/// Truncate to at most `max_chars` characters, cutting wherever that lands.
#[inline]
#[must_use]
pub fn safe_truncate_chars(s: &str, max_chars: usize) -> &str {
    &s[..nth_char_boundary(s, max_chars)]
}

/// Truncate to at most `max_chars` characters, then back up to the nearest
/// preceding character in `boundary_chars` (or whitespace) so the cut lands
/// between words instead of inside one. A no-op (returns `s.len()`) when the
/// string is already within the cap. Falls back to the raw character cut
/// when no boundary exists in range.
#[must_use]
pub fn safe_truncate_boundary(s: &str, max_chars: usize, boundary_chars: &str) -> usize {
    let limit = nth_char_boundary(s, max_chars);
    if limit >= s.len() {
        return s.len();
    }
    s[..limit]
        .rfind(|c: char| c.is_whitespace() || boundary_chars.contains(c))
        .unwrap_or(limit)
}

/// [`safe_truncate_boundary`] plus the slice itself, for callers that only
/// need the truncated text.
#[must_use]
pub fn truncate_at_boundary<'a>(s: &'a str, max_chars: usize, boundary_chars: &str) -> &'a str {
    &s[..safe_truncate_boundary(s, max_chars, boundary_chars)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_truncate_chars_counts_unicode_scalars_not_bytes() {
        assert_eq!(safe_truncate_chars("Hello, World!", 5), "Hello");
        assert_eq!(safe_truncate_chars("日本語のテキスト", 3), "日本語");
        assert_eq!(safe_truncate_chars("🎉🎊🎈", 2), "🎉🎊");
    }

    #[test]
    fn safe_truncate_chars_is_a_no_op_below_the_cap() {
        assert_eq!(safe_truncate_chars("Hi", 100), "Hi");
    }

    #[test]
    fn safe_truncate_boundary_backs_up_to_whitespace() {
        let text = "Hello, wonderful world of Unicode!";
        let idx = safe_truncate_boundary(text, 20, ",;:");
        assert_eq!(&text[..idx], "Hello, wonderful");
    }

    #[test]
    fn safe_truncate_boundary_falls_back_to_the_raw_cut_with_no_boundary_in_range() {
        let text = "supercalifragilisticexpialidocious";
        let idx = safe_truncate_boundary(text, 10, ",;:");
        assert_eq!(idx, nth_char_boundary(text, 10));
    }

    #[test]
    fn truncate_at_boundary_returns_the_slice_directly() {
        let text = "one two three four";
        assert_eq!(truncate_at_boundary(text, 9, ""), "one two");
    }
}
