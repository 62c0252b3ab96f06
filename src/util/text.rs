use std::borrow::Cow;

/// Maximum length of a generated URL slug, in bytes.
///
/// Slugs are pure ASCII, so bytes and characters coincide.
const MAX_SLUG_LEN: usize = 80;

/// Strips supplementary-plane characters (4-byte UTF-8 sequences, lead
/// bytes 0xF0–0xF7) from a string.
///
/// Feed payloads occasionally smuggle emoji or malformed astral-plane
/// sequences into titles; downstream consumers only handle the basic
/// multilingual plane, so these are dropped wholesale.
///
/// Returns `Cow::Borrowed` when the input contains no such characters
/// (the common case) — a single scan with no allocation.
pub fn strip_supplementary(s: &str) -> Cow<'_, str> {
    if s.chars().all(|c| c.len_utf8() < 4) {
        return Cow::Borrowed(s);
    }
    Cow::Owned(s.chars().filter(|c| c.len_utf8() < 4).collect())
}

/// Derives a URL slug from an item title.
///
/// ASCII-lowercases the input, collapses every run of non-alphanumeric
/// characters to a single `-`, trims leading/trailing dashes, and caps
/// the result at [`MAX_SLUG_LEN`] characters. Non-ASCII characters are
/// treated as separators.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len().min(MAX_SLUG_LEN));
    let mut pending_dash = false;

    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
            if slug.len() >= MAX_SLUG_LEN {
                break;
            }
        } else {
            pending_dash = true;
        }
    }

    // The length cap can land mid-word; never end on a dash
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_clean_text_returns_borrowed() {
        let input = "Hello, world — plain BMP text";
        let result = strip_supplementary(input);
        assert!(matches!(result, Cow::Borrowed(_)));
        assert_eq!(result, input);
    }

    #[test]
    fn test_strip_removes_emoji() {
        let result = strip_supplementary("Hi \u{1F600} there");
        assert!(matches!(result, Cow::Owned(_)));
        assert_eq!(result, "Hi  there");
    }

    #[test]
    fn test_strip_keeps_three_byte_chars() {
        // CJK and friends are 3-byte sequences and must survive
        let input = "日本語 – ok";
        assert_eq!(strip_supplementary(input), input);
    }

    #[test]
    fn test_slugify_basic() {
        assert_eq!(slugify("Hello, World!"), "hello-world");
    }

    #[test]
    fn test_slugify_collapses_separator_runs() {
        assert_eq!(slugify("a -- b ?? c"), "a-b-c");
    }

    #[test]
    fn test_slugify_trims_edges() {
        assert_eq!(slugify("  ...leading and trailing...  "), "leading-and-trailing");
    }

    #[test]
    fn test_slugify_non_ascii_is_separator() {
        assert_eq!(slugify("café au lait"), "caf-au-lait");
    }

    #[test]
    fn test_slugify_empty() {
        assert_eq!(slugify(""), "");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn test_slugify_caps_length() {
        let long = "word ".repeat(40);
        let slug = slugify(&long);
        assert!(slug.len() <= 80);
        assert!(!slug.ends_with('-'));
    }
}
