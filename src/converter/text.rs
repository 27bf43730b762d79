//! Cleanup of text extracted from PDF pages.
//!
//! Used by the `y1x` (plain text) and `y1d` (text DOCX) modes. Every rule is
//! a pure `&str → String` pass; order matters only in that line endings are
//! normalised before anything splits on `\n`.

use once_cell::sync::Lazy;
use regex::Regex;

/// Normalise raw extracted text: line endings, invisible characters, spaces.
pub fn clean_extracted(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = remove_invisible_chars(&s);
    strip_spaces(&s)
}

/// Join per-page text with a newline between pages.
pub fn join_pages<I, S>(pages: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out = String::new();
    for (i, page) in pages.into_iter().enumerate() {
        if i > 0 && !out.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(page.as_ref());
    }
    out
}

/// One entry per line, trimmed; blank lines become a single space so the
/// paragraph survives in Word.
pub fn paragraph_lines(text: &str) -> Vec<String> {
    text.split('\n')
        .map(|line| {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                " ".to_string()
            } else {
                trimmed.to_string()
            }
        })
        .collect()
}

// ── Line endings ─────────────────────────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Spaces ───────────────────────────────────────────────────────────────────
//
// CJK layout engines pad glyph runs with spaces that have no meaning in the
// source text. Tabs and newlines are kept.

static RE_SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \u{00A0}\u{3000}]+").unwrap());

fn strip_spaces(input: &str) -> String {
    RE_SPACES.replace_all(input, "").into_owned()
}

// ── Invisible characters ─────────────────────────────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_spaces_keeps_newlines() {
        assert_eq!(strip_spaces("第 一 行\n second  line"), "第一行\nsecondline");
    }

    #[test]
    fn test_strip_ideographic_and_nbsp() {
        assert_eq!(strip_spaces("甲\u{3000}乙\u{00A0}丙"), "甲乙丙");
    }

    #[test]
    fn test_normalise_line_endings() {
        assert_eq!(normalise_line_endings("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn test_remove_invisible() {
        assert_eq!(remove_invisible_chars("\u{FEFF}ab\u{200B}c"), "abc");
    }

    #[test]
    fn test_clean_extracted_full() {
        let raw = "\u{FEFF}标 题\r\n\r\n 正文 内容 \r\n";
        assert_eq!(clean_extracted(raw), "标题\n\n正文内容\n");
    }

    #[test]
    fn test_join_pages() {
        assert_eq!(join_pages(["a", "b\n", "c"]), "a\nb\nc");
        assert_eq!(join_pages(Vec::<String>::new()), "");
    }

    #[test]
    fn test_paragraph_lines_blank_becomes_space() {
        let lines = paragraph_lines("\tfirst\t\n\nsecond");
        assert_eq!(lines, vec!["first", " ", "second"]);
    }
}
