//! Text normalization applied before tokenization.

use regex::Regex;
use std::sync::LazyLock;

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?\S+|www\S+").expect("valid url regex"));

static DISALLOWED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9\s,]").expect("valid character regex"));

static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Normalizes a piece of news text.
///
/// Lowercases, drops URL tokens, keeps only ASCII letters, digits,
/// whitespace and commas, then collapses whitespace and trims.
///
/// URLs are stripped a second time after the character filter because
/// dropping punctuation can join fragments into a new `http...` token.
/// With both passes the result is a fixed point of `clean_text`.
pub fn clean_text(text: &str) -> String {
    let lowered = text.to_lowercase();
    let without_urls = URL_RE.replace_all(&lowered, "");
    let filtered = DISALLOWED_RE.replace_all(&without_urls, "");
    let without_urls = URL_RE.replace_all(&filtered, "");
    WHITESPACE_RE
        .replace_all(&without_urls, " ")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_cleaning() {
        assert_eq!(
            clean_text("  Stocks RALLY!!  after   earnings beat, analysts say. "),
            "stocks rally after earnings beat, analysts say"
        );
    }

    #[test]
    fn test_removes_urls() {
        assert_eq!(
            clean_text("Read more at https://example.com/a?b=1 and www.news.org today"),
            "read more at and today"
        );
        assert_eq!(clean_text("see http://x.y"), "see");
    }

    #[test]
    fn test_keeps_commas_and_digits() {
        assert_eq!(clean_text("Revenue rose 12.5% to $1,200m"), "revenue rose 125 to 1,200m");
    }

    #[test]
    fn test_non_ascii_is_dropped() {
        assert_eq!(clean_text("Café profits € up"), "caf profits up");
    }

    #[test]
    fn test_empty_and_symbol_only() {
        assert_eq!(clean_text(""), "");
        assert_eq!(clean_text("!!! ??? ..."), "");
    }

    #[test]
    fn test_idempotent() {
        let samples = [
            "Shares of ACME (NYSE: ACM) fell 3% -- see https://t.co/xyz",
            "h.t.t.p.s.//spliced url",
            "h!ttp is not a link until cleaned",
            "wWw-Example-Com, tabs\tand\nnewlines",
            "Ünïcödé ünd ASCII, mixed 123",
            "   ",
            "plain text, already clean",
        ];
        for sample in samples {
            let once = clean_text(sample);
            assert_eq!(clean_text(&once), once, "not idempotent for {sample:?}");
        }
    }

    #[test]
    fn test_spliced_url_is_removed() {
        assert_eq!(clean_text("h!ttp/example is gone"), "is gone");
    }
}
