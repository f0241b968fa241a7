//! Text cleanup for titles and abstracts coming back from remote APIs.

use regex::Regex;
use scraper::Html;
use std::sync::OnceLock;

/// Block-level tags whose boundaries separate words
fn block_tag() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)<(/?)(jats:)?(p|title|sec|div|br|li|h[1-6])\b").expect("valid regex")
    })
}

/// Strip HTML/JATS markup, decode entities and collapse whitespace.
///
/// OpenAlex and Semantic Scholar abstracts regularly carry `<jats:p>`, `<i>` or `&amp;`.
/// Plain text takes the fast path and is only whitespace-normalized.
pub fn strip_markup(input: &str) -> String {
    if !input.contains('<') && !input.contains('&') {
        return collapse_whitespace(input);
    }

    let spaced = block_tag().replace_all(input, " <$1$2$3");
    let fragment = Html::parse_fragment(&spaced);
    let text: String = fragment.root_element().text().collect();
    collapse_whitespace(&text)
}

/// Replace every run of whitespace (including newlines) with one space and trim.
pub fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_only_collapsed() {
        assert_eq!(
            collapse_whitespace("  Attention is\n   all you\tneed "),
            "Attention is all you need"
        );
        assert_eq!(strip_markup("Deep\n  learning"), "Deep learning");
    }

    #[test]
    fn test_jats_tags_are_removed() {
        let raw = "<jats:title>Abstract</jats:title><jats:p>We study <i>graph</i>s.</jats:p>";
        assert_eq!(strip_markup(raw), "Abstract We study graphs.");
    }

    #[test]
    fn test_entities_are_decoded() {
        assert_eq!(strip_markup("Q&amp;A over &lt;tables&gt;"), "Q&A over <tables>");
        assert_eq!(strip_markup("caf&eacute;"), "café");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(strip_markup(""), "");
        assert_eq!(strip_markup("<p>  </p>"), "");
    }
}
